//! Tracker Service Module
//!
//! Single consumer of discovery events and display commands. Owns the device
//! registry, the radar loop and the geo estimator, so every mutation happens
//! on one task and the display only ever sees snapshots.

use crate::domain::geo::{GeoEstimator, LocationEstimate, UnavailableReason};
use crate::domain::models::{
    AppEvent, DiscoveryEvent, LatLon, MessageSeverity, StatusMessage, TrackedDevice,
};
use crate::domain::radar::RadarLoop;
use crate::domain::registry::DeviceRegistry;
use crate::domain::settings::Settings;
use crate::domain::signal::DistanceModel;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

/// Requests from the display layer.
#[derive(Debug)]
pub enum TrackerCommand {
    StartScan,
    StopScan,
    AttachRadar,
    DetachRadar,
    ToggleFavorite(Uuid),
    RequestLocation {
        device_id: Uuid,
        origin: Option<LatLon>,
        heading_deg: f64,
        reply: oneshot::Sender<LocationEstimate>,
    },
    Snapshot(oneshot::Sender<Vec<TrackedDevice>>),
}

pub struct TrackerService {
    registry: DeviceRegistry,
    radar: RadarLoop,
    geo: GeoEstimator,
    model: DistanceModel,
    last_rssi: HashMap<Uuid, i32>,
    scanning: bool,
    stale_after: Option<chrono::Duration>,
    tick_interval: Duration,
    rng: StdRng,
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl TrackerService {
    pub fn new(settings: &Settings, event_sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Self {
            registry: DeviceRegistry::new(),
            radar: RadarLoop::new(&settings.radar, settings.rng_seed),
            geo: GeoEstimator::new(settings.geo.clone()),
            model: settings.estimator,
            last_rssi: HashMap::new(),
            scanning: false,
            stale_after: settings
                .stale_after_secs
                .map(|secs| chrono::Duration::seconds(secs as i64)),
            tick_interval: Duration::from_millis(settings.radar.tick_interval_ms.max(1)),
            rng,
            event_sender,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn radar(&self) -> &RadarLoop {
        &self.radar
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Drive the service until the command channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<TrackerCommand>,
        mut discovery: mpsc::UnboundedReceiver<DiscoveryEvent>,
    ) {
        info!("Tracker service started");
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut discovery_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = discovery.recv(), if discovery_open => match event {
                    Some(event) => self.handle_discovery(event),
                    None => {
                        debug!("Discovery feed closed");
                        discovery_open = false;
                    }
                },
                _ = ticker.tick() => self.tick(),
            }
        }

        info!("Tracker service stopped");
    }

    pub fn handle_command(&mut self, command: TrackerCommand) {
        match command {
            TrackerCommand::StartScan => self.start_scan(),
            TrackerCommand::StopScan => self.stop_scan(),
            TrackerCommand::AttachRadar => self.radar.attach(),
            TrackerCommand::DetachRadar => self.radar.detach(),
            TrackerCommand::ToggleFavorite(id) => {
                if self.registry.toggle_favorite(&id).is_some() {
                    self.publish_devices();
                }
            }
            TrackerCommand::RequestLocation {
                device_id,
                origin,
                heading_deg,
                reply,
            } => {
                let estimate = self.locate(device_id, origin, heading_deg);
                let _ = reply.send(estimate);
            }
            TrackerCommand::Snapshot(reply) => {
                let _ = reply.send(self.registry.devices().to_vec());
            }
        }
    }

    /// Apply one sighting. Ignored while not scanning.
    pub fn handle_discovery(&mut self, event: DiscoveryEvent) {
        if !self.scanning {
            return;
        }
        if self.registry.ingest(&event, &self.model) {
            self.last_rssi.insert(event.peripheral_id, event.rssi);
            self.publish_devices();
        }
    }

    /// One animation step plus stale eviction when configured.
    pub fn tick(&mut self) {
        self.tick_at(Utc::now());
    }

    pub fn tick_at(&mut self, now: DateTime<Utc>) {
        if let Some(max_age) = self.stale_after {
            let removed = self.registry.remove_stale(max_age, now);
            if !removed.is_empty() {
                for id in &removed {
                    self.last_rssi.remove(id);
                }
                self.publish_devices();
            }
        }

        if let Some(frame) = self.radar.tick(self.registry.devices()) {
            let _ = self.event_sender.send(AppEvent::RadarFrame(frame));
        }
    }

    fn start_scan(&mut self) {
        info!("Starting scan");
        self.registry.clear();
        self.last_rssi.clear();
        self.scanning = true;
        let _ = self.event_sender.send(AppEvent::ScanStatus(true));
        self.publish_devices();
    }

    fn stop_scan(&mut self) {
        if !self.scanning {
            return;
        }
        info!("Stopping scan with {} device(s) tracked", self.registry.len());
        self.scanning = false;
        let _ = self.event_sender.send(AppEvent::ScanStatus(false));
    }

    fn locate(&mut self, device_id: Uuid, origin: Option<LatLon>, heading_deg: f64) -> LocationEstimate {
        let Some(device) = self.registry.get(&device_id) else {
            return LocationEstimate::Unavailable(UnavailableReason::UnknownDevice);
        };
        let rssi = self.last_rssi.get(&device_id).copied();
        let estimate = self
            .geo
            .estimate(origin, heading_deg, device.distance, rssi, &mut self.rng);

        match estimate {
            LocationEstimate::Available { location, .. } => {
                self.registry.set_location(&device_id, location);
            }
            LocationEstimate::Unavailable(reason) => {
                let _ = self.event_sender.send(AppEvent::LogMessage(StatusMessage {
                    message: reason.message().to_string(),
                    severity: MessageSeverity::Warning,
                }));
            }
        }
        estimate
    }

    fn publish_devices(&self) {
        let _ = self
            .event_sender
            .send(AppEvent::DevicesUpdated(self.registry.devices().to_vec()));
    }
}
