use proximity_radar::domain::geo::{describe_separation, LocationEstimate};
use proximity_radar::domain::models::AppEvent;
use proximity_radar::domain::settings::SettingsService;
use proximity_radar::infrastructure::discovery::{
    ProxySession, SimulatedAdvertiser, SimulatedLink, TrackerCommand, TrackerService,
};
use proximity_radar::infrastructure::logging::init_logger;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

const DEMO_RUN: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = match SettingsService::new() {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Failed to load settings, using defaults: {}", e);
            SettingsService::load(std::env::temp_dir().join("proximity_radar_settings.json"))
        }
    };
    let settings = settings_service.get().clone();

    let _logging_guard = init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Proximity Radar");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (discovery_tx, discovery_rx) = mpsc::unbounded_channel();

    let advertiser = SimulatedAdvertiser::demo(Duration::from_millis(500), settings.rng_seed);
    let advertiser_task = tokio::spawn(advertiser.run(discovery_tx));
    let tracker_task = tokio::spawn(TrackerService::new(&settings, event_tx.clone()).run(cmd_rx, discovery_rx));

    cmd_tx.send(TrackerCommand::AttachRadar)?;
    cmd_tx.send(TrackerCommand::StartScan)?;

    let deadline = tokio::time::sleep(DEMO_RUN);
    tokio::pin!(deadline);
    let mut frames = 0usize;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = event_rx.recv() => match event {
                Some(AppEvent::RadarFrame(frame)) => {
                    frames += 1;
                    // Roughly one summary line per revolution.
                    if frames % 30 == 0 {
                        for (device, position) in &frame.devices {
                            info!(
                                "{:>14} {:>16} at ({:6.1}, {:6.1}) opacity {:.1}",
                                device.name,
                                device.formatted_distance(),
                                position.position.x,
                                position.position.y,
                                position.opacity
                            );
                        }
                    }
                }
                Some(AppEvent::LogMessage(message)) => {
                    info!("[{:?}] {}", message.severity, message.message)
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    cmd_tx.send(TrackerCommand::StopScan)?;

    let (reply, answer) = oneshot::channel();
    cmd_tx.send(TrackerCommand::Snapshot(reply))?;
    let devices = answer.await?;
    info!("Scan finished with {} device(s)", devices.len());

    if let Some(nearest) = devices.first() {
        let mut session = ProxySession::new(
            nearest.id,
            nearest.battery_level,
            SimulatedLink::new(Duration::from_millis(
                settings.connection.simulated_link_delay_ms,
            )),
            &settings.connection,
            event_tx.clone(),
        );

        if let Err(e) = session.show_location() {
            warn!("{}", e);
        }
        match session.connect().await {
            Ok(status) => info!(
                "{} is {:?} (battery {}%)",
                nearest.name,
                status,
                session.battery_level()
            ),
            Err(e) => error!("Could not connect to {}: {}", nearest.name, e),
        }

        if session.show_location().is_ok() {
            // No live fix here; the configured fallback origin is used if present.
            let (reply, answer) = oneshot::channel();
            cmd_tx.send(TrackerCommand::RequestLocation {
                device_id: nearest.id,
                origin: None,
                heading_deg: 0.0,
                reply,
            })?;
            match answer.await? {
                LocationEstimate::Available {
                    location,
                    distance_m,
                    ..
                } => info!(
                    "{} estimated at {:.5}, {:.5}: {}",
                    nearest.name,
                    location.latitude,
                    location.longitude,
                    describe_separation(distance_m)
                ),
                LocationEstimate::Unavailable(reason) => warn!("{}", reason.message()),
            }
        }

        if let Err(e) = session.play_sound().await {
            warn!("{}", e);
        }
        session.disconnect().await;
    }

    cmd_tx.send(TrackerCommand::DetachRadar)?;
    drop(cmd_tx);
    tracker_task.await?;
    advertiser_task.abort();

    info!("Proximity Radar stopped");
    Ok(())
}
