//! Radar Animation Loop
//!
//! Owns the sweep angle and the transient per-device [`RadarPosition`]s.
//! Each tick advances the sweep, reconciles positions against the current
//! device set, occasionally jitters markers and relights the ones the sweep
//! line is passing over.

use crate::domain::models::{Point2D, RadarFrame, RadarPosition, TrackedDevice};
use crate::domain::placement::PositionEstimator;
use crate::domain::settings::RadarSettings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarState {
    /// No view attached yet.
    Idle,
    Sweeping,
}

pub struct RadarLoop {
    state: RadarState,
    sweep_angle: f64,
    sweep_step: f64,
    sweep_tolerance: f64,
    lit_opacity: f64,
    dim_opacity: f64,
    jitter_probability: f64,
    dense_threshold: usize,
    dense_refresh_probability: f64,
    estimator: PositionEstimator,
    positions: HashMap<Uuid, RadarPosition>,
    rng: StdRng,
}

impl RadarLoop {
    pub fn new(settings: &RadarSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            state: RadarState::Idle,
            sweep_angle: 0.0,
            sweep_step: settings.sweep_step_deg,
            sweep_tolerance: settings.sweep_tolerance_deg.abs(),
            lit_opacity: settings.lit_opacity,
            dim_opacity: settings.dim_opacity,
            jitter_probability: settings.jitter_probability.clamp(0.0, 1.0),
            dense_threshold: settings.dense_threshold,
            dense_refresh_probability: settings.dense_refresh_probability.clamp(0.0, 1.0),
            estimator: PositionEstimator::new(settings),
            positions: HashMap::new(),
            rng,
        }
    }

    /// View entry: start sweeping from zero.
    pub fn attach(&mut self) {
        info!("Radar attached");
        self.state = RadarState::Sweeping;
        self.sweep_angle = 0.0;
        self.positions.clear();
    }

    /// View teardown: positions are only meaningful while drawn.
    pub fn detach(&mut self) {
        info!("Radar detached");
        self.state = RadarState::Idle;
        self.positions.clear();
    }

    pub fn state(&self) -> RadarState {
        self.state
    }

    pub fn sweep_angle(&self) -> f64 {
        self.sweep_angle
    }

    pub fn position(&self, id: &Uuid) -> Option<RadarPosition> {
        self.positions.get(id).copied()
    }

    pub fn estimator(&self) -> &PositionEstimator {
        &self.estimator
    }

    /// Advance one animation step. Returns `None` while idle.
    pub fn tick(&mut self, devices: &[TrackedDevice]) -> Option<RadarFrame> {
        if self.state != RadarState::Sweeping {
            return None;
        }

        self.sweep_angle = (self.sweep_angle + self.sweep_step).rem_euclid(360.0);
        let added = self.reconcile(devices);

        let refresh = self.positions.len() <= self.dense_threshold
            || self.rng.gen_bool(self.dense_refresh_probability);
        if refresh {
            self.jitter_all(devices, &added);
        }

        self.relight();
        Some(self.frame(devices))
    }

    /// Place new devices and drop positions whose device is gone. Returns the
    /// ids that received a first placement.
    pub fn reconcile(&mut self, devices: &[TrackedDevice]) -> HashSet<Uuid> {
        let current: HashSet<Uuid> = devices.iter().map(|d| d.id).collect();
        let before = self.positions.len();
        self.positions.retain(|id, _| current.contains(id));
        if self.positions.len() != before {
            debug!("Dropped {} radar position(s)", before - self.positions.len());
        }

        let mut added = HashSet::new();
        for device in devices {
            if self.positions.contains_key(&device.id) {
                continue;
            }
            let placement = {
                let occupied = self.positions.values().map(|p| &p.position);
                self.estimator.place(&device.name, device.distance, occupied)
            };
            debug!(
                "Placed {} at {:.0} deg after {} attempt(s)",
                device.name, placement.angle_deg, placement.attempts
            );
            self.positions.insert(
                device.id,
                RadarPosition {
                    position: placement.point,
                    opacity: self.dim_opacity,
                },
            );
            added.insert(device.id);
        }
        added
    }

    fn jitter_all(&mut self, devices: &[TrackedDevice], skip: &HashSet<Uuid>) {
        for device in devices {
            if skip.contains(&device.id) || !self.rng.gen_bool(self.jitter_probability) {
                continue;
            }
            if let Some(entry) = self.positions.get_mut(&device.id) {
                entry.position = self.estimator.jitter(entry.position, &mut self.rng);
            }
        }
    }

    fn relight(&mut self) {
        let center = self.estimator.center();
        for entry in self.positions.values_mut() {
            let bearing = sweep_bearing(center, entry.position);
            entry.opacity = if is_near_sweep(bearing, self.sweep_angle, self.sweep_tolerance) {
                self.lit_opacity
            } else {
                self.dim_opacity
            };
        }
    }

    /// Devices paired with their radar positions, in list order.
    pub fn frame(&self, devices: &[TrackedDevice]) -> RadarFrame {
        RadarFrame {
            sweep_angle: self.sweep_angle,
            devices: devices
                .iter()
                .filter_map(|d| self.positions.get(&d.id).map(|p| (d.clone(), *p)))
                .collect(),
        }
    }
}

/// Angle of `point` seen from `center` in the sweep's frame: 0 points up and
/// angles grow clockwise.
pub fn sweep_bearing(center: Point2D, point: Point2D) -> f64 {
    let screen = (point.y - center.y).atan2(point.x - center.x).to_degrees();
    (screen + 90.0).rem_euclid(360.0)
}

/// Whether `bearing` lies within `tolerance` degrees of `sweep`, across the
/// 0/360 seam.
pub fn is_near_sweep(bearing: f64, sweep: f64, tolerance: f64) -> bool {
    let diff = (bearing - sweep).rem_euclid(360.0);
    diff < tolerance || diff > 360.0 - tolerance
}
