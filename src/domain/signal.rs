//! Signal Sampler
//!
//! Converts raw RSSI readings into distance estimates. Two strategies exist and
//! are kept apart on purpose: the banded table used for the device list and
//! radar, and the log-distance path-loss curve used for live signal tracking.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a reading cannot be turned into a distance.
pub const UNKNOWN_DISTANCE: f64 = -1.0;

/// Far-field cap of the banded table, in meters.
pub const FAR_FIELD_DISTANCE: f64 = 5.0;

/// Reference RSSI at one meter for the log-distance model.
pub const DEFAULT_TX_POWER: i32 = -59;

/// Free-space path loss exponent.
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.0;

/// RSSI range used to normalise signal quality.
const QUALITY_MAX_RSSI: i32 = -30;
const QUALITY_MIN_RSSI: i32 = -90;

/// Named RSSI to distance strategies. Call sites pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistanceModel {
    /// Stepped table biased toward near-range accuracy.
    Banded,
    /// `10^((tx_power - rssi) / (10 * n))`
    LogDistance {
        tx_power: i32,
        path_loss_exponent: f64,
    },
}

impl Default for DistanceModel {
    fn default() -> Self {
        DistanceModel::Banded
    }
}

impl DistanceModel {
    pub fn log_distance() -> Self {
        DistanceModel::LogDistance {
            tx_power: DEFAULT_TX_POWER,
            path_loss_exponent: DEFAULT_PATH_LOSS_EXPONENT,
        }
    }

    pub fn estimate(&self, rssi: i32) -> f64 {
        match *self {
            DistanceModel::Banded => banded_distance(rssi),
            DistanceModel::LogDistance {
                tx_power,
                path_loss_exponent,
            } => log_distance(rssi, tx_power, path_loss_exponent),
        }
    }
}

/// Banded RSSI to meters conversion.
///
/// A reading of exactly 0 means the radio could not measure the signal and
/// yields [`UNKNOWN_DISTANCE`]. Positive readings fall into the closest band.
pub fn banded_distance(rssi: i32) -> f64 {
    if rssi == 0 {
        return UNKNOWN_DISTANCE;
    }

    if rssi >= -50 {
        0.2
    } else if rssi >= -65 {
        0.5
    } else if rssi >= -75 {
        (rssi + 65).abs() as f64 / 10.0
    } else if rssi >= -85 {
        2.0 + (rssi + 75).abs() as f64 / 10.0
    } else {
        FAR_FIELD_DISTANCE
    }
}

/// Continuous log-distance path-loss estimate, sub-meter precision.
pub fn log_distance(rssi: i32, tx_power: i32, path_loss_exponent: f64) -> f64 {
    if rssi == 0 {
        return UNKNOWN_DISTANCE;
    }
    let exponent = (tx_power - rssi) as f64 / (10.0 * path_loss_exponent);
    10f64.powf(exponent)
}

/// Signal quality in `[0, 1]`, 1 being the strongest displayable signal.
pub fn signal_quality(rssi: i32) -> f64 {
    let range = (QUALITY_MIN_RSSI - QUALITY_MAX_RSSI) as f64;
    let normalized = (rssi - QUALITY_MAX_RSSI) as f64 / range;
    1.0 - normalized.clamp(0.0, 1.0)
}

/// Number of lit bars out of `bar_count`.
pub fn signal_bars(rssi: i32, bar_count: u8) -> u8 {
    let threshold = signal_quality(rssi) * bar_count as f64;
    (0..bar_count).filter(|&i| (i as f64) < threshold).count() as u8
}

pub fn format_precise_distance(distance: f64) -> String {
    if distance < 0.0 {
        "Unknown".to_string()
    } else if distance < 1.0 {
        format!("~{} cm", (distance * 100.0) as i64)
    } else {
        format!("~{:.1} m", distance)
    }
}

/// Stable placeholder battery level (1-100) until a real reading arrives.
pub fn simulated_battery_level(peripheral_id: &Uuid) -> u8 {
    (fnv1a_64(peripheral_id.as_bytes()) % 100) as u8 + 1
}

/// 64-bit FNV-1a. Used wherever placement or simulation must be stable
/// across runs and platforms.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(PRIME)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTrend {
    GettingCloser,
    MovingAway,
    Steady,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalReading {
    pub rssi: i32,
    pub distance: f64,
    pub bars: u8,
    pub trend: SignalTrend,
}

/// Live "signal tracker" for a single connected device.
pub struct SignalTracker {
    model: DistanceModel,
    bar_count: u8,
    last_distance: Option<f64>,
}

impl SignalTracker {
    pub fn new(model: DistanceModel, bar_count: u8) -> Self {
        Self {
            model,
            bar_count,
            last_distance: None,
        }
    }

    pub fn update(&mut self, rssi: i32) -> SignalReading {
        let distance = self.model.estimate(rssi);
        let trend = match self.last_distance {
            Some(previous) if distance >= 0.0 && distance < previous => SignalTrend::GettingCloser,
            Some(previous) if distance >= 0.0 && distance > previous => SignalTrend::MovingAway,
            _ => SignalTrend::Steady,
        };
        if distance >= 0.0 {
            self.last_distance = Some(distance);
        }

        SignalReading {
            rssi,
            distance,
            bars: signal_bars(rssi, self.bar_count),
            trend,
        }
    }
}

impl Default for SignalTracker {
    fn default() -> Self {
        Self::new(DistanceModel::log_distance(), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn zero_reading_is_unknown() {
        assert_eq!(banded_distance(0), UNKNOWN_DISTANCE);
        assert_eq!(DistanceModel::Banded.estimate(0), UNKNOWN_DISTANCE);
        assert_eq!(DistanceModel::log_distance().estimate(0), UNKNOWN_DISTANCE);
    }

    #[test]
    fn band_table_matches_exactly() {
        assert!(approx(banded_distance(-48), 0.2));
        assert!(approx(banded_distance(-50), 0.2));
        assert!(approx(banded_distance(-51), 0.5));
        assert!(approx(banded_distance(-65), 0.5));
        assert!(approx(banded_distance(-66), 0.1));
        assert!(approx(banded_distance(-70), 0.5));
        assert!(approx(banded_distance(-75), 1.0));
        assert!(approx(banded_distance(-76), 2.1));
        assert!(approx(banded_distance(-85), 3.0));
        assert!(approx(banded_distance(-86), 5.0));
        assert!(approx(banded_distance(-95), 5.0));
        assert!(approx(banded_distance(-500), 5.0));
    }

    #[test]
    fn positive_readings_clamp_into_nearest_band() {
        assert!(approx(banded_distance(12), 0.2));
        assert!(approx(banded_distance(i32::MAX), 0.2));
    }

    #[test]
    fn distance_grows_within_each_band_as_signal_weakens() {
        let bands = [(-1, -50), (-51, -65), (-66, -75), (-76, -85), (-86, -200)];
        for (top, bottom) in bands {
            let mut previous = banded_distance(top);
            for rssi in (bottom..top).rev() {
                let current = banded_distance(rssi);
                assert!(current >= previous, "rssi {} regressed", rssi);
                previous = current;
            }
        }
    }

    #[test]
    fn every_negative_reading_has_a_concrete_distance() {
        for rssi in -200..0 {
            let distance = banded_distance(rssi);
            assert!(distance >= 0.1 && distance <= FAR_FIELD_DISTANCE);
        }
    }

    #[test]
    fn log_distance_is_one_meter_at_tx_power() {
        let model = DistanceModel::log_distance();
        assert!(approx(model.estimate(DEFAULT_TX_POWER), 1.0));
        assert!(approx(model.estimate(-79), 10.0));
        assert!(model.estimate(-43) < 1.0);
    }

    #[test]
    fn signal_bars_follow_quality() {
        assert_eq!(signal_bars(-30, 5), 5);
        assert_eq!(signal_bars(-90, 5), 0);
        assert_eq!(signal_bars(-60, 5), 3);
        assert!(approx(signal_quality(-10), 1.0));
    }

    #[test]
    fn precise_distance_formatting() {
        assert_eq!(format_precise_distance(0.21), "~21 cm");
        assert_eq!(format_precise_distance(2.345), "~2.3 m");
    }

    #[test]
    fn battery_level_is_stable_and_in_range() {
        let id = Uuid::new_v4();
        let level = simulated_battery_level(&id);
        assert_eq!(level, simulated_battery_level(&id));
        assert!((1..=100).contains(&level));
    }

    #[test]
    fn fnv1a_known_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn tracker_reports_trend() {
        let mut tracker = SignalTracker::default();
        assert_eq!(tracker.update(-70).trend, SignalTrend::Steady);
        assert_eq!(tracker.update(-60).trend, SignalTrend::GettingCloser);
        assert_eq!(tracker.update(-75).trend, SignalTrend::MovingAway);
        assert_eq!(tracker.update(0).trend, SignalTrend::Steady);
        assert_eq!(tracker.update(-80).trend, SignalTrend::MovingAway);
    }
}
