use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::signal::UNKNOWN_DISTANCE;

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Point in radar drawing coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A discovered peripheral as held by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedDevice {
    pub id: Uuid,
    pub name: String,
    /// Meters, or [`UNKNOWN_DISTANCE`] when the reading was degenerate.
    pub distance: f64,
    pub last_seen: DateTime<Utc>,
    pub battery_level: u8,
    pub is_favorite: bool,
    pub location: Option<LatLon>,
}

impl TrackedDevice {
    pub fn new(id: Uuid, name: impl Into<String>, distance: f64, battery_level: u8) -> Self {
        Self {
            id,
            name: name.into(),
            distance,
            last_seen: Utc::now(),
            battery_level: battery_level.min(100),
            is_favorite: false,
            location: None,
        }
    }

    pub fn has_known_distance(&self) -> bool {
        self.distance >= 0.0
    }

    pub fn formatted_distance(&self) -> String {
        let distance = self.distance;
        if distance == UNKNOWN_DISTANCE || distance < 0.0 {
            "Unknown distance".to_string()
        } else if distance < 0.3 {
            "Very close".to_string()
        } else if distance < 1.0 {
            "Within 1m".to_string()
        } else if distance < 3.0 {
            format!("{:.1}m away", distance)
        } else if distance < 5.0 {
            "Few meters away".to_string()
        } else {
            "Far away".to_string()
        }
    }

    pub fn proximity_tier(&self) -> ProximityTier {
        if self.distance < 1.0 {
            ProximityTier::Near
        } else if self.distance < 2.0 {
            ProximityTier::Mid
        } else {
            ProximityTier::Far
        }
    }

    /// Lit bars of the three-bar list indicator.
    pub fn proximity_bars(&self) -> u8 {
        if !self.has_known_distance() || self.distance >= 5.0 {
            return 0;
        }
        [3.0, 1.5, 0.5]
            .iter()
            .filter(|&&threshold| self.distance <= threshold)
            .count() as u8
    }

    pub fn battery_tier(&self) -> BatteryTier {
        if self.battery_level > 70 {
            BatteryTier::High
        } else if self.battery_level > 30 {
            BatteryTier::Medium
        } else {
            BatteryTier::Low
        }
    }

    pub fn kind(&self) -> DeviceKind {
        DeviceKind::from_name(&self.name)
    }

    pub fn last_seen_text(&self, now: DateTime<Utc>) -> String {
        let elapsed = (now - self.last_seen).num_seconds().max(0);
        let (value, unit) = match elapsed {
            0..=4 => return "just now".to_string(),
            5..=59 => (elapsed, "second"),
            60..=3599 => (elapsed / 60, "minute"),
            3600..=86_399 => (elapsed / 3600, "hour"),
            _ => (elapsed / 86_400, "day"),
        };
        let plural = if value == 1 { "" } else { "s" };
        format!("{} {}{} ago", value, unit, plural)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityTier {
    Near,
    Mid,
    Far,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Phone,
    Laptop,
    Headphones,
    Tablet,
    Watch,
    Tv,
    Speaker,
}

impl DeviceKind {
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        let has = |keys: &[&str]| keys.iter().any(|k| name.contains(k));

        if has(&["iphone", "phone"]) {
            DeviceKind::Phone
        } else if has(&["macbook", "laptop"]) {
            DeviceKind::Laptop
        } else if has(&[
            "airpods",
            "buds",
            "headphone",
            "earphone",
            "earpods",
            "beats",
            "jbl",
        ]) {
            DeviceKind::Headphones
        } else if has(&["ipad", "tablet"]) {
            DeviceKind::Tablet
        } else if has(&["watch"]) {
            DeviceKind::Watch
        } else if has(&["tv", "television"]) {
            DeviceKind::Tv
        } else if has(&["speaker", "sound"]) {
            DeviceKind::Speaker
        } else {
            DeviceKind::Laptop
        }
    }
}

/// Advertisement sighting delivered by the discovery subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryEvent {
    pub peripheral_id: Uuid,
    pub name: Option<String>,
    pub rssi: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Rendering data for one device on the radar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarPosition {
    pub position: Point2D,
    pub opacity: f64,
}

/// Everything the display needs to draw one radar frame.
#[derive(Debug, Clone, Default)]
pub struct RadarFrame {
    pub sweep_angle: f64,
    pub devices: Vec<(TrackedDevice, RadarPosition)>,
}

/// Outbound notifications for the display layer.
#[derive(Debug, Clone)]
pub enum AppEvent {
    DevicesUpdated(Vec<TrackedDevice>),
    RadarFrame(RadarFrame),
    ScanStatus(bool),
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn device_at(distance: f64) -> TrackedDevice {
        TrackedDevice::new(Uuid::new_v4(), "Pixel Phone", distance, 50)
    }

    #[test]
    fn formatted_distance_follows_bands() {
        assert_eq!(device_at(0.2).formatted_distance(), "Very close");
        assert_eq!(device_at(0.5).formatted_distance(), "Within 1m");
        assert_eq!(device_at(2.1).formatted_distance(), "2.1m away");
        assert_eq!(device_at(3.0).formatted_distance(), "Few meters away");
        assert_eq!(device_at(5.0).formatted_distance(), "Far away");
        assert_eq!(
            device_at(UNKNOWN_DISTANCE).formatted_distance(),
            "Unknown distance"
        );
    }

    #[test]
    fn proximity_bars_light_with_closeness() {
        assert_eq!(device_at(0.2).proximity_bars(), 3);
        assert_eq!(device_at(1.0).proximity_bars(), 2);
        assert_eq!(device_at(2.5).proximity_bars(), 1);
        assert_eq!(device_at(3.5).proximity_bars(), 0);
        assert_eq!(device_at(5.0).proximity_bars(), 0);
    }

    #[test]
    fn device_kind_uses_name_keywords() {
        assert_eq!(DeviceKind::from_name("Kerem's iPhone"), DeviceKind::Phone);
        assert_eq!(DeviceKind::from_name("AirPods Pro"), DeviceKind::Headphones);
        assert_eq!(DeviceKind::from_name("Galaxy Watch"), DeviceKind::Watch);
        assert_eq!(DeviceKind::from_name("Mystery"), DeviceKind::Laptop);
    }

    #[test]
    fn last_seen_text_is_relative() {
        let device = device_at(1.0);
        let seen = device.last_seen;
        assert_eq!(device.last_seen_text(seen), "just now");
        assert_eq!(
            device.last_seen_text(seen + Duration::seconds(30)),
            "30 seconds ago"
        );
        assert_eq!(
            device.last_seen_text(seen + Duration::seconds(60)),
            "1 minute ago"
        );
        assert_eq!(
            device.last_seen_text(seen + Duration::hours(3)),
            "3 hours ago"
        );
    }

    #[test]
    fn battery_tier_thresholds() {
        let mut device = device_at(1.0);
        device.battery_level = 71;
        assert_eq!(device.battery_tier(), BatteryTier::High);
        device.battery_level = 31;
        assert_eq!(device.battery_tier(), BatteryTier::Medium);
        device.battery_level = 30;
        assert_eq!(device.battery_tier(), BatteryTier::Low);
    }
}
