//! Device Registry
//!
//! Canonical list of discovered peripherals, deduplicated by id and kept
//! sorted by ascending distance.

use crate::domain::models::{DiscoveryEvent, LatLon, TrackedDevice};
use crate::domain::signal::{simulated_battery_level, DistanceModel};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<TrackedDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new device or refresh an existing one, then re-sort.
    ///
    /// Existing entries get a new distance and `last_seen`. Name and battery
    /// level are only replaced by non-empty values.
    pub fn upsert(&mut self, id: Uuid, name: &str, distance: f64, battery_level: Option<u8>) {
        self.upsert_at(id, name, distance, battery_level, Utc::now());
    }

    pub fn upsert_at(
        &mut self,
        id: Uuid,
        name: &str,
        distance: f64,
        battery_level: Option<u8>,
        now: DateTime<Utc>,
    ) {
        if let Some(existing) = self.devices.iter_mut().find(|d| d.id == id) {
            existing.distance = distance;
            existing.last_seen = now;
            if !name.is_empty() {
                existing.name = name.to_string();
            }
            if let Some(level) = battery_level.filter(|&l| l > 0) {
                existing.battery_level = level.min(100);
            }
            trace!("Updated {} ({}) at {:.2} m", existing.name, id, distance);
        } else {
            let mut device = TrackedDevice::new(id, name, distance, battery_level.unwrap_or(0));
            device.last_seen = now;
            debug!("Registered {} ({}) at {:.2} m", device.name, id, distance);
            self.devices.push(device);
        }

        self.sort();
    }

    /// Convert a discovery sighting and apply it. Returns `false` when the
    /// sighting is rejected because the peripheral has no usable name.
    pub fn ingest(&mut self, event: &DiscoveryEvent, model: &DistanceModel) -> bool {
        let name = match event.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                trace!("Ignoring nameless peripheral {}", event.peripheral_id);
                return false;
            }
        };

        let distance = model.estimate(event.rssi);
        let battery = simulated_battery_level(&event.peripheral_id);
        self.upsert(event.peripheral_id, name, distance, Some(battery));
        true
    }

    /// Drop devices not seen within `max_age`. Returns the removed ids.
    pub fn remove_stale(&mut self, max_age: Duration, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut removed = Vec::new();
        self.devices.retain(|device| {
            let fresh = now - device.last_seen <= max_age;
            if !fresh {
                removed.push(device.id);
            }
            fresh
        });
        if !removed.is_empty() {
            debug!("Evicted {} stale device(s)", removed.len());
        }
        removed
    }

    pub fn toggle_favorite(&mut self, id: &Uuid) -> Option<bool> {
        self.get_mut(id).map(|device| {
            device.is_favorite = !device.is_favorite;
            device.is_favorite
        })
    }

    pub fn set_battery_level(&mut self, id: &Uuid, level: u8) -> bool {
        match self.get_mut(id) {
            Some(device) => {
                device.battery_level = level.min(100);
                true
            }
            None => false,
        }
    }

    pub fn set_location(&mut self, id: &Uuid, location: LatLon) -> bool {
        match self.get_mut(id) {
            Some(device) => {
                device.location = Some(location);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&TrackedDevice> {
        self.devices.iter().find(|d| d.id == *id)
    }

    fn get_mut(&mut self, id: &Uuid) -> Option<&mut TrackedDevice> {
        self.devices.iter_mut().find(|d| d.id == *id)
    }

    /// Devices in ascending distance order.
    pub fn devices(&self) -> &[TrackedDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    fn sort(&mut self) {
        // Stable sort keeps arrival order between equal distances.
        self.devices
            .sort_by(|a, b| a.distance.total_cmp(&b.distance));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: Uuid, name: Option<&str>, rssi: i32) -> DiscoveryEvent {
        DiscoveryEvent {
            peripheral_id: id,
            name: name.map(str::to_string),
            rssi,
        }
    }

    fn assert_sorted(registry: &DeviceRegistry) {
        for pair in registry.devices().windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn repeat_sightings_update_in_place() {
        let mut registry = DeviceRegistry::new();
        let id = Uuid::new_v4();
        let first = Utc::now();

        registry.upsert_at(id, "Watch", 0.5, Some(40), first);
        registry.upsert_at(id, "Watch", 2.1, None, first + Duration::seconds(3));

        assert_eq!(registry.len(), 1);
        let device = registry.get(&id).unwrap();
        assert_eq!(device.distance, 2.1);
        assert_eq!(device.battery_level, 40);
        assert_eq!(device.last_seen, first + Duration::seconds(3));
    }

    #[test]
    fn name_and_battery_do_not_regress() {
        let mut registry = DeviceRegistry::new();
        let id = Uuid::new_v4();
        registry.upsert(id, "Speaker", 1.0, Some(80));
        registry.upsert(id, "", 1.5, Some(0));

        let device = registry.get(&id).unwrap();
        assert_eq!(device.name, "Speaker");
        assert_eq!(device.battery_level, 80);
    }

    #[test]
    fn list_length_equals_distinct_ids_and_stays_sorted() {
        let mut registry = DeviceRegistry::new();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let readings = [-90, -48, -70, -80, -52, -66, -30, -99];

        for (i, rssi) in readings.iter().enumerate() {
            let id = ids[i % ids.len()];
            registry.ingest(&event(id, Some("Device"), *rssi), &DistanceModel::Banded);
            assert_sorted(&registry);
        }

        assert_eq!(registry.len(), ids.len());
    }

    #[test]
    fn nameless_peripherals_are_rejected() {
        let mut registry = DeviceRegistry::new();
        assert!(!registry.ingest(&event(Uuid::new_v4(), None, -60), &DistanceModel::Banded));
        assert!(!registry.ingest(
            &event(Uuid::new_v4(), Some("   "), -60),
            &DistanceModel::Banded
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn ingest_uses_the_selected_model() {
        let mut registry = DeviceRegistry::new();
        let id = Uuid::new_v4();
        registry.ingest(&event(id, Some("Tag"), -79), &DistanceModel::log_distance());
        assert!((registry.get(&id).unwrap().distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn stale_devices_are_evicted() {
        let mut registry = DeviceRegistry::new();
        let now = Utc::now();
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        registry.upsert_at(old, "Old", 1.0, None, now - Duration::seconds(120));
        registry.upsert_at(fresh, "Fresh", 2.0, None, now - Duration::seconds(5));

        let removed = registry.remove_stale(Duration::seconds(60), now);
        assert_eq!(removed, vec![old]);
        assert!(registry.get(&fresh).is_some());
    }

    #[test]
    fn favorite_and_location_are_independent_of_estimation() {
        let mut registry = DeviceRegistry::new();
        let id = Uuid::new_v4();
        registry.upsert(id, "Buds", 0.5, None);

        assert_eq!(registry.toggle_favorite(&id), Some(true));
        registry.upsert(id, "Buds", 3.0, None);
        assert!(registry.get(&id).unwrap().is_favorite);

        assert!(registry.set_location(&id, LatLon::new(41.0, 29.0)));
        assert!(registry.get(&id).unwrap().location.is_some());
        assert_eq!(registry.toggle_favorite(&Uuid::new_v4()), None);
    }
}
