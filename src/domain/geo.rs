//! Geo-Projection
//!
//! Spherical-earth helpers for showing an estimated device location on a map.
//! Accuracy near the poles is not a concern for this use case.

use crate::domain::models::LatLon;
use crate::domain::settings::GeoSettings;
use crate::domain::signal::signal_quality;
use rand::Rng;
use tracing::debug;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Point reached by travelling `distance_m` from `origin` along the initial
/// `bearing_deg` (clockwise from true north).
pub fn destination(origin: LatLon, distance_m: f64, bearing_deg: f64) -> LatLon {
    let angular = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    LatLon::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Haversine distance in meters.
pub fn great_circle_distance(a: LatLon, b: LatLon) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` to `b`, degrees in `[0, 360)`.
pub fn initial_bearing(a: LatLon, b: LatLon) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

pub fn describe_separation(meters: f64) -> String {
    if meters < 1000.0 {
        format!("Approximately {} meters away", meters as i64)
    } else {
        format!("Approximately {:.1} km away", meters / 1000.0)
    }
}

/// Map viewport framing both the user and the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapRegion {
    pub center: LatLon,
    pub span_deg: f64,
}

impl MapRegion {
    pub fn framing(user: LatLon, device: LatLon) -> Self {
        let center = LatLon::new(
            (user.latitude + device.latitude) / 2.0,
            (user.longitude + device.longitude) / 2.0,
        );
        let span_deg = (great_circle_distance(user, device) / 50_000.0).max(0.01);
        Self { center, span_deg }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBand {
    Close,
    Medium,
    Far,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Neither a user fix nor a fallback origin exists.
    NoOrigin,
    UnknownDevice,
    /// The last reading could not be turned into a distance.
    UnknownDistance,
    NotConnected,
}

impl UnavailableReason {
    pub fn message(&self) -> &'static str {
        match self {
            UnavailableReason::NoOrigin => "Your location is not available yet",
            UnavailableReason::UnknownDevice => "Device is no longer in range",
            UnavailableReason::UnknownDistance => "Distance to the device is unknown",
            UnavailableReason::NotConnected => "Please connect to the device first",
        }
    }
}

/// Answer to a "where is this device" request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationEstimate {
    Available {
        location: LatLon,
        distance_m: f64,
        bearing_deg: f64,
    },
    Unavailable(UnavailableReason),
}

impl LocationEstimate {
    pub fn location(&self) -> Option<LatLon> {
        match self {
            LocationEstimate::Available { location, .. } => Some(*location),
            LocationEstimate::Unavailable(_) => None,
        }
    }
}

/// Turns a radar-scale distance into a plausible map position.
///
/// Raw estimator output is remapped onto close/medium/far meter ranges with
/// some randomness inside the range, and the bearing deviates from the user's
/// heading less when the signal is strong.
#[derive(Debug, Clone)]
pub struct GeoEstimator {
    settings: GeoSettings,
}

impl GeoEstimator {
    pub fn new(settings: GeoSettings) -> Self {
        Self { settings }
    }

    pub fn band(&self, distance: f64) -> DistanceBand {
        if distance < self.settings.close_below {
            DistanceBand::Close
        } else if distance < self.settings.medium_below {
            DistanceBand::Medium
        } else {
            DistanceBand::Far
        }
    }

    pub fn band_range(&self, band: DistanceBand) -> (f64, f64) {
        let (lo, hi) = match band {
            DistanceBand::Close => self.settings.close_range_m,
            DistanceBand::Medium => self.settings.medium_range_m,
            DistanceBand::Far => self.settings.far_range_m,
        };
        (lo.min(hi), lo.max(hi))
    }

    pub fn map_distance<R: Rng>(&self, distance: f64, rng: &mut R) -> f64 {
        let (lo, hi) = self.band_range(self.band(distance));
        if hi > lo {
            rng.gen_range(lo..=hi)
        } else {
            lo
        }
    }

    /// Bearing for the map marker. With an RSSI the spread around `heading`
    /// shrinks as the signal gets stronger; without one any bearing is possible.
    pub fn bearing<R: Rng>(&self, heading_deg: f64, rssi: Option<i32>, rng: &mut R) -> f64 {
        let Some(rssi) = rssi else {
            return rng.gen_range(0.0..360.0);
        };
        let strength = signal_quality(rssi);
        let max = self.settings.max_bearing_spread_deg.abs();
        let min = self.settings.min_bearing_spread_deg.abs().min(max);
        let spread = min + (max - min) * (1.0 - strength);
        let offset = if spread > 0.0 {
            rng.gen_range(-spread..=spread)
        } else {
            0.0
        };
        (heading_deg + offset).rem_euclid(360.0)
    }

    pub fn estimate<R: Rng>(
        &self,
        origin: Option<LatLon>,
        heading_deg: f64,
        distance: f64,
        rssi: Option<i32>,
        rng: &mut R,
    ) -> LocationEstimate {
        let Some(origin) = origin.or(self.settings.fallback_origin) else {
            return LocationEstimate::Unavailable(UnavailableReason::NoOrigin);
        };
        if distance < 0.0 {
            return LocationEstimate::Unavailable(UnavailableReason::UnknownDistance);
        }

        let distance_m = self.map_distance(distance, rng);
        let bearing_deg = self.bearing(heading_deg, rssi, rng);
        let location = destination(origin, distance_m, bearing_deg);
        debug!(
            "Estimated location {:.6},{:.6} ({:.0} m at {:.0} deg)",
            location.latitude, location.longitude, distance_m, bearing_deg
        );

        LocationEstimate::Available {
            location,
            distance_m,
            bearing_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn one_degree_east_along_the_equator() {
        let dest = destination(LatLon::new(0.0, 0.0), 111_319.9, 90.0);
        assert!(dest.latitude.abs() < 1e-6);
        // 111,319.9 m is a WGS84 degree; on this sphere it is slightly more.
        assert!((dest.longitude - 1.0).abs() < 2e-3);

        let sphere_degree = 2.0 * std::f64::consts::PI * EARTH_RADIUS_M / 360.0;
        let dest = destination(LatLon::new(0.0, 0.0), sphere_degree, 90.0);
        assert!((dest.longitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_distance_stays_put() {
        let origin = LatLon::new(41.0082, 28.9784);
        let dest = destination(origin, 0.0, 123.0);
        assert!((dest.latitude - origin.latitude).abs() < 1e-12);
        assert!((dest.longitude - origin.longitude).abs() < 1e-12);
    }

    #[test]
    fn projection_round_trips_through_haversine() {
        let origins = [
            LatLon::new(0.0, 0.0),
            LatLon::new(41.0082, 28.9784),
            LatLon::new(-33.86, 151.21),
            LatLon::new(60.17, -24.94),
        ];
        for origin in origins {
            for &d in &[1.0, 12.5, 250.0, 1_000.0, 10_000.0] {
                for &bearing in &[0.0, 45.0, 90.0, 180.0, 271.0, 359.9] {
                    let dest = destination(origin, d, bearing);
                    let back = great_circle_distance(origin, dest);
                    assert!(((back - d) / d).abs() < 1e-3, "d={} bearing={}", d, bearing);
                }
            }
        }
    }

    #[test]
    fn initial_bearing_recovers_projection_bearing() {
        let origin = LatLon::new(41.0, 29.0);
        let dest = destination(origin, 5_000.0, 60.0);
        assert!((initial_bearing(origin, dest) - 60.0).abs() < 1e-6);
    }

    #[test]
    fn separation_text() {
        assert_eq!(describe_separation(80.4), "Approximately 80 meters away");
        assert_eq!(describe_separation(2_450.0), "Approximately 2.5 km away");
    }

    #[test]
    fn map_region_has_a_minimum_span() {
        let a = LatLon::new(41.0, 29.0);
        let region = MapRegion::framing(a, destination(a, 50.0, 90.0));
        assert_eq!(region.span_deg, 0.01);
        let far = MapRegion::framing(a, destination(a, 5_000.0, 90.0));
        assert!((far.span_deg - 0.1).abs() < 1e-3);
    }

    #[test]
    fn bands_remap_to_meter_ranges() {
        let est = GeoEstimator::new(GeoSettings::default());
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let close = est.map_distance(0.2, &mut rng);
            assert!((5.0..=20.0).contains(&close));
            let medium = est.map_distance(2.1, &mut rng);
            assert!((20.0..=60.0).contains(&medium));
            let far = est.map_distance(5.0, &mut rng);
            assert!((60.0..=150.0).contains(&far));
        }
    }

    #[test]
    fn strong_signal_keeps_bearing_near_heading() {
        let est = GeoEstimator::new(GeoSettings::default());
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let bearing = est.bearing(10.0, Some(-30), &mut rng);
            let deviation = (bearing - 10.0 + 180.0).rem_euclid(360.0) - 180.0;
            assert!(deviation.abs() <= 15.0 + 1e-9);
        }
    }

    #[test]
    fn estimate_requires_an_origin_and_a_distance() {
        let est = GeoEstimator::new(GeoSettings::default());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            est.estimate(None, 0.0, 1.0, None, &mut rng),
            LocationEstimate::Unavailable(UnavailableReason::NoOrigin)
        );
        assert_eq!(
            est.estimate(Some(LatLon::new(0.0, 0.0)), 0.0, -1.0, None, &mut rng),
            LocationEstimate::Unavailable(UnavailableReason::UnknownDistance)
        );
    }

    #[test]
    fn fallback_origin_is_used_without_a_fix() {
        let settings = GeoSettings {
            fallback_origin: Some(LatLon::new(41.0082, 28.9784)),
            ..GeoSettings::default()
        };
        let est = GeoEstimator::new(settings);
        let mut rng = StdRng::seed_from_u64(5);
        match est.estimate(None, 0.0, 0.5, Some(-55), &mut rng) {
            LocationEstimate::Available {
                location,
                distance_m,
                ..
            } => {
                let back = great_circle_distance(LatLon::new(41.0082, 28.9784), location);
                assert!((back - distance_m).abs() / distance_m < 1e-3);
                assert!((5.0..=20.0).contains(&distance_m));
            }
            other => panic!("expected a location, got {:?}", other),
        }
    }
}
