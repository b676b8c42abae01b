//! Position Estimator
//!
//! Projects a 1-D distance estimate onto the circular radar surface. The angle
//! comes from a stable hash of the device name, so a device keeps its slot
//! across redraws without persisted state. When the slot collides with an
//! already placed marker the angle is rotated in fixed steps; after the
//! attempt budget runs out the last candidate is accepted as is.

use crate::domain::models::Point2D;
use crate::domain::settings::RadarSettings;
use crate::domain::signal::fnv1a_64;
use rand::Rng;
use tracing::warn;

/// Result of a first placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub point: Point2D,
    pub angle_deg: f64,
    /// Candidates evaluated, including the accepted one.
    pub attempts: u32,
    /// `true` when the attempt budget ran out without a free slot.
    pub overlapping: bool,
}

#[derive(Debug, Clone)]
pub struct PositionEstimator {
    center: Point2D,
    radius: f64,
    cap_distance: f64,
    edge_margin: f64,
    min_separation: f64,
    retry_step_deg: f64,
    max_attempts: u32,
    jitter_amplitude: f64,
}

impl PositionEstimator {
    pub fn new(settings: &RadarSettings) -> Self {
        Self {
            center: Point2D::new(settings.center_x, settings.center_y),
            radius: settings.radius.max(0.0),
            cap_distance: settings.cap_distance.max(f64::EPSILON),
            edge_margin: settings.edge_margin.clamp(0.0, 1.0),
            min_separation: settings.min_separation.max(0.0),
            retry_step_deg: settings.retry_step_deg,
            max_attempts: settings.max_attempts.max(1),
            jitter_amplitude: settings.jitter_amplitude.abs(),
        }
    }

    pub fn center(&self) -> Point2D {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Closeness in `[0, 1]`: 1 at the center, 0 at or beyond the cap.
    /// Unknown (negative) distances are treated as far-field.
    pub fn normalized_distance(&self, distance: f64) -> f64 {
        let distance = if distance < 0.0 {
            self.cap_distance
        } else {
            distance.min(self.cap_distance)
        };
        1.0 - distance / self.cap_distance
    }

    /// Distance of the marker from the radar center.
    pub fn ring_radius(&self, distance: f64) -> f64 {
        self.radius * (1.0 - self.normalized_distance(distance)) * self.edge_margin
    }

    /// Name-derived base angle in whole degrees `[0, 360)`.
    pub fn base_angle(name: &str) -> f64 {
        (fnv1a_64(name.as_bytes()) % 360) as f64
    }

    /// Point on the radar for a radius and an angle measured clockwise from
    /// the positive x axis (screen coordinates).
    pub fn point_at(&self, ring_radius: f64, angle_deg: f64) -> Point2D {
        let radians = angle_deg.to_radians();
        Point2D::new(
            self.center.x + ring_radius * radians.cos(),
            self.center.y + ring_radius * radians.sin(),
        )
    }

    pub fn place<'a, I>(&self, name: &str, distance: f64, existing: I) -> Placement
    where
        I: IntoIterator<Item = &'a Point2D>,
    {
        self.place_from_angle(Self::base_angle(name), distance, existing)
    }

    /// First placement starting from an explicit base angle.
    pub fn place_from_angle<'a, I>(&self, base_angle: f64, distance: f64, existing: I) -> Placement
    where
        I: IntoIterator<Item = &'a Point2D>,
    {
        let occupied: Vec<Point2D> = existing.into_iter().copied().collect();
        let ring = self.ring_radius(distance);

        let mut angle = base_angle.rem_euclid(360.0);
        let mut candidate = self.point_at(ring, angle);
        for attempt in 0..self.max_attempts {
            angle = (base_angle + attempt as f64 * self.retry_step_deg).rem_euclid(360.0);
            candidate = self.point_at(ring, angle);

            let clear = occupied
                .iter()
                .all(|p| p.distance_to(&candidate) >= self.min_separation);
            if clear {
                return Placement {
                    point: candidate,
                    angle_deg: angle,
                    attempts: attempt + 1,
                    overlapping: false,
                };
            }
        }

        warn!(
            "No free radar slot after {} attempts (base {:.0} deg, ring {:.1}); accepting overlap",
            self.max_attempts, base_angle, ring
        );
        Placement {
            point: candidate,
            angle_deg: angle,
            attempts: self.max_attempts,
            overlapping: true,
        }
    }

    /// Nudge an existing marker by at most the jitter amplitude on each axis,
    /// keeping it inside the radar circle.
    pub fn jitter<R: Rng>(&self, previous: Point2D, rng: &mut R) -> Point2D {
        let amplitude = self.jitter_amplitude;
        if amplitude == 0.0 {
            return self.clamp_to_bounds(previous);
        }
        let moved = Point2D::new(
            previous.x + rng.gen_range(-amplitude..=amplitude),
            previous.y + rng.gen_range(-amplitude..=amplitude),
        );
        self.clamp_to_bounds(moved)
    }

    pub fn clamp_to_bounds(&self, point: Point2D) -> Point2D {
        let offset = point.distance_to(&self.center);
        if offset <= self.radius || offset == 0.0 {
            return point;
        }
        let scale = self.radius / offset;
        Point2D::new(
            self.center.x + (point.x - self.center.x) * scale,
            self.center.y + (point.y - self.center.y) * scale,
        )
    }
}
