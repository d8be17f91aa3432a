//! Fan of fixed-angle distance probes around a vehicle pose. Rays are
//! recomputed from the live pose every update; casting reports every
//! intersection closer than the range, and a fixed-length offset vector is
//! derived per ray for the network (nearest hit wins, a clear ray reads zero).

use crate::geom::{self, Quat, Ray, Vec3, FORWARD, UP};
use crate::obstacle::ObstacleSet;
use std::f64::consts::FRAC_PI_4;

pub const DEFAULT_RAY_COUNT: usize = 80;
pub const DEFAULT_SPREAD_ANGLE: f64 = FRAC_PI_4;
pub const DEFAULT_MAX_RANGE: f64 = 50.0;

/// One ray/obstacle intersection. A single ray can hit several obstacles;
/// all of them are reported.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub ray_index: usize,
    pub distance: f64,
    pub obstacle_id: u32,
}

#[derive(Clone, Debug)]
pub struct RangeSensor {
    ray_count: usize,
    spread_angle: f64,
    max_range: f64,
    rays: Vec<Ray>,
    skipped_last_cast: usize,
}

impl Default for RangeSensor {
    fn default() -> Self {
        Self::new(DEFAULT_RAY_COUNT, DEFAULT_SPREAD_ANGLE, DEFAULT_MAX_RANGE)
    }
}

impl RangeSensor {
    pub fn new(ray_count: usize, spread_angle: f64, max_range: f64) -> Self {
        debug_assert!(ray_count > 0, "sensor needs at least one ray");
        debug_assert!(max_range > 0.0);
        Self {
            ray_count,
            spread_angle,
            max_range,
            rays: Vec::with_capacity(ray_count),
            skipped_last_cast: 0,
        }
    }

    /// Recompute the probe fan for the given pose. Ray i sweeps from
    /// +spread/2 down to -spread/2 about the local up axis, starting from the
    /// local forward direction; the whole fan then follows `orientation`.
    pub fn update(&mut self, origin: Vec3, orientation: Quat) {
        self.rays.clear();
        for i in 0..self.ray_count {
            let t = if self.ray_count == 1 {
                0.5
            } else {
                i as f64 / (self.ray_count - 1) as f64
            };
            let angle = geom::lerp(self.spread_angle / 2.0, -self.spread_angle / 2.0, t);
            let local = Quat::from_axis_angle(UP, angle).rotate(FORWARD);
            self.rays.push(Ray {
                origin,
                dir: orientation.rotate(local),
            });
        }
    }

    /// Cast every probe against the obstacle set. A hit is included only when
    /// its distance is strictly below the range; grazing the exact boundary
    /// is excluded. A non-finite intersection distance skips that single hit
    /// and is counted, never aborting the cast.
    pub fn cast_against(&mut self, obstacles: &ObstacleSet) -> Vec<Hit> {
        self.skipped_last_cast = 0;
        let mut hits = Vec::new();
        for (ray_index, ray) in self.rays.iter().enumerate() {
            for obstacle in obstacles.candidates_along(ray, self.max_range) {
                let Some(distance) = obstacle.shape.ray_distance(ray) else {
                    continue;
                };
                if !distance.is_finite() {
                    self.skipped_last_cast += 1;
                    continue;
                }
                if distance < self.max_range {
                    hits.push(Hit {
                        ray_index,
                        distance,
                        obstacle_id: obstacle.id,
                    });
                }
            }
        }
        hits
    }

    /// Normalized proximity vector for the network: exactly `ray_count`
    /// entries, `max_range - distance` of the nearest hit per ray, 0 for a
    /// clear ray. One entry per ray keeps the length pinned to the input
    /// layer size no matter how many intersections a cast found.
    pub fn offsets(&self, hits: &[Hit]) -> Vec<f32> {
        let mut nearest = vec![self.max_range; self.ray_count];
        for hit in hits {
            if hit.distance < nearest[hit.ray_index] {
                nearest[hit.ray_index] = hit.distance;
            }
        }
        nearest
            .into_iter()
            .map(|d| (self.max_range - d) as f32)
            .collect()
    }

    pub fn ray_count(&self) -> usize {
        self.ray_count
    }

    pub fn spread_angle(&self) -> f64 {
        self.spread_angle
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    /// Rays dropped during the most recent cast because the intersection
    /// produced a non-finite distance.
    pub fn skipped_last_cast(&self) -> usize {
        self.skipped_last_cast
    }

    /// Forget the last cast's skip count. Called on ticks that skip casting
    /// so a stale count is never re-reported.
    pub fn clear_skipped(&mut self) {
        self.skipped_last_cast = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacle::{Aabb, Obstacle, Shape};

    fn wall_across_lane(id: u32, z: f64) -> Obstacle {
        Obstacle::new(id, Shape::Box(Aabb::new([-50.0, -1.0, z - 1.0], [50.0, 3.0, z])))
    }

    #[test]
    fn single_forward_ray_reads_wall_distance() {
        // One ray, no spread, facing -z from the origin; wall face at z = -10.
        let mut sensor = RangeSensor::new(1, 0.0, 50.0);
        sensor.update([0.0, 1.0, 0.0], Quat::IDENTITY);
        let obstacles = ObstacleSet::new(vec![wall_across_lane(0, -10.0)]);
        let hits = sensor.cast_against(&obstacles);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ray_index, 0);
        assert_eq!(hits[0].obstacle_id, 0);
        assert!((hits[0].distance - 10.0).abs() < 1e-9);
        let offsets = sensor.offsets(&hits);
        assert_eq!(offsets.len(), 1);
        assert!((offsets[0] - 40.0).abs() < 1e-6);
    }

    #[test]
    fn clear_ray_produces_no_hits_and_zero_offset() {
        let mut sensor = RangeSensor::new(3, FRAC_PI_4, 50.0);
        sensor.update([0.0, 1.0, 0.0], Quat::IDENTITY);
        let hits = sensor.cast_against(&ObstacleSet::new(vec![]));
        assert!(hits.is_empty());
        assert_eq!(sensor.offsets(&hits), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn hit_at_exact_range_boundary_is_excluded() {
        let mut sensor = RangeSensor::new(1, 0.0, 50.0);
        sensor.update([0.0, 1.0, 0.0], Quat::IDENTITY);
        // Near face exactly at the range limit.
        let obstacles = ObstacleSet::new(vec![Obstacle::new(
            0,
            Shape::Box(Aabb::new([-5.0, 0.0, -60.0], [5.0, 2.0, -50.0])),
        )]);
        assert!(sensor.cast_against(&obstacles).is_empty());
    }

    #[test]
    fn every_intersection_is_reported_per_ray() {
        let mut sensor = RangeSensor::new(1, 0.0, 50.0);
        sensor.update([0.0, 1.0, 0.0], Quat::IDENTITY);
        let obstacles = ObstacleSet::new(vec![
            wall_across_lane(0, -10.0),
            wall_across_lane(1, -20.0),
        ]);
        let mut hits = sensor.cast_against(&obstacles);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].obstacle_id, 0);
        assert_eq!(hits[1].obstacle_id, 1);
        // Offsets keep the nearest hit only.
        let offsets = sensor.offsets(&hits);
        assert!((offsets[0] - 40.0).abs() < 1e-6);
    }

    #[test]
    fn fan_spans_the_spread_angle() {
        let spread = FRAC_PI_4;
        let mut sensor = RangeSensor::new(5, spread, 50.0);
        sensor.update([0.0, 0.0, 0.0], Quat::IDENTITY);
        let rays = sensor.rays();
        assert_eq!(rays.len(), 5);
        // Ray 0 leans +spread/2 (toward -x half-space given +angle about +y
        // rotates -z toward -x); the middle ray is straight ahead.
        assert!((rays[2].dir[0]).abs() < 1e-9);
        assert!((rays[2].dir[2] + 1.0).abs() < 1e-9);
        let expected_x = -(spread / 2.0).sin();
        assert!((rays[0].dir[0] - expected_x).abs() < 1e-9);
        assert!((rays[4].dir[0] + expected_x).abs() < 1e-9);
    }

    #[test]
    fn fan_follows_vehicle_orientation() {
        use std::f64::consts::FRAC_PI_2;
        let mut sensor = RangeSensor::new(1, 0.0, 50.0);
        // Facing -x after a quarter turn; wall sits on the -x side.
        sensor.update([0.0, 1.0, 0.0], Quat::from_axis_angle(UP, FRAC_PI_2));
        let obstacles = ObstacleSet::new(vec![Obstacle::new(
            3,
            Shape::Box(Aabb::new([-12.0, 0.0, -5.0], [-10.0, 2.0, 5.0])),
        )]);
        let hits = sensor.cast_against(&obstacles);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_intersection_is_skipped_and_counted() {
        // Squared radius overflows to infinity, so the intersection distance
        // comes back non-finite; the cast drops that hit and counts it.
        let mut sensor = RangeSensor::new(1, 0.0, 50.0);
        sensor.update([0.0, 1.0, 0.0], Quat::IDENTITY);
        let obstacles = ObstacleSet::new(vec![Obstacle::new(
            0,
            Shape::Sphere {
                center: [0.0, 1.0, -5.0],
                radius: 1e200,
            },
        )]);
        let hits = sensor.cast_against(&obstacles);
        assert!(hits.is_empty());
        assert_eq!(sensor.skipped_last_cast(), 1);
        // A clean cast resets the counter; clearing without casting does too.
        sensor.cast_against(&ObstacleSet::new(vec![]));
        assert_eq!(sensor.skipped_last_cast(), 0);
    }

    #[test]
    fn offsets_length_tracks_ray_count_not_hit_count() {
        let mut sensor = RangeSensor::new(7, FRAC_PI_4, 50.0);
        sensor.update([0.0, 1.0, 0.0], Quat::IDENTITY);
        let obstacles = ObstacleSet::new(vec![wall_across_lane(0, -10.0)]);
        let hits = sensor.cast_against(&obstacles);
        assert_eq!(hits.len(), 7, "wide wall intersects the whole fan");
        assert_eq!(sensor.offsets(&hits).len(), 7);
        assert_eq!(sensor.offsets(&[]).len(), 7);
    }
}
