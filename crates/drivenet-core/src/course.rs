//! Straight obstacle lane: side walls plus box rows, each row leaving one
//! randomly placed drivable gap. Deterministic for a fixed generator.

use crate::config::SimConfig;
use crate::geom::{Quat, Vec3};
use crate::obstacle::{Aabb, Obstacle, Shape};
use rand::Rng;

const WALL_THICKNESS: f64 = 1.0;
const OBSTACLE_HEIGHT: f64 = 2.0;
const ROW_DEPTH: f64 = 1.0;
/// Row segments narrower than this are dropped rather than emitted as slivers.
const MIN_SEGMENT_WIDTH: f64 = 0.05;

#[derive(Clone, Debug)]
pub struct Course {
    pub obstacles: Vec<Obstacle>,
    pub spawn_position: Vec3,
    pub spawn_orientation: Quat,
}

/// Lay out the course described by `config`. The lane runs from z = 0 toward
/// z = -course_length, centered on x = 0; vehicles spawn at the start facing
/// down the lane.
pub fn generate<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R) -> Course {
    let half_lane = config.lane_width / 2.0;
    let mut obstacles = Vec::new();
    let mut next_id = 0u32;
    let mut push = |obstacles: &mut Vec<Obstacle>, min: Vec3, max: Vec3| {
        obstacles.push(Obstacle::new(next_id, Shape::Box(Aabb::new(min, max))));
        next_id += 1;
    };

    // Side walls spanning the whole lane.
    push(
        &mut obstacles,
        [-half_lane - WALL_THICKNESS, 0.0, -config.course_length],
        [-half_lane, OBSTACLE_HEIGHT, 0.0],
    );
    push(
        &mut obstacles,
        [half_lane, 0.0, -config.course_length],
        [half_lane + WALL_THICKNESS, OBSTACLE_HEIGHT, 0.0],
    );

    // Obstacle rows, one gap each.
    let half_gap = config.gap_width / 2.0;
    let mut z = -config.first_row_offset;
    while z > -config.course_length {
        let gap_center = rng.random_range(-half_lane + half_gap..=half_lane - half_gap);
        let left_end = gap_center - half_gap;
        let right_start = gap_center + half_gap;
        if left_end - -half_lane > MIN_SEGMENT_WIDTH {
            push(
                &mut obstacles,
                [-half_lane, 0.0, z - ROW_DEPTH],
                [left_end, OBSTACLE_HEIGHT, z],
            );
        }
        if half_lane - right_start > MIN_SEGMENT_WIDTH {
            push(
                &mut obstacles,
                [right_start, 0.0, z - ROW_DEPTH],
                [half_lane, OBSTACLE_HEIGHT, z],
            );
        }
        z -= config.row_spacing;
    }

    Course {
        obstacles,
        spawn_position: [0.0, OBSTACLE_HEIGHT / 2.0, 0.0],
        spawn_orientation: Quat::IDENTITY,
    }
}
