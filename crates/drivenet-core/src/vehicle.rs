//! Per-tick decision loop: pose -> sensor fan -> cast -> offsets -> network ->
//! control state, plus the kinematic motion stand-in for the physics engine.

use crate::config::SimConfig;
use crate::control::ControlState;
use crate::geom::{self, Quat, Vec3, FORWARD, UP};
use crate::network::{FeedForwardNetwork, CONTROL_OUTPUTS};
use crate::obstacle::ObstacleSet;
use crate::sensor::RangeSensor;

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id: u32,
    pub position: Vec3,
    pub orientation: Quat,
    pub speed: f64,
    /// When set, network output overwrites the control state every tick and
    /// manual input is discarded.
    pub autonomous: bool,
    /// A damaged vehicle keeps its state but no longer decides or moves.
    pub damaged: bool,
    /// Best distance reached along the lane axis this run.
    pub progress: f64,
    network: FeedForwardNetwork,
    sensor: RangeSensor,
    control: ControlState,
}

impl Vehicle {
    pub fn new(
        id: u32,
        position: Vec3,
        orientation: Quat,
        network: FeedForwardNetwork,
        sensor: RangeSensor,
    ) -> Self {
        Self {
            id,
            position,
            orientation,
            speed: 0.0,
            autonomous: true,
            damaged: false,
            progress: 0.0,
            network,
            sensor,
            control: ControlState::NONE,
        }
    }

    /// One decision tick. The sensor fan is rebuilt from the live pose and
    /// cast; in autonomous mode the four network outputs become the control
    /// state unconditionally, otherwise `manual` is adopted whole. A network
    /// failure (wrong arity, length mismatch) marks the vehicle damaged
    /// instead of propagating; one broken driver never stops the simulation.
    pub fn decide(&mut self, obstacles: &ObstacleSet, manual: ControlState) -> ControlState {
        if self.damaged {
            self.sensor.clear_skipped();
            self.control = ControlState::NONE;
            return self.control;
        }
        self.sensor.update(self.position, self.orientation);
        let hits = self.sensor.cast_against(obstacles);
        if !self.autonomous {
            self.control = manual;
            return self.control;
        }
        let offsets = self.sensor.offsets(&hits);
        match self.network.evaluate(&offsets) {
            Ok(outputs) if outputs.len() == CONTROL_OUTPUTS => {
                self.control =
                    ControlState::from_outputs(&[outputs[0], outputs[1], outputs[2], outputs[3]]);
            }
            _ => {
                self.damaged = true;
                self.control = ControlState::NONE;
            }
        }
        self.control
    }

    /// Advance the pose by one fixed step from the current control state.
    /// Reverse is capped at half the forward speed limit; steering authority
    /// follows the sign of travel, so reversing steers mirrored.
    pub fn integrate(&mut self, config: &SimConfig) {
        if self.damaged {
            self.speed = 0.0;
            return;
        }
        let dt = config.dt;
        if self.control.forward {
            self.speed += config.acceleration * dt;
        }
        if self.control.backward {
            self.speed -= config.acceleration * dt;
        }
        self.speed = self.speed.clamp(-config.max_speed * 0.5, config.max_speed);

        let decay = config.friction * dt;
        if self.speed.abs() <= decay {
            self.speed = 0.0;
        } else {
            self.speed -= decay * self.speed.signum();
        }

        if self.speed != 0.0 {
            let steer_sign = self.speed.signum();
            let mut yaw = 0.0;
            if self.control.left {
                yaw += config.turn_rate * steer_sign * dt;
            }
            if self.control.right {
                yaw -= config.turn_rate * steer_sign * dt;
            }
            if yaw != 0.0 {
                self.orientation = Quat::from_axis_angle(UP, yaw).mul(self.orientation);
            }
        }

        let forward = self.orientation.rotate(FORWARD);
        self.position = geom::add(self.position, geom::scale(forward, self.speed * dt));
        self.progress = self.progress.max(-self.position[2]);
    }

    /// Respawn for a new generation: fresh pose, zero speed, undamaged, and a
    /// replacement network.
    pub fn reset(&mut self, position: Vec3, orientation: Quat, network: FeedForwardNetwork) {
        self.position = position;
        self.orientation = orientation;
        self.speed = 0.0;
        self.damaged = false;
        self.progress = 0.0;
        self.control = ControlState::NONE;
        self.network = network;
    }

    pub fn control(&self) -> ControlState {
        self.control
    }

    pub fn network(&self) -> &FeedForwardNetwork {
        &self.network
    }

    pub fn set_network(&mut self, network: FeedForwardNetwork) {
        self.network = network;
    }

    pub fn sensor(&self) -> &RangeSensor {
        &self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{LayerDescriptor, NetworkDescriptor};
    use crate::obstacle::{Aabb, Obstacle, Shape};
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn empty_set() -> ObstacleSet {
        ObstacleSet::new(vec![])
    }

    /// Single-ray network wired so a clear road (offset 0) reads "forward"
    /// and nothing else: output j fires iff sum > bias.
    fn drive_straight_network() -> FeedForwardNetwork {
        FeedForwardNetwork::from_descriptor(&NetworkDescriptor {
            layers: vec![LayerDescriptor {
                weights: vec![vec![0.0, 0.0, 0.0, 0.0]],
                biases: vec![-1.0, 1.0, 1.0, 1.0],
            }],
        })
        .unwrap()
    }

    fn test_vehicle(network: FeedForwardNetwork) -> Vehicle {
        Vehicle::new(
            0,
            [0.0, 1.0, 0.0],
            Quat::IDENTITY,
            network,
            RangeSensor::new(1, 0.0, 50.0),
        )
    }

    #[test]
    fn autonomous_mode_discards_manual_input() {
        let mut vehicle = test_vehicle(drive_straight_network());
        let manual = ControlState {
            backward: true,
            left: true,
            ..ControlState::NONE
        };
        let control = vehicle.decide(&empty_set(), manual);
        assert!(control.forward);
        assert!(!control.backward && !control.left && !control.right);
    }

    #[test]
    fn manual_mode_adopts_input_whole() {
        let mut vehicle = test_vehicle(drive_straight_network());
        vehicle.autonomous = false;
        let manual = ControlState {
            forward: true,
            right: true,
            ..ControlState::NONE
        };
        assert_eq!(vehicle.decide(&empty_set(), manual), manual);
    }

    #[test]
    fn network_size_mismatch_damages_vehicle_without_panicking() {
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        // Two-input network behind a one-ray sensor.
        let network = FeedForwardNetwork::random(&[2, 4], &mut rng).unwrap();
        let mut vehicle = test_vehicle(network);
        let control = vehicle.decide(&empty_set(), ControlState::NONE);
        assert!(vehicle.damaged);
        assert!(!control.any());
        // Subsequent ticks stay inert.
        assert!(!vehicle.decide(&empty_set(), ControlState::NONE).any());
    }

    #[test]
    fn wrong_output_arity_damages_vehicle() {
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        let network = FeedForwardNetwork::random(&[1, 3], &mut rng).unwrap();
        let mut vehicle = test_vehicle(network);
        vehicle.decide(&empty_set(), ControlState::NONE);
        assert!(vehicle.damaged);
    }

    #[test]
    fn forward_control_advances_down_the_lane() {
        let mut vehicle = test_vehicle(drive_straight_network());
        let config = SimConfig::default();
        let obstacles = empty_set();
        for _ in 0..120 {
            vehicle.decide(&obstacles, ControlState::NONE);
            vehicle.integrate(&config);
        }
        assert!(vehicle.progress > 1.0, "progress {}", vehicle.progress);
        assert!(vehicle.position[2] < -1.0);
        assert!(vehicle.speed > 0.0 && vehicle.speed <= config.max_speed);
    }

    #[test]
    fn damaged_vehicle_does_not_move() {
        let mut vehicle = test_vehicle(drive_straight_network());
        vehicle.damaged = true;
        vehicle.speed = 5.0;
        let before = vehicle.position;
        vehicle.integrate(&SimConfig::default());
        assert_eq!(vehicle.position, before);
        assert_eq!(vehicle.speed, 0.0);
    }

    #[test]
    fn steering_rotates_heading() {
        let mut vehicle = test_vehicle(drive_straight_network());
        vehicle.autonomous = false;
        let config = SimConfig::default();
        let obstacles = empty_set();
        let manual = ControlState {
            forward: true,
            left: true,
            ..ControlState::NONE
        };
        for _ in 0..60 {
            vehicle.decide(&obstacles, manual);
            vehicle.integrate(&config);
        }
        let forward = vehicle.orientation.rotate(FORWARD);
        // A left turn swings the heading from -z toward -x.
        assert!(forward[0] < -0.1, "heading {forward:?}");
    }

    #[test]
    fn reset_clears_run_state_and_swaps_network() {
        let mut vehicle = test_vehicle(drive_straight_network());
        let config = SimConfig::default();
        vehicle.decide(&empty_set(), ControlState::NONE);
        vehicle.integrate(&config);
        vehicle.damaged = true;
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let replacement = FeedForwardNetwork::random(&[1, 4], &mut rng).unwrap();
        vehicle.reset([0.0, 1.0, 0.0], Quat::IDENTITY, replacement);
        assert!(!vehicle.damaged);
        assert_eq!(vehicle.progress, 0.0);
        assert_eq!(vehicle.speed, 0.0);
        assert!(!vehicle.control().any());
    }

    #[test]
    fn damaged_vehicle_does_not_report_stale_skip_counts() {
        let mut vehicle = test_vehicle(drive_straight_network());
        // Overflowing squared radius forces a non-finite intersection
        // distance, so the first decide records one skipped ray.
        let obstacles = ObstacleSet::new(vec![Obstacle::new(
            0,
            Shape::Sphere {
                center: [0.0, 1.0, -5.0],
                radius: 1e200,
            },
        )]);
        vehicle.decide(&obstacles, ControlState::NONE);
        assert_eq!(vehicle.sensor().skipped_last_cast(), 1);
        // Once damaged, decide never casts again; the old count must not
        // linger where a per-step sum would re-add it.
        vehicle.damaged = true;
        vehicle.decide(&obstacles, ControlState::NONE);
        assert_eq!(vehicle.sensor().skipped_last_cast(), 0);
    }

    #[test]
    fn sensor_sees_obstacles_during_decide() {
        let mut vehicle = test_vehicle(drive_straight_network());
        let obstacles = ObstacleSet::new(vec![Obstacle::new(
            0,
            Shape::Box(Aabb::new([-5.0, 0.0, -11.0], [5.0, 2.0, -10.0])),
        )]);
        vehicle.decide(&obstacles, ControlState::NONE);
        assert_eq!(vehicle.sensor().rays().len(), 1);
        assert_eq!(vehicle.sensor().skipped_last_cast(), 0);
        assert_eq!(vehicle.network().layers()[0].last_inputs().len(), 1);
        assert!((vehicle.network().layers()[0].last_inputs()[0] - 40.0).abs() < 1e-4);
    }
}
