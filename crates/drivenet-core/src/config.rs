use crate::network::CONTROL_OUTPUTS;
use crate::sensor::{DEFAULT_MAX_RANGE, DEFAULT_RAY_COUNT, DEFAULT_SPREAD_ANGLE};
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Simulation parameters: population, sensor fan, network topology, kinematic
/// constants, and course layout. Loaded from JSON by the CLI; validated
/// before a world is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub num_vehicles: usize,
    /// Hidden layer sizes; the full topology is `[ray_count, hidden.., 4]`.
    pub hidden_layers: Vec<usize>,
    pub ray_count: usize,
    /// Radians.
    pub spread_angle: f64,
    pub max_range: f64,
    /// Probability and interpolation weight of the mutation operator, in [0, 1].
    pub mutation_rate: f32,
    pub dt: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    /// Yaw rate at full steering, radians per second.
    pub turn_rate: f64,
    /// Speed decay toward zero, units per second squared.
    pub friction: f64,
    pub vehicle_radius: f64,
    pub lane_width: f64,
    pub course_length: f64,
    /// Distance between obstacle rows along the lane.
    pub row_spacing: f64,
    /// Drivable gap left open in each obstacle row.
    pub gap_width: f64,
    /// Clear run-up before the first obstacle row.
    pub first_row_offset: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_vehicles: 20,
            hidden_layers: vec![6],
            ray_count: DEFAULT_RAY_COUNT,
            spread_angle: DEFAULT_SPREAD_ANGLE,
            max_range: DEFAULT_MAX_RANGE,
            mutation_rate: 1.0,
            dt: 1.0 / 60.0,
            max_speed: 12.0,
            acceleration: 8.0,
            turn_rate: 1.5,
            friction: 2.0,
            vehicle_radius: 1.0,
            lane_width: 12.0,
            course_length: 400.0,
            row_spacing: 25.0,
            gap_width: 4.0,
            first_row_offset: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    NoVehicles,
    TooManyVehicles { max: usize, actual: usize },
    NoRays,
    TooManyRays { max: usize, actual: usize },
    ZeroHiddenLayer { index: usize },
    NonPositive { field: &'static str },
    MutationRateOutOfRange { actual: f32 },
    SpreadAngleOutOfRange { actual: f64 },
    GapNarrowerThanVehicle { gap: f64, vehicle_diameter: f64 },
    LaneNarrowerThanGap { lane: f64, gap: f64 },
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::NoVehicles => write!(f, "num_vehicles must be positive"),
            SimConfigError::TooManyVehicles { max, actual } => {
                write!(f, "num_vehicles ({actual}) exceeds supported maximum ({max})")
            }
            SimConfigError::NoRays => write!(f, "ray_count must be positive"),
            SimConfigError::TooManyRays { max, actual } => {
                write!(f, "ray_count ({actual}) exceeds supported maximum ({max})")
            }
            SimConfigError::ZeroHiddenLayer { index } => {
                write!(f, "hidden_layers[{index}] must be positive")
            }
            SimConfigError::NonPositive { field } => {
                write!(f, "{field} must be positive")
            }
            SimConfigError::MutationRateOutOfRange { actual } => {
                write!(f, "mutation_rate ({actual}) must lie in [0, 1]")
            }
            SimConfigError::SpreadAngleOutOfRange { actual } => {
                write!(f, "spread_angle ({actual}) must lie in [0, 2*pi]")
            }
            SimConfigError::GapNarrowerThanVehicle {
                gap,
                vehicle_diameter,
            } => write!(
                f,
                "gap_width ({gap}) must exceed the vehicle diameter ({vehicle_diameter})"
            ),
            SimConfigError::LaneNarrowerThanGap { lane, gap } => {
                write!(f, "lane_width ({lane}) must exceed gap_width ({gap})")
            }
        }
    }
}

impl Error for SimConfigError {}

impl SimConfig {
    pub const MAX_VEHICLES: usize = 4096;
    pub const MAX_RAYS: usize = 1024;

    /// Full network topology for this config: sensor rays in, four control
    /// channels out.
    pub fn topology(&self) -> Vec<usize> {
        let mut topology = Vec::with_capacity(self.hidden_layers.len() + 2);
        topology.push(self.ray_count);
        topology.extend_from_slice(&self.hidden_layers);
        topology.push(CONTROL_OUTPUTS);
        topology
    }

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if self.num_vehicles == 0 {
            return Err(SimConfigError::NoVehicles);
        }
        if self.num_vehicles > Self::MAX_VEHICLES {
            return Err(SimConfigError::TooManyVehicles {
                max: Self::MAX_VEHICLES,
                actual: self.num_vehicles,
            });
        }
        if self.ray_count == 0 {
            return Err(SimConfigError::NoRays);
        }
        if self.ray_count > Self::MAX_RAYS {
            return Err(SimConfigError::TooManyRays {
                max: Self::MAX_RAYS,
                actual: self.ray_count,
            });
        }
        if let Some(index) = self.hidden_layers.iter().position(|&n| n == 0) {
            return Err(SimConfigError::ZeroHiddenLayer { index });
        }
        if !(self.mutation_rate.is_finite() && (0.0..=1.0).contains(&self.mutation_rate)) {
            return Err(SimConfigError::MutationRateOutOfRange {
                actual: self.mutation_rate,
            });
        }
        if !(self.spread_angle.is_finite()
            && (0.0..=2.0 * std::f64::consts::PI).contains(&self.spread_angle))
        {
            return Err(SimConfigError::SpreadAngleOutOfRange {
                actual: self.spread_angle,
            });
        }
        for (value, field) in [
            (self.max_range, "max_range"),
            (self.dt, "dt"),
            (self.max_speed, "max_speed"),
            (self.acceleration, "acceleration"),
            (self.turn_rate, "turn_rate"),
            (self.vehicle_radius, "vehicle_radius"),
            (self.lane_width, "lane_width"),
            (self.course_length, "course_length"),
            (self.row_spacing, "row_spacing"),
            (self.gap_width, "gap_width"),
            (self.first_row_offset, "first_row_offset"),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimConfigError::NonPositive { field });
            }
        }
        if self.friction < 0.0 || !self.friction.is_finite() {
            return Err(SimConfigError::NonPositive { field: "friction" });
        }
        let vehicle_diameter = self.vehicle_radius * 2.0;
        if self.gap_width <= vehicle_diameter {
            return Err(SimConfigError::GapNarrowerThanVehicle {
                gap: self.gap_width,
                vehicle_diameter,
            });
        }
        if self.lane_width <= self.gap_width {
            return Err(SimConfigError::LaneNarrowerThanGap {
                lane: self.lane_width,
                gap: self.gap_width,
            });
        }
        Ok(())
    }
}
