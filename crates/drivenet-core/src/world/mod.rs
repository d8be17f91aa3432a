pub mod lifecycle;
pub mod metrics;

pub use metrics::*;

use crate::config::{SimConfig, SimConfigError};
use crate::course;
use crate::geom::{Quat, Vec3};
use crate::network::{FeedForwardNetwork, NetworkError};
use crate::obstacle::ObstacleSet;
use crate::sensor::RangeSensor;
use crate::vehicle::Vehicle;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::{error::Error, fmt};

/// Population of vehicles on a shared obstacle course, stepped by a fixed
/// tick. Selection is read-only (best progress); propagation is
/// clone-by-descriptor plus mutate-in-place between generations.
pub struct World {
    pub vehicles: Vec<Vehicle>,
    pub(crate) obstacles: ObstacleSet,
    pub(crate) spawn_position: Vec3,
    pub(crate) spawn_orientation: Quat,
    pub(crate) config: SimConfig,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) step_index: usize,
    pub(crate) generation: u32,
    pub(crate) damage_events_last_step: usize,
    pub(crate) total_damage_events: usize,
    pub(crate) sensor_skips_last_step: usize,
    pub(crate) total_sensor_skips: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldInitError {
    Config(SimConfigError),
    Network(NetworkError),
}

impl fmt::Display for WorldInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldInitError::Config(e) => write!(f, "{e}"),
            WorldInitError::Network(e) => write!(f, "{e}"),
        }
    }
}

impl Error for WorldInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorldInitError::Config(e) => Some(e),
            WorldInitError::Network(e) => Some(e),
        }
    }
}

impl From<SimConfigError> for WorldInitError {
    fn from(err: SimConfigError) -> Self {
        WorldInitError::Config(err)
    }
}

impl From<NetworkError> for WorldInitError {
    fn from(err: NetworkError) -> Self {
        WorldInitError::Network(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManySteps { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(
                    f,
                    "sample count ({actual}) exceeds supported maximum ({max})"
                )
            }
        }
    }
}

impl Error for ExperimentError {}

impl World {
    pub const MAX_EXPERIMENT_STEPS: usize = 1_000_000;
    pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;

    pub fn new(config: SimConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: SimConfig) -> Result<Self, WorldInitError> {
        config.validate()?;
        // Course layout gets its own stream so population size does not
        // perturb the obstacles for a given seed.
        let mut course_rng = ChaCha12Rng::seed_from_u64(config.seed.wrapping_add(1));
        let course = course::generate(&config, &mut course_rng);

        let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
        let topology = config.topology();
        let mut vehicles = Vec::with_capacity(config.num_vehicles);
        for id in 0..config.num_vehicles {
            let network = FeedForwardNetwork::random(&topology, &mut rng)?;
            let sensor = RangeSensor::new(config.ray_count, config.spread_angle, config.max_range);
            vehicles.push(Vehicle::new(
                id as u32,
                course.spawn_position,
                course.spawn_orientation,
                network,
                sensor,
            ));
        }

        Ok(Self {
            vehicles,
            obstacles: ObstacleSet::new(course.obstacles),
            spawn_position: course.spawn_position,
            spawn_orientation: course.spawn_orientation,
            config,
            rng,
            step_index: 0,
            generation: 0,
            damage_events_last_step: 0,
            total_damage_events: 0,
            sensor_skips_last_step: 0,
            total_sensor_skips: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn obstacles(&self) -> &ObstacleSet {
        &self.obstacles
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn alive_count(&self) -> usize {
        self.vehicles.iter().filter(|v| !v.damaged).count()
    }

    /// Collisions recorded since the world was built.
    pub fn total_damage_events(&self) -> usize {
        self.total_damage_events
    }

    /// Sensor rays skipped for non-finite intersections since the world was
    /// built.
    pub fn total_sensor_skips(&self) -> usize {
        self.total_sensor_skips
    }

    /// Vehicle with the highest progress so far, damaged or not (a crash
    /// freezes progress where it happened). Pure read; never mutates.
    pub fn best_vehicle(&self) -> Option<&Vehicle> {
        self.vehicles
            .iter()
            .max_by(|a, b| a.progress.total_cmp(&b.progress))
    }

    pub fn run_experiment(&mut self, steps: usize, sample_every: usize) -> RunSummary {
        self.try_run_experiment(steps, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment(
        &mut self,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        let estimated_samples = if steps == 0 {
            0
        } else {
            ((steps - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_EXPERIMENT_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_EXPERIMENT_SAMPLES,
                actual: estimated_samples,
            });
        }

        let mut samples = Vec::with_capacity(estimated_samples);
        for step in 1..=steps {
            self.step();
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics(step));
            }
        }
        Ok(RunSummary {
            schema_version: 1,
            steps,
            sample_every,
            generation: self.generation,
            final_alive_count: self.alive_count(),
            best_progress: self
                .best_vehicle()
                .map(|v| v.progress)
                .unwrap_or(0.0),
            samples,
        })
    }
}
