use super::metrics::StepTimings;
use super::World;
use crate::control::ControlState;
use crate::network::{FeedForwardNetwork, NetworkError};
use rayon::prelude::*;
use std::time::Instant;

impl World {
    /// One fixed tick: a parallel decision phase (each vehicle owns its
    /// sensor and network exclusively, so the population is embarrassingly
    /// parallel), then a serial motion and collision phase.
    pub fn step(&mut self) -> StepTimings {
        let total_start = Instant::now();
        self.step_index = self.step_index.saturating_add(1);
        self.damage_events_last_step = 0;
        self.sensor_skips_last_step = 0;

        let t0 = Instant::now();
        let obstacles = &self.obstacles;
        let skipped: usize = self
            .vehicles
            .par_iter_mut()
            .map(|vehicle| {
                vehicle.decide(obstacles, ControlState::NONE);
                vehicle.sensor().skipped_last_cast()
            })
            .sum();
        self.sensor_skips_last_step = skipped;
        self.total_sensor_skips += skipped;
        let decision_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        for vehicle in &mut self.vehicles {
            if vehicle.damaged {
                continue;
            }
            vehicle.integrate(&self.config);
            if self
                .obstacles
                .overlapping_sphere(vehicle.position, self.config.vehicle_radius)
                .is_some()
            {
                vehicle.damaged = true;
                self.damage_events_last_step += 1;
                self.total_damage_events += 1;
            }
        }
        let motion_us = t1.elapsed().as_micros() as u64;

        StepTimings {
            decision_us,
            motion_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }

    /// Advance one generation: serialize the best vehicle's network, respawn
    /// everyone at the course start, give vehicle 0 the exact clone and every
    /// other vehicle a clone mutated at the configured rate. This is the
    /// whole propagation step; there is no crossover and no internal fitness
    /// beyond the progress comparison.
    pub fn evolve_generation(&mut self) -> Result<(), NetworkError> {
        let Some(best) = self.best_vehicle() else {
            return Ok(());
        };
        let descriptor = best.network().to_descriptor();
        self.generation = self.generation.saturating_add(1);
        for (idx, vehicle) in self.vehicles.iter_mut().enumerate() {
            let mut network = FeedForwardNetwork::from_descriptor(&descriptor)?;
            if idx != 0 {
                network.mutate(&mut self.rng, self.config.mutation_rate);
            }
            vehicle.reset(self.spawn_position, self.spawn_orientation, network);
        }
        Ok(())
    }
}
