use super::World;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct StepTimings {
    pub decision_us: u64,
    pub motion_us: u64,
    pub total_us: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StepMetrics {
    pub step: usize,
    pub generation: u32,
    pub alive_count: usize,
    pub damaged_count: usize,
    pub best_progress: f64,
    pub mean_progress: f64,
    pub mean_speed: f64,
    pub damage_events: usize,
    pub sensor_skipped_rays: usize,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub steps: usize,
    pub sample_every: usize,
    pub generation: u32,
    pub final_alive_count: usize,
    pub best_progress: f64,
    pub samples: Vec<StepMetrics>,
}

impl World {
    pub(crate) fn collect_step_metrics(&self, step: usize) -> StepMetrics {
        let total = self.vehicles.len();
        let denom = total.max(1) as f64;
        let mut best_progress = 0.0f64;
        let mut progress_sum = 0.0f64;
        let mut speed_sum = 0.0f64;
        let mut damaged = 0usize;
        for vehicle in &self.vehicles {
            best_progress = best_progress.max(vehicle.progress);
            progress_sum += vehicle.progress;
            speed_sum += vehicle.speed;
            if vehicle.damaged {
                damaged += 1;
            }
        }
        StepMetrics {
            step,
            generation: self.generation,
            alive_count: total - damaged,
            damaged_count: damaged,
            best_progress,
            mean_progress: progress_sum / denom,
            mean_speed: speed_sum / denom,
            damage_events: self.damage_events_last_step,
            sensor_skipped_rays: self.sensor_skips_last_step,
        }
    }
}
