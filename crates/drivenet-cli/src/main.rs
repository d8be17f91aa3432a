//! Headless driver for the simulation core: runs the generation loop that a
//! human performs in the browser (drive, pick the best, save, mutate, reload),
//! and reads/writes networks as descriptor JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use drivenet_core::network::NetworkDescriptor;
use drivenet_core::world::RunSummary;
use drivenet_core::{FeedForwardNetwork, SimConfig, World};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "drivenet", about = "Evolve obstacle-lane driving networks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the generation loop and keep the best driver.
    Run {
        /// Simulation config JSON; defaults apply for missing fields.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        generations: u32,
        /// Ticks per generation.
        #[arg(long, default_value_t = 1800)]
        steps: usize,
        #[arg(long, default_value_t = 60)]
        sample_every: usize,
        /// Overrides the config seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Write the best network descriptor here.
        #[arg(long)]
        save_best: Option<PathBuf>,
        /// Write per-generation run summaries here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Drive a saved network alone through the course and report progress.
    Evaluate {
        #[arg(long)]
        network: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 1800)]
        steps: usize,
        #[arg(long, default_value_t = 60)]
        sample_every: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Apply one mutation pass to a saved network.
    Mutate {
        #[arg(long)]
        network: PathBuf,
        /// Mutation rate in [0, 1]; probability and interpolation weight.
        #[arg(long, default_value_t = 1.0)]
        rate: f32,
        /// Seeded when given, entropy otherwise.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct RunReport {
    generations: Vec<RunSummary>,
    best_progress: f64,
}

fn load_config(path: Option<&Path>, seed: Option<u64>) -> Result<SimConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn load_network(path: &Path) -> Result<FeedForwardNetwork> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading network {}", path.display()))?;
    let descriptor: NetworkDescriptor = serde_json::from_str(&text)
        .with_context(|| format!("parsing network {}", path.display()))?;
    FeedForwardNetwork::from_descriptor(&descriptor)
        .with_context(|| format!("validating network {}", path.display()))
}

fn save_network(path: &Path, network: &FeedForwardNetwork) -> Result<()> {
    let json = serde_json::to_string_pretty(&network.to_descriptor())?;
    fs::write(path, json).with_context(|| format!("writing network {}", path.display()))
}

fn run(
    config: Option<PathBuf>,
    generations: u32,
    steps: usize,
    sample_every: usize,
    seed: Option<u64>,
    save_best: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config.as_deref(), seed)?;
    let mut world = World::try_new(config)?;
    eprintln!(
        "course ready: {} obstacles, {} vehicles",
        world.obstacles().len(),
        world.vehicles.len()
    );
    let mut summaries = Vec::with_capacity(generations as usize);
    for generation in 0..generations {
        let summary = world.try_run_experiment(steps, sample_every)?;
        eprintln!(
            "generation {generation}: best progress {:.1}, {} of {} still driving",
            summary.best_progress,
            summary.final_alive_count,
            world.vehicles.len()
        );
        summaries.push(summary);
        if generation + 1 < generations {
            world.evolve_generation()?;
        }
    }
    let best = world
        .best_vehicle()
        .context("population is empty")?;
    let best_progress = best.progress;
    if let Some(path) = save_best {
        save_network(&path, best.network())?;
        eprintln!("saved best network to {}", path.display());
    }
    let report = RunReport {
        generations: summaries,
        best_progress,
    };
    match out {
        Some(path) => {
            fs::write(&path, serde_json::to_string_pretty(&report)?)
                .with_context(|| format!("writing report {}", path.display()))?;
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn evaluate(
    network: PathBuf,
    config: Option<PathBuf>,
    steps: usize,
    sample_every: usize,
    seed: Option<u64>,
) -> Result<()> {
    let mut config = load_config(config.as_deref(), seed)?;
    config.num_vehicles = 1;
    let network = load_network(&network)?;
    if network.input_size() != config.ray_count {
        bail!(
            "network expects {} inputs but the sensor has {} rays",
            network.input_size(),
            config.ray_count
        );
    }
    let mut world = World::try_new(config)?;
    world.vehicles[0].set_network(network);
    let summary = world.try_run_experiment(steps, sample_every)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn mutate(network: PathBuf, rate: f32, seed: Option<u64>, out: PathBuf) -> Result<()> {
    if !(rate.is_finite() && (0.0..=1.0).contains(&rate)) {
        bail!("rate ({rate}) must lie in [0, 1]");
    }
    let mut net = load_network(&network)?;
    let mut rng = match seed {
        Some(seed) => ChaCha12Rng::seed_from_u64(seed),
        None => ChaCha12Rng::from_rng(&mut rand::rng()),
    };
    net.mutate(&mut rng, rate);
    save_network(&out, &net)?;
    eprintln!("wrote mutated network to {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("drivenet-{}-{name}", std::process::id()))
    }

    #[test]
    fn network_file_round_trips_through_save_and_load() {
        let mut rng = ChaCha12Rng::seed_from_u64(31);
        let mut original = FeedForwardNetwork::random(&[5, 4, 4], &mut rng).unwrap();
        let path = temp_path("roundtrip.json");
        save_network(&path, &original).unwrap();
        let mut restored = load_network(&path).unwrap();
        fs::remove_file(&path).unwrap();
        for trial in 0..10 {
            let input: Vec<f32> = (0..5).map(|i| ((trial * 5 + i) as f32).cos()).collect();
            assert_eq!(
                original.evaluate(&input).unwrap(),
                restored.evaluate(&input).unwrap()
            );
        }
    }

    #[test]
    fn malformed_network_file_is_rejected() {
        // One bias for two outputs; parses as JSON but fails shape validation.
        let path = temp_path("malformed.json");
        fs::write(&path, r#"{"layers":[{"weights":[[0.1,0.2]],"biases":[0.0]}]}"#).unwrap();
        let err = load_network(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("validating network"), "{err}");
    }

    #[test]
    fn unparseable_network_file_is_rejected() {
        let path = temp_path("unparseable.json");
        fs::write(&path, "not a descriptor").unwrap();
        let err = load_network(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("parsing network"), "{err}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            generations,
            steps,
            sample_every,
            seed,
            save_best,
            out,
        } => run(config, generations, steps, sample_every, seed, save_best, out),
        Command::Evaluate {
            network,
            config,
            steps,
            sample_every,
            seed,
        } => evaluate(network, config, steps, sample_every, seed),
        Command::Mutate {
            network,
            rate,
            seed,
            out,
        } => mutate(network, rate, seed, out),
    }
}
