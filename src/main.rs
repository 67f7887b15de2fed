// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindblad GRAPE command-line driver
//!
//! Runs the built-in demo problem (a damped qubit driven from |0⟩ to |1⟩ by
//! two quadrature controls) forward or through GRAPE.
//!
//! # Usage
//!
//! ```bash
//! # Evolve the demo problem with zero controls
//! lindblad-grape evolve
//!
//! # Optimize with a custom config and write checkpoints
//! lindblad-grape optimize --config run.yaml --save-file run.jsonl
//!
//! # Show the effective configuration
//! lindblad-grape config
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ndarray::Array2;
use num_complex::Complex64;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lindblad_grape::{
    config::{Config, DEMO_CONTROL_COUNT},
    grape::GrapeLindbladOptimizer,
    lindblad::{evolve_lindblad_discrete, purity, state_fidelity, DensityBatch},
    Result, VERSION,
};

/// Lindblad evolution and open-system GRAPE
#[derive(Parser)]
#[command(name = "lindblad-grape")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Lindblad master equation evolution and GRAPE pulse optimization")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve the demo problem with constant controls
    Evolve {
        /// Amplitude applied to the x quadrature at every control step
        #[arg(long, default_value_t = 0.0)]
        amplitude: f64,
    },

    /// Optimize the demo problem with GRAPE
    Optimize {
        /// Optimizer iterations
        #[arg(long, env = "LINDBLAD_GRAPE_ITERATION_COUNT")]
        iterations: Option<usize>,

        /// Adam learning rate
        #[arg(long)]
        learning_rate: Option<f64>,

        /// Checkpoint file (JSON lines)
        #[arg(long)]
        save_file: Option<PathBuf>,
    },

    /// Show effective configuration
    Config,

    /// Validate configuration file
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Evolve { amplitude } => {
            config.validate()?;
            let problem = config
                .problem
                .build(&config.evolution, &config.grape.control_norms())?;

            let mut controls =
                Array2::zeros((config.evolution.control_step_count, DEMO_CONTROL_COUNT));
            controls.column_mut(0).fill(Complex64::new(amplitude, 0.0));

            info!(
                version = VERSION,
                steps = config.evolution.control_step_count,
                evolution_time = config.evolution.evolution_time,
                amplitude,
                "evolving demo problem"
            );
            let result = evolve_lindblad_discrete(&problem, Some(&controls))?;

            println!("total_error: {:.6}", result.total_error);
            print_densities(&result.final_densities);
        }

        Commands::Optimize {
            iterations,
            learning_rate,
            save_file,
        } => {
            if let Some(n) = iterations {
                config.grape.iteration_count = n;
            }
            if let Some(lr) = learning_rate {
                config.optimizer.learning_rate = lr;
            }
            if let Some(path) = save_file {
                config.grape.save_file_path = Some(path);
                if config.grape.save_iteration_step == 0 {
                    config.grape.save_iteration_step = config.grape.log_iteration_step.max(1);
                }
            }
            config.validate()?;

            let problem = config
                .problem
                .build(&config.evolution, &config.grape.control_norms())?;

            info!(
                version = VERSION,
                iterations = config.grape.iteration_count,
                learning_rate = config.optimizer.learning_rate,
                "optimizing demo problem"
            );
            let mut grape = GrapeLindbladOptimizer::new(config.grape.clone())?
                .with_optimizer(config.optimizer.clone());
            let result = grape.optimize(&problem, None)?;

            println!("best_total_error: {:.6}", result.best_total_error);
            if let Some(iteration) = result.best_iteration {
                println!("best_iteration: {}", iteration);
            }
            if let Some(densities) = &result.best_final_densities {
                print_densities(densities);
            }
        }

        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Validate => match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Initialize logging with tracing.
///
/// RUST_LOG takes precedence over the configured level.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn print_densities(densities: &DensityBatch) {
    let n = densities.shape()[1];
    let mut excited = Array2::zeros((n, n));
    excited[[n - 1, n - 1]] = Complex64::new(1.0, 0.0);

    for (i, rho) in densities.outer_iter().enumerate() {
        let rho = rho.to_owned();
        println!(
            "density {}: purity {:.6}, excited population {:.6}",
            i,
            purity(&rho),
            state_fidelity(&rho, &excited)
        );
        for row in rho.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|z| format!("{:+.4}{:+.4}i", z.re, z.im))
                .collect();
            println!("  [{}]", cells.join(", "));
        }
    }
}
