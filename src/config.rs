// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the command-line driver.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. lindblad-grape.yaml file
//! 3. Environment variables (LINDBLAD_GRAPE_*)
//! 4. CLI arguments

use ndarray::{array, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::cost::{ControlNorm, TargetDensityInfidelity};
use crate::error::{Error, Result, ValidationError};
use crate::grape::{Adam, GrapeConfig};
use crate::lindblad::{
    CollapseOperator, ControlledHamiltonian, DensityBatch, EvolutionConfig, LindbladProblem,
    StaticLindbladData,
};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lindblad-grape.yaml";

/// Controls of the built-in demo problem (x and y quadratures).
pub const DEMO_CONTROL_COUNT: usize = 2;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Evolution grid and policies
    #[serde(default = "default_evolution")]
    pub evolution: EvolutionConfig,

    /// GRAPE driver settings
    #[serde(default = "default_grape")]
    pub grape: GrapeConfig,

    /// Adam hyperparameters
    #[serde(default)]
    pub optimizer: Adam,

    /// Built-in demo problem
    #[serde(default)]
    pub problem: DemoProblemConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            evolution: default_evolution(),
            grape: default_grape(),
            optimizer: Adam::default(),
            problem: DemoProblemConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_evolution() -> EvolutionConfig {
    EvolutionConfig::new(40, 10.0)
}

fn default_grape() -> GrapeConfig {
    GrapeConfig::new(DEMO_CONTROL_COUNT, 200)
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply `LINDBLAD_GRAPE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(val) = lookup("LINDBLAD_GRAPE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("LINDBLAD_GRAPE_ITERATION_COUNT") {
            self.grape.iteration_count = parse_override("LINDBLAD_GRAPE_ITERATION_COUNT", &val)?;
        }
        if let Some(val) = lookup("LINDBLAD_GRAPE_CONTROL_STEP_COUNT") {
            self.evolution.control_step_count =
                parse_override("LINDBLAD_GRAPE_CONTROL_STEP_COUNT", &val)?;
        }
        if let Some(val) = lookup("LINDBLAD_GRAPE_EVOLUTION_TIME") {
            self.evolution.evolution_time = parse_override("LINDBLAD_GRAPE_EVOLUTION_TIME", &val)?;
        }
        if let Some(val) = lookup("LINDBLAD_GRAPE_SAVE_FILE_PATH") {
            self.grape.save_file_path = Some(PathBuf::from(val));
        }
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.grape.validate()?;
        self.optimizer.validate()?;
        self.problem.validate()?;
        if self.grape.control_count != DEMO_CONTROL_COUNT {
            return Err(Error::Config(format!(
                "the demo problem has {} controls, grape.control_count is {}",
                DEMO_CONTROL_COUNT, self.grape.control_count
            )));
        }
        // σx/2 and σy/2 only stay Hermitian under real amplitudes
        if self.grape.complex_controls {
            return Err(Error::Config(
                "the demo problem takes real quadrature controls; set grape.complex_controls to false"
                    .into(),
            ));
        }
        if self.grape.save_iteration_step > 0 && self.grape.save_file_path.is_none() {
            tracing::warn!(
                save_iteration_step = self.grape.save_iteration_step,
                "save_file_path is not set; no checkpoints will be written"
            );
        }
        self.logging.validate()
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: cannot parse {val:?}")))
}

/// Parameters of the built-in demo problem.
///
/// A single qubit with detuning `detuning` is driven from |0⟩ to |1⟩ by
/// two quadrature controls coupling through σx/2 and σy/2, while decaying
/// with the given T1 and T2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoProblemConfig {
    /// Energy relaxation time, in units of the evolution time
    #[serde(default = "default_t1")]
    pub t1: f64,

    /// Coherence time (≤ 2·T1)
    #[serde(default = "default_t2")]
    pub t2: f64,

    /// Drift term coefficient of σz/2
    #[serde(default)]
    pub detuning: f64,

    /// Weight of the control-norm penalty (0 disables it)
    #[serde(default)]
    pub control_norm_multiplier: f64,
}

impl Default for DemoProblemConfig {
    fn default() -> Self {
        Self {
            t1: default_t1(),
            t2: default_t2(),
            detuning: 0.0,
            control_norm_multiplier: 0.0,
        }
    }
}

fn default_t1() -> f64 {
    50.0
}

fn default_t2() -> f64 {
    40.0
}

impl DemoProblemConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("t1", self.t1), ("t2", self.t2)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::Field {
                    field: field.into(),
                    message: format!("must be a positive finite number, got {value}"),
                }
                .into());
            }
        }
        if self.t2 > 2.0 * self.t1 {
            return Err(ValidationError::PhysicsConstraint(format!(
                "T2 ({}) must be ≤ 2*T1 ({})",
                self.t2,
                2.0 * self.t1
            ))
            .into());
        }
        if !(self.control_norm_multiplier.is_finite() && self.control_norm_multiplier >= 0.0) {
            return Err(ValidationError::Field {
                field: "control_norm_multiplier".into(),
                message: format!("must be ≥ 0, got {}", self.control_norm_multiplier),
            }
            .into());
        }
        Ok(())
    }

    /// Build the demo problem on the given evolution grid.
    ///
    /// `max_control_norms` feeds the optional control-norm penalty.
    pub fn build(
        &self,
        evolution: &EvolutionConfig,
        max_control_norms: &[f64],
    ) -> Result<LindbladProblem> {
        let half = Complex64::new(0.5, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        let i_half = Complex64::new(0.0, 0.5);

        let drift: Array2<Complex64> = array![
            [Complex64::new(0.5 * self.detuning, 0.0), zero],
            [zero, Complex64::new(-0.5 * self.detuning, 0.0)]
        ];
        let x_half = array![[zero, half], [half, zero]];
        let y_half = array![[zero, -i_half], [i_half, zero]];

        let mut ground = DensityBatch::zeros((1, 2, 2));
        ground[[0, 0, 0]] = Complex64::new(1.0, 0.0);
        let mut excited = DensityBatch::zeros((1, 2, 2));
        excited[[0, 1, 1]] = Complex64::new(1.0, 0.0);

        let ops = CollapseOperator::from_t1_t2(self.t1, self.t2, "q0")?;
        let mut problem = LindbladProblem::new(evolution.clone(), ground)?
            .with_hamiltonian(ControlledHamiltonian::new(drift, vec![x_half, y_half]))
            .with_lindblad_data(StaticLindbladData::from_collapse_ops(&ops))
            .with_cost(TargetDensityInfidelity::new(excited));
        if self.control_norm_multiplier > 0.0 {
            problem = problem.with_cost(
                ControlNorm::new(max_control_norms.to_vec())
                    .with_multiplier(self.control_norm_multiplier),
            );
        }
        Ok(problem)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        match self.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(Error::Config(format!(
                "logging.format must be json or pretty, got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lindblad::evolve_lindblad_discrete;
    use std::collections::HashMap;
    use std::io::Write as _;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.evolution.control_step_count, 40);
        assert_eq!(config.grape.control_count, DEMO_CONTROL_COUNT);
        assert_eq!(config.grape.iteration_count, 200);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = Config::default();
        bad.grape.control_count = 3;
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.problem.t2 = 3.0 * bad.problem.t1;
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.logging.format = "xml".into();
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.evolution.evolution_time = 0.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_demo_rejects_complex_controls() {
        let mut config = Config::default();
        config.grape.complex_controls = true;
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());

        config.grape.complex_controls = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
evolution:
  control_step_count: 12
  evolution_time: 3.5
  operation_policy: cpu_sparse
grape:
  control_count: 2
  iteration_count: 7
  complex_controls: true
optimizer:
  learning_rate: 0.02
problem:
  t1: 30.0
  t2: 20.0
"#
        )
        .unwrap();

        let config = Config::from_file(f.path()).unwrap();
        assert_eq!(config.evolution.control_step_count, 12);
        assert_eq!(config.evolution.system_step_multiplier, 1);
        assert_eq!(
            config.evolution.operation_policy,
            crate::lindblad::OperationPolicy::CpuSparse
        );
        assert_eq!(config.grape.iteration_count, 7);
        assert!(config.grape.complex_controls);
        assert!(config.validate().unwrap_err().is_configuration());
        assert_eq!(config.optimizer.learning_rate, 0.02);
        assert_eq!(config.optimizer.beta_1, 0.9);
        assert_eq!(config.problem.t1, 30.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_config_load_invalid_yaml() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "{{{{not: valid: yaml::::").unwrap();
        assert!(Config::from_file(f.path()).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LINDBLAD_GRAPE_LOG_LEVEL", "debug"),
            ("LINDBLAD_GRAPE_ITERATION_COUNT", "25"),
            ("LINDBLAD_GRAPE_CONTROL_STEP_COUNT", " 16 "),
            ("LINDBLAD_GRAPE_EVOLUTION_TIME", "2.5"),
            ("LINDBLAD_GRAPE_SAVE_FILE_PATH", "/tmp/run.jsonl"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.grape.iteration_count, 25);
        assert_eq!(config.evolution.control_step_count, 16);
        assert_eq!(config.evolution.evolution_time, 2.5);
        assert_eq!(
            config.grape.save_file_path.as_deref(),
            Some(Path::new("/tmp/run.jsonl"))
        );
    }

    #[test]
    fn test_unparseable_override_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| {
                (key == "LINDBLAD_GRAPE_ITERATION_COUNT").then(|| "many".to_string())
            })
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_yaml_round_trip_of_effective_config() {
        let config = Config::default();
        let text = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.grape.control_count, config.grape.control_count);
        assert_eq!(back.evolution.evolution_time, config.evolution.evolution_time);
    }

    #[test]
    fn test_demo_problem_decays_without_controls() {
        let config = Config::default();
        let problem = config
            .problem
            .build(&config.evolution, &config.grape.control_norms())
            .unwrap();
        assert_eq!(problem.hilbert_size(), 2);
        assert_eq!(problem.costs().len(), 1);

        let zeros = Array2::zeros((config.evolution.control_step_count, DEMO_CONTROL_COUNT));
        let result = evolve_lindblad_discrete(&problem, Some(&zeros)).unwrap();
        // Ground state is a fixed point of amplitude damping and dephasing.
        approx::assert_relative_eq!(result.total_error, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_demo_problem_adds_control_norm() {
        let mut config = Config::default();
        config.problem.control_norm_multiplier = 0.1;
        let problem = config
            .problem
            .build(&config.evolution, &config.grape.control_norms())
            .unwrap();
        assert_eq!(problem.costs().len(), 2);
    }
}
