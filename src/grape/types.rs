// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! GRAPE configuration and result types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::lindblad::types::{ControlArray, DensityBatch};
use crate::validation::validate_control_norms;

/// Configuration for the open-system GRAPE driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrapeConfig {
    /// Number of control channels.
    #[serde(default = "default_control_count")]
    pub control_count: usize,
    /// Whether controls are complex (real and imaginary parts optimized).
    #[serde(default)]
    pub complex_controls: bool,
    /// Optimizer iterations (gradient evaluations).
    #[serde(default = "default_iteration_count")]
    pub iteration_count: usize,
    /// Per-channel magnitude bounds. Defaults to 1.0 per channel.
    #[serde(default)]
    pub max_control_norms: Option<Vec<f64>>,
    /// Error the caller considers good enough. Informational only.
    #[serde(default)]
    pub minimum_error: f64,
    /// Log progress every this many iterations (0 disables).
    #[serde(default = "default_log_iteration_step")]
    pub log_iteration_step: usize,
    /// Write a checkpoint every this many iterations (0 disables).
    #[serde(default)]
    pub save_iteration_step: usize,
    /// Checkpoint file (JSON lines).
    #[serde(default)]
    pub save_file_path: Option<PathBuf>,
}

fn default_control_count() -> usize {
    1
}

fn default_iteration_count() -> usize {
    1000
}

fn default_log_iteration_step() -> usize {
    10
}

impl Default for GrapeConfig {
    fn default() -> Self {
        Self {
            control_count: default_control_count(),
            complex_controls: false,
            iteration_count: default_iteration_count(),
            max_control_norms: None,
            minimum_error: 0.0,
            log_iteration_step: default_log_iteration_step(),
            save_iteration_step: 0,
            save_file_path: None,
        }
    }
}

impl GrapeConfig {
    pub fn new(control_count: usize, iteration_count: usize) -> Self {
        Self {
            control_count,
            iteration_count,
            ..Self::default()
        }
    }

    /// Bounds used for the run: the configured ones or 1.0 per channel.
    pub fn control_norms(&self) -> Vec<f64> {
        self.max_control_norms
            .clone()
            .unwrap_or_else(|| vec![1.0; self.control_count])
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.control_count == 0 {
            return Err(ValidationError::Field {
                field: "control_count".into(),
                message: "must be > 0".into(),
            }
            .into());
        }
        if self.iteration_count == 0 {
            return Err(ValidationError::Field {
                field: "iteration_count".into(),
                message: "must be > 0".into(),
            }
            .into());
        }
        if let Some(bounds) = &self.max_control_norms {
            validate_control_norms(bounds, self.control_count)?;
        }
        if !self.minimum_error.is_finite() {
            return Err(ValidationError::Field {
                field: "minimum_error".into(),
                message: format!("must be finite, got {}", self.minimum_error),
            }
            .into());
        }
        Ok(())
    }
}

/// Best solution seen during an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Lowest total error observed; +∞ until the first evaluation.
    pub best_total_error: f64,
    /// Clipped structured controls that produced `best_total_error`.
    pub best_controls: Option<ControlArray>,
    /// Final densities of the best evaluation.
    pub best_final_densities: Option<DensityBatch>,
    /// Gradient-evaluation index of the best evaluation.
    pub best_iteration: Option<usize>,
}

impl Default for OptimizationResult {
    fn default() -> Self {
        Self {
            best_total_error: f64::INFINITY,
            best_controls: None,
            best_final_densities: None,
            best_iteration: None,
        }
    }
}

impl OptimizationResult {
    /// Replace all fields together when `total_error` is strictly better.
    ///
    /// Returns whether the result was updated.
    pub fn record(
        &mut self,
        iteration: usize,
        total_error: f64,
        controls: &ControlArray,
        final_densities: &DensityBatch,
    ) -> bool {
        if total_error < self.best_total_error {
            self.best_total_error = total_error;
            self.best_controls = Some(controls.clone());
            self.best_final_densities = Some(final_densities.clone());
            self.best_iteration = Some(iteration);
            true
        } else {
            false
        }
    }
}
