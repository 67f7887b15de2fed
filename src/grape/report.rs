// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress reporting and checkpoint files for optimization runs.
//!
//! Checkpoints are JSON lines: a `summary` record written when the run
//! starts, then one `progress` record per saved iteration.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::types::GrapeConfig;
use crate::lindblad::types::{ControlArray, DensityBatch};

/// Static description of a run, reported once before the first iteration.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub control_count: usize,
    pub control_step_count: usize,
    pub complex_controls: bool,
    pub iteration_count: usize,
    pub density_count: usize,
    pub hilbert_size: usize,
    pub max_control_norms: Vec<f64>,
    pub minimum_error: f64,
    pub cost_names: Vec<String>,
}

/// One gradient evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Progress<'a> {
    pub iteration: usize,
    pub total_error: f64,
    pub best_total_error: f64,
    /// Clipped structured controls the evaluation ran with.
    pub controls: &'a ControlArray,
    /// Gradient in optimization form.
    pub gradient: &'a ControlArray,
    pub final_densities: &'a DensityBatch,
}

impl Progress<'_> {
    /// Euclidean norm of the gradient over all components.
    pub fn gradient_norm(&self) -> f64 {
        self.gradient.iter().map(|g| g.norm_sqr()).sum::<f64>().sqrt()
    }
}

/// Receives progress from the optimization driver.
///
/// Reporting must not fail the run; implementations handle their own errors.
pub trait ProgressReporter {
    fn initial(&mut self, _summary: &RunSummary) {}

    fn report(&mut self, progress: &Progress<'_>);
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&mut self, _progress: &Progress<'_>) {}
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Summary(&'a RunSummary),
    Progress(&'a Progress<'a>),
}

/// Logs progress through `tracing` and appends checkpoints to a file.
#[derive(Debug, Clone)]
pub struct CheckpointReporter {
    log_iteration_step: usize,
    save_iteration_step: usize,
    save_file_path: Option<PathBuf>,
}

impl CheckpointReporter {
    pub fn new(
        log_iteration_step: usize,
        save_iteration_step: usize,
        save_file_path: Option<PathBuf>,
    ) -> Self {
        Self {
            log_iteration_step,
            save_iteration_step,
            save_file_path,
        }
    }

    pub fn from_config(config: &GrapeConfig) -> Self {
        Self::new(
            config.log_iteration_step,
            config.save_iteration_step,
            config.save_file_path.clone(),
        )
    }

    fn saving(&self) -> Option<&Path> {
        if self.save_iteration_step == 0 {
            return None;
        }
        self.save_file_path.as_deref()
    }

    fn write_record(path: &Path, record: &Record<'_>, truncate: bool) -> std::io::Result<()> {
        let file: File = if truncate {
            File::create(path)?
        } else {
            OpenOptions::new().create(true).append(true).open(path)?
        };
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl ProgressReporter for CheckpointReporter {
    fn initial(&mut self, summary: &RunSummary) {
        info!(
            control_count = summary.control_count,
            control_step_count = summary.control_step_count,
            complex_controls = summary.complex_controls,
            iteration_count = summary.iteration_count,
            costs = ?summary.cost_names,
            "starting GRAPE run"
        );
        if let Some(path) = self.saving() {
            if let Err(e) = Self::write_record(path, &Record::Summary(summary), true) {
                warn!(path = %path.display(), error = %e, "failed to write checkpoint summary");
            }
        }
    }

    fn report(&mut self, progress: &Progress<'_>) {
        let iteration = progress.iteration;
        if self.log_iteration_step > 0 && iteration % self.log_iteration_step == 0 {
            info!(
                iteration,
                total_error = progress.total_error,
                best_total_error = progress.best_total_error,
                gradient_norm = progress.gradient_norm(),
                "GRAPE progress"
            );
        }

        if let Some(path) = self.saving() {
            if iteration % self.save_iteration_step == 0 {
                if let Err(e) = Self::write_record(path, &Record::Progress(progress), false) {
                    warn!(iteration, path = %path.display(), error = %e, "failed to write checkpoint");
                }
            }
        }
    }
}
