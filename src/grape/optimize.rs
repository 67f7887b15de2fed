// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Open-system GRAPE driver.
//!
//! Couples an [`Optimizer`] working on flat real parameters to the Lindblad
//! evolution working on structured complex controls. Every evaluation runs
//! slap → clip → evolve (and differentiate); gradient evaluations also track
//! the best result and report progress.
//!
//! Ref: Khaneja et al. (2005), J. Magn. Reson. 172, 296.
//! Ref: Boutin et al. (2017), "Resonator reset in circuit QED by optimal
//! control for large open quantum systems", Phys. Rev. A 96, 042315.

use ndarray::Array1;
use tracing::{debug, info, warn};

use super::controls::{clip_control_norms, initialize_controls, slap_controls, strip_controls};
use super::differentiate::{AdjointDifferentiator, Differentiator};
use super::optimizer::{Adam, Objective, Optimizer};
use super::report::{CheckpointReporter, Progress, ProgressReporter, RunSummary};
use super::types::{GrapeConfig, OptimizationResult};
use crate::error::Result;
use crate::lindblad::integrate::{evolve_lindblad_discrete, LindbladProblem};
use crate::lindblad::types::ControlArray;

/// GRAPE optimizer for Lindblad problems.
pub struct GrapeLindbladOptimizer {
    config: GrapeConfig,
    optimizer: Box<dyn Optimizer>,
    differentiator: Box<dyn Differentiator>,
    reporter: Box<dyn ProgressReporter>,
}

impl GrapeLindbladOptimizer {
    /// Create a driver with Adam, the adjoint differentiator and a
    /// checkpoint reporter built from `config`.
    pub fn new(config: GrapeConfig) -> Result<Self> {
        config.validate()?;
        let reporter = CheckpointReporter::from_config(&config);
        Ok(Self {
            config,
            optimizer: Box::new(Adam::default()),
            differentiator: Box::new(AdjointDifferentiator),
            reporter: Box::new(reporter),
        })
    }

    pub fn with_optimizer(mut self, optimizer: impl Optimizer + 'static) -> Self {
        self.optimizer = Box::new(optimizer);
        self
    }

    pub fn with_differentiator(mut self, differentiator: impl Differentiator + 'static) -> Self {
        self.differentiator = Box::new(differentiator);
        self
    }

    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn config(&self) -> &GrapeConfig {
        &self.config
    }

    /// Run the optimizer for `iteration_count` gradient evaluations.
    ///
    /// `initial_controls` must be `(control_step_count, control_count)`;
    /// when absent a bounded deterministic guess is generated.
    pub fn optimize(
        &mut self,
        problem: &LindbladProblem,
        initial_controls: Option<&ControlArray>,
    ) -> Result<OptimizationResult> {
        let Self {
            config,
            optimizer,
            differentiator,
            reporter,
        } = self;

        if problem.is_degenerate() {
            warn!("problem has neither a Hamiltonian nor dissipation; controls have no effect");
        }

        let control_step_count = problem.state().control_step_count;
        let (controls, bounds) = initialize_controls(
            config.complex_controls,
            config.control_count,
            control_step_count,
            initial_controls,
            config.max_control_norms.as_deref(),
        )?;

        reporter.initial(&RunSummary {
            control_count: config.control_count,
            control_step_count,
            complex_controls: config.complex_controls,
            iteration_count: config.iteration_count,
            density_count: problem.density_count(),
            hilbert_size: problem.hilbert_size(),
            max_control_norms: bounds.clone(),
            minimum_error: config.minimum_error,
            cost_names: problem.costs().iter().map(|c| c.name().to_string()).collect(),
        });

        let mut objective = GrapeObjective {
            problem,
            config,
            bounds,
            differentiator: &**differentiator,
            reporter: &mut **reporter,
            result: OptimizationResult::default(),
            iteration: 0,
        };
        let initial_params = strip_controls(config.complex_controls, &controls);
        optimizer.run(&mut objective, config.iteration_count, initial_params)?;

        let result = objective.result;
        info!(
            iterations = objective.iteration,
            best_total_error = result.best_total_error,
            best_iteration = ?result.best_iteration,
            "GRAPE run complete"
        );
        Ok(result)
    }
}

/// Evaluation context handed to the optimizer.
struct GrapeObjective<'a> {
    problem: &'a LindbladProblem,
    config: &'a GrapeConfig,
    bounds: Vec<f64>,
    differentiator: &'a dyn Differentiator,
    reporter: &'a mut dyn ProgressReporter,
    result: OptimizationResult,
    iteration: usize,
}

impl GrapeObjective<'_> {
    fn structured(&self, params: &Array1<f64>) -> Result<ControlArray> {
        let shape = (self.problem.state().control_step_count, self.config.control_count);
        let mut controls = slap_controls(self.config.complex_controls, params, shape)?;
        clip_control_norms(&mut controls, &self.bounds);
        Ok(controls)
    }
}

impl Objective for GrapeObjective<'_> {
    fn value(&mut self, params: &Array1<f64>) -> Result<f64> {
        let controls = self.structured(params)?;
        let result = evolve_lindblad_discrete(self.problem, Some(&controls))?;
        debug!(total_error = result.total_error, "objective evaluated");
        Ok(result.total_error)
    }

    fn gradient(&mut self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let controls = self.structured(params)?;
        let (evolution, mut gradient) = self
            .differentiator
            .value_and_gradient(self.problem, &controls)?;
        if self.config.complex_controls {
            // ∂u/∂x − i∂u/∂y  →  ∂u/∂x + i∂u/∂y
            gradient.mapv_inplace(|g| g.conj());
        }

        let total_error = evolution.total_error;
        let previous_best = self.result.best_total_error;
        if self.result.record(
            self.iteration,
            total_error,
            &controls,
            &evolution.final_densities,
        ) && previous_best >= self.config.minimum_error
            && total_error < self.config.minimum_error
        {
            info!(
                iteration = self.iteration,
                total_error,
                minimum_error = self.config.minimum_error,
                "total error below minimum_error"
            );
        }

        self.reporter.report(&Progress {
            iteration: self.iteration,
            total_error,
            best_total_error: self.result.best_total_error,
            controls: &controls,
            gradient: &gradient,
            final_densities: &evolution.final_densities,
        });
        self.iteration += 1;

        Ok(strip_controls(self.config.complex_controls, &gradient))
    }
}
