// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! RK4 integrator and evolution driver for the discrete Lindblad problem.
//!
//! Integrates dρ/dt = -i[H(c(t), t), ρ] + Σ_k γ_k(t) D[L_k(t)](ρ) with
//! classical 4th-order Runge–Kutta. Controls are given on a grid of
//! `control_step_count` points and linearly interpolated to the RK4 stage
//! times; each control step is subdivided into `system_step_multiplier`
//! integration steps.
//!
//! Ref: Press et al., "Numerical Recipes" (2007), §17.1.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use tracing::debug;

use super::generator::{trace, Generator};
use super::hamiltonian::{Hamiltonian, LindbladData};
use super::interpolate::interpolate;
use super::types::{ControlArray, DensityBatch, EvolutionConfig, EvolveResult, ProgramState};
use crate::cost::{Cost, CostKind};
use crate::error::{Result, ValidationError};
use crate::validation::validate_densities;

/// Everything needed to evolve a density batch: timing, initial state,
/// costs and the (optional) Hamiltonian and dissipation sources.
pub struct LindbladProblem {
    config: EvolutionConfig,
    state: ProgramState,
    initial_densities: DensityBatch,
    costs: Vec<Box<dyn Cost>>,
    hamiltonian: Option<Box<dyn Hamiltonian>>,
    lindblad_data: Option<Box<dyn LindbladData>>,
}

impl LindbladProblem {
    /// Create a problem with no costs, Hamiltonian or dissipation.
    ///
    /// # Errors
    /// Invalid evolution settings or a malformed initial density batch.
    pub fn new(config: EvolutionConfig, initial_densities: DensityBatch) -> Result<Self> {
        let state = ProgramState::new(&config)?;
        validate_densities(&initial_densities)?;
        Ok(Self {
            config,
            state,
            initial_densities,
            costs: Vec::new(),
            hamiltonian: None,
            lindblad_data: None,
        })
    }

    pub fn with_cost(mut self, cost: impl Cost + 'static) -> Self {
        self.costs.push(Box::new(cost));
        self
    }

    pub fn with_hamiltonian(mut self, hamiltonian: impl Hamiltonian + 'static) -> Self {
        self.hamiltonian = Some(Box::new(hamiltonian));
        self
    }

    pub fn with_lindblad_data(mut self, data: impl LindbladData + 'static) -> Self {
        self.lindblad_data = Some(Box::new(data));
        self
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn state(&self) -> &ProgramState {
        &self.state
    }

    pub fn initial_densities(&self) -> &DensityBatch {
        &self.initial_densities
    }

    pub fn costs(&self) -> &[Box<dyn Cost>] {
        &self.costs
    }

    pub fn hamiltonian(&self) -> Option<&dyn Hamiltonian> {
        self.hamiltonian.as_deref()
    }

    pub fn hilbert_size(&self) -> usize {
        self.initial_densities.shape()[1]
    }

    pub fn density_count(&self) -> usize {
        self.initial_densities.shape()[0]
    }

    /// True when neither a Hamiltonian nor dissipation data is attached,
    /// so evolution leaves every density unchanged.
    pub fn is_degenerate(&self) -> bool {
        self.hamiltonian.is_none() && self.lindblad_data.is_none()
    }

    /// Check a structured control array against the control grid.
    pub fn check_controls(&self, controls: &ControlArray) -> Result<()> {
        if controls.nrows() != self.state.control_step_count {
            return Err(ValidationError::shape(
                "controls",
                (self.state.control_step_count, controls.ncols()),
                controls.dim(),
            )
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for LindbladProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LindbladProblem")
            .field("config", &self.config)
            .field("densities", &self.initial_densities.shape())
            .field("costs", &self.costs.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("hamiltonian", &self.hamiltonian.is_some())
            .field("lindblad_data", &self.lindblad_data.is_some())
            .finish()
    }
}

/// Resolved data for the four RK4 stages of one integration step.
///
/// Stages 2 and 3 share their time, controls and Hamiltonian.
pub(crate) struct Stages {
    pub times: [f64; 4],
    pub controls: [Option<Array1<Complex64>>; 4],
    pub generators: [Generator; 4],
    /// Control rows bracketing the step.
    pub bracket: (usize, usize),
    /// Interpolation weight of the right row at the midpoint.
    pub alpha: f64,
    pub dt: f64,
}

/// Control rows bracketing a step.
fn bracket(control_step: usize, is_final_control_step: bool, control_step_count: usize) -> (usize, usize) {
    if control_step_count == 1 {
        (0, 0)
    } else if is_final_control_step {
        (control_step - 1, control_step)
    } else {
        (control_step, control_step + 1)
    }
}

impl Stages {
    pub(crate) fn resolve(
        problem: &LindbladProblem,
        controls: Option<&ControlArray>,
        control_step: usize,
        time: f64,
        is_final_control_step: bool,
    ) -> Result<Self> {
        let state = problem.state();
        let dt = state.dt;
        let t1 = time;
        let t2 = time + 0.5 * dt;
        let t4 = time + dt;
        let times = [t1, t2, t2, t4];
        let bracket = bracket(control_step, is_final_control_step, state.control_step_count);

        let (c1, c2, c4) = match controls {
            Some(controls) => {
                let left = controls.row(bracket.0);
                let right = controls.row(bracket.1);
                let mid = interpolate(state.interpolation_policy, t1, t4, t2, left, right)?;
                (Some(left.to_owned()), Some(mid), Some(right.to_owned()))
            }
            None => (None, None, None),
        };

        let hamiltonians = match problem.hamiltonian() {
            Some(h) => {
                let h1 = h.evaluate(c1.as_ref().map(|c| c.view()), t1)?;
                let h2 = h.evaluate(c2.as_ref().map(|c| c.view()), t2)?;
                let h4 = h.evaluate(c4.as_ref().map(|c| c.view()), t4)?;
                [Some(h1), Some(h2.clone()), Some(h2), Some(h4)]
            }
            None => [None, None, None, None],
        };

        let n = problem.hilbert_size();
        let generator = |stage: usize| {
            let terms = problem
                .lindblad_data
                .as_ref()
                .map(|data| data.terms(times[stage]));
            Generator::new(
                hamiltonians[stage].as_ref(),
                terms.as_deref(),
                n,
                state.operation_policy,
            )
        };
        let generators = [generator(0)?, generator(1)?, generator(2)?, generator(3)?];

        Ok(Self {
            times,
            controls: [c1, c2.clone(), c2, c4],
            generators,
            bracket,
            alpha: (t2 - t1) / (t4 - t1),
            dt,
        })
    }

    /// Stage inputs X_i and increments k_i = Δt·ℒ_i(X_i).
    pub(crate) fn increments(&self, densities: &DensityBatch) -> ([DensityBatch; 4], [DensityBatch; 4]) {
        let dt = Complex64::new(self.dt, 0.0);
        let half = Complex64::new(0.5, 0.0);

        let x1 = densities.clone();
        let k1 = self.generators[0].apply(&x1) * dt;
        let x2 = densities + &(&k1 * half);
        let k2 = self.generators[1].apply(&x2) * dt;
        let x3 = densities + &(&k2 * half);
        let k3 = self.generators[2].apply(&x3) * dt;
        let x4 = densities + &k3;
        let k4 = self.generators[3].apply(&x4) * dt;
        ([x1, x2, x3, x4], [k1, k2, k3, k4])
    }

    pub(crate) fn advance(&self, densities: &DensityBatch) -> DensityBatch {
        if self.generators.iter().all(Generator::is_zero) {
            return densities.clone();
        }
        let (_, [k1, k2, k3, k4]) = self.increments(densities);
        let two = Complex64::new(2.0, 0.0);
        let sixth = Complex64::new(1.0 / 6.0, 0.0);
        densities + &((k1 + &k2 * two + &k3 * two + k4) * sixth)
    }
}

/// Advance a density batch by one integration step starting at `time`.
///
/// `controls` is the full structured control array; the two rows
/// bracketing `control_step` are interpolated to the stage times.
pub fn rk4_step(
    problem: &LindbladProblem,
    densities: &DensityBatch,
    controls: Option<&ControlArray>,
    control_step: usize,
    time: f64,
    is_final_control_step: bool,
) -> Result<DensityBatch> {
    let stages = Stages::resolve(problem, controls, control_step, time, is_final_control_step)?;
    Ok(stages.advance(densities))
}

/// Evolve the problem's initial densities over the full time horizon and
/// accumulate the total error of its costs.
///
/// Step costs are evaluated on the densities produced by every integration
/// step; on the final step every cost is evaluated.
pub fn evolve_lindblad_discrete(
    problem: &LindbladProblem,
    controls: Option<&ControlArray>,
) -> Result<EvolveResult> {
    evaluate(problem, controls, false)
}

/// Like [`evolve_lindblad_discrete`] but keeps the batch entering every
/// integration step together with the final batch.
pub fn evolve_with_trajectory(
    problem: &LindbladProblem,
    controls: Option<&ControlArray>,
) -> Result<EvolveResult> {
    evaluate(problem, controls, true)
}

fn evaluate(
    problem: &LindbladProblem,
    controls: Option<&ControlArray>,
    keep_trajectory: bool,
) -> Result<EvolveResult> {
    if let Some(c) = controls {
        problem.check_controls(c)?;
    }
    let state = problem.state();
    debug!(
        dt = state.dt,
        steps = state.final_system_step + 1,
        densities = problem.density_count(),
        "evolving lindblad problem"
    );

    let mut densities = problem.initial_densities().clone();
    let mut total_error = 0.0;
    let mut trajectory = keep_trajectory.then(|| Vec::with_capacity(state.final_system_step + 2));

    for system_step in 0..=state.final_system_step {
        let control_step = system_step / state.system_step_multiplier;
        let is_final_control_step = control_step == state.final_control_step;
        let is_final_system_step = system_step == state.final_system_step;
        let time = system_step as f64 * state.dt;

        if let Some(traj) = trajectory.as_mut() {
            traj.push(densities.clone());
        }
        densities = rk4_step(
            problem,
            &densities,
            controls,
            control_step,
            time,
            is_final_control_step,
        )?;

        for cost in active_costs(problem, is_final_system_step) {
            total_error += cost.cost(controls, &densities, system_step)?;
        }
    }

    if let Some(traj) = trajectory.as_mut() {
        traj.push(densities.clone());
    }
    debug!(total_error, "evolution complete");

    Ok(EvolveResult {
        final_densities: densities,
        total_error,
        trajectory,
    })
}

/// Costs evaluated after an integration step.
pub(crate) fn active_costs<'a>(
    problem: &'a LindbladProblem,
    is_final_system_step: bool,
) -> impl Iterator<Item = &'a (dyn Cost + 'static)> {
    problem
        .costs()
        .iter()
        .map(|c| &**c)
        .filter(move |c| is_final_system_step || c.kind() == CostKind::Step)
}

/// Real part of the trace.
pub fn trace_real(rho: &Array2<Complex64>) -> f64 {
    trace(rho).re
}

/// Purity Tr(ρ²).
pub fn purity(rho: &Array2<Complex64>) -> f64 {
    trace(&rho.dot(rho)).re
}

/// Fidelity Tr(ρ_target ρ) against a pure target.
pub fn state_fidelity(rho: &Array2<Complex64>, target_rho: &Array2<Complex64>) -> f64 {
    trace(&target_rho.dot(rho)).re
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{CostGradient, TargetDensityInfidelity};
    use crate::lindblad::hamiltonian::{StaticHamiltonian, StaticLindbladData};
    use crate::lindblad::superoperator::exact_evolution;
    use crate::lindblad::types::{
        CollapseOperator, InterpolationPolicy, LindbladTerms, OperationPolicy,
    };
    use crate::test_utils::{
        assert_batch_close, batch_of, c, column_densities, excited_state, ground_state, identity,
        iswap, pauli_x, pauli_z, sigma_minus, superposition_state, xx_plus_yy,
    };
    use crate::error::Error;
    use crate::lindblad::hamiltonian::ControlledHamiltonian;
    use approx::assert_relative_eq;
    use ndarray::{array, Array3, ArrayView1};
    use std::cell::RefCell;
    use std::rc::Rc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn config(steps: usize, time: f64) -> EvolutionConfig {
        EvolutionConfig::new(steps, time)
    }

    #[test]
    fn test_empty_problem_is_identity() {
        let rho = batch_of(&[superposition_state(), excited_state()]);
        let problem = LindbladProblem::new(config(1, 1.0), rho.clone()).unwrap();
        assert!(problem.is_degenerate());

        let one_step = rk4_step(&problem, &rho, None, 0, 0.0, true).unwrap();
        assert_eq!(one_step, rho);

        let result = evolve_lindblad_discrete(&problem, None).unwrap();
        assert_eq!(result.final_densities, rho);
        assert_eq!(result.total_error, 0.0);
    }

    #[test]
    fn test_iswap_from_exchange_hamiltonian() {
        let steps = 1000;
        let initial = column_densities(&identity(4));
        let expected = column_densities(&iswap());
        let problem = LindbladProblem::new(config(steps, PI / 2.0), initial)
            .unwrap()
            .with_hamiltonian(StaticHamiltonian::new(xx_plus_yy()));

        let result = evolve_lindblad_discrete(&problem, None).unwrap();
        assert_batch_close(&result.final_densities, &expected, 1e-6);
    }

    #[test]
    fn test_amplitude_damping_closed_form() {
        let gamma = 2.0;
        let time = 1.0;
        // a0 = ρ00, b0 = ρ01
        let rho0 = array![[c(0.25, 0.0), c(0.1, 0.2)], [c(0.1, -0.2), c(0.75, 0.0)]];
        let problem = LindbladProblem::new(config(1000, time), batch_of(&[rho0.clone()]))
            .unwrap()
            .with_lindblad_data(StaticLindbladData::new(LindbladTerms::new(
                array![gamma],
                vec![sigma_minus()],
            )));

        let rho = evolve_lindblad_discrete(&problem, None).unwrap().final_densities;
        let decay = (-gamma * time).exp();
        let coherence = (-gamma * time / 2.0).exp();
        assert_relative_eq!(rho[[0, 1, 1]].re, 0.75 * decay, epsilon = 1e-6);
        assert_relative_eq!(rho[[0, 0, 0]].re, 1.0 - 0.75 * decay, epsilon = 1e-6);
        assert_relative_eq!((rho[[0, 0, 1]] - rho0[[0, 1]] * coherence).norm(), 0.0, epsilon = 1e-6);
        assert_relative_eq!((rho[[0, 1, 0]] - rho0[[1, 0]] * coherence).norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_t1_t2_coherence_decay() {
        let (t1, t2, time) = (2.0, 1.5, 1.0);
        let ops = CollapseOperator::from_t1_t2(t1, t2, "q0").unwrap();
        let problem = LindbladProblem::new(config(500, time), batch_of(&[superposition_state()]))
            .unwrap()
            .with_lindblad_data(StaticLindbladData::from_collapse_ops(&ops));

        let rho = evolve_lindblad_discrete(&problem, None).unwrap().final_densities;
        assert_relative_eq!(rho[[0, 0, 1]].norm(), 0.5 * (-time / t2).exp(), epsilon = 1e-6);
        assert_relative_eq!(rho[[0, 1, 1]].re, 0.5 * (-time / t1).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_unitary_evolution_preserves_purity() {
        let h = pauli_x() * c(0.5 * PI, 0.0);
        let problem = LindbladProblem::new(config(200, 0.5), batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(StaticHamiltonian::new(h));
        let rho = evolve_lindblad_discrete(&problem, None).unwrap().final_densities;
        let final_rho = rho.index_axis(ndarray::Axis(0), 0).to_owned();
        assert_relative_eq!(purity(&final_rho), 1.0, epsilon = 1e-8);
        assert_relative_eq!(trace_real(&final_rho), 1.0, epsilon = 1e-10);
        // Rx(π/2)|0⟩ has equal populations
        assert_relative_eq!(state_fidelity(&final_rho, &ground_state()), 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_ground_state_is_steady_under_decay() {
        let problem = LindbladProblem::new(config(20, 5.0), batch_of(&[ground_state()]))
            .unwrap()
            .with_lindblad_data(StaticLindbladData::new(LindbladTerms::new(
                array![3.0],
                vec![sigma_minus()],
            )));
        let rho = evolve_lindblad_discrete(&problem, None).unwrap().final_densities;
        assert_batch_close(&rho, &batch_of(&[ground_state()]), 1e-14);
    }

    fn random_hermitian(rng: &mut StdRng, n: usize) -> Array2<Complex64> {
        let a = Array2::from_shape_fn((n, n), |_| c(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)));
        (&a + &a.t().mapv(|z| z.conj())) * c(0.5, 0.0)
    }

    fn random_density(rng: &mut StdRng, n: usize) -> Array2<Complex64> {
        let a = Array2::from_shape_fn((n, n), |_| c(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)));
        let rho = a.dot(&a.t().mapv(|z| z.conj()));
        let tr = trace(&rho);
        rho.mapv(|z| z / tr)
    }

    #[test]
    fn test_random_problems_match_exact_propagation() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for n in 2..=10 {
            let h = random_hermitian(&mut rng, n);
            let operator_count = rng.gen_range(1..=3);
            let rates: Array1<f64> = (0..operator_count).map(|_| rng.gen_range(0.0..1.0)).collect();
            let operators = (0..operator_count)
                .map(|_| {
                    Array2::from_shape_fn((n, n), |_| {
                        c(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5))
                    })
                })
                .collect();
            let terms = LindbladTerms::new(rates, operators);
            let densities = batch_of(&[random_density(&mut rng, n), random_density(&mut rng, n)]);

            let problem = LindbladProblem::new(config(2_000, 1.0), densities.clone())
                .unwrap()
                .with_hamiltonian(StaticHamiltonian::new(h.clone()))
                .with_lindblad_data(StaticLindbladData::new(terms.clone()));

            let rk4 = evolve_lindblad_discrete(&problem, None).unwrap().final_densities;
            let exact = exact_evolution(&densities, Some(&h), Some(&terms), 1.0).unwrap();
            assert_batch_close(&rk4, &exact, 1e-6);
        }
    }

    #[test]
    fn test_system_step_multiplier_refines_grid() {
        let h = pauli_x() * c(0.3, 0.0);
        let coarse = LindbladProblem::new(config(100, 1.0), batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(StaticHamiltonian::new(h.clone()));
        let mut fine_config = config(25, 1.0);
        fine_config.system_step_multiplier = 4;
        let fine = LindbladProblem::new(fine_config, batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(StaticHamiltonian::new(h));

        assert_relative_eq!(fine.state().dt, coarse.state().dt);
        let a = evolve_lindblad_discrete(&coarse, None).unwrap().final_densities;
        let b = evolve_lindblad_discrete(&fine, None).unwrap().final_densities;
        assert_batch_close(&a, &b, 1e-12);
    }

    #[test]
    fn test_constant_controls_match_static_hamiltonian() {
        let steps = 50;
        let controls = Array2::from_elem((steps, 1), c(0.8, 0.0));
        let controlled = LindbladProblem::new(config(steps, 1.0), batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(ControlledHamiltonian::new(Array2::zeros((2, 2)), vec![pauli_x()]));
        let fixed = LindbladProblem::new(config(steps, 1.0), batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(StaticHamiltonian::new(pauli_x() * c(0.8, 0.0)));

        let a = evolve_lindblad_discrete(&controlled, Some(&controls)).unwrap();
        let b = evolve_lindblad_discrete(&fixed, None).unwrap();
        assert_batch_close(&a.final_densities, &b.final_densities, 1e-13);
    }

    #[test]
    fn test_single_control_step_brackets_first_row() {
        let controls = array![[c(0.4, 0.0)]];
        let problem = LindbladProblem::new(config(1, 0.5), batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(ControlledHamiltonian::new(Array2::zeros((2, 2)), vec![pauli_x()]));
        assert_eq!(bracket(0, true, 1), (0, 0));
        assert!(evolve_lindblad_discrete(&problem, Some(&controls)).is_ok());
    }

    #[test]
    fn test_bracketing_rows() {
        assert_eq!(bracket(0, false, 5), (0, 1));
        assert_eq!(bracket(3, false, 5), (3, 4));
        assert_eq!(bracket(4, true, 5), (3, 4));
    }

    #[test]
    fn test_terminal_cost_evaluated_once() {
        let targets = batch_of(&[excited_state()]);
        let problem = LindbladProblem::new(config(10, 1.0), batch_of(&[ground_state()]))
            .unwrap()
            .with_cost(TargetDensityInfidelity::new(targets));
        let result = evolve_lindblad_discrete(&problem, None).unwrap();
        assert_relative_eq!(result.total_error, 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_trajectory_has_every_step() {
        let problem = LindbladProblem::new(config(7, 1.0), batch_of(&[ground_state()])).unwrap();
        let result = evolve_with_trajectory(&problem, None).unwrap();
        assert_eq!(result.trajectory.map(|t| t.len()), Some(8));
        assert!(evolve_lindblad_discrete(&problem, None).unwrap().trajectory.is_none());
    }

    #[test]
    fn test_cubic_interpolation_fails_lazily() {
        let mut cfg = config(4, 1.0);
        cfg.interpolation_policy = InterpolationPolicy::Cubic;
        let problem = LindbladProblem::new(cfg, batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(ControlledHamiltonian::new(Array2::zeros((2, 2)), vec![pauli_x()]));

        let controls = Array2::zeros((4, 1));
        let err = evolve_lindblad_discrete(&problem, Some(&controls)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_cubic_without_controls_is_fine() {
        let mut cfg = config(4, 1.0);
        cfg.interpolation_policy = InterpolationPolicy::Cubic;
        let problem = LindbladProblem::new(cfg, batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(StaticHamiltonian::new(pauli_x()));
        assert!(evolve_lindblad_discrete(&problem, None).is_ok());
    }

    #[test]
    fn test_gpu_policy_fails_at_first_step() {
        let mut cfg = config(4, 1.0);
        cfg.operation_policy = OperationPolicy::Gpu;
        let problem = LindbladProblem::new(cfg, batch_of(&[ground_state()])).unwrap();
        assert!(matches!(
            evolve_lindblad_discrete(&problem, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_sparse_policy_matches_dense() {
        let build = |policy| {
            let mut cfg = config(40, 1.0);
            cfg.operation_policy = policy;
            LindbladProblem::new(cfg, batch_of(&[superposition_state()]))
                .unwrap()
                .with_hamiltonian(StaticHamiltonian::new(pauli_x()))
                .with_lindblad_data(StaticLindbladData::new(LindbladTerms::new(
                    array![0.5],
                    vec![sigma_minus()],
                )))
        };
        let dense = evolve_lindblad_discrete(&build(OperationPolicy::Cpu), None).unwrap();
        let sparse = evolve_lindblad_discrete(&build(OperationPolicy::CpuSparse), None).unwrap();
        assert_batch_close(&dense.final_densities, &sparse.final_densities, 1e-13);
    }

    #[test]
    fn test_control_row_count_is_checked() {
        let problem = LindbladProblem::new(config(4, 1.0), batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(ControlledHamiltonian::new(Array2::zeros((2, 2)), vec![pauli_x()]));
        let controls = Array2::zeros((3, 1));
        assert!(matches!(
            evolve_lindblad_discrete(&problem, Some(&controls)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_time_dependent_dissipation_is_queried() {
        // γ(t) = 2t integrates to ∫γ = T² over [0, T].
        let data = |t: f64| LindbladTerms::new(array![2.0 * t], vec![sigma_minus()]);
        let problem = LindbladProblem::new(config(200, 1.0), batch_of(&[excited_state()]))
            .unwrap()
            .with_lindblad_data(data);
        let rho = evolve_lindblad_discrete(&problem, None).unwrap().final_densities;
        assert_relative_eq!(rho[[0, 1, 1]].re, (-1.0f64).exp(), epsilon = 1e-8);
    }

    #[derive(Debug, Clone)]
    struct RampHamiltonian;

    impl Hamiltonian for RampHamiltonian {
        /// H(t) = t·σz/2
        fn evaluate(
            &self,
            _controls: Option<ArrayView1<'_, Complex64>>,
            time: f64,
        ) -> Result<Array2<Complex64>> {
            Ok(pauli_z() * c(0.5 * time, 0.0))
        }

        fn control_gradient(
            &self,
            _controls: Option<ArrayView1<'_, Complex64>>,
            _time: f64,
            _cotangent: &Array2<Complex64>,
        ) -> Option<Array1<Complex64>> {
            None
        }
    }

    #[test]
    fn test_time_dependent_hamiltonian_is_queried_at_stage_times() {
        // ρ01 picks up the phase e^{-i∫t dt} = e^{-iT²/2}.
        let time = 2.0;
        let problem = LindbladProblem::new(config(400, time), batch_of(&[superposition_state()]))
            .unwrap()
            .with_hamiltonian(RampHamiltonian);
        let rho = evolve_lindblad_discrete(&problem, None).unwrap().final_densities;

        let expected = Complex64::from_polar(0.5, -0.5 * time * time);
        assert_relative_eq!((rho[[0, 0, 1]] - expected).norm(), 0.0, epsilon = 1e-8);
        assert_relative_eq!((rho[[0, 1, 0]] - expected.conj()).norm(), 0.0, epsilon = 1e-8);
        assert_relative_eq!(rho[[0, 0, 0]].re, 0.5, epsilon = 1e-12);
    }

    /// Records every evaluation; a step cost returns its step index and a
    /// terminal cost returns a fixed value.
    struct RecordingCost {
        kind: CostKind,
        calls: Rc<RefCell<Vec<usize>>>,
    }

    const TERMINAL_VALUE: f64 = 1000.0;

    impl Cost for RecordingCost {
        fn name(&self) -> &str {
            "recording"
        }

        fn kind(&self) -> CostKind {
            self.kind
        }

        fn cost(
            &self,
            _controls: Option<&ControlArray>,
            _densities: &DensityBatch,
            system_step: usize,
        ) -> Result<f64> {
            self.calls.borrow_mut().push(system_step);
            Ok(match self.kind {
                CostKind::Step => system_step as f64,
                CostKind::Terminal => TERMINAL_VALUE,
            })
        }

        fn gradient(
            &self,
            _controls: Option<&ControlArray>,
            _densities: &DensityBatch,
            _system_step: usize,
        ) -> Result<CostGradient> {
            Ok(CostGradient::default())
        }
    }

    #[test]
    fn test_step_costs_run_every_step_and_terminal_costs_once() {
        let step_calls = Rc::new(RefCell::new(Vec::new()));
        let terminal_calls = Rc::new(RefCell::new(Vec::new()));

        let mut cfg = config(5, 1.0);
        cfg.system_step_multiplier = 3;
        let problem = LindbladProblem::new(cfg, batch_of(&[ground_state()]))
            .unwrap()
            .with_hamiltonian(StaticHamiltonian::new(pauli_x()))
            .with_cost(RecordingCost {
                kind: CostKind::Step,
                calls: Rc::clone(&step_calls),
            })
            .with_cost(RecordingCost {
                kind: CostKind::Terminal,
                calls: Rc::clone(&terminal_calls),
            });
        let final_system_step = problem.state().final_system_step;
        assert_eq!(final_system_step, 14);

        let result = evolve_lindblad_discrete(&problem, None).unwrap();

        let expected_steps: Vec<usize> = (0..=final_system_step).collect();
        assert_eq!(*step_calls.borrow(), expected_steps);
        assert_eq!(*terminal_calls.borrow(), vec![final_system_step]);

        let step_sum: f64 = expected_steps.iter().map(|&s| s as f64).sum();
        assert_relative_eq!(result.total_error, step_sum + TERMINAL_VALUE);
    }

    #[test]
    fn test_initial_densities_are_validated() {
        let bad = Array3::<Complex64>::zeros((1, 2, 3));
        assert!(LindbladProblem::new(config(1, 1.0), bad).is_err());
    }
}
