// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reverse-mode gradient of the total error with respect to the controls.
//!
//! The forward pass keeps the batch entering every integration step. The
//! reverse pass walks the steps backwards, seeding density cotangents from
//! each cost's gradient and pulling them through the four RK4 stages with
//! the adjoint Lindbladian. Hamiltonian cotangents of every stage are mapped
//! to control cotangents through [`Hamiltonian::control_gradient`] and then
//! through the linear interpolation onto the two bracketing control rows.
//!
//! Cotangents use `X̄ = ∂f/∂Re X + i·∂f/∂Im X`. The returned gradient is in
//! the raw convention `∂f/∂Re c − i·∂f/∂Im c`, i.e. the conjugate.

use ndarray::Array2;
use num_complex::Complex64;
use tracing::debug;

use super::generator::hamiltonian_cotangent;
use super::hamiltonian::Hamiltonian;
use super::integrate::{active_costs, evolve_with_trajectory, LindbladProblem, Stages};
use super::types::{ControlArray, DensityBatch, EvolveResult};
use crate::error::Result;

/// Evolve the problem and return the gradient of its total error with
/// respect to `controls` in the raw convention `∂u/∂x − i·∂u/∂y`.
///
/// The gradient is `None` when no controls are given.
pub fn evolve_lindblad_adjoint(
    problem: &LindbladProblem,
    controls: Option<&ControlArray>,
) -> Result<(EvolveResult, Option<ControlArray>)> {
    let mut forward = evolve_with_trajectory(problem, controls)?;
    let trajectory = forward.trajectory.take().unwrap_or_default();
    let state = problem.state();

    let mut rho_bar = DensityBatch::zeros(problem.initial_densities().raw_dim());
    let mut control_bar = controls.map(|c| ControlArray::zeros(c.raw_dim()));

    for system_step in (0..=state.final_system_step).rev() {
        let control_step = system_step / state.system_step_multiplier;
        let is_final_control_step = control_step == state.final_control_step;
        let is_final_system_step = system_step == state.final_system_step;
        let time = system_step as f64 * state.dt;

        let output = &trajectory[system_step + 1];
        for cost in active_costs(problem, is_final_system_step) {
            let grad = cost.gradient(controls, output, system_step)?;
            if let Some(d) = grad.densities {
                rho_bar += &d;
            }
            if let (Some(acc), Some(c)) = (control_bar.as_mut(), grad.controls) {
                *acc += &c;
            }
        }

        let stages = Stages::resolve(problem, controls, control_step, time, is_final_control_step)?;
        rho_bar = rk4_step_adjoint(
            problem.hamiltonian(),
            &stages,
            &trajectory[system_step],
            &rho_bar,
            control_bar.as_mut(),
        );
    }

    debug!(total_error = forward.total_error, "adjoint pass complete");
    let gradient = control_bar.map(|g| g.mapv(|z| z.conj()));
    Ok((forward, gradient))
}

/// Pull the cotangent of one RK4 step's output back to its input.
///
/// Control cotangents are accumulated into `control_bar` when both a
/// Hamiltonian and a control array are present.
pub(crate) fn rk4_step_adjoint(
    hamiltonian: Option<&dyn Hamiltonian>,
    stages: &Stages,
    densities: &DensityBatch,
    output_bar: &DensityBatch,
    control_bar: Option<&mut ControlArray>,
) -> DensityBatch {
    let (inputs, _) = stages.increments(densities);
    let dt = Complex64::new(stages.dt, 0.0);
    let half = Complex64::new(0.5, 0.0);

    // ρ' = ρ + k1/6 + k2/3 + k3/3 + k4/6
    let sixth = output_bar * Complex64::new(1.0 / 6.0, 0.0);
    let third = output_bar * Complex64::new(1.0 / 3.0, 0.0);
    let mut k_bar = [sixth.clone(), third.clone(), third, sixth];
    let mut rho_bar = output_bar.clone();

    let track_controls = hamiltonian.is_some() && control_bar.is_some();
    let mut h_bar: [Array2<Complex64>; 4] = std::array::from_fn(|_| Array2::zeros((0, 0)));

    // k_i = Δt·ℒ_i(X_i); X4 = ρ + k3, X3 = ρ + ½k2, X2 = ρ + ½k1, X1 = ρ
    for stage in (0..4).rev() {
        let x_bar = stages.generators[stage].apply_adjoint(&k_bar[stage]) * dt;
        if track_controls {
            h_bar[stage] = hamiltonian_cotangent(&inputs[stage], &k_bar[stage]) * dt;
        }
        rho_bar += &x_bar;
        match stage {
            3 => k_bar[2] += &x_bar,
            2 => k_bar[1] += &(&x_bar * half),
            1 => k_bar[0] += &(&x_bar * half),
            _ => {}
        }
    }

    if let (Some(h), Some(c_bar)) = (hamiltonian, control_bar) {
        let [h1, h2, h3, h4] = h_bar;
        let control = |stage: usize| stages.controls[stage].as_ref().map(|c| c.view());
        let (left, right) = stages.bracket;
        let alpha = stages.alpha;

        if let Some(g) = h.control_gradient(control(0), stages.times[0], &h1) {
            let mut row = c_bar.row_mut(left);
            row += &g;
        }
        // c2 = c3 = (1 − α)·left + α·right
        if let Some(g) = h.control_gradient(control(1), stages.times[1], &(h2 + h3)) {
            c_bar
                .row_mut(left)
                .scaled_add(Complex64::new(1.0 - alpha, 0.0), &g);
            c_bar.row_mut(right).scaled_add(Complex64::new(alpha, 0.0), &g);
        }
        if let Some(g) = h.control_gradient(control(3), stages.times[3], &h4) {
            let mut row = c_bar.row_mut(right);
            row += &g;
        }
    }

    rho_bar
}
