// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gradient providers for the optimization driver.
//!
//! A [`Differentiator`] returns the forward evaluation together with the
//! gradient of the total error in the raw convention `∂u/∂x − i·∂u/∂y`
//! for every control `x + iy`.

use num_complex::Complex64;

use crate::error::Result;
use crate::lindblad::adjoint::evolve_lindblad_adjoint;
use crate::lindblad::integrate::{evolve_lindblad_discrete, LindbladProblem};
use crate::lindblad::types::{ControlArray, EvolveResult};

/// Forward evaluation plus gradient with respect to the structured controls.
pub trait Differentiator {
    fn value_and_gradient(
        &self,
        problem: &LindbladProblem,
        controls: &ControlArray,
    ) -> Result<(EvolveResult, ControlArray)>;
}

/// Reverse-mode gradient through the RK4 evolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjointDifferentiator;

impl Differentiator for AdjointDifferentiator {
    fn value_and_gradient(
        &self,
        problem: &LindbladProblem,
        controls: &ControlArray,
    ) -> Result<(EvolveResult, ControlArray)> {
        let (result, gradient) = evolve_lindblad_adjoint(problem, Some(controls))?;
        let gradient = gradient.unwrap_or_else(|| ControlArray::zeros(controls.raw_dim()));
        Ok((result, gradient))
    }
}

/// Central finite differences over every real and imaginary component.
///
/// Costs `4 × control_step_count × control_count + 1` evolutions.
#[derive(Debug, Clone, Copy)]
pub struct FiniteDifference {
    pub epsilon: f64,
}

impl Default for FiniteDifference {
    fn default() -> Self {
        Self { epsilon: 1e-6 }
    }
}

impl Differentiator for FiniteDifference {
    fn value_and_gradient(
        &self,
        problem: &LindbladProblem,
        controls: &ControlArray,
    ) -> Result<(EvolveResult, ControlArray)> {
        let forward = evolve_lindblad_discrete(problem, Some(controls))?;
        let eps = self.epsilon;
        let mut probe = controls.clone();
        let mut gradient = ControlArray::zeros(controls.raw_dim());

        for ((i, j), g) in gradient.indexed_iter_mut() {
            let x = controls[[i, j]];
            let mut partial = |delta: Complex64| -> Result<f64> {
                probe[[i, j]] = x + delta;
                let plus = evolve_lindblad_discrete(problem, Some(&probe))?.total_error;
                probe[[i, j]] = x - delta;
                let minus = evolve_lindblad_discrete(problem, Some(&probe))?.total_error;
                probe[[i, j]] = x;
                Ok((plus - minus) / (2.0 * eps))
            };
            let d_re = partial(Complex64::new(eps, 0.0))?;
            let d_im = partial(Complex64::new(0.0, eps))?;
            *g = Complex64::new(d_re, -d_im);
        }
        Ok((forward, gradient))
    }
}
