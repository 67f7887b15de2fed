// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cost functions for the Lindblad evolution driver.
//!
//! A cost is evaluated either after every integration step
//! ([`CostKind::Step`]) or once on the final densities
//! ([`CostKind::Terminal`]). On the final step the driver evaluates every
//! cost, so a step cost sees `final_system_step + 1` evaluations in total.
//!
//! Gradients are cotangents in the convention `X̄ = ∂f/∂Re X + i·∂f/∂Im X`.

use ndarray::{Array2, Axis};
use num_complex::Complex64;

use crate::error::{Result, ValidationError};
use crate::lindblad::generator::inner_product;
use crate::lindblad::types::{ControlArray, DensityBatch};

/// When a cost is evaluated by the evolution driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostKind {
    /// After every integration step.
    Step,
    /// Only on the final densities.
    Terminal,
}

/// Cotangents of one cost evaluation.
#[derive(Debug, Clone, Default)]
pub struct CostGradient {
    /// With respect to the densities the cost was evaluated on.
    pub densities: Option<DensityBatch>,
    /// With respect to the full structured control array.
    pub controls: Option<ControlArray>,
}

/// An additive, differentiable contribution to the total error.
pub trait Cost {
    fn name(&self) -> &str;

    fn kind(&self) -> CostKind;

    /// Evaluate the cost on the densities produced by `system_step`.
    fn cost(
        &self,
        controls: Option<&ControlArray>,
        densities: &DensityBatch,
        system_step: usize,
    ) -> Result<f64>;

    /// Cotangents of [`Cost::cost`] at the same arguments.
    fn gradient(
        &self,
        controls: Option<&ControlArray>,
        densities: &DensityBatch,
        system_step: usize,
    ) -> Result<CostGradient>;
}

fn check_batch(what: &str, expected: &[usize], densities: &DensityBatch) -> Result<()> {
    if densities.shape() != expected {
        return Err(ValidationError::shape(what, expected, densities.shape()).into());
    }
    Ok(())
}

/// `1 − (1/D) Σ_i |Tr(T_i† ρ_i) / H|²` on the final densities.
#[derive(Debug, Clone)]
pub struct TargetDensityInfidelity {
    targets: DensityBatch,
    cost_multiplier: f64,
}

impl TargetDensityInfidelity {
    pub fn new(targets: DensityBatch) -> Self {
        Self {
            targets,
            cost_multiplier: 1.0,
        }
    }

    pub fn with_multiplier(mut self, cost_multiplier: f64) -> Self {
        self.cost_multiplier = cost_multiplier;
        self
    }

    fn overlaps(&self, densities: &DensityBatch) -> Result<Vec<Complex64>> {
        check_batch("target densities", self.targets.shape(), densities)?;
        Ok(self
            .targets
            .outer_iter()
            .zip(densities.outer_iter())
            .map(|(t, rho)| inner_product(&t, &rho))
            .collect())
    }
}

impl Cost for TargetDensityInfidelity {
    fn name(&self) -> &str {
        "target_density_infidelity"
    }

    fn kind(&self) -> CostKind {
        CostKind::Terminal
    }

    fn cost(
        &self,
        _controls: Option<&ControlArray>,
        densities: &DensityBatch,
        _system_step: usize,
    ) -> Result<f64> {
        let overlaps = self.overlaps(densities)?;
        let h = densities.shape()[1] as f64;
        let d = overlaps.len() as f64;
        let fidelity: f64 = overlaps.iter().map(|z| z.norm_sqr() / (h * h)).sum::<f64>() / d;
        Ok(self.cost_multiplier * (1.0 - fidelity))
    }

    fn gradient(
        &self,
        _controls: Option<&ControlArray>,
        densities: &DensityBatch,
        _system_step: usize,
    ) -> Result<CostGradient> {
        let overlaps = self.overlaps(densities)?;
        let h = densities.shape()[1] as f64;
        let d = overlaps.len() as f64;
        let scale = -2.0 * self.cost_multiplier / (d * h * h);

        let mut grad = DensityBatch::zeros(densities.raw_dim());
        for ((mut g, t), z) in grad
            .outer_iter_mut()
            .zip(self.targets.outer_iter())
            .zip(overlaps)
        {
            g.scaled_add(z * scale, &t);
        }
        Ok(CostGradient {
            densities: Some(grad),
            controls: None,
        })
    }
}

/// Penalise population of forbidden densities at every integration step.
///
/// Per density i the cost is the mean of `|Tr(F† ρ_i) / H|²` over its
/// forbidden set, summed over i and normalised by `D × system_eval_count`.
#[derive(Debug, Clone)]
pub struct ForbidDensities {
    forbidden: Vec<Vec<Array2<Complex64>>>,
    system_eval_count: usize,
    cost_multiplier: f64,
}

impl ForbidDensities {
    /// `forbidden[i]` lists the densities forbidden for the i-th evolving density.
    ///
    /// `system_eval_count` is the number of times the driver evaluates the
    /// cost, `control_step_count × system_step_multiplier`.
    pub fn new(forbidden: Vec<Vec<Array2<Complex64>>>, system_eval_count: usize) -> Self {
        Self {
            forbidden,
            system_eval_count: system_eval_count.max(1),
            cost_multiplier: 1.0,
        }
    }

    pub fn with_multiplier(mut self, cost_multiplier: f64) -> Self {
        self.cost_multiplier = cost_multiplier;
        self
    }

    fn check(&self, densities: &DensityBatch) -> Result<()> {
        if self.forbidden.len() != densities.shape()[0] {
            return Err(ValidationError::shape(
                "forbidden density sets",
                densities.shape()[0],
                self.forbidden.len(),
            )
            .into());
        }
        let n = densities.shape()[1];
        for f in self.forbidden.iter().flatten() {
            if f.dim() != (n, n) {
                return Err(ValidationError::shape("forbidden density", (n, n), f.dim()).into());
            }
        }
        Ok(())
    }

    fn normalizer(&self, densities: &DensityBatch) -> f64 {
        let h = densities.shape()[1] as f64;
        (densities.shape()[0] * self.system_eval_count) as f64 * h * h
    }
}

impl Cost for ForbidDensities {
    fn name(&self) -> &str {
        "forbid_densities"
    }

    fn kind(&self) -> CostKind {
        CostKind::Step
    }

    fn cost(
        &self,
        _controls: Option<&ControlArray>,
        densities: &DensityBatch,
        _system_step: usize,
    ) -> Result<f64> {
        self.check(densities)?;
        let mut total = 0.0;
        for (set, rho) in self.forbidden.iter().zip(densities.outer_iter()) {
            if set.is_empty() {
                continue;
            }
            let sum: f64 = set.iter().map(|f| inner_product(f, &rho).norm_sqr()).sum();
            total += sum / set.len() as f64;
        }
        Ok(self.cost_multiplier * total / self.normalizer(densities))
    }

    fn gradient(
        &self,
        _controls: Option<&ControlArray>,
        densities: &DensityBatch,
        _system_step: usize,
    ) -> Result<CostGradient> {
        self.check(densities)?;
        let norm = self.normalizer(densities);
        let mut grad = DensityBatch::zeros(densities.raw_dim());
        for ((mut g, set), rho) in grad
            .outer_iter_mut()
            .zip(self.forbidden.iter())
            .zip(densities.outer_iter())
        {
            if set.is_empty() {
                continue;
            }
            let scale = 2.0 * self.cost_multiplier / (norm * set.len() as f64);
            for f in set {
                g.scaled_add(inner_product(f, &rho) * scale, f);
            }
        }
        Ok(CostGradient {
            densities: Some(grad),
            controls: None,
        })
    }
}

/// Penalise control amplitude: `Σ |c_ij / max_j|² / (steps × count)`.
#[derive(Debug, Clone)]
pub struct ControlNorm {
    max_control_norms: Vec<f64>,
    cost_multiplier: f64,
}

impl ControlNorm {
    pub fn new(max_control_norms: Vec<f64>) -> Self {
        Self {
            max_control_norms,
            cost_multiplier: 1.0,
        }
    }

    pub fn with_multiplier(mut self, cost_multiplier: f64) -> Self {
        self.cost_multiplier = cost_multiplier;
        self
    }

    fn check<'a>(&self, controls: Option<&'a ControlArray>) -> Result<Option<&'a ControlArray>> {
        if let Some(c) = controls {
            if c.ncols() != self.max_control_norms.len() {
                return Err(ValidationError::shape(
                    "control norm bounds",
                    c.ncols(),
                    self.max_control_norms.len(),
                )
                .into());
            }
        }
        Ok(controls)
    }
}

impl Cost for ControlNorm {
    fn name(&self) -> &str {
        "control_norm"
    }

    fn kind(&self) -> CostKind {
        CostKind::Terminal
    }

    fn cost(
        &self,
        controls: Option<&ControlArray>,
        _densities: &DensityBatch,
        _system_step: usize,
    ) -> Result<f64> {
        let Some(controls) = self.check(controls)? else {
            return Ok(0.0);
        };
        let mut total = 0.0;
        for (column, &max) in controls.axis_iter(Axis(1)).zip(&self.max_control_norms) {
            total += column.iter().map(|c| c.norm_sqr()).sum::<f64>() / (max * max);
        }
        Ok(self.cost_multiplier * total / controls.len().max(1) as f64)
    }

    fn gradient(
        &self,
        controls: Option<&ControlArray>,
        _densities: &DensityBatch,
        _system_step: usize,
    ) -> Result<CostGradient> {
        let Some(controls) = self.check(controls)? else {
            return Ok(CostGradient::default());
        };
        let norm = controls.len().max(1) as f64;
        let mut grad = controls.clone();
        for (mut column, &max) in grad.axis_iter_mut(Axis(1)).zip(&self.max_control_norms) {
            let scale = 2.0 * self.cost_multiplier / (max * max * norm);
            column.mapv_inplace(|c| c * scale);
        }
        Ok(CostGradient {
            densities: None,
            controls: Some(grad),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        batch_of, c, density_from_state, excited_state, ground_state, superposition_state,
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    /// Directional derivative of `f` at `x` along `dx`, central differences.
    fn directional<F: Fn(&DensityBatch) -> f64>(f: F, x: &DensityBatch, dx: &DensityBatch) -> f64 {
        let eps = 1e-6;
        let plus = x + &(dx * c(eps, 0.0));
        let minus = x - &(dx * c(eps, 0.0));
        (f(&plus) - f(&minus)) / (2.0 * eps)
    }

    fn batch_inner(a: &DensityBatch, b: &DensityBatch) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x.conj() * y).re).sum()
    }

    fn perturbation() -> DensityBatch {
        array![
            [[c(0.1, 0.3), c(-0.2, 0.5)], [c(0.7, -0.1), c(0.0, 0.2)]],
            [[c(-0.4, 0.0), c(0.3, 0.3)], [c(0.1, 0.9), c(0.6, -0.5)]]
        ]
    }

    #[test]
    fn test_infidelity_is_normalised_by_hilbert_size() {
        let targets = batch_of(&[ground_state(), excited_state()]);
        let cost = TargetDensityInfidelity::new(targets.clone());
        // |Tr(ρ†ρ)/H|² = 1/4 for pure qubit states
        let value = cost.cost(None, &targets, 0).unwrap();
        assert_relative_eq!(value, 0.75, epsilon = 1e-14);
    }

    #[test]
    fn test_infidelity_mixed_batch() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let psi = array![c(0.0, s), c(s, 0.0)];
        let rho = batch_of(&[ground_state(), density_from_state(&psi)]);
        let target0 = density_from_state(&array![c(0.0, 1.0), c(0.0, 0.0)]);
        let cost = TargetDensityInfidelity::new(batch_of(&[target0, ground_state()]));
        let value = cost.cost(None, &rho, 0).unwrap();
        assert_relative_eq!(value, 1.0 - 5.0 / 32.0, epsilon = 1e-14);
    }

    #[test]
    fn test_infidelity_orthogonal_is_one() {
        let cost = TargetDensityInfidelity::new(batch_of(&[ground_state()])).with_multiplier(2.0);
        let value = cost.cost(None, &batch_of(&[excited_state()]), 0).unwrap();
        assert_relative_eq!(value, 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_infidelity_gradient() {
        let cost = TargetDensityInfidelity::new(batch_of(&[ground_state(), superposition_state()]))
            .with_multiplier(1.5);
        let rho = batch_of(&[superposition_state(), excited_state()]);
        let dx = perturbation();
        let grad = cost.gradient(None, &rho, 0).unwrap().densities.unwrap();
        let fd = directional(|x| cost.cost(None, x, 0).unwrap(), &rho, &dx);
        assert_relative_eq!(batch_inner(&grad, &dx), fd, epsilon = 1e-8);
    }

    #[test]
    fn test_infidelity_shape_mismatch() {
        let cost = TargetDensityInfidelity::new(batch_of(&[ground_state()]));
        let rho = batch_of(&[ground_state(), ground_state()]);
        assert!(cost.cost(None, &rho, 0).is_err());
    }

    #[test]
    fn test_forbid_densities_value() {
        let cost = ForbidDensities::new(vec![vec![excited_state()], vec![]], 4);
        let rho = batch_of(&[excited_state(), excited_state()]);
        // (|1/2|² + 0) / (2 · 4)
        let value = cost.cost(None, &rho, 0).unwrap();
        assert_relative_eq!(value, 0.25 / 8.0, epsilon = 1e-14);
        assert_eq!(cost.kind(), CostKind::Step);
    }

    #[test]
    fn test_forbid_densities_gradient() {
        let cost = ForbidDensities::new(
            vec![vec![excited_state(), superposition_state()], vec![ground_state()]],
            3,
        )
        .with_multiplier(0.5);
        let rho = batch_of(&[superposition_state(), excited_state()]);
        let dx = perturbation();
        let grad = cost.gradient(None, &rho, 1).unwrap().densities.unwrap();
        let fd = directional(|x| cost.cost(None, x, 1).unwrap(), &rho, &dx);
        assert_relative_eq!(batch_inner(&grad, &dx), fd, epsilon = 1e-8);
    }

    #[test]
    fn test_control_norm_value_and_gradient() {
        let cost = ControlNorm::new(vec![1.0, 2.0]);
        let controls = array![[c(0.5, 0.0), c(1.0, 1.0)], [c(0.0, -1.0), c(2.0, 0.0)]];
        let rho = batch_of(&[ground_state()]);
        // (0.25 + 2/4 + 1 + 4/4) / 4
        let value = cost.cost(Some(&controls), &rho, 0).unwrap();
        assert_relative_eq!(value, 2.75 / 4.0, epsilon = 1e-14);

        let grad = cost.gradient(Some(&controls), &rho, 0).unwrap().controls.unwrap();
        // d/dRe + i d/dIm of |c|²/(max² · 4) = 2c/(max² · 4)
        assert_relative_eq!(grad[[0, 1]].re, 2.0 / 16.0, epsilon = 1e-14);
        assert_relative_eq!(grad[[0, 1]].im, 2.0 / 16.0, epsilon = 1e-14);
        assert_relative_eq!(grad[[1, 0]].im, -0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_control_norm_without_controls() {
        let cost = ControlNorm::new(vec![1.0]);
        let rho = batch_of(&[ground_state()]);
        assert_eq!(cost.cost(None, &rho, 0).unwrap(), 0.0);
        assert!(cost.gradient(None, &rho, 0).unwrap().controls.is_none());
    }
}
