// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Time-dependent Hamiltonian and dissipation data sources.
//!
//! The integrator never builds operators itself; it queries a
//! [`Hamiltonian`] with the resolved controls at each RK4 stage time and a
//! [`LindbladData`] source with the stage time alone.

use std::borrow::Cow;

use ndarray::{Array1, Array2, ArrayView1};
use num_complex::Complex64;

use super::generator::inner_product;
use super::types::{CollapseOperator, LindbladTerms};
use crate::error::{Error, Result, ValidationError};

/// A Hamiltonian H(c, t).
///
/// Cotangents follow the convention `X̄ = ∂f/∂Re X + i·∂f/∂Im X` for a real
/// scalar f, so that `δf = Re Tr(X̄† δX)`.
pub trait Hamiltonian {
    /// Evaluate H at the given controls and time.
    ///
    /// `controls` is `None` when the problem carries no control array.
    fn evaluate(&self, controls: Option<ArrayView1<'_, Complex64>>, time: f64)
        -> Result<Array2<Complex64>>;

    /// Pull a cotangent of H back onto the control vector.
    ///
    /// Returns `None` when H does not depend on the controls.
    fn control_gradient(
        &self,
        controls: Option<ArrayView1<'_, Complex64>>,
        time: f64,
        cotangent: &Array2<Complex64>,
    ) -> Option<Array1<Complex64>>;
}

/// A Hamiltonian that ignores controls and time.
#[derive(Debug, Clone)]
pub struct StaticHamiltonian {
    pub matrix: Array2<Complex64>,
}

impl StaticHamiltonian {
    pub fn new(matrix: Array2<Complex64>) -> Self {
        Self { matrix }
    }
}

impl Hamiltonian for StaticHamiltonian {
    fn evaluate(
        &self,
        _controls: Option<ArrayView1<'_, Complex64>>,
        _time: f64,
    ) -> Result<Array2<Complex64>> {
        Ok(self.matrix.clone())
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

/// H(c) = H_drift + Σ_j c_j H_j, optionally completed with Σ_j conj(c_j) H_j†.
///
/// The completion keeps H Hermitian for complex controls driving a
/// non-Hermitian operator (e.g. c·σ⁻ + c*·σ⁺).
#[derive(Debug, Clone)]
pub struct ControlledHamiltonian {
    pub drift: Array2<Complex64>,
    pub operators: Vec<Array2<Complex64>>,
    pub hermitian_completion: bool,
}

impl ControlledHamiltonian {
    pub fn new(drift: Array2<Complex64>, operators: Vec<Array2<Complex64>>) -> Self {
        Self {
            drift,
            operators,
            hermitian_completion: false,
        }
    }

    /// Enable the conj(c_j) H_j† completion.
    pub fn with_hermitian_completion(mut self) -> Self {
        self.hermitian_completion = true;
        self
    }

    pub fn control_count(&self) -> usize {
        self.operators.len()
    }

    fn check_controls(&self, controls: ArrayView1<'_, Complex64>) -> Result<()> {
        if controls.len() != self.operators.len() {
            return Err(ValidationError::shape(
                "hamiltonian controls",
                self.operators.len(),
                controls.len(),
            )
            .into());
        }
        Ok(())
    }
}

impl Hamiltonian for ControlledHamiltonian {
    fn evaluate(
        &self,
        controls: Option<ArrayView1<'_, Complex64>>,
        _time: f64,
    ) -> Result<Array2<Complex64>> {
        let controls = controls.ok_or_else(|| {
            Error::Config("controlled Hamiltonian evaluated without a control array".into())
        })?;
        self.check_controls(controls)?;

        let mut h = self.drift.clone();
        for (op, &c) in self.operators.iter().zip(controls.iter()) {
            h.scaled_add(c, op);
            if self.hermitian_completion {
                h.scaled_add(c.conj(), &op.t().mapv(|z| z.conj()));
            }
        }
        Ok(h)
    }

    fn control_gradient(
        &self,
        controls: Option<ArrayView1<'_, Complex64>>,
        _time: f64,
        cotangent: &Array2<Complex64>,
    ) -> Option<Array1<Complex64>> {
        controls?;
        let grad = self
            .operators
            .iter()
            .map(|op| {
                // δH = δc·H_j (+ δc*·H_j†)  ⇒  c̄ = conj(⟨H̄, H_j⟩) (+ ⟨H̄, H_j†⟩)
                let mut g = inner_product(cotangent, op).conj();
                if self.hermitian_completion {
                    g += inner_product(cotangent, &op.t().mapv(|z| z.conj()));
                }
                g
            })
            .collect();
        Some(grad)
    }
}

/// A source of dissipation data (rates and Lindblad operators) over time.
pub trait LindbladData {
    fn terms(&self, time: f64) -> Cow<'_, LindbladTerms>;
}

impl<F> LindbladData for F
where
    F: Fn(f64) -> LindbladTerms,
{
    fn terms(&self, time: f64) -> Cow<'_, LindbladTerms> {
        Cow::Owned(self(time))
    }
}

/// Time-independent dissipation data.
#[derive(Debug, Clone)]
pub struct StaticLindbladData {
    terms: LindbladTerms,
}

impl StaticLindbladData {
    pub fn new(terms: LindbladTerms) -> Self {
        Self { terms }
    }

    pub fn from_collapse_ops(ops: &[CollapseOperator]) -> Self {
        Self::new(LindbladTerms::from_collapse_ops(ops))
    }
}

impl LindbladData for StaticLindbladData {
    fn terms(&self, _time: f64) -> Cow<'_, LindbladTerms> {
        Cow::Borrowed(&self.terms)
    }
}
