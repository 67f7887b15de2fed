// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindbladian generator and its adjoint.
//!
//! Computes, for every density in a batch,
//!
//!   dρ/dt = -i[H, ρ] + Σ_k γ_k (L_k ρ L_k† − ½{L_k†L_k, ρ})
//!
//! and the transposed maps needed to back-propagate a cotangent through it.
//! With ⟨A, B⟩ = Re Tr(A†B):
//!
//!   ℒ†(Ȳ) = i[H†, Ȳ] + Σ_k γ_k (L_k† Ȳ L_k − ½{L_k†L_k, Ȳ})
//!   H̄     = i(Ȳ ρ† − ρ† Ȳ)
//!
//! Ref: Breuer & Petruccione, "The Theory of Open Quantum Systems" (2002), Ch. 3.

use ndarray::{Array2, ArrayBase, ArrayView2, Data, Ix2, Zip};
use num_complex::Complex64;

use super::types::{DensityBatch, LindbladTerms, OperationPolicy};
use crate::error::{Error, Result, ValidationError};

const I: Complex64 = Complex64::new(0.0, 1.0);

/// An operator prepared for repeated left/right products.
#[derive(Debug, Clone)]
enum Operand {
    Dense(Array2<Complex64>),
    Sparse {
        dim: usize,
        entries: Vec<(usize, usize, Complex64)>,
    },
}

impl Operand {
    fn new(matrix: Array2<Complex64>, policy: OperationPolicy) -> Self {
        match policy {
            OperationPolicy::CpuSparse => {
                let entries = matrix
                    .indexed_iter()
                    .filter(|(_, z)| z.norm_sqr() != 0.0)
                    .map(|((i, j), z)| (i, j, *z))
                    .collect();
                Operand::Sparse {
                    dim: matrix.nrows(),
                    entries,
                }
            }
            _ => Operand::Dense(matrix),
        }
    }

    /// A · X
    fn left(&self, x: ArrayView2<'_, Complex64>) -> Array2<Complex64> {
        match self {
            Operand::Dense(a) => a.dot(&x),
            Operand::Sparse { dim, entries } => {
                let mut out = Array2::zeros((*dim, x.ncols()));
                for &(i, j, a) in entries {
                    out.row_mut(i).scaled_add(a, &x.row(j));
                }
                out
            }
        }
    }

    /// X · A
    fn right(&self, x: ArrayView2<'_, Complex64>) -> Array2<Complex64> {
        match self {
            Operand::Dense(a) => x.dot(a),
            Operand::Sparse { dim, entries } => {
                let mut out = Array2::zeros((x.nrows(), *dim));
                for &(i, j, a) in entries {
                    out.column_mut(j).scaled_add(a, &x.column(i));
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Dissipator {
    rate: f64,
    op: Operand,
    op_dag: Operand,
    /// L†L
    product: Operand,
}

/// The Lindbladian at one instant, prepared for a given operation policy.
#[derive(Debug, Clone)]
pub struct Generator {
    hamiltonian: Option<Operand>,
    hamiltonian_dag: Option<Operand>,
    dissipators: Vec<Dissipator>,
}

impl Generator {
    /// Prepare the generator.
    ///
    /// # Errors
    /// - `Error::Config` for an operation policy this build cannot run.
    /// - `Error::Validation` when an operator is not `hilbert_size × hilbert_size`.
    pub fn new(
        hamiltonian: Option<&Array2<Complex64>>,
        terms: Option<&LindbladTerms>,
        hilbert_size: usize,
        policy: OperationPolicy,
    ) -> Result<Self> {
        if policy == OperationPolicy::Gpu {
            return Err(Error::Config(
                "operation policy Gpu is not available in this build".into(),
            ));
        }

        let (hamiltonian, hamiltonian_dag) = match hamiltonian {
            Some(h) => {
                if h.dim() != (hilbert_size, hilbert_size) {
                    return Err(ValidationError::shape(
                        "hamiltonian",
                        (hilbert_size, hilbert_size),
                        h.dim(),
                    )
                    .into());
                }
                (
                    Some(Operand::new(h.clone(), policy)),
                    Some(Operand::new(conjugate_transpose(h), policy)),
                )
            }
            None => (None, None),
        };

        let mut dissipators = Vec::new();
        if let Some(terms) = terms {
            terms.check_shapes(hilbert_size)?;
            for (&rate, l) in terms.rates.iter().zip(terms.operators.iter()) {
                if rate == 0.0 {
                    continue;
                }
                let l_dag = conjugate_transpose(l);
                let product = l_dag.dot(l);
                dissipators.push(Dissipator {
                    rate,
                    op: Operand::new(l.clone(), policy),
                    op_dag: Operand::new(l_dag, policy),
                    product: Operand::new(product, policy),
                });
            }
        }

        Ok(Self {
            hamiltonian,
            hamiltonian_dag,
            dissipators,
        })
    }

    /// Whether the generator is identically zero.
    pub fn is_zero(&self) -> bool {
        self.hamiltonian.is_none() && self.dissipators.is_empty()
    }

    /// dρ/dt for every density in the batch.
    pub fn apply(&self, densities: &DensityBatch) -> DensityBatch {
        let mut out = DensityBatch::zeros(densities.raw_dim());
        for (mut out_d, rho) in out.outer_iter_mut().zip(densities.outer_iter()) {
            if let Some(h) = &self.hamiltonian {
                // -i(Hρ - ρH)
                let commutator = h.left(rho) - h.right(rho);
                out_d.scaled_add(-I, &commutator);
            }
            for d in &self.dissipators {
                // γ (L ρ L† − ½ L†L ρ − ½ ρ L†L)
                let jump = d.op_dag.right(d.op.left(rho).view());
                let anticommutator = d.product.left(rho) + d.product.right(rho);
                out_d.scaled_add(Complex64::new(d.rate, 0.0), &jump);
                out_d.scaled_add(Complex64::new(-0.5 * d.rate, 0.0), &anticommutator);
            }
        }
        out
    }

    /// Transpose of [`Generator::apply`] with respect to ⟨A, B⟩ = Re Tr(A†B).
    pub fn apply_adjoint(&self, cotangent: &DensityBatch) -> DensityBatch {
        let mut out = DensityBatch::zeros(cotangent.raw_dim());
        for (mut out_d, y) in out.outer_iter_mut().zip(cotangent.outer_iter()) {
            if let Some(h_dag) = &self.hamiltonian_dag {
                // i(H†Ȳ - ȲH†)
                let commutator = h_dag.left(y) - h_dag.right(y);
                out_d.scaled_add(I, &commutator);
            }
            for d in &self.dissipators {
                // γ (L† Ȳ L − ½ L†L Ȳ − ½ Ȳ L†L)
                let jump = d.op.right(d.op_dag.left(y).view());
                let anticommutator = d.product.left(y) + d.product.right(y);
                out_d.scaled_add(Complex64::new(d.rate, 0.0), &jump);
                out_d.scaled_add(Complex64::new(-0.5 * d.rate, 0.0), &anticommutator);
            }
        }
        out
    }
}

/// Compute the Lindbladian of a density batch in one call.
pub fn lindbladian(
    densities: &DensityBatch,
    hamiltonian: Option<&Array2<Complex64>>,
    terms: Option<&LindbladTerms>,
    policy: OperationPolicy,
) -> Result<DensityBatch> {
    let generator = Generator::new(hamiltonian, terms, densities.shape()[1], policy)?;
    Ok(generator.apply(densities))
}

/// Cotangent of the Hamiltonian given the cotangent of dρ/dt, summed over the batch.
pub fn hamiltonian_cotangent(
    densities: &DensityBatch,
    cotangent: &DensityBatch,
) -> Array2<Complex64> {
    let n = densities.shape()[1];
    let mut h_bar = Array2::zeros((n, n));
    for (rho, y) in densities.outer_iter().zip(cotangent.outer_iter()) {
        let rho_dag = rho.t().mapv(|z| z.conj());
        let term = y.dot(&rho_dag) - rho_dag.dot(&y);
        h_bar.scaled_add(I, &term);
    }
    h_bar
}

/// Conjugate transpose (dagger) of a matrix.
pub fn conjugate_transpose<S>(m: &ArrayBase<S, Ix2>) -> Array2<Complex64>
where
    S: Data<Elem = Complex64>,
{
    m.t().mapv(|z| z.conj())
}

/// Tr(A†B) = Σ conj(a_ij) b_ij.
pub fn inner_product<S1, S2>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>) -> Complex64
where
    S1: Data<Elem = Complex64>,
    S2: Data<Elem = Complex64>,
{
    Zip::from(a)
        .and(b)
        .fold(Complex64::new(0.0, 0.0), |acc, x, y| acc + x.conj() * y)
}

/// Trace of a square matrix.
pub fn trace<S>(m: &ArrayBase<S, Ix2>) -> Complex64
where
    S: Data<Elem = Complex64>,
{
    m.diag().sum()
}
