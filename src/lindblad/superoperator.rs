// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Liouvillian superoperator and exact propagation for time-independent data.
//!
//! Densities are vectorised row-major, vec(ρ)[i·n + j] = ρ_ij, so that
//! vec(A ρ B) = (A ⊗ Bᵀ) vec(ρ). The Lindbladian then reads
//!
//!   𝓛 = −i(H ⊗ I − I ⊗ Hᵀ) + Σ_k γ_k (L_k ⊗ L_k* − ½ P_k ⊗ I − ½ I ⊗ P_kᵀ),
//!
//! with P_k = L_k†L_k, and ρ(t) = exp(𝓛t) ρ(0).

use ndarray::linalg::kron;
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::expm::matrix_exp;
use super::generator::conjugate_transpose;
use super::types::{DensityBatch, LindbladTerms};
use crate::error::{Result, ValidationError};

/// Build the n² × n² Liouvillian of a time-independent problem.
pub fn liouvillian_superoperator(
    hilbert_size: usize,
    hamiltonian: Option<&Array2<Complex64>>,
    terms: Option<&LindbladTerms>,
) -> Result<Array2<Complex64>> {
    let n = hilbert_size;
    let eye = Array2::from_diag_elem(n, Complex64::new(1.0, 0.0));
    let mut super_op = Array2::<Complex64>::zeros((n * n, n * n));

    if let Some(h) = hamiltonian {
        if h.dim() != (n, n) {
            return Err(ValidationError::shape("hamiltonian", (n, n), h.dim()).into());
        }
        let commutator = kron(h, &eye) - kron(&eye, &h.t());
        super_op.scaled_add(Complex64::new(0.0, -1.0), &commutator);
    }

    if let Some(terms) = terms {
        terms.check_shapes(n)?;
        for (&rate, l) in terms.rates.iter().zip(terms.operators.iter()) {
            let product = conjugate_transpose(l).dot(l);
            let jump = kron(l, &l.mapv(|z| z.conj()));
            let anticommutator = kron(&product, &eye) + kron(&eye, &product.t());
            super_op.scaled_add(Complex64::new(rate, 0.0), &jump);
            super_op.scaled_add(Complex64::new(-0.5 * rate, 0.0), &anticommutator);
        }
    }

    Ok(super_op)
}

/// Propagate every density in the batch by exp(𝓛·time).
pub fn exact_evolution(
    densities: &DensityBatch,
    hamiltonian: Option<&Array2<Complex64>>,
    terms: Option<&LindbladTerms>,
    time: f64,
) -> Result<DensityBatch> {
    let n = densities.shape()[1];
    let super_op = liouvillian_superoperator(n, hamiltonian, terms)?;
    let propagator = matrix_exp(&super_op.mapv(|z| z * time))?;

    let mut out = DensityBatch::zeros(densities.raw_dim());
    for (mut slot, rho) in out.outer_iter_mut().zip(densities.outer_iter()) {
        let vec: Array1<Complex64> = rho.iter().copied().collect();
        let evolved = propagator.dot(&vec);
        for (dst, src) in slot.iter_mut().zip(evolved.iter()) {
            *dst = *src;
        }
    }
    Ok(out)
}
