// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test fixtures: Pauli operators, standard qubit states, batch helpers.

use ndarray::{array, Array1, Array2, Array3, Axis};
use num_complex::Complex64;

use crate::lindblad::types::DensityBatch;

pub fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

pub fn identity(n: usize) -> Array2<Complex64> {
    Array2::from_diag_elem(n, c(1.0, 0.0))
}

pub fn pauli_x() -> Array2<Complex64> {
    array![[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]]
}

pub fn pauli_y() -> Array2<Complex64> {
    array![[c(0.0, 0.0), c(0.0, -1.0)], [c(0.0, 1.0), c(0.0, 0.0)]]
}

pub fn pauli_z() -> Array2<Complex64> {
    array![[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-1.0, 0.0)]]
}

/// σ⁻ = |0⟩⟨1|
pub fn sigma_minus() -> Array2<Complex64> {
    array![[c(0.0, 0.0), c(1.0, 0.0)], [c(0.0, 0.0), c(0.0, 0.0)]]
}

/// ½(XX + YY), the generator of iSWAP at t = π/2.
pub fn xx_plus_yy() -> Array2<Complex64> {
    let xx = ndarray::linalg::kron(&pauli_x(), &pauli_x());
    let yy = ndarray::linalg::kron(&pauli_y(), &pauli_y());
    (xx + yy) * c(0.5, 0.0)
}

/// iSWAP in the computational basis |00⟩, |01⟩, |10⟩, |11⟩.
pub fn iswap() -> Array2<Complex64> {
    let mut m = Array2::zeros((4, 4));
    m[[0, 0]] = c(1.0, 0.0);
    m[[1, 2]] = c(0.0, -1.0);
    m[[2, 1]] = c(0.0, -1.0);
    m[[3, 3]] = c(1.0, 0.0);
    m
}

/// |ψ⟩⟨ψ|
pub fn density_from_state(psi: &Array1<Complex64>) -> Array2<Complex64> {
    let n = psi.len();
    Array2::from_shape_fn((n, n), |(i, j)| psi[i] * psi[j].conj())
}

/// |0⟩⟨0|
pub fn ground_state() -> Array2<Complex64> {
    density_from_state(&array![c(1.0, 0.0), c(0.0, 0.0)])
}

/// |1⟩⟨1|
pub fn excited_state() -> Array2<Complex64> {
    density_from_state(&array![c(0.0, 0.0), c(1.0, 0.0)])
}

/// |+⟩⟨+|
pub fn superposition_state() -> Array2<Complex64> {
    let s = std::f64::consts::FRAC_1_SQRT_2;
    density_from_state(&array![c(s, 0.0), c(s, 0.0)])
}

/// Stack square matrices into a density batch.
pub fn batch_of(densities: &[Array2<Complex64>]) -> DensityBatch {
    let n = densities.first().map(|d| d.nrows()).unwrap_or(0);
    let mut batch = Array3::zeros((densities.len(), n, n));
    for (mut slot, d) in batch.outer_iter_mut().zip(densities.iter()) {
        slot.assign(d);
    }
    batch
}

/// Batch of |j⟩⟨j| for each column j of `columns`.
pub fn column_densities(columns: &Array2<Complex64>) -> DensityBatch {
    let states: Vec<_> = columns
        .axis_iter(Axis(1))
        .map(|col| density_from_state(&col.to_owned()))
        .collect();
    batch_of(&states)
}

/// Element-wise absolute comparison of two batches.
pub fn assert_batch_close(actual: &DensityBatch, expected: &DensityBatch, tol: f64) {
    assert_eq!(actual.shape(), expected.shape(), "batch shapes differ");
    for ((idx, a), b) in actual.indexed_iter().zip(expected.iter()) {
        assert!(
            (a - b).norm() <= tol,
            "element {:?}: {} vs {} (tol {})",
            idx,
            a,
            b,
            tol
        );
    }
}
