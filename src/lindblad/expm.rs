// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Matrix exponential by scaling-and-squaring with a Padé(13) approximant.
//!
//! Used to propagate the Liouvillian superoperator exactly, which gives an
//! integrator-independent reference for the RK4 solver.
//!
//! Ref: Higham (2005), "The Scaling and Squaring Method for the Matrix
//! Exponential Revisited", SIAM J. Matrix Anal. Appl. 26(4), 1179.

use ndarray::{Array2, Zip};
use num_complex::Complex64;

use crate::error::{Result, ValidationError};

/// Padé(13) numerator coefficients b_0..b_13 (Higham 2005, Table 10.4).
const PADE13: [f64; 14] = [
    64_764_752_532_480_000.0,
    32_382_376_266_240_000.0,
    7_771_770_303_897_600.0,
    1_187_353_796_428_800.0,
    129_060_195_264_000.0,
    10_559_470_521_600.0,
    670_442_572_800.0,
    33_522_128_640.0,
    1_323_241_920.0,
    40_840_800.0,
    960_960.0,
    16_380.0,
    182.0,
    1.0,
];

/// Largest 1-norm for which Padé(13) is accurate to double precision.
const THETA_13: f64 = 5.371_920_351_148_152;

/// exp(A) for a square complex matrix.
///
/// # Errors
/// `ValidationError::ShapeMismatch` when `a` is not square, and
/// `ValidationError::PhysicsConstraint` when the Padé denominator is singular.
pub fn matrix_exp(a: &Array2<Complex64>) -> Result<Array2<Complex64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(ValidationError::shape("matrix_exp input", (n, n), a.dim()).into());
    }
    match n {
        0 => return Ok(Array2::zeros((0, 0))),
        1 => return Ok(Array2::from_elem((1, 1), a[[0, 0]].exp())),
        _ => {}
    }

    let norm = one_norm(a);
    let squarings = if norm > THETA_13 {
        (norm / THETA_13).log2().ceil() as i32
    } else {
        0
    };
    let scaled = a.mapv(|z| z / 2f64.powi(squarings));

    let mut result = pade13(&scaled)?;
    for _ in 0..squarings {
        result = result.dot(&result);
    }
    Ok(result)
}

fn pade13(a: &Array2<Complex64>) -> Result<Array2<Complex64>> {
    let n = a.nrows();
    let b = |k: usize| Complex64::new(PADE13[k], 0.0);
    let eye = Array2::from_diag_elem(n, Complex64::new(1.0, 0.0));
    let a2 = a.dot(a);
    let a4 = a2.dot(&a2);
    let a6 = a4.dot(&a2);

    let mut u_inner = &a6 * b(13) + &a4 * b(11) + &a2 * b(9);
    u_inner = a6.dot(&u_inner) + &a6 * b(7) + &a4 * b(5) + &a2 * b(3) + &eye * b(1);
    let u = a.dot(&u_inner);

    let v_inner = &a6 * b(12) + &a4 * b(10) + &a2 * b(8);
    let v = a6.dot(&v_inner) + &a6 * b(6) + &a4 * b(4) + &a2 * b(2) + &eye * b(0);

    // (V - U) X = (V + U)
    solve(&v - &u, &v + &u)
}

/// Solve A X = B by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<Complex64>, mut b: Array2<Complex64>) -> Result<Array2<Complex64>> {
    let n = a.nrows();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[[i, col]].norm().total_cmp(&a[[j, col]].norm()))
            .unwrap_or(col);
        if a[[pivot_row, col]].norm() < f64::EPSILON {
            return Err(ValidationError::PhysicsConstraint(
                "Padé denominator is singular".into(),
            )
            .into());
        }
        if pivot_row != col {
            for mat in [&mut a, &mut b] {
                for k in 0..mat.ncols() {
                    mat.swap([col, k], [pivot_row, k]);
                }
            }
        }

        let pivot = a[[col, col]];
        for row in (col + 1)..n {
            let factor = a[[row, col]] / pivot;
            if factor.norm_sqr() == 0.0 {
                continue;
            }
            let (a_col, b_col) = (a.row(col).to_owned(), b.row(col).to_owned());
            a.row_mut(row).scaled_add(-factor, &a_col);
            b.row_mut(row).scaled_add(-factor, &b_col);
        }
    }

    let mut x = Array2::<Complex64>::zeros(b.raw_dim());
    for row in (0..n).rev() {
        let mut rhs = b.row(row).to_owned();
        for k in (row + 1)..n {
            rhs.scaled_add(-a[[row, k]], &x.row(k));
        }
        let pivot = a[[row, row]];
        x.row_mut(row).assign(&rhs.mapv(|z| z / pivot));
    }
    Ok(x)
}

/// Maximum absolute column sum.
fn one_norm(a: &Array2<Complex64>) -> f64 {
    a.columns()
        .into_iter()
        .map(|col| {
            let mut sum = 0.0;
            Zip::from(&col).for_each(|z| sum += z.norm());
            sum
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{identity, pauli_x};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn assert_close(a: &Array2<Complex64>, b: &Array2<Complex64>, tol: f64) {
        assert_eq!(a.shape(), b.shape());
        for ((idx, x), y) in a.indexed_iter().zip(b.iter()) {
            assert!((x - y).norm() < tol, "{:?}: {} vs {}", idx, x, y);
        }
    }

    #[test]
    fn test_zero_gives_identity() {
        let z = Array2::<Complex64>::zeros((3, 3));
        assert_close(&matrix_exp(&z).unwrap(), &identity(3), 1e-14);
    }

    #[test]
    fn test_diagonal() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = Complex64::new(-0.5, 0.0);
        a[[1, 1]] = Complex64::new(1.5, 0.25);
        let e = matrix_exp(&a).unwrap();
        assert_relative_eq!((e[[0, 0]] - Complex64::new(-0.5, 0.0).exp()).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!((e[[1, 1]] - Complex64::new(1.5, 0.25).exp()).norm(), 0.0, epsilon = 1e-12);
        assert!(e[[0, 1]].norm() < 1e-14);
    }

    #[test]
    fn test_x_rotation() {
        // exp(-iπ/2 σx) = -iσx
        let a = pauli_x() * Complex64::new(0.0, -PI / 2.0);
        let expected = pauli_x() * Complex64::new(0.0, -1.0);
        assert_close(&matrix_exp(&a).unwrap(), &expected, 1e-12);
    }

    #[test]
    fn test_large_norm_is_scaled() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = Complex64::new(40.0, 0.0);
        a[[1, 1]] = Complex64::new(-40.0, 0.0);
        let e = matrix_exp(&a).unwrap();
        assert_relative_eq!(e[[0, 0]].re, 40f64.exp(), max_relative = 1e-10);
        assert!(e[[1, 1]].re.abs() < 1e-15);
    }

    #[test]
    fn test_scalar_and_empty() {
        let a = Array2::from_elem((1, 1), Complex64::new(1.0, 1.0));
        let e = matrix_exp(&a).unwrap();
        assert_relative_eq!((e[[0, 0]] - Complex64::new(1.0, 1.0).exp()).norm(), 0.0, epsilon = 1e-14);
        assert_eq!(matrix_exp(&Array2::zeros((0, 0))).unwrap().len(), 0);
    }

    #[test]
    fn test_non_square_is_rejected() {
        assert!(matrix_exp(&Array2::zeros((2, 3))).is_err());
    }
}
