// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Control interpolation between discrete control steps.

use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;

use super::types::InterpolationPolicy;
use crate::error::{Error, Result};

/// Straight-line interpolation of two control sets.
///
/// Returns `left` when `t_left == t_right`.
pub fn interpolate_linear(
    t_left: f64,
    t_right: f64,
    t: f64,
    left: ArrayView1<'_, Complex64>,
    right: ArrayView1<'_, Complex64>,
) -> Array1<Complex64> {
    let span = t_right - t_left;
    if span == 0.0 {
        return left.to_owned();
    }
    let alpha = Complex64::new((t - t_left) / span, 0.0);
    let mut out = left.to_owned();
    // left + α (right - left)
    out.scaled_add(alpha, &(&right - &left));
    out
}

/// Resolve the controls at `t` under `policy`.
///
/// # Errors
/// `Error::Config` for policies the discrete solver does not implement.
pub fn interpolate(
    policy: InterpolationPolicy,
    t_left: f64,
    t_right: f64,
    t: f64,
    left: ArrayView1<'_, Complex64>,
    right: ArrayView1<'_, Complex64>,
) -> Result<Array1<Complex64>> {
    match policy {
        InterpolationPolicy::Linear => Ok(interpolate_linear(t_left, t_right, t, left, right)),
        InterpolationPolicy::Cubic => Err(Error::Config(
            "interpolation policy Cubic is not supported by the discrete Lindblad solver".into(),
        )),
    }
}
