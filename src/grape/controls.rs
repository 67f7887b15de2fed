// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Control representations, magnitude limits and initial guesses.
//!
//! The optimizer works on a flat real vector; the physics works on a
//! `(control_step_count, control_count)` complex array. Real controls map
//! to their real parts in row-major order. Complex controls map to all real
//! parts followed by all imaginary parts.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::{Result, ValidationError};
use crate::lindblad::types::ControlArray;
use crate::validation::{validate_control_norms, validate_controls};

/// Golden ratio, used to space the phases of generated controls.
const PHI: f64 = 1.618_033_988_749_895;

/// Structured controls to the optimizer's flat representation.
pub fn strip_controls(complex_controls: bool, controls: &ControlArray) -> Array1<f64> {
    let real = controls.iter().map(|c| c.re);
    if complex_controls {
        real.chain(controls.iter().map(|c| c.im)).collect()
    } else {
        real.collect()
    }
}

/// Flat optimizer parameters back to structured controls of `shape`.
///
/// # Errors
/// `ValidationError::ShapeMismatch` when the parameter count does not fit `shape`.
pub fn slap_controls(
    complex_controls: bool,
    params: &Array1<f64>,
    shape: (usize, usize),
) -> Result<ControlArray> {
    let size = shape.0 * shape.1;
    let expected = if complex_controls { 2 * size } else { size };
    if params.len() != expected {
        return Err(ValidationError::shape("optimizer parameters", expected, params.len()).into());
    }

    let controls = if complex_controls {
        Array2::from_shape_fn(shape, |(i, j)| {
            let k = i * shape.1 + j;
            Complex64::new(params[k], params[size + k])
        })
    } else {
        Array2::from_shape_fn(shape, |(i, j)| Complex64::new(params[i * shape.1 + j], 0.0))
    };
    Ok(controls)
}

/// Rescale, in place, every control whose magnitude exceeds its channel's
/// bound down to the bound, keeping its phase.
pub fn clip_control_norms(controls: &mut ControlArray, max_control_norms: &[f64]) {
    for mut row in controls.rows_mut() {
        for (c, &max) in row.iter_mut().zip(max_control_norms) {
            let norm = c.norm();
            if norm > max {
                let mut clipped = *c * (max / norm);
                // rescaling can land one ulp above the bound
                while clipped.norm() > max {
                    clipped *= 1.0 - f64::EPSILON;
                }
                *c = clipped;
            }
        }
    }
}

/// Initial controls and the per-channel bounds used for the run.
///
/// Bounds default to 1.0 per channel. Supplied controls are checked for
/// shape; otherwise a deterministic sinusoid at half of each channel's
/// bound is generated (a quadrature pair for complex controls).
pub fn initialize_controls(
    complex_controls: bool,
    control_count: usize,
    control_step_count: usize,
    initial_controls: Option<&ControlArray>,
    max_control_norms: Option<&[f64]>,
) -> Result<(ControlArray, Vec<f64>)> {
    let bounds = match max_control_norms {
        Some(bounds) => bounds.to_vec(),
        None => vec![1.0; control_count],
    };
    validate_control_norms(&bounds, control_count)?;

    if let Some(initial) = initial_controls {
        validate_controls(initial, control_step_count, control_count, None)?;
        let mut controls = initial.clone();
        if !complex_controls {
            controls.mapv_inplace(|c| Complex64::new(c.re, 0.0));
        }
        return Ok((controls, bounds));
    }

    let controls = Array2::from_shape_fn((control_step_count, control_count), |(k, j)| {
        let amplitude = 0.5 * bounds[j];
        let phase = k as f64 * PHI * (1.0 + 0.3 * j as f64);
        if complex_controls {
            let a = amplitude * std::f64::consts::FRAC_1_SQRT_2;
            Complex64::new(a * phase.sin(), a * (1.3 * phase).cos())
        } else {
            Complex64::new(amplitude * (phase + PHI).sin(), 0.0)
        }
    });
    Ok((controls, bounds))
}
