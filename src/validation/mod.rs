// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input validation for densities and control arrays.

use crate::error::{Result, ValidationError};
use crate::lindblad::types::{ControlArray, DensityBatch};

/// Validate an initial density batch: non-empty, square, finite.
///
/// Hermiticity, positivity and unit trace are not enforced.
pub fn validate_densities(densities: &DensityBatch) -> Result<()> {
    let shape = densities.shape();
    if shape[0] == 0 {
        return Err(ValidationError::Field {
            field: "densities".into(),
            message: "batch cannot be empty".into(),
        }
        .into());
    }

    if shape[1] != shape[2] || shape[1] == 0 {
        return Err(ValidationError::shape(
            "densities",
            (shape[0], shape[1], shape[1]),
            (shape[0], shape[1], shape[2]),
        )
        .into());
    }

    if let Some(((i, j, k), val)) = densities
        .indexed_iter()
        .find(|(_, z)| !(z.re.is_finite() && z.im.is_finite()))
    {
        return Err(ValidationError::Field {
            field: "densities".into(),
            message: format!("non-finite value {} at index ({}, {}, {})", val, i, j, k),
        }
        .into());
    }

    Ok(())
}

/// Validate a structured control array against the expected grid and
/// optional per-channel magnitude bounds.
pub fn validate_controls(
    controls: &ControlArray,
    control_step_count: usize,
    control_count: usize,
    max_control_norms: Option<&[f64]>,
) -> Result<()> {
    if controls.dim() != (control_step_count, control_count) {
        return Err(ValidationError::shape(
            "controls",
            (control_step_count, control_count),
            controls.dim(),
        )
        .into());
    }

    for ((step, channel), val) in controls.indexed_iter() {
        if !(val.re.is_finite() && val.im.is_finite()) {
            return Err(ValidationError::Field {
                field: "controls".into(),
                message: format!("contains {} at ({}, {})", val, step, channel),
            }
            .into());
        }
        if let Some(bounds) = max_control_norms {
            if val.norm() > bounds[channel] {
                return Err(ValidationError::Field {
                    field: "controls".into(),
                    message: format!(
                        "magnitude {} at ({}, {}) exceeds max {}",
                        val.norm(),
                        step,
                        channel,
                        bounds[channel]
                    ),
                }
                .into());
            }
        }
    }

    Ok(())
}

/// Validate per-channel control bounds: one positive finite bound per channel.
pub fn validate_control_norms(max_control_norms: &[f64], control_count: usize) -> Result<()> {
    if max_control_norms.len() != control_count {
        return Err(ValidationError::shape(
            "max_control_norms",
            control_count,
            max_control_norms.len(),
        )
        .into());
    }
    if let Some((i, bound)) = max_control_norms
        .iter()
        .enumerate()
        .find(|(_, b)| !(b.is_finite() && **b > 0.0))
    {
        return Err(ValidationError::Field {
            field: "max_control_norms".into(),
            message: format!("bound {} for channel {} must be positive and finite", bound, i),
        }
        .into());
    }
    Ok(())
}
