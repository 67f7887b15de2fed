// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindblad master equation types.
//!
//! Ref: Lindblad (1976), Commun. Math. Phys. 48, 119.
//! Ref: Gorini, Kossakowski, Sudarshan (1976), J. Math. Phys. 17, 821.

use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ValidationError};

/// A batch of density matrices, shape `(density_count, hilbert_size, hilbert_size)`.
pub type DensityBatch = Array3<Complex64>;

/// Structured (physics-format) controls, shape `(control_step_count, control_count)`.
///
/// Real controls are stored with zero imaginary part.
pub type ControlArray = Array2<Complex64>;

/// How controls are resolved between two discrete control steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationPolicy {
    /// Straight line between the bracketing control sets.
    #[default]
    Linear,
    /// Cubic spline. Not supported by the discrete Lindblad solver.
    Cubic,
}

/// Numeric backend used by the Lindbladian generator.
///
/// All supported policies are numerically equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPolicy {
    /// Dense matrix products.
    #[default]
    Cpu,
    /// Operators reduced to their non-zero entries before each product.
    CpuSparse,
    /// GPU kernels. Not available in this build.
    Gpu,
}

/// Settings shared by every evolution of one problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of discrete control sets spread over the evolution time.
    #[serde(default = "default_control_step_count")]
    pub control_step_count: usize,
    /// Total evolution time.
    #[serde(default = "default_evolution_time")]
    pub evolution_time: f64,
    /// Integration steps per control step.
    #[serde(default = "default_system_step_multiplier")]
    pub system_step_multiplier: usize,
    /// Control interpolation between control steps.
    #[serde(default)]
    pub interpolation_policy: InterpolationPolicy,
    /// Numeric backend.
    #[serde(default)]
    pub operation_policy: OperationPolicy,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            control_step_count: default_control_step_count(),
            evolution_time: default_evolution_time(),
            system_step_multiplier: default_system_step_multiplier(),
            interpolation_policy: InterpolationPolicy::default(),
            operation_policy: OperationPolicy::default(),
        }
    }
}

fn default_control_step_count() -> usize {
    100
}

fn default_evolution_time() -> f64 {
    1.0
}

fn default_system_step_multiplier() -> usize {
    1
}

impl EvolutionConfig {
    /// Create a configuration with the default policies.
    pub fn new(control_step_count: usize, evolution_time: f64) -> Self {
        Self {
            control_step_count,
            evolution_time,
            ..Self::default()
        }
    }

    /// Validate configuration.
    ///
    /// Policy support is not checked here; unsupported policies fail at
    /// first use.
    pub fn validate(&self) -> Result<()> {
        if self.control_step_count == 0 {
            return Err(ValidationError::Field {
                field: "control_step_count".into(),
                message: "must be > 0".into(),
            }
            .into());
        }
        if !(self.evolution_time.is_finite() && self.evolution_time > 0.0) {
            return Err(ValidationError::Field {
                field: "evolution_time".into(),
                message: format!("must be a positive finite number, got {}", self.evolution_time),
            }
            .into());
        }
        if self.system_step_multiplier == 0 {
            return Err(ValidationError::Field {
                field: "system_step_multiplier".into(),
                message: "must be >= 1".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// Immutable quantities derived once from an [`EvolutionConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramState {
    /// Integration time step.
    pub dt: f64,
    /// Index of the last control set.
    pub final_control_step: usize,
    /// Index of the last integration step.
    pub final_system_step: usize,
    pub system_step_multiplier: usize,
    pub control_step_count: usize,
    pub interpolation_policy: InterpolationPolicy,
    pub operation_policy: OperationPolicy,
}

impl ProgramState {
    /// Derive the program state, validating the configuration.
    pub fn new(config: &EvolutionConfig) -> Result<Self> {
        config.validate()?;
        let system_step_count = config.control_step_count * config.system_step_multiplier;
        Ok(Self {
            dt: config.evolution_time / system_step_count as f64,
            final_control_step: config.control_step_count - 1,
            final_system_step: system_step_count - 1,
            system_step_multiplier: config.system_step_multiplier,
            control_step_count: config.control_step_count,
            interpolation_policy: config.interpolation_policy,
            operation_policy: config.operation_policy,
        })
    }
}

/// Dissipation data at one instant: rates `g_k` and operators `L_k`.
#[derive(Debug, Clone)]
pub struct LindbladTerms {
    /// Non-negative dissipation rates, one per operator.
    pub rates: Array1<f64>,
    /// Lindblad operators (H × H each).
    pub operators: Vec<Array2<Complex64>>,
}

impl LindbladTerms {
    pub fn new(rates: Array1<f64>, operators: Vec<Array2<Complex64>>) -> Self {
        Self { rates, operators }
    }

    /// Terms built from collapse operators.
    pub fn from_collapse_ops(ops: &[CollapseOperator]) -> Self {
        Self {
            rates: ops.iter().map(|op| op.rate).collect(),
            operators: ops.iter().map(|op| op.matrix.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Check rate/operator counts and operator shapes against `hilbert_size`.
    pub fn check_shapes(&self, hilbert_size: usize) -> Result<()> {
        if self.rates.len() != self.operators.len() {
            return Err(ValidationError::shape(
                "lindblad rates",
                self.operators.len(),
                self.rates.len(),
            )
            .into());
        }
        for op in &self.operators {
            if op.dim() != (hilbert_size, hilbert_size) {
                return Err(ValidationError::shape(
                    "lindblad operator",
                    (hilbert_size, hilbert_size),
                    op.dim(),
                )
                .into());
            }
        }
        Ok(())
    }
}

/// A Lindblad collapse (jump) operator with its rate.
///
/// Represents a single dissipation channel:
///   D[L](ρ) = γ (L ρ L† − ½{L†L, ρ})
///
/// Rates are in inverse units of the evolution time.
#[derive(Debug, Clone)]
pub struct CollapseOperator {
    /// Operator matrix (d × d).
    pub matrix: Array2<Complex64>,
    /// Decay rate (= 1/T).
    pub rate: f64,
    /// Human-readable label (e.g., "T1_q0", "Tphi_q1").
    pub label: String,
}

impl CollapseOperator {
    /// Amplitude damping: L = σ⁻ = |0⟩⟨1|, γ = 1/T1.
    pub fn amplitude_damping(t1: f64, qubit_label: &str) -> Result<Self> {
        if t1 <= 0.0 {
            return Err(Error::Config(format!("T1 must be positive, got {t1}")));
        }
        let mut sigma_minus = Array2::zeros((2, 2));
        sigma_minus[[0, 1]] = Complex64::new(1.0, 0.0);

        Ok(Self {
            matrix: sigma_minus,
            rate: 1.0 / t1,
            label: format!("T1_{qubit_label}"),
        })
    }

    /// Pure dephasing: L = σz/√2, γ = 1/T_φ with 1/T_φ = 1/T2 − 1/(2·T1).
    ///
    /// With this normalisation coherences decay as exp(−t/T_φ).
    pub fn pure_dephasing(t1: f64, t2: f64, qubit_label: &str) -> Result<Self> {
        if t1 <= 0.0 {
            return Err(Error::Config(format!("T1 must be positive, got {t1}")));
        }
        if t2 <= 0.0 {
            return Err(Error::Config(format!("T2 must be positive, got {t2}")));
        }
        if t2 > 2.0 * t1 {
            return Err(ValidationError::PhysicsConstraint(format!(
                "T2 ({t2}) must be ≤ 2*T1 ({})",
                2.0 * t1
            ))
            .into());
        }

        let gamma_phi = (1.0 / t2 - 1.0 / (2.0 * t1)).max(0.0);
        let amp = std::f64::consts::FRAC_1_SQRT_2;
        let mut sigma_z = Array2::zeros((2, 2));
        sigma_z[[0, 0]] = Complex64::new(amp, 0.0);
        sigma_z[[1, 1]] = Complex64::new(-amp, 0.0);

        Ok(Self {
            matrix: sigma_z,
            rate: gamma_phi,
            label: format!("Tphi_{qubit_label}"),
        })
    }

    /// Both T1 and T_φ collapse operators for a single qubit.
    pub fn from_t1_t2(t1: f64, t2: f64, qubit_label: &str) -> Result<Vec<Self>> {
        let t1_op = Self::amplitude_damping(t1, qubit_label)?;
        let tphi_op = Self::pure_dephasing(t1, t2, qubit_label)?;
        Ok(vec![t1_op, tphi_op])
    }
}

/// Result of a forward evolution.
#[derive(Debug, Clone)]
pub struct EvolveResult {
    /// Densities after the final integration step.
    pub final_densities: DensityBatch,
    /// Sum of every evaluated cost.
    pub total_error: f64,
    /// Batch before every integration step plus the final batch, when requested.
    pub trajectory: Option<Vec<DensityBatch>>,
}
