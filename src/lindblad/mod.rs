// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindblad master equation evolution with reverse-mode gradients.
//!
//! Implements the Gorini–Kossakowski–Sudarshan–Lindblad (GKSL) master equation
//! for a batch of density matrices:
//!
//!   dρ/dt = -i[H(t), ρ] + Σ_k γ_k (L_k ρ L_k† − ½{L_k†L_k, ρ})
//!
//! This module provides:
//! - Physical collapse operators for T1 (amplitude damping) and T2 (dephasing)
//! - Hamiltonians built from a drift plus linearly interpolated controls
//! - A fixed-step RK4 integrator on a grid of control and system steps
//! - The exact adjoint of that integrator for control gradients
//! - Exact superoperator evolution for cross-checking
//!
//! # Example
//!
//! ```ignore
//! use lindblad_grape::lindblad::{
//!     evolve_lindblad_discrete, CollapseOperator, EvolutionConfig,
//!     LindbladProblem, StaticHamiltonian, StaticLindbladData,
//! };
//!
//! let ops = CollapseOperator::from_t1_t2(50.0, 30.0, "q0")?;
//! let problem = LindbladProblem::new(EvolutionConfig::new(100, 20.0), initial)?
//!     .with_hamiltonian(StaticHamiltonian::new(h))
//!     .with_lindblad_data(StaticLindbladData::from_collapse_ops(&ops));
//!
//! let result = evolve_lindblad_discrete(&problem, None)?;
//! ```
//!
//! # References
//!
//! - Lindblad, G. (1976). Commun. Math. Phys. 48, 119.
//!   DOI: 10.1007/BF01608499
//! - Gorini, V., Kossakowski, A., & Sudarshan, E. C. G. (1976). J. Math. Phys. 17, 821.
//!   DOI: 10.1063/1.522979
//! - Breuer, H.-P. & Petruccione, F. (2002). "The Theory of Open Quantum Systems." Oxford.

pub mod adjoint;
pub mod expm;
pub mod generator;
pub mod hamiltonian;
pub mod integrate;
pub mod interpolate;
pub mod superoperator;
pub mod types;

pub use adjoint::evolve_lindblad_adjoint;
pub use generator::{lindbladian, Generator};
pub use hamiltonian::{
    ControlledHamiltonian, Hamiltonian, LindbladData, StaticHamiltonian, StaticLindbladData,
};
pub use integrate::{
    evolve_lindblad_discrete, evolve_with_trajectory, purity, rk4_step, state_fidelity,
    trace_real, LindbladProblem,
};
pub use superoperator::{exact_evolution, liouvillian_superoperator};
pub use types::{
    CollapseOperator, ControlArray, DensityBatch, EvolutionConfig, EvolveResult,
    InterpolationPolicy, LindbladTerms, OperationPolicy, ProgramState,
};
