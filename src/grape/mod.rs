// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! GRAPE optimization of open-system control pulses.
//!
//! The driver treats the Lindblad evolution as a black-box objective: an
//! [`Optimizer`] proposes flat real parameters, the driver reshapes them into
//! structured controls, clips them to their bounds, evolves the problem and
//! returns the adjoint gradient in the optimizer's convention.
//!
//! # Architecture
//!
//! - [`controls`]: flat ↔ structured conversion, norm clipping, initial guesses
//! - [`differentiate`]: adjoint and finite-difference gradients
//! - [`optimizer`]: the [`Optimizer`] seam and [`Adam`]
//! - [`report`]: progress logging and JSON-lines checkpoints
//! - [`GrapeLindbladOptimizer::optimize`]: the full loop
//!
//! # References
//!
//! - Khaneja et al. (2005), "Optimal control of coupled spin dynamics",
//!   J. Magn. Reson. 172, 296. doi:10.1016/j.jmr.2004.11.004
//! - Kingma & Ba (2015), "Adam: A Method for Stochastic Optimization".
//!   arXiv:1412.6980

pub mod controls;
pub mod differentiate;
pub mod optimize;
pub mod optimizer;
pub mod report;
pub mod types;

pub use controls::{clip_control_norms, initialize_controls, slap_controls, strip_controls};
pub use differentiate::{AdjointDifferentiator, Differentiator, FiniteDifference};
pub use optimize::GrapeLindbladOptimizer;
pub use optimizer::{Adam, Objective, Optimizer};
pub use report::{CheckpointReporter, NullReporter, Progress, ProgressReporter, RunSummary};
pub use types::{GrapeConfig, OptimizationResult};
