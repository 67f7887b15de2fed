// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindblad master equation evolution and open-system GRAPE.
//!
//! This crate integrates batches of density matrices under the Lindblad
//! master equation with a fixed-step RK4 scheme, differentiates the result
//! with the exact discrete adjoint, and optimizes control pulses with GRAPE.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      GrapeLindbladOptimizer (grape)      │
//! ├──────────────────┬──────────────────────┤
//! │   Optimizer      │   Differentiator     │
//! │   (Adam)         │   (adjoint / FD)     │
//! ├──────────────────┴──────────────────────┤
//! │     Evolution driver + RK4 (lindblad)    │
//! ├────────────────┬────────────────────────┤
//! │ Hamiltonian    │  Generator (dense /    │
//! │ + interpolator │  sparse Lindbladian)   │
//! └────────────────┴────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`cost`]: Cost functions and their analytic gradients
//! - [`lindblad`]: Evolution, adjoint and reference propagation
//! - [`grape`]: Optimization driver
//! - [`validation`]: Input validation utilities
//! - [`error`]: Error types

pub mod config;
pub mod cost;
pub mod error;
pub mod grape;
pub mod lindblad;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
