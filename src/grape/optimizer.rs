// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gradient-based optimizers over flat real parameter vectors.
//!
//! Ref: Kingma & Ba (2015), "Adam: A Method for Stochastic Optimization",
//! ICLR. arXiv:1412.6980

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// A scalar function the optimizer minimizes.
///
/// Methods take `&mut self` so implementations can track state (best
/// result, iteration count, reporting) across calls.
pub trait Objective {
    fn value(&mut self, params: &Array1<f64>) -> Result<f64>;

    fn gradient(&mut self, params: &Array1<f64>) -> Result<Array1<f64>>;
}

/// Drives an [`Objective`] for a fixed number of iterations.
pub trait Optimizer {
    fn run(
        &mut self,
        objective: &mut dyn Objective,
        iteration_count: usize,
        initial_params: Array1<f64>,
    ) -> Result<Array1<f64>>;
}

/// Adam with bias-corrected moment estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_beta_1")]
    pub beta_1: f64,
    #[serde(default = "default_beta_2")]
    pub beta_2: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_beta_1() -> f64 {
    0.9
}

fn default_beta_2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

impl Default for Adam {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            beta_1: default_beta_1(),
            beta_2: default_beta_2(),
            epsilon: default_epsilon(),
        }
    }
}

impl Adam {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ValidationError::Field {
                field: "learning_rate".into(),
                message: format!("must be > 0, got {}", self.learning_rate),
            }
            .into());
        }
        for (field, beta) in [("beta_1", self.beta_1), ("beta_2", self.beta_2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(ValidationError::Field {
                    field: field.into(),
                    message: format!("must be in [0, 1), got {}", beta),
                }
                .into());
            }
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ValidationError::Field {
                field: "epsilon".into(),
                message: "must be > 0".into(),
            }
            .into());
        }
        Ok(())
    }
}

impl Optimizer for Adam {
    fn run(
        &mut self,
        objective: &mut dyn Objective,
        iteration_count: usize,
        initial_params: Array1<f64>,
    ) -> Result<Array1<f64>> {
        self.validate()?;
        let mut params = initial_params;
        let mut m = Array1::<f64>::zeros(params.len());
        let mut v = Array1::<f64>::zeros(params.len());

        for t in 1..=iteration_count {
            let grad = objective.gradient(&params)?;
            if grad.len() != params.len() {
                return Err(ValidationError::shape("gradient", params.len(), grad.len()).into());
            }

            m = &m * self.beta_1 + &grad * (1.0 - self.beta_1);
            v = &v * self.beta_2 + &grad.mapv(|g| g * g) * (1.0 - self.beta_2);
            let m_scale = 1.0 / (1.0 - self.beta_1.powi(t as i32));
            let v_scale = 1.0 / (1.0 - self.beta_2.powi(t as i32));

            ndarray::Zip::from(&mut params)
                .and(&m)
                .and(&v)
                .for_each(|p, &m_i, &v_i| {
                    let m_hat = m_i * m_scale;
                    let v_hat = v_i * v_scale;
                    *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
                });
        }
        Ok(params)
    }
}
