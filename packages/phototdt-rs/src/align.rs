//! Reference-to-signal alignment
//!
//! Non-negative Lasso regression of the signal channel on the reference
//! channel, solved by coordinate descent on the precomputed Gram matrix of the
//! centered design:
//!
//! ```text
//! minimize (1 / 2n) ||y - Xβ - b||² + α ||β||₁   subject to β >= 0
//! ```
//!
//! Random coordinate selection draws from a generator seeded per fit, so the
//! same input always produces the same coefficients.

use crate::error::{PhotoError, Result};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Order in which coordinates are updated within an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Cyclic,
    #[default]
    Random,
}

/// Regression hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignerParams {
    /// L1 penalty
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Maximum number of coordinate-descent epochs
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Relative coefficient-update tolerance
    #[serde(default = "default_tol")]
    pub tol: f64,

    /// Constrain coefficients to be non-negative
    #[serde(default = "default_true")]
    pub positive: bool,

    #[serde(default = "default_true")]
    pub fit_intercept: bool,

    #[serde(default)]
    pub selection: Selection,

    /// Seed for random coordinate selection
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_alpha() -> f64 {
    1e-4
}
fn default_max_iter() -> usize {
    1000
}
fn default_tol() -> f64 {
    1e-4
}
fn default_true() -> bool {
    true
}
fn default_seed() -> u64 {
    9999
}

impl Default for AlignerParams {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            max_iter: default_max_iter(),
            tol: default_tol(),
            positive: true,
            fit_intercept: true,
            selection: Selection::Random,
            seed: default_seed(),
        }
    }
}

/// Fitted regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentFit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl AlignmentFit {
    /// `intercept + Σ βⱼ·featureⱼ` for every sample
    pub fn predict(&self, features: &[&[f64]]) -> Result<Vec<f64>> {
        if features.len() != self.coefficients.len() {
            return Err(PhotoError::InvalidInput(format!(
                "Expected {} feature columns, got {}",
                self.coefficients.len(),
                features.len()
            )));
        }
        let n = check_columns(features)?;

        let mut predicted = vec![self.intercept; n];
        for (column, &beta) in features.iter().zip(&self.coefficients) {
            for (p, &v) in predicted.iter_mut().zip(column.iter()) {
                *p += beta * v;
            }
        }
        Ok(predicted)
    }
}

/// Non-negative Lasso aligner
#[derive(Debug, Clone, Default)]
pub struct ReferenceAligner {
    params: AlignerParams,
}

impl ReferenceAligner {
    pub fn new(params: AlignerParams) -> Self {
        Self { params }
    }

    /// Predicted `signal` from `reference` under the fitted regression
    pub fn align(&self, reference: &[f64], signal: &[f64]) -> Result<(Vec<f64>, AlignmentFit)> {
        let fit = self.fit(&[reference], signal)?;
        let predicted = fit.predict(&[reference])?;
        Ok((predicted, fit))
    }

    /// Fit `target` on one or more feature columns.
    pub fn fit(&self, features: &[&[f64]], target: &[f64]) -> Result<AlignmentFit> {
        if features.is_empty() {
            return Err(PhotoError::InvalidInput(
                "Regression needs at least one feature column".to_string(),
            ));
        }
        let n = check_columns(features)?;
        if n != target.len() {
            return Err(PhotoError::InvalidInput(format!(
                "Feature columns have {} samples but the target has {}",
                n,
                target.len()
            )));
        }
        if n == 0 {
            return Err(PhotoError::InvalidInput(
                "Regression needs at least one sample".to_string(),
            ));
        }
        if target.iter().any(|v| !v.is_finite()) {
            return Err(PhotoError::InvalidInput(
                "Regression target contains non-finite values".to_string(),
            ));
        }

        let p = features.len();
        let params = &self.params;

        let mut x = DMatrix::from_fn(n, p, |i, j| features[j][i]);
        let mut y = DVector::from_column_slice(target);

        let (x_mean, y_mean) = if params.fit_intercept {
            let x_mean: Vec<f64> = (0..p).map(|j| x.column(j).mean()).collect();
            (x_mean, y.mean())
        } else {
            (vec![0.0; p], 0.0)
        };

        for (j, &m) in x_mean.iter().enumerate() {
            for v in x.column_mut(j).iter_mut() {
                *v -= m;
            }
        }
        for v in y.iter_mut() {
            *v -= y_mean;
        }

        let gram = x.transpose() * &x;
        let xy = x.transpose() * &y;

        let l1 = params.alpha * n as f64;
        let mut w = DVector::<f64>::zeros(p);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut iterations = 0;
        let mut converged = false;

        for epoch in 1..=params.max_iter {
            iterations = epoch;
            let mut w_max = 0.0_f64;
            let mut d_w_max = 0.0_f64;

            for f_iter in 0..p {
                let j = match params.selection {
                    Selection::Cyclic => f_iter,
                    Selection::Random => rng.random_range(0..p),
                };

                let g_jj = gram[(j, j)];
                if g_jj == 0.0 {
                    continue;
                }

                let w_old = w[j];
                let mut tmp = xy[j];
                for k in 0..p {
                    if k != j {
                        tmp -= gram[(j, k)] * w[k];
                    }
                }

                let w_new = if params.positive && tmp < 0.0 {
                    0.0
                } else {
                    tmp.signum() * (tmp.abs() - l1).max(0.0) / g_jj
                };
                w[j] = w_new;

                d_w_max = d_w_max.max((w_new - w_old).abs());
                w_max = w_max.max(w_new.abs());
            }

            if w_max == 0.0 || d_w_max / w_max < params.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!(
                "Coordinate descent did not converge within {} iterations",
                params.max_iter
            );
        }

        let coefficients: Vec<f64> = w.iter().copied().collect();
        let intercept = y_mean
            - x_mean
                .iter()
                .zip(&coefficients)
                .map(|(m, b)| m * b)
                .sum::<f64>();

        Ok(AlignmentFit {
            coefficients,
            intercept,
            iterations,
            converged,
        })
    }
}

/// Common length of all columns, rejecting ragged or non-finite input
fn check_columns(features: &[&[f64]]) -> Result<usize> {
    let n = features.first().map(|c| c.len()).unwrap_or(0);
    for (j, column) in features.iter().enumerate() {
        if column.len() != n {
            return Err(PhotoError::InvalidInput(format!(
                "Feature column {} has {} samples, expected {}",
                j,
                column.len(),
                n
            )));
        }
        if column.iter().any(|v| !v.is_finite()) {
            return Err(PhotoError::InvalidInput(format!(
                "Feature column {} contains non-finite values",
                j
            )));
        }
    }
    Ok(n)
}
