//! Adaptive iteratively reweighted penalized least squares (airPLS)
//!
//! Fits a slowly varying baseline under a signal. Each iteration solves the
//! Whittaker system `(W + λ DᵀD) z = W x`; samples above the current fit are
//! treated as peaks and dropped from the next fit, samples below it are
//! weighted up exponentially.
//!
//! Reference: Z.-M. Zhang, S. Chen, Y.-Z. Liang, "Baseline correction using
//! adaptive iteratively reweighted penalized least squares", Analyst 135 (5),
//! 1138-1146 (2010).

use crate::banded::SymmetricBanded;
use crate::error::{PhotoError, Result};

/// Relative stopping threshold on the negative-residual mass
const CONVERGENCE_RATIO: f64 = 0.001;

/// Result of an airPLS fit
#[derive(Debug, Clone)]
pub struct BaselineFit {
    pub baseline: Vec<f64>,
    /// Number of penalized least-squares solves performed
    pub iterations: usize,
    /// `false` when the iteration cap was reached before the threshold
    pub converged: bool,
}

/// Fitted airPLS baseline of `x`.
///
/// Non-convergence is logged and the last fit is returned.
pub fn air_pls(x: &[f64], lambda: f64, porder: usize, itermax: usize) -> Result<Vec<f64>> {
    air_pls_fit(x, lambda, porder, itermax).map(|fit| fit.baseline)
}

/// airPLS fit with convergence details.
///
/// # Arguments
/// * `x` - Signal to fit
/// * `lambda` - Smoothness penalty; larger values give a smoother baseline
/// * `porder` - Order of the difference penalty (1 = first differences)
/// * `itermax` - Maximum number of reweighting iterations (at least 1)
pub fn air_pls_fit(x: &[f64], lambda: f64, porder: usize, itermax: usize) -> Result<BaselineFit> {
    let n = x.len();
    if n == 0 {
        return Err(PhotoError::InvalidInput(
            "airPLS needs at least one sample".to_string(),
        ));
    }
    if itermax == 0 {
        return Err(PhotoError::InvalidInput(
            "airPLS itermax must be at least 1".to_string(),
        ));
    }
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(PhotoError::InvalidInput(format!(
            "airPLS lambda must be finite and non-negative, got {}",
            lambda
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PhotoError::InvalidInput(
            "airPLS input contains non-finite samples".to_string(),
        ));
    }

    let gram = difference_gram(n, porder);
    let threshold = CONVERGENCE_RATIO * x.iter().map(|v| v.abs()).sum::<f64>();
    let mut weights = vec![1.0; n];

    let mut iteration = 1;
    loop {
        let z = whittaker_smooth(x, &weights, lambda, &gram)?;

        let mut dssn = 0.0;
        let mut max_negative = 0.0_f64;
        for (xi, zi) in x.iter().zip(&z) {
            let d = xi - zi;
            if d < 0.0 {
                dssn += -d;
                max_negative = max_negative.max(-d);
            }
        }

        // dssn == 0 means the fit already lies on or under every sample
        if dssn < threshold || dssn == 0.0 {
            return Ok(BaselineFit {
                baseline: z,
                iterations: iteration,
                converged: true,
            });
        }

        if iteration == itermax {
            log::warn!(
                "airPLS reached max iteration ({}) without converging (dssn={:.4e}, threshold={:.4e})",
                itermax,
                dssn,
                threshold
            );
            return Ok(BaselineFit {
                baseline: z,
                iterations: iteration,
                converged: false,
            });
        }

        let step = iteration as f64;
        for ((w, xi), zi) in weights.iter_mut().zip(x).zip(&z) {
            let d = xi - zi;
            *w = if d >= 0.0 {
                0.0
            } else {
                (step * d.abs() / dssn).exp()
            };
        }
        let edge = (step * max_negative / dssn).exp();
        weights[0] = edge;
        weights[n - 1] = edge;

        iteration += 1;
    }
}

/// Penalized least-squares fit `(W + λ DᵀD) z = W x`
pub fn whittaker_smooth(
    x: &[f64],
    weights: &[f64],
    lambda: f64,
    gram: &SymmetricBanded,
) -> Result<Vec<f64>> {
    if weights.len() != x.len() {
        return Err(PhotoError::LengthMismatch {
            expected: x.len(),
            actual: weights.len(),
        });
    }

    let system = gram.scaled_with_diagonal(lambda, weights)?;
    let rhs: Vec<f64> = weights.iter().zip(x).map(|(w, v)| w * v).collect();
    system.cholesky()?.solve(&rhs)
}

/// `DᵀD` for the `order`-th difference operator on `n` samples, in banded form.
///
/// Row `r` of `D` holds the signed binomial coefficients
/// `(-1)^(order-k) C(order, k)` in columns `r..=r+order`.
pub fn difference_gram(n: usize, order: usize) -> SymmetricBanded {
    let coeffs = difference_coefficients(order);
    let mut gram = SymmetricBanded::zeros(n, order);

    let rows = if n > order { n - order } else { 0 };
    for r in 0..rows {
        for a in 0..=order {
            for b in 0..=a {
                gram.add(r + a, r + b, coeffs[a] * coeffs[b]);
            }
        }
    }
    gram
}

fn difference_coefficients(order: usize) -> Vec<f64> {
    let mut coeffs = Vec::with_capacity(order + 1);
    let mut binom = 1.0;
    for k in 0..=order {
        let sign = if (order - k) % 2 == 0 { 1.0 } else { -1.0 };
        coeffs.push(sign * binom);
        binom = binom * (order - k) as f64 / (k + 1) as f64;
    }
    coeffs
}
