//! z-scored ΔF/F from a reference/signal channel pair
//!
//! Martianova, E., Aronson, S., Proulx, C.D. "Multi-Fiber Photometry to Record
//! Neural Activity in Freely Moving Animal." J. Vis. Exp. (152), e60278 (2019).

use crate::align::{AlignerParams, AlignmentFit, ReferenceAligner};
use crate::baseline::{air_pls_fit, BaselineFit};
use crate::error::{PhotoError, Result};
use crate::smoothing::{smooth, WindowKind};
use crate::stats::standardize;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LAMBDA: f64 = 5e4;
pub const DEFAULT_PORDER: usize = 1;
pub const DEFAULT_ITERMAX: usize = 50;

/// Parameters for one zdFF computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZdffParams {
    /// Smoothing window in samples
    pub smooth_win: usize,
    /// Samples dropped from the start after baseline removal
    pub remove: usize,
    /// airPLS smoothness penalty
    pub lambda: f64,
    /// airPLS difference order
    pub porder: usize,
    /// airPLS iteration cap
    pub itermax: usize,
    pub kernel: WindowKind,
    pub aligner: AlignerParams,
}

impl ZdffParams {
    /// Parameters with the standard airPLS settings (`lambda = 5e4`,
    /// `porder = 1`, `itermax = 50`), a flat kernel and the default aligner.
    pub fn new(smooth_win: usize, remove: usize) -> Self {
        Self {
            smooth_win,
            remove,
            lambda: DEFAULT_LAMBDA,
            porder: DEFAULT_PORDER,
            itermax: DEFAULT_ITERMAX,
            kernel: WindowKind::Flat,
            aligner: AlignerParams::default(),
        }
    }
}

/// Convergence of the two airPLS fits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub iterations: usize,
    pub converged: bool,
}

impl From<&BaselineFit> for BaselineSummary {
    fn from(fit: &BaselineFit) -> Self {
        Self {
            iterations: fit.iterations,
            converged: fit.converged,
        }
    }
}

/// zdFF trace plus the fits that produced it
#[derive(Debug, Clone)]
pub struct ZdffOutput {
    /// `len(input) - remove` values
    pub zdff: Vec<f64>,
    pub alignment: AlignmentFit,
    pub reference_baseline: BaselineSummary,
    pub signal_baseline: BaselineSummary,
}

/// Compute zdFF for one reference/signal pair.
///
/// 1. Smooth both channels.
/// 2. Subtract each channel's airPLS baseline.
/// 3. Drop the first `remove` samples.
/// 4. Standardize (median-centered, divided by the standard deviation).
/// 5. Align the reference onto the signal with a non-negative Lasso.
/// 6. Return `signal - aligned reference`.
pub fn compute_zdff(reference: &[f64], signal: &[f64], params: &ZdffParams) -> Result<ZdffOutput> {
    if reference.len() != signal.len() {
        return Err(PhotoError::InvalidInput(format!(
            "Reference has {} samples but signal has {}",
            reference.len(),
            signal.len()
        )));
    }
    let n = reference.len();
    if params.remove >= n {
        return Err(PhotoError::InvalidInput(format!(
            "Cannot remove {} samples from a {}-sample trace",
            params.remove, n
        )));
    }

    let reference = smooth(reference, params.smooth_win, params.kernel)?;
    let signal = smooth(signal, params.smooth_win, params.kernel)?;

    let reference_fit = air_pls_fit(&reference, params.lambda, params.porder, params.itermax)?;
    let signal_fit = air_pls_fit(&signal, params.lambda, params.porder, params.itermax)?;

    let reference = detrend_tail(&reference, &reference_fit.baseline, params.remove);
    let signal = detrend_tail(&signal, &signal_fit.baseline, params.remove);

    let reference = standardize(&reference);
    let signal = standardize(&signal);

    let aligner = ReferenceAligner::new(params.aligner.clone());
    let (aligned, alignment) = aligner.align(&reference, &signal)?;

    let zdff: Vec<f64> = signal.iter().zip(&aligned).map(|(s, r)| s - r).collect();

    let expected = n - params.remove;
    if zdff.len() != expected {
        return Err(PhotoError::LengthMismatch {
            expected,
            actual: zdff.len(),
        });
    }

    Ok(ZdffOutput {
        zdff,
        alignment,
        reference_baseline: BaselineSummary::from(&reference_fit),
        signal_baseline: BaselineSummary::from(&signal_fit),
    })
}

/// `(x - baseline)[remove..]`
fn detrend_tail(x: &[f64], baseline: &[f64], remove: usize) -> Vec<f64> {
    x[remove..]
        .iter()
        .zip(&baseline[remove..])
        .map(|(v, b)| v - b)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(n: usize) -> (Vec<f64>, Vec<f64>) {
        let reference: Vec<f64> = (0..n)
            .map(|i| 1.0 + 0.0005 * i as f64 + 0.05 * (i as f64 * 0.013).sin())
            .collect();
        let signal: Vec<f64> = reference
            .iter()
            .enumerate()
            .map(|(i, r)| 1.5 * r + 0.2 * (i as f64 * 0.07).sin().max(0.0))
            .collect();
        (reference, signal)
    }

    #[test]
    fn test_output_length_accounts_for_remove() {
        let (r, s) = channels(2000);
        for remove in [0, 1, 200] {
            let out = compute_zdff(&r, &s, &ZdffParams::new(10, remove)).unwrap();
            assert_eq!(out.zdff.len(), 2000 - remove);
        }
    }

    #[test]
    fn test_scaled_reference_gives_zero_trace() {
        let (r, _) = channels(3000);
        let s: Vec<f64> = r.iter().map(|v| 2.0 * v).collect();

        let out = compute_zdff(&r, &s, &ZdffParams::new(10, 0)).unwrap();
        let worst = out.zdff.iter().map(|v| v.abs()).fold(0.0, f64::max);
        assert!(worst < 5e-3, "zdFF should vanish, max |zdFF| = {}", worst);
        assert!((out.alignment.coefficients[0] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = compute_zdff(&[1.0; 20], &[1.0; 21], &ZdffParams::new(3, 0)).unwrap_err();
        assert!(matches!(err, PhotoError::InvalidInput(_)));
    }

    #[test]
    fn test_remove_larger_than_trace_rejected() {
        let (r, s) = channels(50);
        let err = compute_zdff(&r, &s, &ZdffParams::new(3, 50)).unwrap_err();
        assert!(matches!(err, PhotoError::InvalidInput(_)));
    }

    #[test]
    fn test_smoothing_error_propagates() {
        let (r, s) = channels(8);
        let err = compute_zdff(&r, &s, &ZdffParams::new(10, 0)).unwrap_err();
        assert!(matches!(err, PhotoError::InvalidInput(_)));
    }
}
