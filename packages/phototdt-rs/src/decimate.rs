//! Anti-aliased integer decimation
//!
//! A Hamming-windowed sinc low-pass of order `20 * factor` with its cutoff at
//! the new Nyquist frequency is applied centered on each kept sample (zero
//! phase, zero-padded edges), then every `factor`-th sample is kept starting
//! at index 0.

use crate::error::{PhotoError, Result};
use std::f64::consts::PI;

/// Filter order per unit of decimation factor
const ORDER_PER_FACTOR: usize = 20;

/// Low-pass FIR taps with unit DC gain.
///
/// `cutoff` is relative to the Nyquist frequency, in `(0, 1]`.
pub fn lowpass_taps(numtaps: usize, cutoff: f64) -> Result<Vec<f64>> {
    if numtaps == 0 {
        return Err(PhotoError::InvalidInput(
            "FIR filter needs at least one tap".to_string(),
        ));
    }
    if !(cutoff > 0.0 && cutoff <= 1.0) {
        return Err(PhotoError::InvalidInput(format!(
            "FIR cutoff must be in (0, 1], got {}",
            cutoff
        )));
    }

    let center = (numtaps - 1) as f64 / 2.0;
    let mut taps: Vec<f64> = (0..numtaps)
        .map(|k| {
            let m = k as f64 - center;
            let window = if numtaps > 1 {
                0.54 - 0.46 * (2.0 * PI * k as f64 / (numtaps - 1) as f64).cos()
            } else {
                1.0
            };
            cutoff * sinc(cutoff * m) * window
        })
        .collect();

    let sum: f64 = taps.iter().sum();
    for t in taps.iter_mut() {
        *t /= sum;
    }
    Ok(taps)
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Decimate `x` by `factor`; output length is `ceil(n / factor)`.
pub fn decimate(x: &[f64], factor: usize) -> Result<Vec<f64>> {
    if factor == 0 {
        return Err(PhotoError::InvalidInput(
            "Decimation factor must be at least 1".to_string(),
        ));
    }
    if factor == 1 {
        return Ok(x.to_vec());
    }

    let taps = lowpass_taps(ORDER_PER_FACTOR * factor + 1, 1.0 / factor as f64)?;
    let half = (taps.len() - 1) / 2;
    let n = x.len();

    let out = (0..n)
        .step_by(factor)
        .map(|i| {
            // taps[k] multiplies x[i + half - k]
            let k_min = (i + half + 1).saturating_sub(n);
            let k_max = (i + half).min(taps.len() - 1);
            (k_min..=k_max)
                .map(|k| taps[k] * x[i + half - k])
                .sum::<f64>()
        })
        .collect();
    Ok(out)
}
