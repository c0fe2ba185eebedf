//! Moving-window smoothing
//!
//! Convolves a normalized window with a copy of the signal that has been
//! extended by mirrored samples at both ends, so the output keeps the input
//! length and the edges are not pulled towards zero.

use crate::error::{PhotoError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// Window shape used by [`smooth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Moving average
    #[default]
    Flat,
    Hanning,
    Hamming,
    Bartlett,
    Blackman,
}

impl WindowKind {
    pub const ALL: [WindowKind; 5] = [
        WindowKind::Flat,
        WindowKind::Hanning,
        WindowKind::Hamming,
        WindowKind::Bartlett,
        WindowKind::Blackman,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Flat => "flat",
            WindowKind::Hanning => "hanning",
            WindowKind::Hamming => "hamming",
            WindowKind::Bartlett => "bartlett",
            WindowKind::Blackman => "blackman",
        }
    }

    /// Window coefficients normalized to sum to one
    pub fn coefficients(&self, len: usize) -> Vec<f64> {
        if len == 0 {
            return Vec::new();
        }
        if len == 1 {
            return vec![1.0];
        }

        let m = (len - 1) as f64;
        let raw: Vec<f64> = (0..len)
            .map(|k| {
                let k = k as f64;
                match self {
                    WindowKind::Flat => 1.0,
                    WindowKind::Hanning => 0.5 - 0.5 * (2.0 * PI * k / m).cos(),
                    WindowKind::Hamming => 0.54 - 0.46 * (2.0 * PI * k / m).cos(),
                    WindowKind::Bartlett => 1.0 - (2.0 * k / m - 1.0).abs(),
                    WindowKind::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * k / m).cos() + 0.08 * (4.0 * PI * k / m).cos()
                    }
                }
            })
            .collect();

        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / total).collect()
    }
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowKind {
    type Err = PhotoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(WindowKind::Flat),
            "hanning" | "hann" => Ok(WindowKind::Hanning),
            "hamming" => Ok(WindowKind::Hamming),
            "bartlett" => Ok(WindowKind::Bartlett),
            "blackman" => Ok(WindowKind::Blackman),
            other => Err(PhotoError::InvalidInput(format!(
                "Unknown window '{}'. Expected one of: flat, hanning, hamming, bartlett, blackman",
                other
            ))),
        }
    }
}

/// Smooth `x` with a window of `window_len` samples.
///
/// Windows shorter than 3 samples return `x` unchanged. The signal is
/// extended by reflecting `window_len - 1` samples at each end (the boundary
/// sample itself is not repeated), convolved in "valid" mode, and cropped back
/// to `x.len()`. Odd windows drop `window_len / 2` samples from each side of
/// the convolution; even windows start one sample earlier, so the crop is
/// asymmetric by one.
///
/// # Errors
/// `InvalidInput` when `x` is shorter than the window, `LengthMismatch` if the
/// crop does not reproduce the input length.
pub fn smooth(x: &[f64], window_len: usize, kernel: WindowKind) -> Result<Vec<f64>> {
    let n = x.len();
    if n < window_len {
        return Err(PhotoError::InvalidInput(format!(
            "Input vector needs to be bigger than window size ({} < {})",
            n, window_len
        )));
    }

    if window_len < 3 {
        return Ok(x.to_vec());
    }

    let padded = reflect_pad(x, window_len);
    let weights = kernel.coefficients(window_len);
    let convolved = convolve_valid(&padded, &weights);

    let half = window_len / 2;
    let start = if window_len % 2 == 0 { half - 1 } else { half };
    let end = convolved.len() - half;
    let smoothed = convolved[start..end].to_vec();

    if smoothed.len() != n {
        return Err(PhotoError::LengthMismatch {
            expected: n,
            actual: smoothed.len(),
        });
    }

    Ok(smoothed)
}

/// `[x[w-1], .., x[1]] ++ x ++ [x[n-2], .., x[n-w]]`
fn reflect_pad(x: &[f64], window_len: usize) -> Vec<f64> {
    let n = x.len();
    let mut padded = Vec::with_capacity(n + 2 * (window_len - 1));
    padded.extend((1..window_len).rev().map(|i| x[i]));
    padded.extend_from_slice(x);
    padded.extend((n - window_len..n - 1).rev().map(|i| x[i]));
    padded
}

fn convolve_valid(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let m = kernel.len();
    if signal.len() < m {
        return Vec::new();
    }

    (0..=signal.len() - m)
        .map(|k| {
            kernel
                .iter()
                .enumerate()
                .map(|(j, &w)| w * signal[k + m - 1 - j])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-12, "index {}: {} != {}", i, a, e);
        }
    }

    #[test]
    fn test_reflect_pad_excludes_boundary_sample() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let padded = reflect_pad(&x, 3);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn test_flat_odd_window_pinned() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = smooth(&x, 3, WindowKind::Flat).unwrap();
        assert_close(&y, &[5.0 / 3.0, 2.0, 3.0, 4.0, 5.0, 16.0 / 3.0]);
    }

    #[test]
    fn test_flat_even_window_pinned() {
        // padded: [4,3,2,1,2,3,4,5,6,5,4,3]; 4-sample means start one sample early
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = smooth(&x, 4, WindowKind::Flat).unwrap();
        assert_close(&y, &[2.0, 2.0, 2.5, 3.5, 4.5, 5.0]);
    }

    #[test]
    fn test_short_window_is_identity() {
        let x = [3.0, -1.0, 7.5];
        assert_eq!(smooth(&x, 0, WindowKind::Flat).unwrap(), x.to_vec());
        assert_eq!(smooth(&x, 2, WindowKind::Hanning).unwrap(), x.to_vec());
    }

    #[test]
    fn test_input_shorter_than_window_fails() {
        let x = [1.0, 2.0];
        let err = smooth(&x, 3, WindowKind::Flat).unwrap_err();
        assert!(matches!(err, PhotoError::InvalidInput(_)));
    }

    #[test]
    fn test_length_preserved_for_all_windows() {
        let x: Vec<f64> = (0..101).map(|i| (i as f64 * 0.3).sin()).collect();
        for kind in WindowKind::ALL {
            for w in [3, 4, 5, 10, 11, 101] {
                let y = smooth(&x, w, kind).unwrap();
                assert_eq!(y.len(), x.len(), "{} window {}", kind, w);
            }
        }
    }

    #[test]
    fn test_constant_signal_unchanged() {
        let x = vec![2.5; 40];
        for kind in WindowKind::ALL {
            let y = smooth(&x, 7, kind).unwrap();
            for v in y {
                assert!((v - 2.5).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_window_coefficients_normalized_and_symmetric() {
        for kind in WindowKind::ALL {
            let w = kind.coefficients(9);
            let total: f64 = w.iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
            for i in 0..w.len() {
                assert!((w[i] - w[w.len() - 1 - i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_window_kind_parsing() {
        assert_eq!("Flat".parse::<WindowKind>().unwrap(), WindowKind::Flat);
        assert_eq!("hann".parse::<WindowKind>().unwrap(), WindowKind::Hanning);
        assert!("gaussian".parse::<WindowKind>().is_err());
    }
}
