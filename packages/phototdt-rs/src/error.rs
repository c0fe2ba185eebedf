use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Length mismatch: expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Singular system: {0}")]
    SingularSystem(String),

    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PhotoError>;

/// Non-fatal notices raised while processing a recording.
///
/// These never abort a run; the pipeline logs them and returns them in the
/// [`ProcessReport`](crate::pipeline::ProcessReport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// airPLS hit its iteration cap before the residual threshold was met.
    NonConvergence {
        channel: String,
        segment: usize,
        iterations: usize,
    },
    /// A window segment was too short for the smoothing window or for the
    /// per-segment `remove`; `fallback` and `remove` are what it ran with.
    ShortSegment {
        segment: usize,
        samples: usize,
        smooth_win: usize,
        fallback: usize,
        remove: usize,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::NonConvergence {
                channel,
                segment,
                iterations,
            } => write!(
                f,
                "airPLS baseline for '{}' (segment {}) did not converge after {} iterations",
                channel, segment, iterations
            ),
            Diagnostic::ShortSegment {
                segment,
                samples,
                smooth_win,
                fallback,
                remove,
            } => write!(
                f,
                "segment {} has only {} samples (smoothing window {}); using window {} and remove {}",
                segment, samples, smooth_win, fallback, remove
            ),
        }
    }
}
