//! Windowed zdFF pipeline
//!
//! Applies the zdFF computation to a whole [`Recording`]:
//! 1. Drop the first `n_remove` samples (photobleaching onset, laser warm-up).
//! 2. Estimate the smoothing window from the time axis when not given.
//! 3. Split the remaining samples into fixed-duration time bins, or keep
//!    them as one segment.
//! 4. Run every segment independently, in parallel when enabled.
//! 5. Merge segment results in order; samples without a value are `0.0`.

use crate::align::AlignerParams;
use crate::error::{Diagnostic, PhotoError, Result};
use crate::recording::{Channel, Recording};
use crate::smoothing::WindowKind;
use crate::zdff::{
    compute_zdff, BaselineSummary, ZdffParams, DEFAULT_ITERMAX, DEFAULT_LAMBDA, DEFAULT_PORDER,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;

/// Configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Smoothing window in samples; estimated as about one second of
    /// samples when unset
    #[serde(default)]
    pub smooth_win: Option<usize>,

    /// Samples dropped from the start of the recording before anything else
    pub n_remove: usize,

    /// Samples dropped from the start of every segment after baseline removal
    pub remove: usize,

    /// Segment duration in seconds; the whole trimmed recording when unset
    #[serde(default)]
    pub window_seconds: Option<f64>,

    #[serde(default = "default_lambda")]
    pub lambda: f64,

    #[serde(default = "default_porder")]
    pub porder: usize,

    #[serde(default = "default_itermax")]
    pub itermax: usize,

    #[serde(default)]
    pub kernel: WindowKind,

    /// Smoothing window for segments shorter than `smooth_win`
    #[serde(default = "default_fallback_smooth_win")]
    pub fallback_smooth_win: usize,

    #[serde(default)]
    pub aligner: AlignerParams,

    /// Process segments on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_lambda() -> f64 {
    DEFAULT_LAMBDA
}
fn default_porder() -> usize {
    DEFAULT_PORDER
}
fn default_itermax() -> usize {
    DEFAULT_ITERMAX
}
fn default_fallback_smooth_win() -> usize {
    10
}
fn default_parallel() -> bool {
    true
}

impl PipelineConfig {
    /// Both trims are explicit; everything else takes its default.
    pub fn new(n_remove: usize, remove: usize) -> Self {
        Self {
            smooth_win: None,
            n_remove,
            remove,
            window_seconds: None,
            lambda: default_lambda(),
            porder: default_porder(),
            itermax: default_itermax(),
            kernel: WindowKind::default(),
            fallback_smooth_win: default_fallback_smooth_win(),
            aligner: AlignerParams::default(),
            parallel: default_parallel(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(w) = self.window_seconds {
            if !(w.is_finite() && w > 0.0) {
                return Err(PhotoError::InvalidInput(format!(
                    "window_seconds must be positive and finite, got {}",
                    w
                )));
            }
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(PhotoError::InvalidInput(format!(
                "lambda must be finite and non-negative, got {}",
                self.lambda
            )));
        }
        if self.itermax == 0 {
            return Err(PhotoError::InvalidInput(
                "itermax must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn zdff_params(&self, smooth_win: usize, remove: usize) -> ZdffParams {
        ZdffParams {
            smooth_win,
            remove,
            lambda: self.lambda,
            porder: self.porder,
            itermax: self.itermax,
            kernel: self.kernel,
            aligner: self.aligner.clone(),
        }
    }
}

/// Alignment and baseline details for one signal channel in one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFit {
    pub channel: String,
    pub coefficient: f64,
    pub intercept: f64,
    pub aligner_iterations: usize,
    pub reference_baseline: BaselineSummary,
    pub signal_baseline: BaselineSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub index: usize,
    /// First sample of the segment in the recording
    pub start: usize,
    /// One past the last sample
    pub end: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub smooth_win: usize,
    pub remove: usize,
    pub fits: Vec<ChannelFit>,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    /// Smoothing window in effect for full-length segments
    pub smooth_win: usize,
    pub n_remove: usize,
    /// Names of the appended result columns
    pub columns: Vec<String>,
    pub segments: Vec<SegmentReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ProcessReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct SegmentOutput {
    report: SegmentReport,
    /// zdFF per signal channel, `range.len() - remove` values each
    traces: Vec<Vec<f64>>,
    diagnostics: Vec<Diagnostic>,
}

/// Name of the result column for `signal`
pub fn result_column_name(recording: &Recording, signal: &str) -> String {
    if recording.signals().len() == 1 {
        "zdFF".to_string()
    } else {
        format!("zdFF_{}", signal)
    }
}

/// `round(1 / dt)` from the last interval of the time axis
pub fn estimate_smooth_win(time_seconds: &[f64]) -> Result<usize> {
    let n = time_seconds.len();
    if n < 2 {
        return Err(PhotoError::InvalidInput(
            "Cannot estimate the smoothing window from fewer than two samples".to_string(),
        ));
    }
    let dt = time_seconds[n - 1] - time_seconds[n - 2];
    if !(dt.is_finite() && dt > 0.0) {
        return Err(PhotoError::InvalidInput(format!(
            "Cannot estimate the smoothing window from sampling interval {}",
            dt
        )));
    }
    Ok(((1.0 / dt).round() as usize).max(1))
}

/// Split `time_seconds` into runs sharing the bin index `floor(t / window_seconds)`.
///
/// Returned ranges index into `time_seconds`.
pub fn segment_bounds(time_seconds: &[f64], window_seconds: f64) -> Result<Vec<Range<usize>>> {
    if !(window_seconds.is_finite() && window_seconds > 0.0) {
        return Err(PhotoError::InvalidInput(format!(
            "window_seconds must be positive and finite, got {}",
            window_seconds
        )));
    }

    let mut bounds = Vec::new();
    let mut start = 0;
    let mut current: Option<i64> = None;
    for (i, t) in time_seconds.iter().enumerate() {
        let bin = (t / window_seconds).floor() as i64;
        match current {
            Some(c) if c != bin => {
                bounds.push(start..i);
                start = i;
                current = Some(bin);
            }
            Some(_) => {}
            None => current = Some(bin),
        }
    }
    if start < time_seconds.len() {
        bounds.push(start..time_seconds.len());
    }
    Ok(bounds)
}

/// Compute zdFF for every signal channel and append the result columns.
pub fn process(recording: &mut Recording, config: &PipelineConfig) -> Result<ProcessReport> {
    crate::profile_scope!("pipeline::process");
    config.validate()?;

    let n = recording.num_samples();
    if config.n_remove >= n {
        return Err(PhotoError::InvalidInput(format!(
            "n_remove ({}) leaves no samples in a {}-sample recording",
            config.n_remove, n
        )));
    }

    let smooth_win = match config.smooth_win {
        Some(w) => w,
        None => {
            let w = estimate_smooth_win(recording.time_seconds())?;
            log::info!("Estimated smoothing window: {} samples", w);
            w
        }
    };

    let segments: Vec<Range<usize>> = match config.window_seconds {
        Some(w) => segment_bounds(&recording.time_seconds()[config.n_remove..], w)?
            .into_iter()
            .map(|r| r.start + config.n_remove..r.end + config.n_remove)
            .collect(),
        None => vec![config.n_remove..n],
    };
    let windowed = config.window_seconds.is_some();

    log::info!(
        "Processing {} samples ({} trimmed) in {} segment(s), smooth_win={}",
        n - config.n_remove,
        config.n_remove,
        segments.len(),
        smooth_win
    );

    let source: &Recording = recording;
    let run = |(index, range): (usize, &Range<usize>)| {
        run_segment(source, config, index, range.clone(), smooth_win, windowed)
    };
    let outputs: Vec<SegmentOutput> = if config.parallel {
        segments
            .par_iter()
            .enumerate()
            .map(run)
            .collect::<Result<Vec<_>>>()?
    } else {
        segments
            .iter()
            .enumerate()
            .map(run)
            .collect::<Result<Vec<_>>>()?
    };

    let columns: Vec<String> = recording
        .signals()
        .iter()
        .map(|s| result_column_name(recording, &s.name))
        .collect();

    let mut merged = vec![vec![0.0; n]; columns.len()];
    let mut diagnostics = Vec::new();
    let mut reports = Vec::with_capacity(outputs.len());
    for output in outputs {
        let offset = output.report.start + output.report.remove;
        for (column, trace) in merged.iter_mut().zip(&output.traces) {
            let end = offset + trace.len();
            if end != output.report.end {
                return Err(PhotoError::LengthMismatch {
                    expected: output.report.end - offset,
                    actual: trace.len(),
                });
            }
            column[offset..end].copy_from_slice(trace);
        }
        diagnostics.extend(output.diagnostics);
        reports.push(output.report);
    }

    for diagnostic in &diagnostics {
        log::warn!("{}", diagnostic);
    }

    for (name, samples) in columns.iter().zip(merged) {
        recording.push_result(Channel::new(name.clone(), samples))?;
    }

    Ok(ProcessReport {
        smooth_win,
        n_remove: config.n_remove,
        columns,
        segments: reports,
        diagnostics,
    })
}

fn run_segment(
    recording: &Recording,
    config: &PipelineConfig,
    index: usize,
    range: Range<usize>,
    smooth_win: usize,
    windowed: bool,
) -> Result<SegmentOutput> {
    let samples = range.len();
    let mut diagnostics = Vec::new();

    let short = samples < smooth_win || samples <= config.remove;
    let (seg_smooth_win, remove) = if windowed && short {
        let fallback = if samples < smooth_win {
            config.fallback_smooth_win.min(samples)
        } else {
            smooth_win
        };
        let remove = config.remove.min(samples - 1);
        diagnostics.push(Diagnostic::ShortSegment {
            segment: index,
            samples,
            smooth_win,
            fallback,
            remove,
        });
        (fallback, remove)
    } else {
        (smooth_win, config.remove)
    };
    let params = config.zdff_params(seg_smooth_win, remove);

    let time = recording.time_seconds();
    log::debug!(
        "Segment {}: samples {}..{} ({:.3}s..{:.3}s), smooth_win={}",
        index,
        range.start,
        range.end,
        time[range.start],
        time[range.end - 1],
        seg_smooth_win
    );

    let reference = &recording.reference().samples[range.clone()];
    let mut traces = Vec::with_capacity(recording.signals().len());
    let mut fits = Vec::with_capacity(recording.signals().len());
    for signal in recording.signals() {
        let output = compute_zdff(reference, &signal.samples[range.clone()], &params)?;

        let stalled = [
            (&recording.reference().name, output.reference_baseline),
            (&signal.name, output.signal_baseline),
        ];
        for (channel, summary) in stalled {
            let diagnostic = Diagnostic::NonConvergence {
                channel: channel.clone(),
                segment: index,
                iterations: summary.iterations,
            };
            if !summary.converged && !diagnostics.contains(&diagnostic) {
                diagnostics.push(diagnostic);
            }
        }

        fits.push(ChannelFit {
            channel: signal.name.clone(),
            coefficient: output.alignment.coefficients.first().copied().unwrap_or(0.0),
            intercept: output.alignment.intercept,
            aligner_iterations: output.alignment.iterations,
            reference_baseline: output.reference_baseline,
            signal_baseline: output.signal_baseline,
        });
        traces.push(output.zdff);
    }

    Ok(SegmentOutput {
        report: SegmentReport {
            index,
            start: range.start,
            end: range.end,
            start_seconds: time[range.start],
            end_seconds: time[range.end - 1],
            smooth_win: seg_smooth_win,
            remove,
            fits,
        },
        traces,
        diagnostics,
    })
}
