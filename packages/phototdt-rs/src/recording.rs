//! Recording data model
//!
//! A recording holds the reference (isosbestic) channel, one or two
//! calcium-dependent signal channels and a shared time axis. Processing never
//! modifies the raw channels; computed traces are appended as result columns.

use crate::decimate::decimate;
use crate::error::{PhotoError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named trace of samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub samples: Vec<f64>,
}

impl Channel {
    pub fn new(name: impl Into<String>, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Onset/offset times of a named event marker, in seconds from recording start.
/// Offsets that were never recorded are `NaN`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMarkers {
    pub onset: Vec<f64>,
    pub offset: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Recording {
    sample_rate: f64,
    time_seconds: Vec<f64>,
    reference: Channel,
    signals: Vec<Channel>,
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
    events: BTreeMap<String, EventMarkers>,
    results: Vec<Channel>,
}

impl Recording {
    /// Build a recording with the time axis `k / sample_rate`.
    ///
    /// # Arguments
    /// * `sample_rate` - Sampling rate in Hz
    /// * `reference` - Isosbestic channel
    /// * `signals` - One or two calcium-dependent channels, same length as `reference`
    pub fn new(sample_rate: f64, reference: Channel, signals: Vec<Channel>) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PhotoError::InvalidInput(format!(
                "Sample rate must be positive and finite, got {}",
                sample_rate
            )));
        }
        if reference.is_empty() {
            return Err(PhotoError::InvalidInput(format!(
                "Reference channel '{}' has no samples",
                reference.name
            )));
        }
        if signals.is_empty() || signals.len() > 2 {
            return Err(PhotoError::InvalidInput(format!(
                "Expected 1 or 2 signal channels, got {}",
                signals.len()
            )));
        }
        for signal in &signals {
            if signal.len() != reference.len() {
                return Err(PhotoError::InvalidInput(format!(
                    "Signal channel '{}' has {} samples but reference '{}' has {}",
                    signal.name,
                    signal.len(),
                    reference.name,
                    reference.len()
                )));
            }
        }

        let time_seconds = (0..reference.len())
            .map(|k| k as f64 / sample_rate)
            .collect();

        Ok(Self {
            sample_rate,
            time_seconds,
            reference,
            signals,
            start: None,
            stop: None,
            events: BTreeMap::new(),
            results: Vec::new(),
        })
    }

    /// Replace the generated time axis with recorded elapsed times
    pub fn with_time_axis(mut self, time_seconds: Vec<f64>) -> Result<Self> {
        if time_seconds.len() != self.num_samples() {
            return Err(PhotoError::InvalidInput(format!(
                "Time axis has {} entries but channels have {} samples",
                time_seconds.len(),
                self.num_samples()
            )));
        }
        if time_seconds.iter().any(|t| !t.is_finite()) {
            return Err(PhotoError::InvalidInput(
                "Time axis contains non-finite values".to_string(),
            ));
        }
        if let Some(i) = time_seconds.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PhotoError::InvalidInput(format!(
                "Time axis is not strictly increasing at sample {}",
                i + 1
            )));
        }
        self.time_seconds = time_seconds;
        Ok(self)
    }

    /// Absolute start and (optional) stop of the recording.
    /// A missing stop is derived from the sample count.
    pub fn with_timestamps(mut self, start: DateTime<Utc>, stop: Option<DateTime<Utc>>) -> Result<Self> {
        if let Some(stop) = stop {
            if stop < start {
                return Err(PhotoError::InvalidInput(format!(
                    "Recording stop {} precedes start {}",
                    stop, start
                )));
            }
        }
        self.start = Some(start);
        self.stop = stop;
        Ok(self)
    }

    pub fn with_event(mut self, name: impl Into<String>, markers: EventMarkers) -> Self {
        self.events.insert(name.into(), markers);
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn num_samples(&self) -> usize {
        self.reference.len()
    }

    /// Elapsed time of the last sample
    pub fn duration(&self) -> f64 {
        self.time_seconds.last().copied().unwrap_or(0.0)
    }

    /// End of the last sample interval, `t[n-1] + 1/fs`.
    ///
    /// Bins are `floor(t / window_seconds)`, so a window of `duration()`
    /// puts the last sample in a bin of its own; use this span to keep the
    /// whole recording in one segment.
    pub fn span(&self) -> f64 {
        self.duration() + 1.0 / self.sample_rate
    }

    pub fn time_seconds(&self) -> &[f64] {
        &self.time_seconds
    }

    pub fn reference(&self) -> &Channel {
        &self.reference
    }

    pub fn signals(&self) -> &[Channel] {
        &self.signals
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Recorded stop, or `start + (n - 1) / fs` when only the start is known
    pub fn stop(&self) -> Option<DateTime<Utc>> {
        match (self.start, self.stop) {
            (_, Some(stop)) => Some(stop),
            (Some(start), None) => {
                let span = (self.num_samples() - 1) as f64 / self.sample_rate;
                Some(start + seconds(span))
            }
            (None, None) => None,
        }
    }

    /// One timestamp per sample, spaced linearly from start to stop inclusive
    pub fn utc_timestamps(&self) -> Option<Vec<DateTime<Utc>>> {
        let start = self.start?;
        let stop = self.stop()?;
        let n = self.num_samples();
        if n == 1 {
            return Some(vec![start]);
        }

        let span = (stop - start).num_nanoseconds()? as f64;
        let step = span / (n - 1) as f64;
        Some(
            (0..n)
                .map(|k| start + Duration::nanoseconds((k as f64 * step).round() as i64))
                .collect(),
        )
    }

    pub fn event(&self, name: &str) -> Option<&EventMarkers> {
        self.events.get(name)
    }

    /// Index of the first sample after the last onset of `marker` plus
    /// `pad_seconds`: `ceil(max(onset) * fs) + round(pad_seconds * fs)`.
    pub fn samples_before_event_end(&self, marker: &str, pad_seconds: f64) -> Result<usize> {
        let markers = self.event(marker).ok_or_else(|| {
            PhotoError::InvalidInput(format!("Recording has no event marker '{}'", marker))
        })?;
        let last_onset = markers
            .onset
            .iter()
            .copied()
            .filter(|t| t.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        if !last_onset.is_finite() {
            return Err(PhotoError::InvalidInput(format!(
                "Event marker '{}' has no onsets",
                marker
            )));
        }
        if !pad_seconds.is_finite() || pad_seconds < 0.0 {
            return Err(PhotoError::InvalidInput(format!(
                "Pad must be a non-negative number of seconds, got {}",
                pad_seconds
            )));
        }

        let onset_index = (last_onset * self.sample_rate).ceil().max(0.0) as usize;
        let pad = (pad_seconds * self.sample_rate).round() as usize;
        Ok(onset_index + pad)
    }

    /// Decimate every channel by `factor`.
    ///
    /// Result columns are dropped; the time axis is rebuilt from the new rate.
    pub fn decimate(&self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(PhotoError::InvalidInput(
                "Decimation factor must be at least 1".to_string(),
            ));
        }
        if factor == 1 {
            return Ok(self.clone());
        }

        let decimate_channel = |c: &Channel| -> Result<Channel> {
            Ok(Channel::new(c.name.clone(), decimate(&c.samples, factor)?))
        };
        let reference = decimate_channel(&self.reference)?;
        let signals = self
            .signals
            .iter()
            .map(decimate_channel)
            .collect::<Result<Vec<_>>>()?;

        let mut out = Recording::new(self.sample_rate / factor as f64, reference, signals)?;
        out.start = self.start;
        out.stop = self.stop;
        out.events = self.events.clone();
        Ok(out)
    }

    /// Append (or replace) a computed column
    pub fn push_result(&mut self, channel: Channel) -> Result<()> {
        if channel.len() != self.num_samples() {
            return Err(PhotoError::LengthMismatch {
                expected: self.num_samples(),
                actual: channel.len(),
            });
        }
        match self.results.iter_mut().find(|c| c.name == channel.name) {
            Some(existing) => *existing = channel,
            None => self.results.push(channel),
        }
        Ok(())
    }

    pub fn results(&self) -> &[Channel] {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&Channel> {
        self.results.iter().find(|c| c.name == name)
    }

    /// Names of all channels in column order: reference, signals, results
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(&self.reference)
            .chain(&self.signals)
            .chain(&self.results)
            .map(|c| c.name.clone())
            .collect()
    }
}

fn seconds(s: f64) -> Duration {
    Duration::nanoseconds((s * 1e9).round() as i64)
}
