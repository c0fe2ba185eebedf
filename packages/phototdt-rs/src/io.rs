//! Recording sources and CSV import/export
//!
//! The pipeline only needs named, equal-length channels, a sampling rate,
//! optional absolute timestamps and optional event markers. Any acquisition
//! format can provide those through [`RecordingSource`]; [`CsvSource`] covers
//! plain-text exports, optionally gzip-compressed.

use crate::error::{PhotoError, Result};
use crate::recording::{Channel, EventMarkers, Recording};
use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const TIME_COLUMN: &str = "time_seconds";
pub const TIMESTAMP_COLUMN: &str = "utc_datetime";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Provider of raw photometry channels.
pub trait RecordingSource {
    /// Sampling rate in Hz shared by all channels
    fn sample_rate(&self) -> f64;

    fn channel_names(&self) -> Vec<String>;

    fn read_channel(&self, name: &str) -> Result<Vec<f64>>;

    /// Recorded elapsed time per sample, when the source stores one
    fn time_axis(&self) -> Option<Vec<f64>> {
        None
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn stop_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn event_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn event(&self, _name: &str) -> Option<EventMarkers> {
        None
    }
}

/// Which channels play the reference and signal roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection {
    pub reference: String,
    pub signals: Vec<String>,
}

impl ChannelSelection {
    pub fn new(reference: impl Into<String>, signals: Vec<String>) -> Self {
        Self {
            reference: reference.into(),
            signals,
        }
    }
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self::new("_405", vec!["_465".to_string()])
    }
}

/// Build a [`Recording`] from the selected channels of `source`.
pub fn load_recording(source: &dyn RecordingSource, selection: &ChannelSelection) -> Result<Recording> {
    let available = source.channel_names();
    let read = |name: &str| -> Result<Channel> {
        if !available.iter().any(|c| c == name) {
            return Err(PhotoError::InvalidInput(format!(
                "Channel '{}' not found. Available channels: {}",
                name,
                available.join(", ")
            )));
        }
        Ok(Channel::new(name, source.read_channel(name)?))
    };

    let reference = read(&selection.reference)?;
    let signals = selection
        .signals
        .iter()
        .map(|name| read(name))
        .collect::<Result<Vec<_>>>()?;

    let mut recording = Recording::new(source.sample_rate(), reference, signals)?;
    if let Some(time) = source.time_axis() {
        recording = recording.with_time_axis(time)?;
    }
    if let Some(start) = source.start_time() {
        recording = recording.with_timestamps(start, source.stop_time())?;
    }
    for name in source.event_names() {
        if let Some(markers) = source.event(&name) {
            recording = recording.with_event(name, markers);
        }
    }

    log::debug!(
        "Loaded {} samples at {} Hz: reference '{}', signals {:?}",
        recording.num_samples(),
        recording.sample_rate(),
        selection.reference,
        selection.signals
    );
    Ok(recording)
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

fn open_text(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| PhotoError::Parse(format!("Invalid timestamp '{}': {}", text, e)))
}

fn parse_value(text: &str, row: usize, column: &str) -> Result<f64> {
    text.parse::<f64>().map_err(|_| {
        PhotoError::Parse(format!(
            "Row {}, column '{}': '{}' is not a number",
            row, column, text
        ))
    })
}

/// Recording stored as a header-row CSV file.
///
/// A `time_seconds` column becomes the time axis, a `utc_datetime` column
/// gives the absolute start and stop, and every other column is a channel.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    sample_rate: f64,
    time_seconds: Option<Vec<f64>>,
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
    channels: Vec<Channel>,
    events: BTreeMap<String, EventMarkers>,
}

impl CsvSource {
    /// Open a CSV whose sampling rate follows from its time column.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sample_rate(path, None)
    }

    /// Open a CSV, using `sample_rate` instead of the rate implied by the file.
    pub fn open_with_sample_rate(path: impl AsRef<Path>, sample_rate: Option<f64>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(open_text(path)?);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let time_idx = headers.iter().position(|h| h == TIME_COLUMN);
        let stamp_idx = headers.iter().position(|h| h == TIMESTAMP_COLUMN);
        let channel_cols: Vec<(usize, &String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != time_idx && Some(*i) != stamp_idx)
            .collect();

        let mut time = Vec::new();
        let mut first_stamp = None;
        let mut last_stamp = None;
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); channel_cols.len()];

        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let row = row_idx + 2;
            if let Some(i) = time_idx {
                time.push(parse_value(record.get(i).unwrap_or(""), row, TIME_COLUMN)?);
            }
            if let Some(i) = stamp_idx {
                let text = record.get(i).unwrap_or("");
                if first_stamp.is_none() {
                    first_stamp = Some(parse_timestamp(text)?);
                }
                last_stamp = Some(text.to_string());
            }
            for (column, (i, name)) in columns.iter_mut().zip(&channel_cols) {
                column.push(parse_value(record.get(*i).unwrap_or(""), row, name)?);
            }
        }

        let n = columns.first().map(|c| c.len()).unwrap_or(0);
        if channel_cols.is_empty() || n == 0 {
            return Err(PhotoError::InvalidInput(format!(
                "{} contains no channel data",
                path.display()
            )));
        }

        let stop = last_stamp.as_deref().map(parse_timestamp).transpose()?;
        let time_seconds = time_idx.map(|_| time);

        let sample_rate = match sample_rate {
            Some(fs) => fs,
            None => Self::implied_sample_rate(time_seconds.as_deref(), first_stamp, stop, n)
                .ok_or_else(|| {
                    PhotoError::InvalidInput(format!(
                        "Cannot determine the sampling rate of {}; add a '{}' column or pass a sample rate",
                        path.display(),
                        TIME_COLUMN
                    ))
                })?,
        };

        let channels = channel_cols
            .iter()
            .zip(columns)
            .map(|((_, name), samples)| Channel::new(name.as_str(), samples))
            .collect();

        log::info!(
            "Read {} samples x {} channels from {}",
            n,
            channel_cols.len(),
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            sample_rate,
            time_seconds,
            start: first_stamp,
            stop,
            channels,
            events: BTreeMap::new(),
        })
    }

    fn implied_sample_rate(
        time: Option<&[f64]>,
        start: Option<DateTime<Utc>>,
        stop: Option<DateTime<Utc>>,
        n: usize,
    ) -> Option<f64> {
        if let Some(t) = time {
            if t.len() >= 2 {
                let dt = t[t.len() - 1] - t[t.len() - 2];
                return (dt > 0.0).then(|| 1.0 / dt);
            }
        }
        let span = (stop? - start?).num_nanoseconds()? as f64 * 1e-9;
        (n >= 2 && span > 0.0).then(|| (n - 1) as f64 / span)
    }

    /// Attach event markers from a `name,onset,offset` sidecar file.
    pub fn with_events_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.events = read_events(path)?;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }
}

impl RecordingSource for CsvSource {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    fn read_channel(&self, name: &str) -> Result<Vec<f64>> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.samples.clone())
            .ok_or_else(|| PhotoError::InvalidInput(format!("Channel '{}' not found", name)))
    }

    fn time_axis(&self) -> Option<Vec<f64>> {
        self.time_seconds.clone()
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    fn stop_time(&self) -> Option<DateTime<Utc>> {
        self.stop
    }

    fn event_names(&self) -> Vec<String> {
        self.events.keys().cloned().collect()
    }

    fn event(&self, name: &str) -> Option<EventMarkers> {
        self.events.get(name).cloned()
    }
}

/// Read a `name,onset,offset` event file; an empty offset is `NaN`.
pub fn read_events(path: impl AsRef<Path>) -> Result<BTreeMap<String, EventMarkers>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(open_text(path)?);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            PhotoError::Parse(format!(
                "{} is missing the '{}' column",
                path.display(),
                name
            ))
        })
    };
    let name_idx = column("name")?;
    let onset_idx = column("onset")?;
    let offset_idx = column("offset")?;

    let mut events: BTreeMap<String, EventMarkers> = BTreeMap::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = row_idx + 2;
        let name = record.get(name_idx).unwrap_or("").to_string();
        let onset = parse_value(record.get(onset_idx).unwrap_or(""), row, "onset")?;
        let offset = match record.get(offset_idx).unwrap_or("") {
            "" => f64::NAN,
            text => parse_value(text, row, "offset")?,
        };
        let markers = events.entry(name).or_default();
        markers.onset.push(onset);
        markers.offset.push(offset);
    }
    Ok(events)
}

/// Options for [`write_csv`]
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Decimal places; shortest round-trip representation when unset
    pub precision: Option<usize>,
}

/// Write the recording and its result columns as CSV.
///
/// Columns: `utc_datetime` (when the start is known), `time_seconds`, the
/// reference, the signals, then the result columns. A `.gz` path is
/// gzip-compressed.
pub fn write_csv(recording: &Recording, path: impl AsRef<Path>, options: &ExportOptions) -> Result<()> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);

    if is_gzip(path) {
        let encoder = write_rows(recording, GzEncoder::new(file, Compression::default()), options)?;
        encoder.finish()?.flush()?;
    } else {
        write_rows(recording, file, options)?.flush()?;
    }

    log::info!(
        "Wrote {} samples x {} columns to {}",
        recording.num_samples(),
        recording.column_names().len(),
        path.display()
    );
    Ok(())
}

fn write_rows<W: Write>(recording: &Recording, sink: W, options: &ExportOptions) -> Result<W> {
    let mut writer = csv::Writer::from_writer(sink);

    let timestamps = recording.utc_timestamps();
    let mut header: Vec<String> = Vec::new();
    if timestamps.is_some() {
        header.push(TIMESTAMP_COLUMN.to_string());
    }
    header.push(TIME_COLUMN.to_string());
    header.extend(recording.column_names());
    writer.write_record(&header)?;

    let columns: Vec<&[f64]> = std::iter::once(recording.reference())
        .chain(recording.signals())
        .chain(recording.results())
        .map(|c| c.samples.as_slice())
        .collect();
    let fmt_value = |v: f64| match options.precision {
        Some(p) => format!("{:.*}", p, v),
        None => v.to_string(),
    };

    let mut row: Vec<String> = Vec::with_capacity(header.len());
    for (k, t) in recording.time_seconds().iter().enumerate() {
        row.clear();
        if let Some(ts) = &timestamps {
            row.push(ts[k].format(TIMESTAMP_FORMAT).to_string());
        }
        row.push(fmt_value(*t));
        row.extend(columns.iter().map(|c| fmt_value(c[k])));
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| PhotoError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_csv_source_reads_time_and_channels() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "rec.csv",
            "time_seconds,_405,_465\n0.0,1.0,2.0\n0.5,1.5,2.5\n1.0,2.0,3.0\n",
        );

        let source = CsvSource::open(&path).unwrap();
        assert_eq!(source.sample_rate(), 2.0);
        assert_eq!(source.channel_names(), vec!["_405", "_465"]);
        assert_eq!(source.read_channel("_465").unwrap(), vec![2.0, 2.5, 3.0]);
        assert_eq!(source.time_axis(), Some(vec![0.0, 0.5, 1.0]));
    }

    #[test]
    fn test_csv_source_needs_sample_rate() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "rec.csv", "_405,_465\n1,2\n3,4\n");

        assert!(matches!(CsvSource::open(&path), Err(PhotoError::InvalidInput(_))));
        let source = CsvSource::open_with_sample_rate(&path, Some(100.0)).unwrap();
        assert_eq!(source.sample_rate(), 100.0);
    }

    #[test]
    fn test_csv_source_rejects_bad_numbers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "rec.csv", "time_seconds,_405\n0,1\n1,abc\n");
        let err = CsvSource::open(&path).unwrap_err();
        assert!(matches!(err, PhotoError::Parse(_)));
        assert!(err.to_string().contains("Row 3"));
    }

    #[test]
    fn test_timestamps_give_start_and_stop() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "rec.csv",
            "utc_datetime,_405,_465\n\
             2024-03-01 10:00:00.000000,1,2\n\
             2024-03-01 10:00:00.500000,1,2\n\
             2024-03-01T10:00:01Z,1,2\n",
        );
        let source = CsvSource::open(&path).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(source.start_time(), Some(start));
        assert_eq!(source.stop_time(), Some(start + chrono::Duration::seconds(1)));
        assert!((source.sample_rate() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_read_events_groups_by_name() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "events.csv",
            "name,onset,offset\nLz1_,1.0,2.0\nCam1,0.1,\nLz1_,3.0,4.0\n",
        );
        let events = read_events(&path).unwrap();
        assert_eq!(events["Lz1_"].onset, vec![1.0, 3.0]);
        assert_eq!(events["Lz1_"].offset, vec![2.0, 4.0]);
        assert!(events["Cam1"].offset[0].is_nan());
    }

    #[test]
    fn test_load_recording_reports_missing_channel() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "rec.csv", "time_seconds,_405,_465\n0,1,2\n1,1,2\n");
        let source = CsvSource::open(&path).unwrap();

        let selection = ChannelSelection::new("_405", vec!["_560".to_string()]);
        let err = load_recording(&source, &selection).unwrap_err();
        assert!(err.to_string().contains("_560"));
        assert!(err.to_string().contains("_465"));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut rec = Recording::new(
            10.0,
            Channel::new("_405", vec![1.0, 1.25, 1.5, 1.75]),
            vec![Channel::new("_465", vec![0.1, 0.2, 0.3, 0.4])],
        )
        .unwrap()
        .with_timestamps(start, None)
        .unwrap();
        rec.push_result(Channel::new("zdFF", vec![0.0, -0.5, 0.5, 1.0 / 3.0]))
            .unwrap();

        for name in ["out.csv", "out.csv.gz"] {
            let path = dir.path().join(name);
            write_csv(&rec, &path, &ExportOptions::default()).unwrap();

            let source = CsvSource::open(&path).unwrap();
            assert_eq!(source.channel_names(), vec!["_405", "_465", "zdFF"]);
            assert_eq!(source.read_channel("zdFF").unwrap(), rec.results()[0].samples);
            assert_eq!(source.start_time(), Some(start));
            assert!((source.sample_rate() - 10.0).abs() < 1e-9);

            let back = load_recording(&source, &ChannelSelection::default()).unwrap();
            assert_eq!(back.reference().samples, rec.reference().samples);
            assert_eq!(back.time_seconds(), rec.time_seconds());
        }
    }

    #[test]
    fn test_write_with_precision() {
        let dir = TempDir::new().unwrap();
        let rec = Recording::new(
            1.0,
            Channel::new("_405", vec![1.0 / 3.0]),
            vec![Channel::new("_465", vec![2.0])],
        )
        .unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&rec, &path, &ExportOptions { precision: Some(3) }).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "time_seconds,_405,_465\n0.000,0.333,2.000\n");
    }
}
