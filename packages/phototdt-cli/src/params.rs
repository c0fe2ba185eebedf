use crate::cli::{PipelineArgs, SourceArgs};
use phototdt_rs::io::read_events;
use phototdt_rs::{
    load_recording, ChannelSelection, CsvSource, PhotoError, PipelineConfig, Recording, WindowKind,
};
use std::path::{Path, PathBuf};

/// Whole-recording trim when neither a flag nor the config sets one
pub const DEFAULT_N_REMOVE: usize = 5000;
pub const DEFAULT_REMOVE: usize = 0;

const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "gz", "txt"];

/// Validate a single file path: existence and supported extension.
pub fn validate_file(file_path: &str) -> Result<(), String> {
    if !Path::new(file_path).exists() {
        return Err(format!("Input file not found: {}", file_path));
    }

    let ext = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    if !SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return Err(format!(
            "Unsupported file extension '{}'. Supported: csv, csv.gz, txt",
            ext
        ));
    }

    Ok(())
}

/// Resolve the pipeline configuration: flag, then config file, then default.
pub fn build_config(args: &PipelineArgs) -> Result<PipelineConfig, String> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .map_err(|e| format!("Failed to load config '{}': {}", path, e))?,
        None => PipelineConfig::new(DEFAULT_N_REMOVE, DEFAULT_REMOVE),
    };

    if let Some(w) = args.smooth_win {
        config.smooth_win = Some(w);
    }
    if let Some(n) = args.n_remove {
        config.n_remove = n;
    }
    if let Some(r) = args.remove {
        config.remove = r;
    }
    if let Some(w) = args.window_seconds {
        config.window_seconds = Some(w);
    }
    if let Some(l) = args.lambda {
        config.lambda = l;
    }
    if let Some(p) = args.porder {
        config.porder = p;
    }
    if let Some(i) = args.itermax {
        config.itermax = i;
    }
    if let Some(ref k) = args.kernel {
        config.kernel = k.parse::<WindowKind>().map_err(|e| e.to_string())?;
    }
    if args.sequential {
        config.parallel = false;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

pub fn validate_source(args: &SourceArgs) -> Result<(), String> {
    if let Some(fs) = args.sample_rate {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(format!("Sample rate must be positive, got {}", fs));
        }
    }
    if args.decimate == Some(0) {
        return Err("Decimation factor must be at least 1".to_string());
    }
    if !(args.start_pad_seconds.is_finite() && args.start_pad_seconds >= 0.0) {
        return Err(format!(
            "Start pad must be a non-negative number of seconds, got {}",
            args.start_pad_seconds
        ));
    }
    if let Some(ref events) = args.events {
        if !Path::new(events).exists() {
            return Err(format!("Event file not found: {}", events));
        }
    }
    Ok(())
}

/// Read, select and optionally decimate a recording.
pub fn load(file_path: &str, args: &SourceArgs) -> Result<Recording, PhotoError> {
    let source = CsvSource::open_with_sample_rate(file_path, args.sample_rate)?;
    let selection = ChannelSelection::new(args.reference.clone(), args.signal.clone());
    let mut recording = load_recording(&source, &selection)?;

    if let Some(ref events) = args.events {
        for (name, markers) in read_events(events)? {
            recording = recording.with_event(name, markers);
        }
    }

    match args.decimate {
        Some(q) if q > 1 => recording.decimate(q),
        _ => Ok(recording),
    }
}

/// Raise `n_remove` to cover everything before the start marker.
pub fn apply_start_trim(
    recording: &Recording,
    args: &SourceArgs,
    config: &mut PipelineConfig,
) -> Result<(), PhotoError> {
    if let Some(ref marker) = args.start_marker {
        let trim = recording.samples_before_event_end(marker, args.start_pad_seconds)?;
        if trim > config.n_remove {
            log::info!(
                "Start marker '{}' moves n_remove from {} to {}",
                marker,
                config.n_remove,
                trim
            );
            config.n_remove = trim;
        }
    }
    Ok(())
}

/// `<stem>_zdff.csv` in `dir`, or beside the input
pub fn default_output_path(file_path: &str, dir: Option<&str>) -> PathBuf {
    let path = Path::new(file_path);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    let name = name.strip_suffix(".gz").unwrap_or(name);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let parent = match dir {
        Some(d) => PathBuf::from(d),
        None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    parent.join(format!("{}_zdff.csv", stem))
}
