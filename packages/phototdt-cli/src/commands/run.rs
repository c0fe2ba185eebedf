use crate::cli::{RunArgs, SourceArgs};
use crate::exit_codes;
use crate::output;
use crate::params;
use phototdt_rs::{process, write_csv, ExportOptions, PipelineConfig, ProcessReport};
use std::path::Path;

/// A failed file: exit code and message
pub type FileError = (i32, String);

/// Load, process and export one recording.
pub fn process_file(
    file_path: &str,
    output_path: &Path,
    source: &SourceArgs,
    config: &PipelineConfig,
    precision: Option<usize>,
) -> Result<ProcessReport, FileError> {
    params::validate_file(file_path).map_err(|msg| (exit_codes::INPUT_ERROR, msg))?;

    let mut recording = params::load(file_path, source)
        .map_err(|e| (exit_codes::for_error(&e), format!("Failed to load {}: {}", file_path, e)))?;

    let mut config = config.clone();
    params::apply_start_trim(&recording, source, &mut config)
        .map_err(|e| (exit_codes::for_error(&e), e.to_string()))?;

    let report = process(&mut recording, &config)
        .map_err(|e| (exit_codes::for_error(&e), format!("Processing failed: {}", e)))?;

    write_csv(&recording, output_path, &ExportOptions { precision }).map_err(|e| {
        (
            exit_codes::EXECUTION_ERROR,
            format!("Failed to write '{}': {}", output_path.display(), e),
        )
    })?;

    Ok(report)
}

pub fn execute(args: RunArgs) -> i32 {
    if let Err(msg) = params::validate_file(&args.file) {
        eprintln!("Error: {}", msg);
        return exit_codes::INPUT_ERROR;
    }
    if let Err(msg) = params::validate_source(&args.source) {
        eprintln!("Error: {}", msg);
        return exit_codes::INPUT_ERROR;
    }

    let config = match params::build_config(&args.pipeline) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let output_path = match args.output {
        Some(ref path) => Path::new(path).to_path_buf(),
        None => params::default_output_path(&args.file, None),
    };

    if !args.quiet {
        eprintln!("Processing {}...", args.file);
        eprintln!(
            "  Reference: {}, signals: {}",
            args.source.reference,
            args.source.signal.join(", ")
        );
        match config.window_seconds {
            Some(w) => eprintln!("  Window: {}s", w),
            None => eprintln!("  Window: whole recording"),
        }
    }

    let report = match process_file(&args.file, &output_path, &args.source, &config, args.precision) {
        Ok(r) => r,
        Err((code, msg)) => {
            eprintln!("Error: {}", msg);
            return code;
        }
    };

    if let Some(ref path) = args.report {
        if let Err(e) = output::write_report(&report, path) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    if !args.quiet {
        eprintln!(
            "  {} segment(s), smooth_win={}, {} diagnostic(s)",
            report.segments.len(),
            report.smooth_win,
            report.diagnostics.len()
        );
        eprintln!("Results written to {}", output_path.display());
    }

    exit_codes::SUCCESS
}
