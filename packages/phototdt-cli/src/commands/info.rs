use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use crate::params;
use phototdt_rs::{CsvSource, RecordingSource};
use serde::Serialize;

#[derive(Serialize)]
struct InfoOutput {
    file: String,
    channels: Vec<String>,
    num_samples: usize,
    sample_rate: f64,
    duration_seconds: f64,
    start: Option<String>,
    stop: Option<String>,
}

pub fn execute(args: InfoArgs) -> i32 {
    if let Err(msg) = params::validate_file(&args.file) {
        eprintln!("Error: {}", msg);
        return exit_codes::INPUT_ERROR;
    }

    let source = match CsvSource::open_with_sample_rate(&args.file, args.sample_rate) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let num_samples = source.num_samples();
    let sample_rate = source.sample_rate();
    let duration_seconds = match source.time_axis() {
        Some(t) => t.last().copied().unwrap_or(0.0) - t.first().copied().unwrap_or(0.0),
        None => num_samples.saturating_sub(1) as f64 / sample_rate,
    };

    let info = InfoOutput {
        file: args.file.clone(),
        channels: source.channel_names(),
        num_samples,
        sample_rate,
        duration_seconds,
        start: source.start_time().map(|t| t.to_rfc3339()),
        stop: source.stop_time().map(|t| t.to_rfc3339()),
    };

    if args.json {
        match output::to_json(&info) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        println!("File: {}", info.file);
        println!("Channels: {}", info.channels.join(", "));
        println!("Samples: {}", info.num_samples);
        println!("Sample rate: {:.4} Hz", info.sample_rate);
        println!("Duration: {:.3} s", info.duration_seconds);
        if let Some(ref start) = info.start {
            println!("Start: {}", start);
        }
        if let Some(ref stop) = info.stop {
            println!("Stop: {}", stop);
        }
    }

    exit_codes::SUCCESS
}
