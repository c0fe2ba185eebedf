use crate::cli::BatchArgs;
use crate::commands::run::process_file;
use crate::exit_codes;
use crate::params;
use std::time::Instant;

pub fn execute(args: BatchArgs) -> i32 {
    let files = match resolve_glob(&args.pattern) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if files.is_empty() {
        eprintln!("Error: No matching files found");
        return exit_codes::INPUT_ERROR;
    }

    // Dry-run mode: print file list and exit
    if args.dry_run {
        for f in &files {
            println!("{}", f);
        }
        if !args.quiet {
            eprintln!("Found {} file(s)", files.len());
        }
        return exit_codes::SUCCESS;
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

    if let Some(ref dir) = args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Error: Failed to create output directory '{}': {}", dir, e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    let total = files.len();
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let start_time = Instant::now();

    for (i, file_path) in files.iter().enumerate() {
        if !args.quiet {
            eprintln!("[{}/{}] {}...", i + 1, total, file_path);
        }

        let output_path = params::default_output_path(file_path, args.output_dir.as_deref());
        match process_file(file_path, &output_path, &args.source, &config, args.precision) {
            Ok(report) => {
                if !args.quiet {
                    eprintln!(
                        "  -> {} ({} segment(s), {} diagnostic(s))",
                        output_path.display(),
                        report.segments.len(),
                        report.diagnostics.len()
                    );
                }
                succeeded += 1;
            }
            Err((_, msg)) => {
                eprintln!("  Error: {}", msg);
                failed += 1;
                if !args.continue_on_error {
                    break;
                }
            }
        }
    }

    let elapsed = start_time.elapsed();

    if !args.quiet {
        eprintln!(
            "Batch complete: {}/{} succeeded, {}/{} failed, {:.1}s",
            succeeded,
            total,
            failed,
            total,
            elapsed.as_secs_f64()
        );
    }

    if failed == 0 {
        exit_codes::SUCCESS
    } else if succeeded > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

fn resolve_glob(pattern: &str) -> Result<Vec<String>, String> {
    let paths = glob::glob(pattern)
        .map_err(|e| format!("Invalid glob pattern '{}': {}", pattern, e))?;

    let mut files: Vec<String> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                // skip our own outputs when inputs and outputs share a directory
                let is_output = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.contains("_zdff.csv"))
                    .unwrap_or(false);
                if path.is_file() && !is_output {
                    if let Some(s) = path.to_str() {
                        files.push(s.to_string());
                    }
                }
            }
            Err(e) => {
                log::warn!("glob error: {}", e);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_glob_no_matches() {
        let result = resolve_glob("/nonexistent_dir_12345/*.csv").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_resolve_glob_invalid_pattern() {
        assert!(resolve_glob("[").is_err());
    }

    #[test]
    fn test_resolve_glob_skips_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.csv"), "").unwrap();
        fs::write(tmp.path().join("b.csv"), "").unwrap();
        fs::write(tmp.path().join("a_zdff.csv"), "").unwrap();
        fs::write(tmp.path().join("c.txt"), "").unwrap();

        let pattern = format!("{}/*.csv", tmp.path().to_str().unwrap());
        let result = resolve_glob(&pattern).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].ends_with("a.csv"));
        assert!(result[1].ends_with("b.csv"));
    }
}
