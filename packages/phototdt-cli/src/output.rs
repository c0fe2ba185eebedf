use phototdt_rs::ProcessReport;
use std::io::Write;
use std::path::Path;

/// Write text to stdout or a file.
pub fn write_output(text: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => std::fs::write(Path::new(path), text)
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Serialize a value to pretty-printed JSON.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {}", e))
}

/// Save the processing report as JSON.
pub fn write_report(report: &ProcessReport, path: &str) -> Result<(), String> {
    let json = report
        .to_json()
        .map_err(|e| format!("JSON serialization failed: {}", e))?;
    write_output(&json, Some(path))
}
