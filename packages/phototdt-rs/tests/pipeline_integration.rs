use phototdt_rs::{
    air_pls, compute_zdff, load_recording, process, smooth, write_csv, Channel, ChannelSelection,
    CsvSource, Diagnostic, EventMarkers, ExportOptions, PipelineConfig, Recording,
    RecordingSource, WindowKind, ZdffParams,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn drifting_pair(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let reference: Vec<f64> = (0..n).map(|i| 1.0 + 0.001 * i as f64).collect();
    let signal: Vec<f64> = reference
        .iter()
        .map(|r| 2.0 * r + rng.random_range(-1.0..1.0))
        .collect();
    (reference, signal)
}

fn photometry_recording(n: usize, fs: f64) -> Recording {
    let mut rng = StdRng::seed_from_u64(7);
    let reference: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            1.5 * (-t / 40.0).exp() + 0.02 * (t * 0.9).sin() + rng.random_range(-0.01..0.01)
        })
        .collect();
    let signal: Vec<f64> = reference
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let t = i as f64 / fs;
            let transient = if (t % 7.0) < 0.8 { 0.05 } else { 0.0 };
            1.3 * r + transient + rng.random_range(-0.01..0.01)
        })
        .collect();
    Recording::new(
        fs,
        Channel::new("_405", reference),
        vec![Channel::new("_465", signal)],
    )
    .unwrap()
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, var.sqrt())
}

#[test]
fn test_linear_drift_with_noise() {
    let (reference, signal) = drifting_pair(20000, 42);

    let smoothed = smooth(&reference, 10, WindowKind::Flat).unwrap();
    let baseline = air_pls(&smoothed, 5e4, 1, 50).unwrap();
    let interior = smoothed[2000..18000]
        .iter()
        .zip(&baseline[2000..18000])
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    assert!(interior < 1e-2, "baseline residual {}", interior);

    let out = compute_zdff(&reference, &signal, &ZdffParams::new(10, 0)).unwrap();
    assert_eq!(out.zdff.len(), 20000);
    assert!(out.zdff.iter().all(|v| v.is_finite()));

    // A first-order penalty bends the baseline away from a ramp near both
    // ends (about slope * sqrt(lambda)). Those edge excursions dominate the
    // whole-trace std used for standardizing, so the bulk sits near -0.2
    // with a spread of about 0.4 rather than at unit scale.
    let (mean, std) = mean_std(&out.zdff[2000..18000]);
    assert!(mean > -0.3 && mean < -0.1, "bulk mean {}", mean);
    assert!(std > 0.3 && std < 0.5, "bulk std {}", std);
}

#[test]
fn test_scaled_reference_cancels() {
    let reference: Vec<f64> = (0..5000)
        .map(|i| 3.0 + 0.0004 * i as f64 + 0.1 * (i as f64 * 0.004).sin())
        .collect();
    let signal: Vec<f64> = reference.iter().map(|r| 1.7 * r).collect();

    let out = compute_zdff(&reference, &signal, &ZdffParams::new(10, 100)).unwrap();
    assert_eq!(out.zdff.len(), 4900);
    let worst = out.zdff.iter().map(|v| v.abs()).fold(0.0, f64::max);
    assert!(worst < 5e-3, "max |zdFF| = {}", worst);
}

#[test]
fn test_whole_duration_window_matches_unwindowed() {
    let n = 3000;
    let fs = 100.0;

    let mut whole = photometry_recording(n, fs);
    let mut config = PipelineConfig::new(100, 0);
    config.smooth_win = Some(20);
    process(&mut whole, &config).unwrap();

    let mut windowed = photometry_recording(n, fs);
    config.window_seconds = Some(windowed.span());
    let report = process(&mut windowed, &config).unwrap();
    assert_eq!(report.segments.len(), 1);

    let a = &whole.result("zdFF").unwrap().samples;
    let b = &windowed.result("zdFF").unwrap().samples;
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < 1e-12);
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let mut config = PipelineConfig::new(500, 10);
    config.window_seconds = Some(6.0);

    let mut parallel = photometry_recording(4000, 200.0);
    let parallel_report = process(&mut parallel, &config).unwrap();

    config.parallel = false;
    let mut sequential = photometry_recording(4000, 200.0);
    let sequential_report = process(&mut sequential, &config).unwrap();

    assert!(parallel_report.segments.len() > 1);
    assert_eq!(parallel_report, sequential_report);
    assert_eq!(
        parallel.result("zdFF").unwrap().samples,
        sequential.result("zdFF").unwrap().samples
    );
}

#[test]
fn test_merged_output_is_zero_filled() {
    let mut rec = photometry_recording(3000, 100.0);
    let mut config = PipelineConfig::new(250, 15);
    config.window_seconds = Some(10.0);
    let report = process(&mut rec, &config).unwrap();

    let zdff = &rec.result("zdFF").unwrap().samples;
    assert_eq!(zdff.len(), rec.num_samples());
    assert!(zdff[..250].iter().all(|v| *v == 0.0));
    for segment in &report.segments {
        let trimmed = &zdff[segment.start..segment.start + segment.remove];
        assert!(trimmed.iter().all(|v| *v == 0.0));
    }
    assert!(zdff.iter().all(|v| !v.is_nan()));
}

#[test]
fn test_duration_window_splits_off_last_sample() {
    let mut rec = photometry_recording(2000, 100.0);
    let mut config = PipelineConfig::new(0, 0);
    config.smooth_win = Some(20);
    config.window_seconds = Some(rec.duration());
    let report = process(&mut rec, &config).unwrap();
    assert_eq!(report.segments.len(), 2);
    assert_eq!(report.segments[1].start, 1999);

    config.window_seconds = Some(rec.span());
    let report = process(&mut rec, &config).unwrap();
    assert_eq!(report.segments.len(), 1);
}

#[test]
fn test_trailing_single_sample_segment() {
    // t[n-1] = 20.0 falls in its own bin
    let mut rec = photometry_recording(2001, 100.0);
    let mut config = PipelineConfig::new(0, 0);
    config.window_seconds = Some(rec.duration() / 2.0);
    let report = process(&mut rec, &config).unwrap();

    let last = report.segments.last().unwrap();
    assert_eq!(last.end - last.start, 1);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::ShortSegment { samples: 1, .. })));
}

#[test]
fn test_event_trim_then_process() {
    let rec = photometry_recording(3000, 100.0).with_event(
        "Lz1_",
        EventMarkers {
            onset: vec![0.2, 1.505],
            offset: vec![0.4, 1.7],
        },
    );
    let n_remove = rec.samples_before_event_end("Lz1_", 2.0).unwrap();
    assert_eq!(n_remove, 151 + 200);

    let mut rec = rec;
    let report = process(&mut rec, &PipelineConfig::new(n_remove, 0)).unwrap();
    assert_eq!(report.segments[0].start, n_remove);
}

#[test]
fn test_decimate_then_process() {
    let rec = photometry_recording(10000, 1000.0);
    let mut rec = rec.decimate(10).unwrap();
    assert_eq!(rec.num_samples(), 1000);
    assert_eq!(rec.sample_rate(), 100.0);

    let report = process(&mut rec, &PipelineConfig::new(50, 0)).unwrap();
    assert_eq!(report.smooth_win, 100);
}

#[test]
fn test_csv_round_trip_after_processing() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("session.csv");
    let output = dir.path().join("session_zdff.csv.gz");

    let rec = photometry_recording(1500, 50.0);
    write_csv(&rec, &input, &ExportOptions::default()).unwrap();

    let source = CsvSource::open(&input).unwrap();
    let mut loaded = load_recording(&source, &ChannelSelection::default()).unwrap();
    assert_eq!(loaded.reference().samples, rec.reference().samples);

    let mut config = PipelineConfig::new(100, 0);
    config.window_seconds = Some(10.0);
    process(&mut loaded, &config).unwrap();
    write_csv(&loaded, &output, &ExportOptions { precision: Some(6) }).unwrap();

    let back = CsvSource::open(&output).unwrap();
    assert_eq!(back.channel_names(), vec!["_405", "_465", "zdFF"]);
    assert_eq!(back.num_samples(), 1500);
}
