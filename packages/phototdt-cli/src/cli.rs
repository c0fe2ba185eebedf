use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "phototdt",
    version,
    about = "Fiber photometry zdFF command-line tool",
    long_about = "Correct fiber photometry recordings: airPLS baseline removal, \
                  non-negative Lasso reference alignment and z-scored dF/F (zdFF).\n\
                  Reads CSV exports (optionally .csv.gz) with one column per channel."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute zdFF for one recording
    Run(RunArgs),
    /// Compute zdFF for every recording matching a glob pattern
    Batch(BatchArgs),
    /// Show channels, sampling rate and duration of a recording
    Info(InfoArgs),
}

/// How to read a recording
#[derive(Args, Clone, Debug)]
pub struct SourceArgs {
    /// Reference (isosbestic) channel name
    #[arg(long, default_value = "_405")]
    pub reference: String,

    /// Signal channel name(s), at most two
    #[arg(long, default_values_t = vec!["_465".to_string()], num_args = 1..=2)]
    pub signal: Vec<String>,

    /// Sampling rate in Hz (overrides the rate implied by the time column)
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Event marker CSV with columns name,onset,offset
    #[arg(long)]
    pub events: Option<String>,

    /// Integer decimation factor applied after loading
    #[arg(long)]
    pub decimate: Option<usize>,

    /// Drop everything before the last onset of this event marker
    #[arg(long)]
    pub start_marker: Option<String>,

    /// Extra seconds dropped after the start marker
    #[arg(long, default_value_t = 5.0)]
    pub start_pad_seconds: f64,
}

/// Pipeline tunables; each flag overrides the config file
#[derive(Args, Clone, Debug, Default)]
pub struct PipelineArgs {
    /// JSON pipeline configuration
    #[arg(long)]
    pub config: Option<String>,

    /// Smoothing window in samples (default: about one second)
    #[arg(long)]
    pub smooth_win: Option<usize>,

    /// Samples dropped from the start of the recording [default: 5000]
    #[arg(long)]
    pub n_remove: Option<usize>,

    /// Samples dropped from the start of each segment [default: 0]
    #[arg(long)]
    pub remove: Option<usize>,

    /// Segment duration in seconds (default: whole recording)
    #[arg(long)]
    pub window_seconds: Option<f64>,

    /// airPLS smoothness penalty [default: 5e4]
    #[arg(long)]
    pub lambda: Option<f64>,

    /// airPLS difference order [default: 1]
    #[arg(long)]
    pub porder: Option<usize>,

    /// airPLS iteration cap [default: 50]
    #[arg(long)]
    pub itermax: Option<usize>,

    /// Smoothing kernel: flat, hanning, hamming, bartlett, blackman
    #[arg(long)]
    pub kernel: Option<String>,

    /// Process segments on a single thread
    #[arg(long, default_value_t = false)]
    pub sequential: bool,
}

#[derive(Args)]
pub struct RunArgs {
    /// Input CSV file (.csv or .csv.gz)
    #[arg(long)]
    pub file: String,

    /// Output CSV (default: <input stem>_zdff.csv beside the input; .gz compresses)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write the processing report as JSON to this path
    #[arg(long)]
    pub report: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Decimal places in the output CSV
    #[arg(long)]
    pub precision: Option<usize>,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input files (e.g., "data/*.csv")
    #[arg(long)]
    pub pattern: String,

    /// Output directory (default: beside each input)
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Continue processing remaining files if one fails
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// List matching files without processing
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Decimal places in the output CSV
    #[arg(long)]
    pub precision: Option<usize>,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Input CSV file
    #[arg(long)]
    pub file: String,

    /// Sampling rate in Hz, for files without a time column
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["phototdt", "run", "--file", "a.csv"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source.reference, "_405");
        assert_eq!(args.source.signal, vec!["_465"]);
        assert_eq!(args.source.start_pad_seconds, 5.0);
        assert!(args.pipeline.n_remove.is_none());
        assert!(!args.pipeline.sequential);
    }

    #[test]
    fn test_two_signals_accepted_three_rejected() {
        let cli = Cli::try_parse_from([
            "phototdt", "run", "--file", "a.csv", "--signal", "_465", "_560",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source.signal, vec!["_465", "_560"]);

        assert!(Cli::try_parse_from([
            "phototdt", "run", "--file", "a.csv", "--signal", "a", "b", "c",
        ])
        .is_err());
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["phototdt", "info", "--file", "a.csv", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
