pub mod align;
pub mod banded;
pub mod baseline;
pub mod decimate;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod profiling;
pub mod recording;
pub mod smoothing;
pub mod stats;
pub mod zdff;

pub use align::{AlignerParams, AlignmentFit, ReferenceAligner, Selection};
pub use baseline::{air_pls, air_pls_fit, BaselineFit};
pub use error::{Diagnostic, PhotoError, Result};
pub use io::{load_recording, write_csv, ChannelSelection, CsvSource, ExportOptions, RecordingSource};
pub use pipeline::{process, PipelineConfig, ProcessReport, SegmentReport};
pub use recording::{Channel, EventMarkers, Recording};
pub use smoothing::{smooth, WindowKind};
pub use zdff::{compute_zdff, ZdffOutput, ZdffParams};
