//! Synheart Sleep - On-device AASM sleep parameters from scored hypnograms
//!
//! Sleep turns a hypnogram (one AASM stage label per epoch) into the standard
//! sleep-scoring parameters: recording and sleep times, latencies, wake after
//! sleep onset, efficiency and per-stage statistics.
//!
//! Pipeline: hypnogram text → parser → memoized analysis → report JSON
//!
//! ## Modules
//!
//! - **Analysis**: [`SleepAnalysis`], the lazily evaluated parameter engine
//! - **Hypnogram**: loading labels, CSV and JSON hypnograms
//! - **Report**: self-describing JSON output with quality flags

pub mod analysis;
pub mod config;
pub mod error;
pub mod hypnogram;
pub mod pipeline;
pub mod report;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use analysis::SleepAnalysis;
pub use config::{AnalysisConfig, DEFAULT_EPOCH_LENGTH_SEC};
pub use error::ComputeError;
pub use hypnogram::{Hypnogram, InputFormat};
pub use pipeline::{hypnogram_to_report, SleepProcessor};
pub use report::{ReportEncoder, SleepReport};
pub use types::{Lights, SleepEpochs, SleepMetrics, SleepStage, StageValues};

/// Library version embedded in all reports
pub const SLEEP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-sleep";
