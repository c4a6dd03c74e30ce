//! Timing events and report output for the hemark harness.
//!
//! Drivers emit one [`TimingEvent`] per pipeline step into a [`ReportSink`];
//! the sink decides what to do with them. The bundled [`CsvReport`] writes a
//! `report.csv` (header block plus per-event rows) and a `summary.csv` with
//! per-label statistics into the benchmark's canonical directory.

mod stats;
mod timer;
mod writer;

use std::path::Path;

pub use stats::Stats;
pub use timer::{cpu_time_ns, Timer};
pub use writer::{write_failure, CsvReport};

use thiserror::Error;

/// One timed pipeline step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingEvent {
    /// Monotonically allocated per benchmark, with a fixed offset per
    /// category.
    pub id: u64,
    pub wall_ns: u64,
    pub cpu_ns: u64,
    /// How many workload units this event covers (1 for latency steps, the
    /// whole result batch for an offline operate).
    pub iterations: u64,
}

/// Where drivers report their measurements.
pub trait ReportSink {
    fn add_event(&mut self, event: TimingEvent, label: &str);
    fn add_header(&mut self, text: &str);
    /// Flush everything below `path`, treating it as a directory.
    fn finalize(&mut self, path: &Path) -> Result<(), ReportError>;
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report under {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
