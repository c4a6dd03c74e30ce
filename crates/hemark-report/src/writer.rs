//! CSV report writer.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::stats::Stats;
use crate::{ReportError, ReportSink, TimingEvent};

/// Collects events in memory and writes `report.csv` / `summary.csv` on
/// finalize.
#[derive(Default)]
pub struct CsvReport {
    header: String,
    events: Vec<(TimingEvent, String)>,
}

impl CsvReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, in emission order.
    pub fn events(&self) -> &[(TimingEvent, String)] {
        &self.events
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.header);
        if !self.header.is_empty() && !self.header.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out.push_str("Event ID,Label,Iterations,Wall Time (ns),CPU Time (ns)\n");
        for (event, label) in &self.events {
            let _ = writeln!(
                out,
                "{},{},{},{},{}",
                event.id,
                csv_field(label),
                event.iterations,
                event.wall_ns,
                event.cpu_ns
            );
        }
        out
    }

    fn render_summary(&self) -> String {
        // Group by label, preserving first-appearance order.
        let mut order: Vec<&str> = Vec::new();
        for (_, label) in &self.events {
            if !order.contains(&label.as_str()) {
                order.push(label);
            }
        }

        let mut out = String::from(
            "Label,Event ID,Count,Total Iterations,\
             Wall Mean (ns),Wall StdDev (ns),Wall Min (ns),Wall Max (ns),\
             CPU Mean (ns),CPU StdDev (ns)\n",
        );
        for label in order {
            let mut wall = Stats::new();
            let mut cpu = Stats::new();
            let mut iterations = 0u64;
            let mut first_id = 0u64;
            for (event, l) in &self.events {
                if l == label {
                    if wall.count() == 0 {
                        first_id = event.id;
                    }
                    wall.push(event.wall_ns as f64);
                    cpu.push(event.cpu_ns as f64);
                    iterations += event.iterations;
                }
            }
            let _ = writeln!(
                out,
                "{},{},{},{},{:.0},{:.0},{:.0},{:.0},{:.0},{:.0}",
                csv_field(label),
                first_id,
                wall.count(),
                iterations,
                wall.mean(),
                wall.stddev(),
                wall.min(),
                wall.max(),
                cpu.mean(),
                cpu.stddev()
            );
        }
        out
    }
}

impl ReportSink for CsvReport {
    fn add_event(&mut self, event: TimingEvent, label: &str) {
        debug!(
            id = event.id,
            label,
            wall_ns = event.wall_ns,
            iterations = event.iterations,
            "timing event"
        );
        self.events.push((event, label.to_string()));
    }

    fn add_header(&mut self, text: &str) {
        self.header.push_str(text);
    }

    fn finalize(&mut self, path: &Path) -> Result<(), ReportError> {
        let io_err = |source| ReportError::Io {
            path: path.display().to_string(),
            source,
        };
        fs::create_dir_all(path).map_err(io_err)?;
        fs::write(path.join("report.csv"), self.render_report()).map_err(io_err)?;
        fs::write(path.join("summary.csv"), self.render_summary()).map_err(io_err)?;
        debug!(path = %path.display(), events = self.events.len(), "report written");
        Ok(())
    }
}

/// Record a benchmark failure inside its report directory.
pub fn write_failure(path: &Path, line: &str) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    fs::create_dir_all(path).map_err(io_err)?;
    fs::write(path.join("failure.txt"), format!("{}\n", line)).map_err(io_err)?;
    Ok(())
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
