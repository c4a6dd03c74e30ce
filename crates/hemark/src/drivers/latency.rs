//! Latency driver: one sample per iteration, repeated until stable.

use std::time::Instant;

use hemark_data::{OutputBatch, TestData};
use hemark_report::ReportSink;
use tracing::{debug, info};

use super::{run_pipeline_unit, EventMode, UnitScope};
use crate::benchmark::PartialBenchmark;
use crate::error::Result;

/// Event ids of latency runs start here.
pub const EVENT_ID_BASE: u64 = 1000;

/// Run the whole pipeline once per iteration on the first sample of each
/// parameter: `warmup_iterations` untimed passes, then measured passes until
/// at least two iterations ran and the measured region covered the requested
/// minimum wall time. Returns the last iteration's decoded output.
pub fn run(
    bench: &mut PartialBenchmark,
    data: &TestData,
    sink: &mut dyn ReportSink,
) -> Result<OutputBatch> {
    bench.check_initialized()?;
    let lat = bench.descriptor().cat_params.as_latency();
    let min_test_time_ms = lat.min_test_time_ms.max(bench.config().min_test_time_ms);
    info!(
        warmup = lat.warmup_iterations,
        min_test_time_ms, "latency run"
    );

    for i in 0..lat.warmup_iterations {
        debug!(iteration = i, "warmup");
        run_pipeline_unit(
            bench,
            data,
            UnitScope::FirstSample,
            1,
            sink,
            EventMode::Single("Warmup"),
        )?;
    }

    let start = Instant::now();
    let mut iterations = 0u64;
    let mut last = None;
    loop {
        let out = run_pipeline_unit(
            bench,
            data,
            UnitScope::FirstSample,
            1,
            sink,
            EventMode::PerStep,
        )?;
        iterations += 1;
        last = Some(out);
        if iterations >= 2 && start.elapsed().as_millis() as u64 >= min_test_time_ms {
            break;
        }
    }
    debug!(
        iterations,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "latency run complete"
    );

    Ok(last.expect("at least two iterations ran"))
}
