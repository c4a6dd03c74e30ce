//! Offline driver: one pipeline pass over the entire input batch.

use hemark_data::{OutputBatch, TestData};
use hemark_report::ReportSink;
use tracing::info;

use super::{run_pipeline_unit, EventMode, UnitScope};
use crate::benchmark::PartialBenchmark;
use crate::error::Result;

/// Event ids of offline runs start here.
pub const EVENT_ID_BASE: u64 = 2000;

/// Run the pipeline once across the whole batch. `operate` is invoked a
/// single time; its event records the Cartesian-product result count so
/// throughput can be derived.
pub fn run(
    bench: &mut PartialBenchmark,
    data: &TestData,
    sink: &mut dyn ReportSink,
) -> Result<OutputBatch> {
    bench.check_initialized()?;
    let result_count = data.space().result_batch_size();
    info!(
        batch_sizes = ?data.space().batch_sizes(),
        result_count,
        "offline run"
    );
    run_pipeline_unit(
        bench,
        data,
        UnitScope::FullBatch,
        result_count,
        sink,
        EventMode::PerStep,
    )
}
