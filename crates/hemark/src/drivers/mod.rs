//! Category drivers.
//!
//! Both categories run the same pipeline shape per workload unit; they differ
//! in what a unit covers (one sample vs the whole batch) and in their
//! termination rule. The shared unit lives here; the drivers schedule it.

pub mod latency;
pub mod offline;

use hemark_abi::{HandleGuard, ParamPosition};
use hemark_data::{OutputBatch, TestData};
use hemark_report::{ReportSink, Timer, TimingEvent};

use crate::benchmark::PartialBenchmark;
use crate::cancel;
use crate::error::Result;

/// How much of the input batch one pipeline unit consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnitScope {
    /// The first sample of every parameter.
    FirstSample,
    /// The entire Cartesian batch.
    FullBatch,
}

/// How the unit reports itself.
#[derive(Clone, Copy)]
pub(crate) enum EventMode {
    /// One timing event per pipeline step.
    PerStep,
    /// A single event covering the whole unit (used for warmups).
    Single(&'static str),
}

/// Run one unit of the fixed pipeline:
/// encode -> encrypt (mask-selected positions) -> load -> operate ->
/// store -> decrypt (iff any input is ciphertext) -> decode.
///
/// Cancellation is honored between steps; the in-flight backend call always
/// returns first. Intermediate handles are destroyed when the unit ends.
pub(crate) fn run_pipeline_unit(
    bench: &mut PartialBenchmark,
    data: &TestData,
    scope: UnitScope,
    operate_iterations: u64,
    sink: &mut dyn ReportSink,
    mode: EventMode,
) -> Result<OutputBatch> {
    bench.check_initialized()?;
    cancel::check()?;

    let backend = bench.backend_arc();
    let h_bench = bench.handle()?;
    let param_count = data.input_count();
    // Mask bits beyond the op arity are ignored.
    let arity_mask = if param_count >= 32 {
        u32::MAX
    } else {
        (1u32 << param_count) - 1
    };
    let mask = bench.descriptor().cipher_param_mask & arity_mask;
    let single = scope == UnitScope::FirstSample;

    let unit_timer = Timer::start();
    let per_step = matches!(mode, EventMode::PerStep);
    let mut emit = |bench: &mut PartialBenchmark, timer: &Timer, iterations: u64, label: &str| {
        if per_step {
            let (wall_ns, cpu_ns) = timer.stop();
            let id = bench.next_event_id();
            sink.add_event(
                TimingEvent {
                    id,
                    wall_ns,
                    cpu_ns,
                    iterations,
                },
                label,
            );
        }
    };

    // encode: one call per op parameter so positions stay addressable
    let timer = Timer::start();
    let mut encoded: Vec<HandleGuard> = Vec::with_capacity(param_count);
    for param in 0..param_count {
        let mut packs = data.param_packs(param, single);
        let raw = backend.encode(h_bench, &packs.collection())?;
        encoded.push(HandleGuard::new(backend.clone(), raw));
    }
    emit(bench, &timer, 1, "Encoding");
    cancel::check()?;

    // encrypt exactly the mask-selected positions
    let mut cipher_guards: Vec<HandleGuard> = Vec::new();
    let mut locals: Vec<hemark_abi::RawHandle> = Vec::with_capacity(param_count);
    if mask != 0 {
        let timer = Timer::start();
        for (param, plain) in encoded.iter().enumerate() {
            if mask & (1 << param) != 0 {
                let raw = backend.encrypt(h_bench, plain.raw())?;
                let guard = HandleGuard::new(backend.clone(), raw);
                locals.push(guard.raw());
                cipher_guards.push(guard);
            } else {
                locals.push(plain.raw());
            }
        }
        emit(bench, &timer, 1, "Encryption");
        cancel::check()?;
    } else {
        locals.extend(encoded.iter().map(|g| g.raw()));
    }

    // load onto the backend's target device
    let timer = Timer::start();
    let remote = HandleGuard::new(backend.clone(), backend.load(h_bench, &locals)?);
    emit(bench, &timer, 1, "Loading");
    cancel::check()?;

    // operate: the measured step
    let positions: Vec<ParamPosition> = (0..param_count)
        .map(|param| ParamPosition {
            value_index: 0,
            batch_size: if single {
                1
            } else {
                data.space().batch_size(param)
            },
        })
        .collect();
    let timer = Timer::start();
    let remote_result = HandleGuard::new(
        backend.clone(),
        backend.operate(h_bench, remote.raw(), &positions)?,
    );
    emit(bench, &timer, operate_iterations, "Operation");
    cancel::check()?;

    // store back from the device
    let timer = Timer::start();
    let stored = HandleGuard::new(backend.clone(), backend.store(h_bench, remote_result.raw())?);
    emit(bench, &timer, 1, "Store");
    cancel::check()?;

    // decrypt iff the result is ciphertext (any ciphertext input makes it so)
    let result_plain = if mask != 0 {
        let timer = Timer::start();
        let guard = HandleGuard::new(backend.clone(), backend.decrypt(h_bench, stored.raw())?);
        emit(bench, &timer, 1, "Decryption");
        cancel::check()?;
        guard
    } else {
        stored
    };

    // decode into harness-owned staging buffers
    let timer = Timer::start();
    let mut out = match scope {
        UnitScope::FirstSample => OutputBatch::new_single(data)?,
        UnitScope::FullBatch => OutputBatch::new_like(data)?,
    };
    let mut raw_out = out.raw_packs();
    let mut collection = raw_out.collection();
    backend.decode(h_bench, result_plain.raw(), &mut collection)?;
    emit(bench, &timer, 1, "Decoding");

    if let EventMode::Single(label) = mode {
        let (wall_ns, cpu_ns) = unit_timer.stop();
        let id = bench.next_event_id();
        sink.add_event(
            TimingEvent {
                id,
                wall_ns,
                cpu_ns,
                iterations: 1,
            },
            label,
        );
    }

    Ok(out)
}
