//! Engine: enumerates backend benchmarks, matches descriptors, runs them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hemark_abi::Backend;
use hemark_data::rng;
use hemark_report::{write_failure, CsvReport, ReportSink};
use tracing::{debug, error, info, warn};

use crate::benchmark::PartialBenchmark;
use crate::cancel;
use crate::config::Config;
use crate::description::{
    default_matchers, seal_token, BenchmarkDescription, DescriptionToken,
};
use crate::drivers;
use crate::error::{Error, Result};
use crate::validator;

/// Owns one backend instance and the matcher catalog for the process
/// lifetime. Benchmarks hold a strong reference back to the engine, so it
/// outlives every one of them.
pub struct Engine {
    backend: Arc<dyn Backend>,
    matchers: Vec<Box<dyn BenchmarkDescription>>,
}

/// One recorded benchmark failure.
#[derive(Debug)]
pub struct BenchmarkFailure {
    pub path: PathBuf,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of an engine run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failures: Vec<BenchmarkFailure>,
}

impl Engine {
    /// Wrap a backend with the default matcher catalog.
    pub fn new(backend: Arc<dyn Backend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            matchers: default_matchers(),
        })
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    pub(crate) fn backend_arc(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Enumerate, match and run every benchmark the backend offers.
    ///
    /// Validation and backend failures are recorded in the summary and the
    /// run continues; configuration and resource errors abort, as does
    /// cancellation.
    pub fn run(self: &Arc<Self>, config: &Config, report_root: &Path) -> Result<RunSummary> {
        let seed = config.resolved_seed();
        rng::seed(seed);
        info!(seed, "seeded global generator");

        let bench_config = config.bench_config();
        let handles = self.backend.list_benchmarks().map_err(Error::from)?;
        info!(count = handles.len(), "backend benchmarks enumerated");

        let mut summary = RunSummary::default();
        for h_desc in handles {
            cancel::check()?;
            let (descriptor, mut default_sets) = match self.backend.describe(h_desc) {
                Ok(v) => v,
                Err(e) => {
                    let err = Error::from(e);
                    error!(error = %err, "describeBenchmark failed, skipping");
                    summary.failures.push(BenchmarkFailure {
                        path: PathBuf::new(),
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                    summary.total += 1;
                    continue;
                }
            };
            if default_sets.is_empty() {
                default_sets.push(Vec::new());
            }

            for w_params in default_sets {
                cancel::check()?;
                let matched = self.matchers.iter().find_map(|matcher| {
                    matcher
                        .match_descriptor(&descriptor, &w_params)
                        .map(|name| (matcher, name))
                });
                let Some((matcher, workload_name)) = matched else {
                    debug!(
                        workload = descriptor.workload.as_raw(),
                        "benchmark not recognized by any matcher, skipped"
                    );
                    continue;
                };

                let token = seal_token(
                    matcher.as_ref(),
                    self.backend(),
                    h_desc,
                    descriptor,
                    w_params,
                    bench_config,
                    workload_name,
                );
                summary.total += 1;

                match self.run_one(matcher.as_ref(), &token, report_root) {
                    Ok(()) => {
                        summary.passed += 1;
                        info!(path = %token.path().display(), "benchmark passed");
                    }
                    Err(err) if err.is_recoverable() => {
                        record_failure(&mut summary, &token, report_root, &err);
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failures.len(),
            "run complete"
        );
        Ok(summary)
    }

    /// Run one matched benchmark and flush its report, even on failure.
    fn run_one(
        self: &Arc<Self>,
        matcher: &dyn BenchmarkDescription,
        token: &DescriptionToken,
        report_root: &Path,
    ) -> Result<()> {
        info!(
            benchmark = token.workload_name(),
            path = %token.path().display(),
            "running benchmark"
        );
        let mut sink = CsvReport::new();
        sink.add_header(token.header());

        let result = self.execute(matcher, token, &mut sink);

        // Flush accumulated events no matter how the run ended.
        let out_dir = report_root.join(token.path());
        if let Err(flush_err) = sink.finalize(&out_dir) {
            warn!(error = %flush_err, "failed to flush report");
            result?;
            return Err(flush_err.into());
        }
        result
    }

    fn execute(
        self: &Arc<Self>,
        matcher: &dyn BenchmarkDescription,
        token: &DescriptionToken,
        sink: &mut CsvReport,
    ) -> Result<()> {
        let mut bench = PartialBenchmark::new(Arc::clone(self), matcher.matcher_id(), token)?;
        let parts = token.unseal(matcher.matcher_id())?;

        // init phase: reference inputs and ground truth
        let data = matcher.generate_data(parts.descriptor, parts.w_params, parts.config)?;
        bench.init_backend(sink)?;

        let category = parts.descriptor.category;
        let (event_base, result_count) = match category {
            hemark_abi::Category::Latency => (drivers::latency::EVENT_ID_BASE, 1),
            hemark_abi::Category::Offline => (
                drivers::offline::EVENT_ID_BASE,
                data.space().result_batch_size(),
            ),
        };
        bench.post_init(event_base);

        let actual = match category {
            hemark_abi::Category::Latency => drivers::latency::run(&mut bench, &data, sink)?,
            hemark_abi::Category::Offline => drivers::offline::run(&mut bench, &data, sink)?,
        };

        validator::validate(&data, &actual, result_count, parts.config)?;
        Ok(())
    }
}

fn record_failure(
    summary: &mut RunSummary,
    token: &DescriptionToken,
    report_root: &Path,
    err: &Error,
) {
    let line = format!(
        "[FAILED] {}: {}: {}",
        token.path().display(),
        err.kind(),
        err
    );
    eprintln!("{}", line);
    error!(path = %token.path().display(), kind = err.kind(), error = %err, "benchmark failed");
    if let Err(write_err) = write_failure(&report_root.join(token.path()), &line) {
        warn!(error = %write_err, "failed to record failure file");
    }
    summary.failures.push(BenchmarkFailure {
        path: token.path().to_path_buf(),
        kind: err.kind(),
        message: err.to_string(),
    });
}
