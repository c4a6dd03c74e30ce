//! Benchmark scaffold owning the backend-side handle lifecycle.

use std::sync::Arc;

use hemark_abi::{Backend, BenchmarkDescriptor, HandleGuard, RawHandle, WorkloadParam};
use hemark_report::{ReportSink, Timer, TimingEvent};
use tracing::{debug, info};

use crate::config::BenchConfig;
use crate::description::{DescriptionToken, MatcherId};
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Partially constructed benchmark: caches the sealed description, owns the
/// backend benchmark handle and allocates event ids.
///
/// Initialization is three-phased - construction, [`init_backend`], then
/// [`post_init`] - and the pipeline refuses to run until all three happened.
///
/// [`init_backend`]: PartialBenchmark::init_backend
/// [`post_init`]: PartialBenchmark::post_init
pub struct PartialBenchmark {
    // Declaration order is drop order: the handle guard must release its
    // backend handle before the engine reference goes away.
    handle: Option<HandleGuard>,
    engine: Arc<Engine>,
    h_desc: RawHandle,
    descriptor: BenchmarkDescriptor,
    w_params: Vec<WorkloadParam>,
    config: BenchConfig,
    current_event_id: u64,
    initialized: bool,
}

impl PartialBenchmark {
    /// Phase one: unseal the token (rejecting a foreign matcher identity)
    /// and cache the description.
    pub(crate) fn new(
        engine: Arc<Engine>,
        caller: MatcherId,
        token: &DescriptionToken,
    ) -> Result<Self> {
        let parts = token.unseal(caller)?;
        Ok(Self {
            engine,
            handle: None,
            h_desc: parts.h_desc,
            descriptor: *parts.descriptor,
            w_params: parts.w_params.to_vec(),
            config: *parts.config,
            current_event_id: 0,
            initialized: false,
        })
    }

    /// Phase two: create the backend-side benchmark, timing the call.
    pub fn init_backend(&mut self, sink: &mut dyn ReportSink) -> Result<()> {
        info!("initializing backend benchmark");
        let timer = Timer::start();
        let raw = self
            .engine
            .backend()
            .init_benchmark(self.h_desc, &self.w_params)?;
        let (wall_ns, cpu_ns) = timer.stop();
        self.handle = Some(HandleGuard::new(self.engine.backend_arc(), raw));

        let id = self.next_event_id();
        sink.add_event(
            TimingEvent {
                id,
                wall_ns,
                cpu_ns,
                iterations: 1,
            },
            "Initialization",
        );
        debug!(wall_ms = wall_ns / 1_000_000, "backend benchmark ready");
        Ok(())
    }

    /// Phase three: rebase event ids onto the category's block and arm the
    /// pipeline.
    pub fn post_init(&mut self, event_id_base: u64) {
        self.current_event_id = event_id_base;
        self.initialized = true;
    }

    /// Fails until every init phase has run.
    pub fn check_initialized(&self) -> Result<()> {
        if self.initialized && self.handle.is_some() {
            Ok(())
        } else {
            Err(Error::PreconditionFailed(
                "pipeline invoked before initialization completed; \
                 required order is new, init_backend, post_init"
                    .into(),
            ))
        }
    }

    /// Allocate the next event id.
    pub fn next_event_id(&mut self) -> u64 {
        self.current_event_id += 1;
        self.current_event_id
    }

    /// The backend benchmark handle.
    pub fn handle(&self) -> Result<RawHandle> {
        self.handle.as_ref().map(|g| g.raw()).ok_or_else(|| {
            Error::PreconditionFailed("backend benchmark handle not initialized".into())
        })
    }

    pub fn descriptor(&self) -> &BenchmarkDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.engine.backend()
    }

    pub(crate) fn backend_arc(&self) -> Arc<dyn Backend> {
        self.engine.backend_arc()
    }
}

#[cfg(test)]
mod tests {
    use hemark_abi::{Category, CategoryParams, DataType, Workload};
    use hemark_data::rng;
    use hemark_report::CsvReport;

    use super::*;
    use crate::description::{
        seal_token, BenchmarkDescription, DotProductDescription, EltwiseDescription,
    };
    use crate::test_support::{MockBackend, MockBenchmark};

    fn fixture() -> (Arc<Engine>, BenchmarkDescriptor, RawHandle) {
        let descriptor = BenchmarkDescriptor {
            workload: Workload::DotProduct,
            category: Category::Latency,
            data_type: DataType::Float64,
            cipher_param_mask: 0b11,
            scheme: 1,
            security: 2,
            other: 0,
            cat_params: CategoryParams::latency(0, 1),
        };
        let mock = Arc::new(MockBackend::new(vec![MockBenchmark {
            descriptor,
            default_params: vec![vec![WorkloadParam::U64(4)]],
        }]));
        let engine = Engine::new(mock);
        let h_desc = engine.backend().list_benchmarks().unwrap()[0];
        (engine, descriptor, h_desc)
    }

    #[test]
    fn token_of_one_matcher_rejects_another_class() {
        let (engine, descriptor, h_desc) = fixture();
        let dot = DotProductDescription::new();
        let eltwise = EltwiseDescription::add();
        let token = seal_token(
            &dot,
            engine.backend(),
            h_desc,
            descriptor,
            vec![WorkloadParam::U64(4)],
            crate::config::Config::default().bench_config(),
            "DotProduct 4".into(),
        );

        assert!(matches!(
            PartialBenchmark::new(Arc::clone(&engine), eltwise.matcher_id(), &token),
            Err(Error::PreconditionFailed(_))
        ));
        assert!(PartialBenchmark::new(engine, dot.matcher_id(), &token).is_ok());
    }

    #[test]
    fn pipeline_refuses_to_run_before_post_init() {
        let _guard = rng::lock_for_tests();
        rng::seed(1);
        let (engine, descriptor, h_desc) = fixture();
        let dot = DotProductDescription::new();
        let config = crate::config::Config::default().bench_config();
        let token = seal_token(
            &dot,
            engine.backend(),
            h_desc,
            descriptor,
            vec![WorkloadParam::U64(4)],
            config,
            "DotProduct 4".into(),
        );
        let data = dot
            .generate_data(&descriptor, &[WorkloadParam::U64(4)], &config)
            .unwrap();

        let mut bench = PartialBenchmark::new(engine, dot.matcher_id(), &token).unwrap();
        let mut sink = CsvReport::new();

        // not initialized at all
        assert!(matches!(
            crate::drivers::latency::run(&mut bench, &data, &mut sink),
            Err(Error::PreconditionFailed(_))
        ));

        // backend handle exists but post_init has not run
        bench.init_backend(&mut sink).unwrap();
        assert!(bench.check_initialized().is_err());

        bench.post_init(crate::drivers::latency::EVENT_ID_BASE);
        assert!(bench.check_initialized().is_ok());
        assert!(crate::drivers::latency::run(&mut bench, &data, &mut sink).is_ok());
    }
}
