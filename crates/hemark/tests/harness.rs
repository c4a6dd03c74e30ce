//! End-to-end harness tests against the in-process mock backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use hemark::test_support::{MockBackend, MockBenchmark};
use hemark::{cancel, Config, Engine, Error};
use hemark_abi::{
    BenchmarkDescriptor, Category, CategoryParams, DataType, Workload, WorkloadParam,
};
use hemark_data::rng;

fn latency_benchmark(
    workload: Workload,
    data_type: DataType,
    cipher_param_mask: u32,
    warmup: u64,
    min_test_time_ms: u64,
    params: Vec<WorkloadParam>,
) -> MockBenchmark {
    MockBenchmark {
        descriptor: BenchmarkDescriptor {
            workload,
            category: Category::Latency,
            data_type,
            cipher_param_mask,
            scheme: 1,
            security: 2,
            other: 0,
            cat_params: CategoryParams::latency(warmup, min_test_time_ms),
        },
        default_params: vec![params],
    }
}

fn offline_benchmark(
    workload: Workload,
    data_type: DataType,
    cipher_param_mask: u32,
    data_count: &[u64],
    params: Vec<WorkloadParam>,
) -> MockBenchmark {
    MockBenchmark {
        descriptor: BenchmarkDescriptor {
            workload,
            category: Category::Offline,
            data_type,
            cipher_param_mask,
            scheme: 1,
            security: 2,
            other: 0,
            cat_params: CategoryParams::offline(data_count),
        },
        default_params: vec![params],
    }
}

fn config_with_seed(seed: u64) -> Config {
    let mut config = Config::default();
    config.random_seed = Some(seed);
    config
}

fn read_report(root: &Path, canonical: &str) -> String {
    let path = root.join(canonical).join("report.csv");
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("missing report at {}: {}", path.display(), e))
}

fn count_rows_with_label(report: &str, label: &str) -> usize {
    report
        .lines()
        .filter(|line| {
            let mut fields = line.split(',');
            fields.next().map_or(false, |id| id.parse::<u64>().is_ok())
                && fields.next() == Some(label)
        })
        .count()
}

#[test]
fn end_to_end_run_writes_reports() {
    let _guard = rng::lock_for_tests();
    cancel::reset();

    let mock = Arc::new(MockBackend::new(vec![
        latency_benchmark(
            Workload::EltwiseAdd,
            DataType::Float64,
            0b11,
            1,
            10,
            vec![WorkloadParam::U64(8)],
        ),
        offline_benchmark(
            Workload::EltwiseAdd,
            DataType::Int32,
            0,
            &[2, 3],
            vec![WorkloadParam::U64(4)],
        ),
    ]));
    let engine = Engine::new(mock.clone());
    let root = tempfile::tempdir().unwrap();

    let summary = engine.run(&config_with_seed(42), root.path()).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.passed, 2);
    assert!(summary.failures.is_empty());

    let latency_path = "EltwiseAdd_8_0/wp_8/Latency/Float64/110/cc/MockScheme/128_bits/0";
    let latency_report = read_report(root.path(), latency_path);
    assert!(latency_report.contains(", , Scheme, MockScheme"));
    assert!(count_rows_with_label(&latency_report, "Operation") >= 2);
    assert!(root
        .path()
        .join(latency_path)
        .join("summary.csv")
        .exists());

    let offline_path = "EltwiseAdd_4_0/wp_4/Offline/Int32/23/all_plain/MockScheme/128_bits/0";
    let offline_report = read_report(root.path(), offline_path);
    // exactly one operate event covering the whole 2x3 batch
    assert_eq!(count_rows_with_label(&offline_report, "Operation"), 1);
    assert!(offline_report.contains(",Operation,6,"));

    // every backend handle was destroyed
    assert_eq!(mock.live_handles(), 0);
    assert!(mock.destroyed_handles() > 0);
}

#[test]
fn cipher_mask_selects_encrypted_positions() {
    let _guard = rng::lock_for_tests();
    cancel::reset();

    let mock = Arc::new(MockBackend::new(vec![offline_benchmark(
        Workload::DotProduct,
        DataType::Float64,
        0b01,
        &[2, 2],
        vec![WorkloadParam::U64(4)],
    )]));
    let engine = Engine::new(mock.clone());
    let root = tempfile::tempdir().unwrap();

    let summary = engine.run(&config_with_seed(7), root.path()).unwrap();
    assert_eq!(summary.passed, 1);

    // only parameter 0 carries the cipher bit
    let encrypted = mock.encrypted_positions();
    assert_eq!(encrypted, vec![0]);
    assert_eq!(mock.operate_calls(), vec![4]);
}

#[test]
fn latency_termination_rule() {
    let _guard = rng::lock_for_tests();
    cancel::reset();

    let mock = Arc::new(MockBackend::new(vec![latency_benchmark(
        Workload::EltwiseAdd,
        DataType::Float64,
        0b11,
        3,
        50,
        vec![WorkloadParam::U64(4)],
    )]));
    let engine = Engine::new(mock.clone());
    let root = tempfile::tempdir().unwrap();

    let start = Instant::now();
    let summary = engine.run(&config_with_seed(3), root.path()).unwrap();
    let elapsed_ms = start.elapsed().as_millis();
    assert_eq!(summary.passed, 1);
    assert!(elapsed_ms >= 50, "run finished after {} ms", elapsed_ms);

    let path = "EltwiseAdd_4_0/wp_4/Latency/Float64/350/cc/MockScheme/128_bits/0";
    let report = read_report(root.path(), path);
    assert_eq!(count_rows_with_label(&report, "Warmup"), 3);
    assert!(count_rows_with_label(&report, "Operation") >= 2);
    assert_eq!(count_rows_with_label(&report, "Initialization"), 1);
}

#[test]
fn matmul_offline_round_trip() {
    let _guard = rng::lock_for_tests();
    cancel::reset();

    let mock = Arc::new(MockBackend::new(vec![offline_benchmark(
        Workload::MatrixMultiply,
        DataType::Float32,
        u32::MAX,
        &[2, 2],
        vec![
            WorkloadParam::U64(2),
            WorkloadParam::U64(3),
            WorkloadParam::U64(2),
        ],
    )]));
    let engine = Engine::new(mock.clone());
    let root = tempfile::tempdir().unwrap();

    let summary = engine.run(&config_with_seed(11), root.path()).unwrap();
    assert_eq!(summary.passed, 1);

    let path = root
        .path()
        .join("MatMul_2x3_x_3x2_3/wp_2_3_2/Offline/Float32/22/all_cipher/MockScheme/128_bits/0");
    assert!(path.join("report.csv").exists());
    // both op parameters encrypted, once for the single unit
    assert_eq!(mock.encrypted_positions(), vec![0, 1]);
}

#[test]
fn backend_failure_is_recorded_and_run_continues() {
    let _guard = rng::lock_for_tests();
    cancel::reset();

    let mock = Arc::new(MockBackend::new(vec![
        offline_benchmark(
            Workload::EltwiseAdd,
            DataType::Int32,
            0,
            &[2, 2],
            vec![WorkloadParam::U64(4)],
        ),
        offline_benchmark(
            Workload::EltwiseMult,
            DataType::Int32,
            0,
            &[2, 2],
            vec![WorkloadParam::U64(4)],
        ),
    ]));
    mock.fail_at("operate");
    let engine = Engine::new(mock.clone());
    let root = tempfile::tempdir().unwrap();

    let summary = engine.run(&config_with_seed(5), root.path()).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].kind, "BackendError");
    assert!(summary.failures[0].message.contains("injected failure"));

    // the failed benchmark still flushed its report and recorded the failure
    let failed_dir = root.path().join(&summary.failures[0].path);
    assert!(failed_dir.join("report.csv").exists());
    let failure = std::fs::read_to_string(failed_dir.join("failure.txt")).unwrap();
    assert!(failure.starts_with("[FAILED] "));
    assert!(failure.contains("BackendError"));

    // no handles leaked despite the mid-pipeline failure
    assert_eq!(mock.live_handles(), 0);
}

#[test]
fn unmatched_benchmarks_are_skipped() {
    let _guard = rng::lock_for_tests();
    cancel::reset();

    // logistic regression over integers is not a supported combination
    let mock = Arc::new(MockBackend::new(vec![latency_benchmark(
        Workload::LogisticRegression,
        DataType::Int32,
        0,
        1,
        1,
        vec![WorkloadParam::U64(4)],
    )]));
    let engine = Engine::new(mock);
    let root = tempfile::tempdir().unwrap();

    let summary = engine.run(&config_with_seed(9), root.path()).unwrap();
    assert_eq!(summary.total, 0);
    assert_eq!(summary.passed, 0);
}

#[test]
fn sigint_aborts_the_run() {
    let _guard = rng::lock_for_tests();
    cancel::reset();
    cancel::install_sigint_handler();

    unsafe {
        libc::raise(libc::SIGINT);
    }
    assert!(cancel::cancelled());

    let mock = Arc::new(MockBackend::new(vec![offline_benchmark(
        Workload::EltwiseAdd,
        DataType::Int32,
        0,
        &[2, 2],
        vec![WorkloadParam::U64(4)],
    )]));
    let engine = Engine::new(mock);
    let root = tempfile::tempdir().unwrap();

    let result = engine.run(&config_with_seed(1), root.path());
    assert!(matches!(result, Err(Error::Cancelled)));
    cancel::reset();
}
