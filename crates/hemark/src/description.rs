//! Descriptor matching and sealed benchmark tokens.
//!
//! Every workload family registers one matcher. A matcher inspects a backend
//! descriptor plus a workload-parameter vector and, when it recognizes the
//! combination, produces a [`DescriptionToken`] sealing everything a
//! benchmark needs: the descriptor handle, the matched configuration, the
//! report header and the canonical output path. A token can only be unsealed
//! by a benchmark presenting the identity of the matcher that sealed it,
//! which keeps a descriptor from ever being wired to the wrong benchmark
//! class.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use hemark_abi::{
    Backend, BenchmarkDescriptor, Category, DataType, RawHandle, Workload, WorkloadParam,
    WorkloadParamKind, MAX_OP_PARAMS,
};
use hemark_data::generators::{dotproduct, eltwise, logreg, matmult, EltwiseKind, SigmoidDegree};
use hemark_data::TestData;

use crate::config::BenchConfig;
use crate::error::{Error, Result};
use crate::sanitize::sanitize_segment;

/// Process-unique identity of a matcher instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatcherId(u64);

impl MatcherId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// One workload family's view of backend descriptors.
pub trait BenchmarkDescription {
    fn matcher_id(&self) -> MatcherId;

    /// The human-readable workload name when this matcher supports the
    /// descriptor with these parameters, `None` otherwise.
    fn match_descriptor(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
    ) -> Option<String>;

    /// Generate inputs and ground truth for a matched benchmark.
    fn generate_data(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
        config: &BenchConfig,
    ) -> Result<TestData>;
}

/// Sealed coupling of a matcher, a backend descriptor and its parameters.
pub struct DescriptionToken {
    matcher_id: MatcherId,
    h_desc: RawHandle,
    descriptor: BenchmarkDescriptor,
    w_params: Vec<WorkloadParam>,
    config: BenchConfig,
    workload_name: String,
    header: String,
    path: PathBuf,
}

/// The sealed parts, readable only through [`DescriptionToken::unseal`].
pub(crate) struct Unsealed<'a> {
    pub h_desc: RawHandle,
    pub descriptor: &'a BenchmarkDescriptor,
    pub w_params: &'a [WorkloadParam],
    pub config: &'a BenchConfig,
}

impl DescriptionToken {
    pub fn workload_name(&self) -> &str {
        &self.workload_name
    }

    /// CSV header block describing the benchmark configuration.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Canonical report directory, relative to the report root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn unseal(&self, caller: MatcherId) -> Result<Unsealed<'_>> {
        if caller != self.matcher_id {
            return Err(Error::PreconditionFailed(
                "description token consumed by a benchmark of the wrong class".into(),
            ));
        }
        Ok(Unsealed {
            h_desc: self.h_desc,
            descriptor: &self.descriptor,
            w_params: &self.w_params,
            config: &self.config,
        })
    }
}

/// Seal a token for a matched benchmark, deriving its header and canonical
/// path from the descriptor and the backend's naming.
pub fn seal_token(
    matcher: &dyn BenchmarkDescription,
    backend: &dyn Backend,
    h_desc: RawHandle,
    descriptor: BenchmarkDescriptor,
    w_params: Vec<WorkloadParam>,
    config: BenchConfig,
    workload_name: String,
) -> DescriptionToken {
    let scheme_name = backend.scheme_name(descriptor.scheme);
    let security_name = backend.security_name(descriptor.scheme, descriptor.security);
    let extra = backend.extra_description(h_desc, &w_params);

    let path = canonical_path(
        &descriptor,
        &w_params,
        &workload_name,
        &scheme_name,
        &security_name,
    );
    let header = report_header(
        &descriptor,
        &workload_name,
        &scheme_name,
        &security_name,
        &extra,
    );

    DescriptionToken {
        matcher_id: matcher.matcher_id(),
        h_desc,
        descriptor,
        w_params,
        config,
        workload_name,
        header,
        path,
    }
}

// ============================================================================
// Canonical path and header derivation
// ============================================================================

pub(crate) fn canonical_path(
    descriptor: &BenchmarkDescriptor,
    w_params: &[WorkloadParam],
    workload_name: &str,
    scheme_name: &str,
    security_name: &str,
) -> PathBuf {
    let mut path = PathBuf::new();

    let mut first = String::new();
    if !workload_name.is_empty() {
        first.push_str(workload_name);
        first.push('_');
    }
    let _ = write!(first, "{}", descriptor.workload.as_raw());
    path.push(sanitize_segment(&first));

    let mut wp = String::from("wp");
    for p in w_params {
        let _ = write!(wp, "_{}", p);
    }
    path.push(sanitize_segment(&wp));

    path.push(sanitize_segment(descriptor.category.name()));
    path.push(sanitize_segment(descriptor.data_type.name()));
    path.push(cat_params_segment(descriptor.cat_params.words()));
    path.push(cipher_mask_segment(descriptor.cipher_param_mask));
    path.push(sanitize_segment(scheme_name));
    path.push(sanitize_segment(security_name));
    path.push(sanitize_segment(&descriptor.other.to_string()));

    path
}

/// Concatenated decimal category words with the trailing zero run trimmed,
/// or `default` when every word is zero.
fn cat_params_segment(words: &[u64]) -> String {
    let mut len = words.len();
    while len > 0 && words[len - 1] == 0 {
        len -= 1;
    }
    if len == 0 {
        return "default".into();
    }
    words[..len].iter().map(u64::to_string).collect()
}

/// `all_plain`, `all_cipher`, or a `c`/`p` string up to the highest set bit.
fn cipher_mask_segment(mask: u32) -> String {
    if mask == 0 {
        return "all_plain".into();
    }
    if mask == u32::MAX {
        return "all_cipher".into();
    }
    let highest = 31 - mask.leading_zeros();
    (0..=highest)
        .map(|bit| if mask & (1 << bit) != 0 { 'c' } else { 'p' })
        .collect()
}

fn report_header(
    descriptor: &BenchmarkDescriptor,
    workload_name: &str,
    scheme_name: &str,
    security_name: &str,
    extra: &str,
) -> String {
    let mut h = String::new();
    h.push_str("Specifications,\n");
    h.push_str(", Encryption, \n");
    let _ = writeln!(h, ", , Scheme, {}", scheme_name);
    let _ = writeln!(h, ", , Security, {}", security_name);
    let _ = writeln!(h, ", Extra, {}", descriptor.other);
    if !extra.is_empty() {
        h.push_str(extra);
        if !extra.ends_with('\n') {
            h.push('\n');
        }
    }
    h.push('\n');
    let _ = writeln!(h, ", Category, {}", descriptor.category.name());
    match descriptor.category {
        Category::Latency => {
            let lat = descriptor.cat_params.as_latency();
            let _ = writeln!(h, ", , Warmup iterations, {}", lat.warmup_iterations);
            let _ = writeln!(
                h,
                ", , Minimum test time requested (ms), {}",
                lat.min_test_time_ms
            );
        }
        Category::Offline => {
            let _ = writeln!(h, ", , Parameter, Samples requested");
            let offline = descriptor.cat_params.as_offline();
            let mut all_zero = true;
            for (i, &count) in offline.data_count.iter().enumerate().take(MAX_OP_PARAMS) {
                if count != 0 {
                    all_zero = false;
                    let _ = writeln!(h, ", , {}, {}", i, count);
                }
            }
            if all_zero {
                h.push_str(", , All, 0\n");
            }
        }
    }
    h.push('\n');
    let _ = writeln!(h, ", Workload, {}", workload_name);
    let _ = writeln!(h, ", , Data type, {}", descriptor.data_type.name());
    h.push_str(", , Encrypted op parameters (index)");
    let mask = descriptor.cipher_param_mask;
    if mask == 0 {
        h.push_str(", None\n");
    } else if mask == u32::MAX {
        h.push_str(", All\n");
    } else {
        for bit in 0..32 {
            if mask & (1 << bit) != 0 {
                let _ = write!(h, ", {}", bit);
            }
        }
        h.push('\n');
    }
    h
}

// ============================================================================
// Workload parameter checks shared by the matchers
// ============================================================================

/// Validate arity and tags, returning the `u64` values.
fn fetch_u64_params(w_params: &[WorkloadParam], expected: usize) -> Option<Vec<u64>> {
    if w_params.len() < expected {
        return None;
    }
    let mut values = Vec::with_capacity(expected);
    for p in &w_params[..expected] {
        if p.kind() != WorkloadParamKind::UInt64 {
            return None;
        }
        match p {
            WorkloadParam::U64(v) if *v > 0 => values.push(*v),
            _ => return None,
        }
    }
    Some(values)
}

/// Per-parameter sample counts for a benchmark: one sample each for latency,
/// the requested (or default) batch sizes for offline.
fn sample_sizes(
    descriptor: &BenchmarkDescriptor,
    param_count: usize,
    config: &BenchConfig,
) -> Vec<u64> {
    match descriptor.category {
        Category::Latency => vec![1; param_count],
        Category::Offline => {
            let offline = descriptor.cat_params.as_offline();
            (0..param_count)
                .map(|i| match offline.data_count[i] {
                    0 => config.default_sample_size,
                    requested => requested,
                })
                .collect()
        }
    }
}

// ============================================================================
// Matchers
// ============================================================================

/// Element-wise add/mult benchmarks: one `u64` vector size.
pub struct EltwiseDescription {
    id: MatcherId,
    kind: EltwiseKind,
}

impl EltwiseDescription {
    pub fn add() -> Self {
        Self {
            id: MatcherId::next(),
            kind: EltwiseKind::Add,
        }
    }

    pub fn mult() -> Self {
        Self {
            id: MatcherId::next(),
            kind: EltwiseKind::Mult,
        }
    }

    fn base_name(&self) -> &'static str {
        match self.kind {
            EltwiseKind::Add => "EltwiseAdd",
            EltwiseKind::Mult => "EltwiseMult",
        }
    }
}

impl BenchmarkDescription for EltwiseDescription {
    fn matcher_id(&self) -> MatcherId {
        self.id
    }

    fn match_descriptor(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
    ) -> Option<String> {
        let expected = match self.kind {
            EltwiseKind::Add => Workload::EltwiseAdd,
            EltwiseKind::Mult => Workload::EltwiseMult,
        };
        if descriptor.workload != expected {
            return None;
        }
        let values = fetch_u64_params(w_params, 1)?;
        Some(format!("{} {}", self.base_name(), values[0]))
    }

    fn generate_data(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
        config: &BenchConfig,
    ) -> Result<TestData> {
        let values = fetch_u64_params(w_params, 1).ok_or_else(|| {
            Error::DescriptorMismatch("invalid element-wise workload parameters".into())
        })?;
        let sizes = sample_sizes(descriptor, 2, config);
        Ok(eltwise::generate(
            self.kind,
            values[0],
            sizes[0],
            sizes[1],
            descriptor.data_type,
        )?)
    }
}

/// Dot-product benchmarks: one `u64` vector size.
pub struct DotProductDescription {
    id: MatcherId,
}

impl DotProductDescription {
    pub fn new() -> Self {
        Self {
            id: MatcherId::next(),
        }
    }
}

impl Default for DotProductDescription {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkDescription for DotProductDescription {
    fn matcher_id(&self) -> MatcherId {
        self.id
    }

    fn match_descriptor(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
    ) -> Option<String> {
        if descriptor.workload != Workload::DotProduct {
            return None;
        }
        let values = fetch_u64_params(w_params, 1)?;
        Some(format!("DotProduct {}", values[0]))
    }

    fn generate_data(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
        config: &BenchConfig,
    ) -> Result<TestData> {
        let values = fetch_u64_params(w_params, 1).ok_or_else(|| {
            Error::DescriptorMismatch("invalid dot-product workload parameters".into())
        })?;
        let sizes = sample_sizes(descriptor, 2, config);
        Ok(dotproduct::generate(
            values[0],
            sizes[0],
            sizes[1],
            descriptor.data_type,
        )?)
    }
}

/// Matrix-multiply benchmarks: three `u64` dimensions
/// `(rows_a, cols_a, cols_b)` describing `(rows_a x cols_a) x (cols_a x cols_b)`.
pub struct MatMultDescription {
    id: MatcherId,
}

impl MatMultDescription {
    pub fn new() -> Self {
        Self {
            id: MatcherId::next(),
        }
    }
}

impl Default for MatMultDescription {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkDescription for MatMultDescription {
    fn matcher_id(&self) -> MatcherId {
        self.id
    }

    fn match_descriptor(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
    ) -> Option<String> {
        if descriptor.workload != Workload::MatrixMultiply {
            return None;
        }
        let d = fetch_u64_params(w_params, 3)?;
        Some(format!("MatMul ({}x{}) x ({}x{})", d[0], d[1], d[1], d[2]))
    }

    fn generate_data(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
        config: &BenchConfig,
    ) -> Result<TestData> {
        let d = fetch_u64_params(w_params, 3).ok_or_else(|| {
            Error::DescriptorMismatch("invalid matrix-multiply workload parameters".into())
        })?;
        let sizes = sample_sizes(descriptor, 2, config);
        Ok(matmult::generate(
            d[0],
            d[1],
            d[2],
            sizes[0],
            sizes[1],
            descriptor.data_type,
        )?)
    }
}

/// Logistic-regression benchmarks, covering the exact sigmoid and the three
/// polynomial approximations: one `u64` feature count, float data only.
pub struct LogRegDescription {
    id: MatcherId,
}

impl LogRegDescription {
    pub fn new() -> Self {
        Self {
            id: MatcherId::next(),
        }
    }

    fn degree_of(workload: Workload) -> Option<SigmoidDegree> {
        match workload {
            Workload::LogisticRegression => Some(SigmoidDegree::Exact),
            Workload::LogisticRegressionPolyD3 => Some(SigmoidDegree::D3),
            Workload::LogisticRegressionPolyD5 => Some(SigmoidDegree::D5),
            Workload::LogisticRegressionPolyD7 => Some(SigmoidDegree::D7),
            _ => None,
        }
    }
}

impl Default for LogRegDescription {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkDescription for LogRegDescription {
    fn matcher_id(&self) -> MatcherId {
        self.id
    }

    fn match_descriptor(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
    ) -> Option<String> {
        let degree = Self::degree_of(descriptor.workload)?;
        if !matches!(descriptor.data_type, DataType::Float32 | DataType::Float64) {
            return None;
        }
        let values = fetch_u64_params(w_params, 1)?;
        let variant = match degree {
            SigmoidDegree::Exact => "",
            SigmoidDegree::D3 => "PolyD3 ",
            SigmoidDegree::D5 => "PolyD5 ",
            SigmoidDegree::D7 => "PolyD7 ",
        };
        Some(format!("LogReg {}{} features", variant, values[0]))
    }

    fn generate_data(
        &self,
        descriptor: &BenchmarkDescriptor,
        w_params: &[WorkloadParam],
        config: &BenchConfig,
    ) -> Result<TestData> {
        let degree = Self::degree_of(descriptor.workload).ok_or_else(|| {
            Error::DescriptorMismatch("not a logistic-regression workload".into())
        })?;
        let values = fetch_u64_params(w_params, 1).ok_or_else(|| {
            Error::DescriptorMismatch("invalid logistic-regression workload parameters".into())
        })?;
        let sizes = sample_sizes(descriptor, 3, config);
        Ok(logreg::generate(
            degree,
            values[0],
            sizes[2],
            descriptor.data_type,
        )?)
    }
}

/// The full matcher catalog, in registration order.
pub fn default_matchers() -> Vec<Box<dyn BenchmarkDescription>> {
    vec![
        Box::new(EltwiseDescription::add()),
        Box::new(EltwiseDescription::mult()),
        Box::new(DotProductDescription::new()),
        Box::new(MatMultDescription::new()),
        Box::new(LogRegDescription::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hemark_abi::CategoryParams;

    fn descriptor(workload: Workload, category: Category, data_type: DataType) -> BenchmarkDescriptor {
        BenchmarkDescriptor {
            workload,
            category,
            data_type,
            cipher_param_mask: 0b11,
            scheme: 1,
            security: 2,
            other: 0,
            cat_params: CategoryParams::latency(3, 50),
        }
    }

    #[test]
    fn matmul_canonical_path() {
        let desc = descriptor(Workload::MatrixMultiply, Category::Latency, DataType::Float32);
        let matcher = MatMultDescription::new();
        let w_params = vec![
            WorkloadParam::U64(2),
            WorkloadParam::U64(3),
            WorkloadParam::U64(2),
        ];
        let name = matcher.match_descriptor(&desc, &w_params).unwrap();
        assert_eq!(name, "MatMul (2x3) x (3x2)");

        let path = canonical_path(&desc, &w_params, &name, "bfv", "128 bits");
        let s = path.to_string_lossy();
        assert!(s.starts_with("MatMul_2x3_x_3x2_3/wp_2_3_2/Latency/Float32/"));
        assert!(s.contains("/350/"));
        assert!(s.contains("/cc/"));
        assert!(s.contains("/bfv/128_bits/0"));
    }

    #[test]
    fn canonical_path_is_stable_and_clean() {
        let desc = descriptor(Workload::DotProduct, Category::Offline, DataType::Int64);
        let w_params = vec![WorkloadParam::U64(100)];
        let a = canonical_path(&desc, &w_params, "DotProduct 100", "scheme x", "sec");
        let b = canonical_path(&desc, &w_params, "DotProduct 100", "scheme x", "sec");
        assert_eq!(a, b);
        for segment in a.iter() {
            let s = segment.to_string_lossy();
            assert!(!s.is_empty());
            assert!(
                s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_'),
                "bad segment {:?}",
                s
            );
        }
    }

    #[test]
    fn cipher_mask_segments() {
        assert_eq!(cipher_mask_segment(0), "all_plain");
        assert_eq!(cipher_mask_segment(u32::MAX), "all_cipher");
        assert_eq!(cipher_mask_segment(0b1), "c");
        assert_eq!(cipher_mask_segment(0b10), "pc");
        assert_eq!(cipher_mask_segment(0b101), "cpc");
    }

    #[test]
    fn cat_params_segments() {
        assert_eq!(cat_params_segment(&[0; 4]), "default");
        assert_eq!(cat_params_segment(&[3, 50, 0, 0]), "350");
        assert_eq!(cat_params_segment(&[2, 3]), "23");
    }

    #[test]
    fn arity_and_type_checks() {
        let matcher = DotProductDescription::new();
        let desc = descriptor(Workload::DotProduct, Category::Latency, DataType::Float64);
        assert!(matcher.match_descriptor(&desc, &[]).is_none());
        assert!(matcher
            .match_descriptor(&desc, &[WorkloadParam::I64(4)])
            .is_none());
        assert!(matcher
            .match_descriptor(&desc, &[WorkloadParam::U64(0)])
            .is_none());
        assert_eq!(
            matcher
                .match_descriptor(&desc, &[WorkloadParam::U64(4)])
                .unwrap(),
            "DotProduct 4"
        );

        // wrong workload entirely
        let other = descriptor(Workload::EltwiseAdd, Category::Latency, DataType::Float64);
        assert!(matcher
            .match_descriptor(&other, &[WorkloadParam::U64(4)])
            .is_none());
    }

    #[test]
    fn logreg_requires_floats() {
        let matcher = LogRegDescription::new();
        let params = [WorkloadParam::U64(16)];
        let float_desc = descriptor(
            Workload::LogisticRegressionPolyD3,
            Category::Latency,
            DataType::Float64,
        );
        assert_eq!(
            matcher.match_descriptor(&float_desc, &params).unwrap(),
            "LogReg PolyD3 16 features"
        );
        let int_desc = descriptor(
            Workload::LogisticRegressionPolyD3,
            Category::Latency,
            DataType::Int32,
        );
        assert!(matcher.match_descriptor(&int_desc, &params).is_none());
    }

    #[test]
    fn offline_sample_sizes_fall_back_to_default() {
        let mut desc = descriptor(Workload::EltwiseAdd, Category::Offline, DataType::Int32);
        desc.cat_params = CategoryParams::offline(&[2, 0]);
        let config = crate::config::Config::default().bench_config();
        assert_eq!(sample_sizes(&desc, 2, &config), vec![2, 100]);

        let lat = descriptor(Workload::EltwiseAdd, Category::Latency, DataType::Int32);
        assert_eq!(sample_sizes(&lat, 2, &config), vec![1, 1]);
    }

    #[test]
    fn header_mentions_the_configuration() {
        let desc = descriptor(Workload::DotProduct, Category::Latency, DataType::Float64);
        let header = report_header(&desc, "DotProduct 4", "bfv", "128 bits", "");
        assert!(header.contains(", , Scheme, bfv"));
        assert!(header.contains(", , Security, 128 bits"));
        assert!(header.contains(", Category, Latency"));
        assert!(header.contains(", , Warmup iterations, 3"));
        assert!(header.contains(", , Minimum test time requested (ms), 50"));
        assert!(header.contains(", Workload, DotProduct 4"));
        assert!(header.contains(", , Data type, Float64"));
        assert!(header.contains(", , Encrypted op parameters (index), 0, 1"));
    }

    #[test]
    fn offline_header_lists_sample_requests() {
        let mut desc = descriptor(Workload::EltwiseAdd, Category::Offline, DataType::Int32);
        desc.cat_params = CategoryParams::offline(&[2, 3]);
        desc.cipher_param_mask = 0;
        let header = report_header(&desc, "EltwiseAdd 4", "s", "sec", "");
        assert!(header.contains(", , Parameter, Samples requested"));
        assert!(header.contains(", , 0, 2"));
        assert!(header.contains(", , 1, 3"));
        assert!(header.contains(", , Encrypted op parameters (index), None"));
    }
}
