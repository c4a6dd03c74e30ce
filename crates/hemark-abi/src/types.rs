//! Wire types shared with backend libraries.
//!
//! Raw `repr(C)` structs cross the ABI; their typed counterparts are built by
//! validated conversion at the edge and used everywhere else.

use std::ffi::c_void;

use crate::error::AbiError;

/// Maximum number of operation parameters a workload may declare.
pub const MAX_OP_PARAMS: usize = 32;

/// Number of raw words in the category-parameter block.
pub const MAX_CATEGORY_PARAMS: usize = 32;

/// Backend return code. Zero is success; anything else is an error whose
/// description is fetched through `getLastErrorDescription`.
pub type ErrorCode = i32;

/// The success return code.
pub const CODE_OK: ErrorCode = 0;

/// Opaque backend handle: pointer, size and tag are owned and interpreted by
/// the backend only.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawHandle {
    pub p: *mut c_void,
    pub size: u64,
    pub tag: i64,
}

impl RawHandle {
    /// The all-zero handle, used before a backend fills one in.
    pub const fn null() -> Self {
        Self {
            p: std::ptr::null_mut(),
            size: 0,
            tag: 0,
        }
    }
}

/// A single buffer exchanged with the backend: pointer, byte size, and an
/// opaque tag the backend may use to refer to the buffer later.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawDataBuffer {
    pub p: *mut c_void,
    pub size: u64,
    pub tag: i64,
}

/// A batch of buffers holding samples for one operation parameter slot.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawDataPack {
    pub buffers: *mut RawDataBuffer,
    pub buffer_count: u64,
    pub param_position: u64,
}

/// A collection of data packs handed to `encode`/filled by `decode`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawPackCollection {
    pub packs: *mut RawDataPack,
    pub pack_count: u64,
}

/// Sample window for one operation parameter during `operate`: the first
/// sample index and how many consecutive samples to consume.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamPosition {
    pub value_index: u64,
    pub batch_size: u64,
}

/// Raw benchmark self-description as written by the backend.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawBenchmarkDescriptor {
    pub workload: u32,
    pub category: u32,
    pub data_type: u32,
    pub cipher_param_mask: u32,
    pub scheme: i32,
    pub security: i32,
    pub other: i64,
    pub cat_params: RawCategoryParams,
}

/// Category parameters as a raw word block. Interpretation depends on the
/// descriptor's category; the words themselves also feed the report path.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawCategoryParams {
    pub reserved: [u64; MAX_CATEGORY_PARAMS],
}

/// Raw tagged workload parameter value.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawWorkloadParamValue {
    pub u: u64,
    pub i: i64,
    pub f: f64,
}

/// Raw tagged workload parameter.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawWorkloadParam {
    pub kind: u32,
    pub value: RawWorkloadParamValue,
}

/// Workload parameter vector handed to `initBenchmark`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawWorkloadParams {
    pub params: *const RawWorkloadParam,
    pub count: u64,
}

// ============================================================================
// Typed views
// ============================================================================

/// Workloads the harness knows how to benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Workload {
    EltwiseAdd,
    EltwiseMult,
    DotProduct,
    MatrixMultiply,
    LogisticRegression,
    LogisticRegressionPolyD3,
    LogisticRegressionPolyD5,
    LogisticRegressionPolyD7,
}

impl Workload {
    /// Wire value of this workload.
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::EltwiseAdd => 0,
            Self::EltwiseMult => 1,
            Self::DotProduct => 2,
            Self::MatrixMultiply => 3,
            Self::LogisticRegression => 4,
            Self::LogisticRegressionPolyD3 => 5,
            Self::LogisticRegressionPolyD5 => 6,
            Self::LogisticRegressionPolyD7 => 7,
        }
    }

    /// Parse a wire value.
    pub const fn try_from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::EltwiseAdd),
            1 => Some(Self::EltwiseMult),
            2 => Some(Self::DotProduct),
            3 => Some(Self::MatrixMultiply),
            4 => Some(Self::LogisticRegression),
            5 => Some(Self::LogisticRegressionPolyD3),
            6 => Some(Self::LogisticRegressionPolyD5),
            7 => Some(Self::LogisticRegressionPolyD7),
            _ => None,
        }
    }
}

/// Benchmark category: per-sample latency or whole-batch throughput.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Latency,
    Offline,
}

impl Category {
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Latency => 0,
            Self::Offline => 1,
        }
    }

    pub const fn try_from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Latency),
            1 => Some(Self::Offline),
            _ => None,
        }
    }

    /// Display name, also used as a path segment.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Latency => "Latency",
            Self::Offline => "Offline",
        }
    }
}

/// Element type of every buffer in a benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DataType {
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Int32 => 0,
            Self::Int64 => 1,
            Self::Float32 => 2,
            Self::Float64 => 3,
        }
    }

    pub const fn try_from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Int32),
            1 => Some(Self::Int64),
            2 => Some(Self::Float32),
            3 => Some(Self::Float64),
            _ => None,
        }
    }

    /// Display name, also used as a path segment.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
        }
    }

    /// Size in bytes of one element.
    pub const fn size_of(self) -> usize {
        match self {
            Self::Int32 => 4,
            Self::Int64 => 8,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// Tag of a workload parameter value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadParamKind {
    UInt64,
    Int64,
    Float64,
}

/// A typed workload parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorkloadParam {
    U64(u64),
    I64(i64),
    F64(f64),
}

impl WorkloadParam {
    pub const fn kind(self) -> WorkloadParamKind {
        match self {
            Self::U64(_) => WorkloadParamKind::UInt64,
            Self::I64(_) => WorkloadParamKind::Int64,
            Self::F64(_) => WorkloadParamKind::Float64,
        }
    }

    pub fn as_raw(self) -> RawWorkloadParam {
        match self {
            Self::U64(u) => RawWorkloadParam {
                kind: 0,
                value: RawWorkloadParamValue { u },
            },
            Self::I64(i) => RawWorkloadParam {
                kind: 1,
                value: RawWorkloadParamValue { i },
            },
            Self::F64(f) => RawWorkloadParam {
                kind: 2,
                value: RawWorkloadParamValue { f },
            },
        }
    }

    pub fn try_from_raw(raw: &RawWorkloadParam) -> Option<Self> {
        // The union read is sound for any bit pattern of these field types.
        unsafe {
            match raw.kind {
                0 => Some(Self::U64(raw.value.u)),
                1 => Some(Self::I64(raw.value.i)),
                2 => Some(Self::F64(raw.value.f)),
                _ => None,
            }
        }
    }
}

impl std::fmt::Display for WorkloadParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U64(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
        }
    }
}

/// Latency-category parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatencyParams {
    pub warmup_iterations: u64,
    pub min_test_time_ms: u64,
}

/// Offline-category parameters: requested sample count per op parameter,
/// zero meaning "use the configured default".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OfflineParams {
    pub data_count: [u64; MAX_OP_PARAMS],
}

/// Category parameters with the raw word block preserved.
///
/// The words double as latency or offline values depending on the category,
/// and the raw block feeds the canonical report path, so both views are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryParams {
    words: [u64; MAX_CATEGORY_PARAMS],
}

impl CategoryParams {
    pub const fn from_raw(raw: &RawCategoryParams) -> Self {
        Self {
            words: raw.reserved,
        }
    }

    /// Build latency parameters.
    pub fn latency(warmup_iterations: u64, min_test_time_ms: u64) -> Self {
        let mut words = [0u64; MAX_CATEGORY_PARAMS];
        words[0] = warmup_iterations;
        words[1] = min_test_time_ms;
        Self { words }
    }

    /// Build offline parameters from per-parameter sample counts.
    pub fn offline(data_count: &[u64]) -> Self {
        let mut words = [0u64; MAX_CATEGORY_PARAMS];
        words[..data_count.len()].copy_from_slice(data_count);
        Self { words }
    }

    pub const fn as_latency(&self) -> LatencyParams {
        LatencyParams {
            warmup_iterations: self.words[0],
            min_test_time_ms: self.words[1],
        }
    }

    pub const fn as_offline(&self) -> OfflineParams {
        OfflineParams {
            data_count: self.words,
        }
    }

    /// Raw words, in wire order.
    pub const fn words(&self) -> &[u64; MAX_CATEGORY_PARAMS] {
        &self.words
    }

    pub const fn as_raw(&self) -> RawCategoryParams {
        RawCategoryParams {
            reserved: self.words,
        }
    }
}

/// Validated benchmark descriptor.
#[derive(Clone, Copy, Debug)]
pub struct BenchmarkDescriptor {
    pub workload: Workload,
    pub category: Category,
    pub data_type: DataType,
    pub cipher_param_mask: u32,
    pub scheme: i32,
    pub security: i32,
    pub other: i64,
    pub cat_params: CategoryParams,
}

impl BenchmarkDescriptor {
    /// Validate a raw descriptor. Unknown enum values are rejected here so
    /// nothing downstream ever sees an out-of-range discriminant.
    pub fn from_raw(raw: &RawBenchmarkDescriptor) -> Result<Self, AbiError> {
        let workload = Workload::try_from_raw(raw.workload).ok_or(AbiError::InvalidDescriptor {
            what: "workload",
            value: raw.workload,
        })?;
        let category = Category::try_from_raw(raw.category).ok_or(AbiError::InvalidDescriptor {
            what: "category",
            value: raw.category,
        })?;
        let data_type =
            DataType::try_from_raw(raw.data_type).ok_or(AbiError::InvalidDescriptor {
                what: "data type",
                value: raw.data_type,
            })?;
        Ok(Self {
            workload,
            category,
            data_type,
            cipher_param_mask: raw.cipher_param_mask,
            scheme: raw.scheme,
            security: raw.security,
            other: raw.other,
            cat_params: CategoryParams::from_raw(&raw.cat_params),
        })
    }

    pub fn as_raw(&self) -> RawBenchmarkDescriptor {
        RawBenchmarkDescriptor {
            workload: self.workload.as_raw(),
            category: self.category.as_raw(),
            data_type: self.data_type.as_raw(),
            cipher_param_mask: self.cipher_param_mask,
            scheme: self.scheme,
            security: self.security,
            other: self.other,
            cat_params: self.cat_params.as_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_raw_round_trip() {
        for raw in 0..8 {
            let w = Workload::try_from_raw(raw).unwrap();
            assert_eq!(w.as_raw(), raw);
        }
        assert_eq!(Workload::try_from_raw(8), None);
    }

    #[test]
    fn descriptor_rejects_unknown_values() {
        let mut raw = RawBenchmarkDescriptor {
            workload: 2,
            category: 0,
            data_type: 3,
            cipher_param_mask: 0b11,
            scheme: 1,
            security: 2,
            other: 0,
            cat_params: RawCategoryParams {
                reserved: [0; MAX_CATEGORY_PARAMS],
            },
        };
        assert!(BenchmarkDescriptor::from_raw(&raw).is_ok());

        raw.category = 7;
        assert!(BenchmarkDescriptor::from_raw(&raw).is_err());
    }

    #[test]
    fn category_params_views() {
        let lat = CategoryParams::latency(3, 50);
        assert_eq!(
            lat.as_latency(),
            LatencyParams {
                warmup_iterations: 3,
                min_test_time_ms: 50
            }
        );
        assert_eq!(lat.words()[0], 3);

        let off = CategoryParams::offline(&[2, 3]);
        assert_eq!(off.as_offline().data_count[0], 2);
        assert_eq!(off.as_offline().data_count[1], 3);
        assert_eq!(off.as_offline().data_count[2], 0);
    }

    #[test]
    fn workload_param_raw_round_trip() {
        for p in [
            WorkloadParam::U64(42),
            WorkloadParam::I64(-7),
            WorkloadParam::F64(0.5),
        ] {
            let raw = p.as_raw();
            assert_eq!(WorkloadParam::try_from_raw(&raw), Some(p));
        }
        let bad = RawWorkloadParam {
            kind: 9,
            value: RawWorkloadParamValue { u: 0 },
        };
        assert_eq!(WorkloadParam::try_from_raw(&bad), None);
    }
}
