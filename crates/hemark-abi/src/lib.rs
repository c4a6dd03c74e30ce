//! Backend ABI for the hemark benchmarking harness.
//!
//! A backend is a shared library exporting a fixed C function table. This
//! crate owns the `repr(C)` wire types, loads the function table via
//! `libloading`, and wraps everything behind the typed [`Backend`] trait so
//! the rest of the harness never touches a raw pointer.

mod api;
mod backend;
mod error;
mod types;

pub use api::Api;
pub use backend::{Backend, HandleGuard, SharedLibBackend};
pub use error::{AbiError, BackendError};
pub use types::{
    BenchmarkDescriptor, Category, CategoryParams, DataType, ErrorCode, LatencyParams,
    OfflineParams, ParamPosition, RawDataBuffer, RawDataPack, RawPackCollection, RawHandle,
    RawBenchmarkDescriptor, RawCategoryParams, RawWorkloadParam, RawWorkloadParamValue,
    RawWorkloadParams, Workload, WorkloadParam, WorkloadParamKind, CODE_OK, MAX_CATEGORY_PARAMS,
    MAX_OP_PARAMS,
};
