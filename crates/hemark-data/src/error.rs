//! Data-layer error types.

use hemark_abi::DataType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to allocate {bytes} bytes for the data arena")]
    AllocationFailed { bytes: usize },

    #[error("buffer {index} has zero size")]
    ZeroSizeBuffer { index: usize },

    #[error("data type {} is not supported by the {workload} generator", data_type.name())]
    UnsupportedDataType {
        workload: &'static str,
        data_type: DataType,
    },

    #[error("sample space is empty: every parameter needs a nonzero batch size")]
    EmptySampleSpace,
}
