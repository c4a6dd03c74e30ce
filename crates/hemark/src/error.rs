//! Harness error taxonomy.

use thiserror::Error;

use crate::validator::ValidationFailure;

/// Harness errors.
///
/// `Validation` and `Backend` are recovered at the engine boundary (the
/// failure is recorded and the next benchmark runs); `Config` and `Resource`
/// are fatal; `PreconditionFailed` indicates a harness bug.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Backend(#[from] hemark_abi::BackendError),

    #[error("descriptor mismatch: {0}")]
    DescriptorMismatch(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("interrupted")]
    Cancelled,
}

impl Error {
    /// Short kind name used in the `[FAILED]` line and the failure file.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Backend(_) => "BackendError",
            Self::DescriptorMismatch(_) => "DescriptorMismatch",
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::Validation(_) => "ValidationError",
            Self::Resource(_) => "ResourceError",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the engine records this failure and keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Backend(_) | Self::Validation(_) | Self::DescriptorMismatch(_)
        )
    }
}

impl From<hemark_abi::AbiError> for Error {
    fn from(err: hemark_abi::AbiError) -> Self {
        match err {
            hemark_abi::AbiError::LibraryNotFound(path) => {
                Self::Config(format!("backend library not found: {}", path))
            }
            hemark_abi::AbiError::Backend(e) => Self::Backend(e),
            other => Self::Backend(hemark_abi::BackendError {
                code: -1,
                message: other.to_string(),
            }),
        }
    }
}

impl From<hemark_data::DataError> for Error {
    fn from(err: hemark_data::DataError) -> Self {
        match err {
            hemark_data::DataError::AllocationFailed { .. } => Self::Resource(err.to_string()),
            hemark_data::DataError::UnsupportedDataType { .. } => {
                Self::DescriptorMismatch(err.to_string())
            }
            other => Self::Resource(other.to_string()),
        }
    }
}

impl From<hemark_report::ReportError> for Error {
    fn from(err: hemark_report::ReportError) -> Self {
        Self::Resource(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
