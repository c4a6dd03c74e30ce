//! ABI-level error types.

use thiserror::Error;

/// Failure reported by a backend call: the nonzero return code plus the
/// backend's last-error description.
#[derive(Debug, Clone, Error)]
#[error("backend error {code}: {message}")]
pub struct BackendError {
    pub code: i32,
    pub message: String,
}

/// Errors raised while loading or talking to a backend library.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("failed to load backend library: {0}")]
    Load(#[from] libloading::Error),

    #[error("backend library not found: {0}")]
    LibraryNotFound(String),

    #[error("failed to find symbol '{0}': {1}")]
    SymbolNotFound(&'static str, libloading::Error),

    #[error("unknown {what} value {value} in benchmark descriptor")]
    InvalidDescriptor { what: &'static str, value: u32 },

    #[error(transparent)]
    Backend(#[from] BackendError),
}
