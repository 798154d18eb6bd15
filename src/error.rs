//! Error type shared by every fallible operation of the crate.
//!
//! Only construction and reconfiguration can fail. Forward and backward
//! passes trust the caller to supply correctly shaped buffers.

use crate::backend::Backend;

/// Errors raised while building or reconfiguring a layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The layer has no kernels for the requested backend.
    #[error("not supported engine: {0}")]
    UnsupportedBackend(Backend),

    /// A backend name did not match any known backend.
    #[error("unknown backend name: {0:?}")]
    UnknownBackend(String),

    /// Layer dimensions must both be non-zero.
    #[error("invalid layer shape: in_size {in_size}, out_size {out_size} (both must be > 0)")]
    InvalidShape {
        /// Requested number of input features.
        in_size: usize,
        /// Requested number of output features.
        out_size: usize,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
