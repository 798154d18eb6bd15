//! Layer configuration records.
//!
//! [`FullyParams`] is the validated descriptor kernels read from, while
//! [`LayerParams`] and [`FullyConnectedParams`] are the user-facing knobs
//! accepted by the layer constructors.

use crate::backend::{Backend, get_backend};
use crate::error::{Error, Result};
use briny::prelude::{TrustedData, Validate, ValidationError};

/// Shape descriptor of a fully-connected layer.
///
/// Immutable once built; kernels hold it behind an `Arc` so that rebuilding a
/// layer's kernels never leaves one pointing at a stale copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullyParams {
    in_size: usize,
    out_size: usize,
    has_bias: bool,
}

impl Validate for FullyParams {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if self.in_size == 0 || self.out_size == 0 {
            return Err(ValidationError);
        }
        Ok(())
    }
}

impl FullyParams {
    /// Builds a descriptor, rejecting zero-sized dimensions.
    ///
    /// # Errors
    /// Returns [`Error::InvalidShape`] if either size is zero.
    pub fn new(in_size: usize, out_size: usize, has_bias: bool) -> Result<Self> {
        let raw = Self {
            in_size,
            out_size,
            has_bias,
        };
        TrustedData::new(raw)
            .map(|trusted| trusted.into_inner())
            .map_err(|_| Error::InvalidShape { in_size, out_size })
    }

    /// Number of input features.
    #[must_use]
    pub const fn in_size(&self) -> usize {
        self.in_size
    }

    /// Number of output features.
    #[must_use]
    pub const fn out_size(&self) -> usize {
        self.out_size
    }

    /// Whether a bias vector is added to the output.
    #[must_use]
    pub const fn has_bias(&self) -> bool {
        self.has_bias
    }

    /// Element count of the weight matrix (`out_size * in_size`).
    #[must_use]
    pub const fn weight_len(&self) -> usize {
        self.out_size * self.in_size
    }
}

/// Options shared by every layer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerParams {
    /// Allow kernels to split work across worker threads.
    pub parallelize: bool,
    /// Engine the layer's kernels are selected for.
    pub backend: Backend,
}

impl Default for LayerParams {
    /// Parallel execution on the current global default backend.
    fn default() -> Self {
        Self {
            parallelize: true,
            backend: get_backend(),
        }
    }
}

/// Options of a fully-connected layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullyConnectedParams {
    /// Options common to all layers.
    pub layer: LayerParams,
    /// Whether to add a trainable bias to the output.
    pub bias: bool,
}

impl Default for FullyConnectedParams {
    fn default() -> Self {
        Self {
            layer: LayerParams::default(),
            bias: true,
        }
    }
}

impl FullyConnectedParams {
    /// Sets the parallelize flag.
    #[must_use]
    pub const fn parallelize(mut self, parallelize: bool) -> Self {
        self.layer.parallelize = parallelize;
        self
    }

    /// Sets the backend.
    #[must_use]
    pub const fn backend(mut self, backend: Backend) -> Self {
        self.layer.backend = backend;
        self
    }

    /// Enables or disables the bias term.
    #[must_use]
    pub const fn bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }
}
