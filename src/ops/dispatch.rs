//! Kernel selection.
//!
//! Maps a [`Backend`] to the forward/backward kernel pair a fully-connected
//! layer runs with. Selection happens once, when a layer is built or rebound
//! to another backend, never per call.
//!
//! # Supported Backends
//!
//! | Backend    | Kernels                                            |
//! |------------|----------------------------------------------------|
//! | `Internal` | [`FullyConnectedOp`] / [`FullyConnectedGradOp`]    |
//! | `Avx`      | same (the `simd` feature vectorizes them)          |
//! | `Nnpack`   | same                                               |
//! | others     | rejected with [`Error::UnsupportedBackend`]        |

use super::cpu::{FullyConnectedGradOp, FullyConnectedOp};
use super::{OpKernel, OpKernelConstruction};
use crate::backend::Backend;
use crate::error::{Error, Result};
use tracing::debug;

/// A forward and a backward kernel built for the same layer and backend.
pub struct KernelPair {
    /// Kernel run by forward propagation.
    pub forward: Box<dyn OpKernel>,
    /// Kernel run by back propagation.
    pub backward: Box<dyn OpKernel>,
}

impl core::fmt::Debug for KernelPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelPair")
            .field("forward", &self.forward.name())
            .field("backward", &self.backward.name())
            .finish()
    }
}

/// Whether fully-connected kernels exist for `backend`.
#[must_use]
pub const fn is_supported(backend: Backend) -> bool {
    matches!(backend, Backend::Internal | Backend::Avx | Backend::Nnpack)
}

/// Builds the kernel pair of a fully-connected layer for `backend`.
///
/// # Errors
/// Returns [`Error::UnsupportedBackend`] when no kernels exist for `backend`;
/// nothing is constructed in that case.
pub fn select_kernels(backend: Backend, ctx: &OpKernelConstruction) -> Result<KernelPair> {
    let pair = match backend {
        Backend::Internal | Backend::Avx | Backend::Nnpack => KernelPair {
            forward: Box::new(FullyConnectedOp::new(ctx)),
            backward: Box::new(FullyConnectedGradOp::new(ctx)),
        },
        Backend::LibDnn | Backend::OpenCl | Backend::Cblas | Backend::IntelMkl => {
            return Err(Error::UnsupportedBackend(backend));
        }
    };

    debug!(
        %backend,
        device = %ctx.device,
        in_size = ctx.params.in_size(),
        out_size = ctx.params.out_size(),
        forward = pair.forward.name(),
        backward = pair.backward.name(),
        "selected fully-connected kernels"
    );
    Ok(pair)
}
