//! # Kernel Dispatch Layer
//!
//! Layers never run arithmetic themselves. At construction they ask
//! [`dispatch::select_kernels`] for a forward and a backward [`OpKernel`] that
//! match their backend, keep the pair for their whole lifetime, and on every
//! call hand the chosen kernel a [`BoundContext`] describing the buffers of
//! that call.
//!
//! ## Submodules
//!
//! - [`context`] — Reusable per-direction execution context
//! - [`dispatch`] — Backend to kernel-pair selection
//! - [`cpu`] — Default kernels (`rayon` rows, optional AVX2 dot products)
//!
//! ## Adding a backend
//!
//! 1. Implement [`OpKernel`] for a forward and a backward type
//! 2. Map the backend to them in [`dispatch::select_kernels`]
//!
//! Layers pick up the new kernels without any change to their own code.
//!
//! ## Feature Flags
//!
//! - `simd` — AVX2/FMA dot products in the default kernels

pub mod context;
pub mod cpu;
pub mod dispatch;

pub use self::context::{BoundContext, OpKernelContext, TensorIo};

use crate::params::FullyParams;
use core::fmt;
use std::sync::Arc;

/// Kind of hardware a layer is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceKind {
    /// Host CPU.
    #[default]
    Cpu,
    /// Discrete or integrated GPU.
    Gpu,
}

/// Hardware binding handed to kernels at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Device {
    /// Hardware kind.
    pub kind: DeviceKind,
    /// Index of the device among those of the same kind.
    pub id: usize,
}

impl Device {
    /// The first host CPU.
    #[must_use]
    pub const fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            id: 0,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Cpu => write!(f, "cpu:{}", self.id),
            DeviceKind::Gpu => write!(f, "gpu:{}", self.id),
        }
    }
}

/// Everything a kernel may capture when it is built.
#[derive(Debug, Clone)]
pub struct OpKernelConstruction {
    /// Device the owning layer is bound to.
    pub device: Device,
    /// Shape descriptor of the owning layer.
    pub params: Arc<FullyParams>,
}

impl OpKernelConstruction {
    /// Bundles a device with the layer descriptor.
    #[must_use]
    pub const fn new(device: Device, params: Arc<FullyParams>) -> Self {
        Self { device, params }
    }
}

/// A forward or backward computation bound to one layer.
///
/// Kernels are built once and invoked many times; each invocation receives a
/// context whose buffers belong to that invocation only.
pub trait OpKernel {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Runs the kernel on the buffers and hints carried by `ctx`.
    ///
    /// Results are written into the output (or gradient) buffers of `ctx`;
    /// nothing is returned and no buffer is resized.
    fn compute(&self, ctx: BoundContext<'_>);
}
