//! Layer abstractions.
//!
//! [`Layer`] is the contract a graph container drives: shape queries for
//! graph-level shape inference, forward and backward entry points, and access
//! to the trainable parameters. [`LayerBase`] holds the state every layer kind
//! shares (device, backend, parallelize flag, registered parameters) so that
//! concrete layers only add their descriptor and kernels.

mod fully_connected;
mod parameter;

pub use self::fully_connected::FullyConnectedLayer;
pub use self::parameter::{ParamRole, Parameter, SharedParam};

use crate::backend::Backend;
use crate::ops::Device;
use crate::params::LayerParams;
use crate::tensors::{Shape3d, Tensor};

/// A node of the execution graph.
pub trait Layer {
    /// Number of input features consumed per sample.
    fn fan_in_size(&self) -> usize;

    /// Number of output features produced per sample.
    fn fan_out_size(&self) -> usize;

    /// Shapes of the input tensors, one entry per input.
    fn in_shape(&self) -> Vec<Shape3d>;

    /// Shapes of the output tensors, one entry per output.
    fn out_shape(&self) -> Vec<Shape3d>;

    /// Identity string used for introspection and serialization.
    fn layer_type(&self) -> &'static str;

    /// Trainable parameters, in registration order.
    fn parameters(&self) -> &[SharedParam];

    /// Computes `out_data` from `in_data`.
    fn forward_propagation(&mut self, in_data: &[Tensor], out_data: &mut [Tensor]);

    /// Propagates `out_grad` back into `in_grad` and the parameter gradients.
    fn back_propagation(
        &mut self,
        in_data: &[Tensor],
        out_data: &[Tensor],
        out_grad: &[Tensor],
        in_grad: &mut [Tensor],
    );

    /// Total element count of one sample's inputs.
    fn in_data_size(&self) -> usize {
        self.in_shape().iter().map(Shape3d::size).sum()
    }

    /// Total element count of one sample's outputs.
    fn out_data_size(&self) -> usize {
        self.out_shape().iter().map(Shape3d::size).sum()
    }

    /// Zeroes the accumulated gradient of every parameter.
    fn zero_grads(&self) {
        for p in self.parameters() {
            p.borrow_mut().zero_grad();
        }
    }
}

/// State shared by every layer kind.
#[derive(Debug)]
pub struct LayerBase {
    device: Device,
    backend: Backend,
    parallelize: bool,
    params: Vec<SharedParam>,
}

impl LayerBase {
    /// Creates a base with no parameters, bound to the host CPU.
    #[must_use]
    pub fn new(options: LayerParams) -> Self {
        Self {
            device: Device::cpu(),
            backend: options.backend,
            parallelize: options.parallelize,
            params: Vec::new(),
        }
    }

    /// Registers a zero-initialized parameter and returns its handle.
    pub fn add_parameter(
        &mut self,
        shape: impl Into<Vec<usize>>,
        role: ParamRole,
        trainable: bool,
    ) -> SharedParam {
        let param = Parameter::zeros(shape, role, trainable).into_shared();
        self.params.push(param.clone());
        param
    }

    /// Registered parameters, in registration order.
    #[must_use]
    pub fn parameters(&self) -> &[SharedParam] {
        &self.params
    }

    /// Device kernels are built for.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// Backend kernels are selected for.
    #[must_use]
    pub const fn engine(&self) -> Backend {
        self.backend
    }

    /// Records the backend; callers rebuild their kernels.
    pub fn set_backend_type(&mut self, backend: Backend) {
        self.backend = backend;
    }

    /// Whether kernels may use worker threads.
    #[must_use]
    pub const fn parallelize(&self) -> bool {
        self.parallelize
    }

    /// Allows or forbids worker threads on subsequent calls.
    pub fn set_parallelize(&mut self, parallelize: bool) {
        self.parallelize = parallelize;
    }
}
