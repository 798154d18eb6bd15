use super::{Layer, LayerBase, ParamRole, SharedParam};
use crate::backend::Backend;
use crate::error::Result;
use crate::ops::dispatch::{KernelPair, select_kernels};
use crate::ops::{Device, OpKernelConstruction, OpKernelContext, TensorIo};
use crate::params::{FullyConnectedParams, FullyParams, LayerParams};
use crate::tensors::{Shape3d, Tensor};
use std::sync::Arc;
use tracing::{debug, trace};

/// Dense layer computing `y = x · Wᵗ + b`.
///
/// The weight has shape `[out_size, in_size]`, the optional bias `[out_size]`.
/// Both are registered as trainable parameters and start at zero; filling them
/// is up to the caller's initialization policy.
///
/// The forward and backward kernels are chosen once from the backend and
/// reused for every call. Backward adds into the parameter gradients, so they
/// have to be zeroed between training steps (see [`Layer::zero_grads`]).
///
/// # Example
///
/// ```rust
/// use fc_core::backend::Backend;
/// use fc_core::layers::{FullyConnectedLayer, Layer};
/// use fc_core::tensor;
/// use fc_core::tensors::Tensor;
///
/// let mut fc = FullyConnectedLayer::new(2, 2, true, Backend::Internal)?;
/// fc.weight().borrow_mut().set_value(tensor!([[1.0, 0.0], [0.0, 1.0]]));
///
/// let mut out = [Tensor::zeros(vec![1, 2])];
/// fc.forward_propagation(&[tensor!([[3.0, 4.0]])], &mut out);
/// assert_eq!(out[0].data, vec![3.0, 4.0]);
/// # Ok::<(), fc_core::error::Error>(())
/// ```
#[derive(Debug)]
pub struct FullyConnectedLayer {
    base: LayerBase,
    params: Arc<FullyParams>,
    fwd_ctx: OpKernelContext,
    bwd_ctx: OpKernelContext,
    kernels: KernelPair,
}

impl FullyConnectedLayer {
    /// Builds a layer with parallel kernels for `backend`.
    ///
    /// # Errors
    /// - [`Error::UnsupportedBackend`](crate::error::Error::UnsupportedBackend)
    ///   if the layer has no kernels for `backend`
    /// - [`Error::InvalidShape`](crate::error::Error::InvalidShape) if either
    ///   size is zero
    pub fn new(in_size: usize, out_size: usize, bias: bool, backend: Backend) -> Result<Self> {
        let options = FullyConnectedParams {
            layer: LayerParams {
                parallelize: true,
                backend,
            },
            bias,
        };
        Self::with_params(in_size, out_size, options)
    }

    /// Builds a layer with a bias on the global default backend.
    ///
    /// # Errors
    /// Same as [`FullyConnectedLayer::new`].
    pub fn with_defaults(in_size: usize, out_size: usize) -> Result<Self> {
        Self::with_params(in_size, out_size, FullyConnectedParams::default())
    }

    /// Builds a layer from a configuration record.
    ///
    /// Kernels are selected before any parameter is allocated, so a rejected
    /// backend leaves nothing behind.
    ///
    /// # Errors
    /// Same as [`FullyConnectedLayer::new`].
    pub fn with_params(
        in_size: usize,
        out_size: usize,
        options: FullyConnectedParams,
    ) -> Result<Self> {
        let params = Arc::new(FullyParams::new(in_size, out_size, options.bias)?);
        let mut base = LayerBase::new(options.layer);

        let construction = OpKernelConstruction::new(base.device(), Arc::clone(&params));
        let kernels = select_kernels(base.engine(), &construction)?;

        base.add_parameter(vec![out_size, in_size], ParamRole::Weight, true);
        if options.bias {
            base.add_parameter(vec![out_size], ParamRole::Bias, true);
        }

        Ok(Self {
            base,
            params,
            fwd_ctx: OpKernelContext::new(),
            bwd_ctx: OpKernelContext::new(),
            kernels,
        })
    }

    /// Takes over `other`'s descriptor, parameters and contexts, and builds
    /// fresh kernels against them instead of reusing `other`'s.
    #[must_use]
    pub fn from_moved(other: Self) -> Self {
        let Self {
            base,
            params,
            fwd_ctx,
            bwd_ctx,
            kernels,
        } = other;

        let construction = OpKernelConstruction::new(base.device(), Arc::clone(&params));
        // `other` was built with this backend, so selection cannot fail here
        let kernels = select_kernels(base.engine(), &construction).unwrap_or(kernels);
        debug!(backend = %base.engine(), "rebuilt fully-connected kernels after move");

        Self {
            base,
            params,
            fwd_ctx,
            bwd_ctx,
            kernels,
        }
    }

    /// Rebinds the layer to another backend, replacing both kernels.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedBackend`](crate::error::Error::UnsupportedBackend)
    /// and keeps the current backend and kernels if `backend` is not supported.
    pub fn set_backend(&mut self, backend: Backend) -> Result<()> {
        let construction = OpKernelConstruction::new(self.base.device(), Arc::clone(&self.params));
        self.kernels = select_kernels(backend, &construction)?;
        debug!(from = %self.base.engine(), to = %backend, "fully-connected backend changed");
        self.base.set_backend_type(backend);
        Ok(())
    }

    /// Allows or forbids worker threads inside the kernels.
    pub fn set_parallelize(&mut self, parallelize: bool) {
        self.base.set_parallelize(parallelize);
    }

    /// Whether kernels may use worker threads.
    #[must_use]
    pub const fn parallelize(&self) -> bool {
        self.base.parallelize()
    }

    /// Backend the kernels were selected for.
    #[must_use]
    pub const fn engine(&self) -> Backend {
        self.base.engine()
    }

    /// Device the kernels were built for.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.base.device()
    }

    /// Shape descriptor of the layer.
    #[must_use]
    pub fn descriptor(&self) -> &FullyParams {
        &self.params
    }

    /// Handle to the weight parameter (`[out_size, in_size]`).
    #[must_use]
    pub fn weight(&self) -> &SharedParam {
        &self.base.parameters()[0]
    }

    /// Handle to the bias parameter (`[out_size]`), if the layer has one.
    #[must_use]
    pub fn bias(&self) -> Option<&SharedParam> {
        self.params
            .has_bias()
            .then(|| &self.base.parameters()[1])
    }
}

impl Layer for FullyConnectedLayer {
    fn fan_in_size(&self) -> usize {
        self.params.in_size()
    }

    fn fan_out_size(&self) -> usize {
        self.params.out_size()
    }

    fn in_shape(&self) -> Vec<Shape3d> {
        vec![Shape3d::new(self.params.in_size(), 1, 1)]
    }

    fn out_shape(&self) -> Vec<Shape3d> {
        vec![Shape3d::new(self.params.out_size(), 1, 1)]
    }

    fn layer_type(&self) -> &'static str {
        "fully-connected"
    }

    fn parameters(&self) -> &[SharedParam] {
        self.base.parameters()
    }

    fn forward_propagation(&mut self, in_data: &[Tensor], out_data: &mut [Tensor]) {
        debug_assert_eq!(in_data[0].features(), self.params.in_size());
        debug_assert_eq!(out_data[0].features(), self.params.out_size());

        self.fwd_ctx.set_parallelize(self.base.parallelize());
        self.fwd_ctx.set_engine(self.base.engine());
        self.fwd_ctx.set_parameters(self.base.parameters());
        trace!(
            batch = in_data.first().map_or(0, Tensor::batch_size),
            parallelize = self.base.parallelize(),
            "fully-connected forward"
        );

        let ctx = self.fwd_ctx.set_in_out(TensorIo::Forward { in_data, out_data });
        self.kernels.forward.compute(ctx);
    }

    fn back_propagation(
        &mut self,
        in_data: &[Tensor],
        out_data: &[Tensor],
        out_grad: &[Tensor],
        in_grad: &mut [Tensor],
    ) {
        debug_assert_eq!(out_grad[0].features(), self.params.out_size());
        debug_assert_eq!(in_grad[0].features(), self.params.in_size());

        self.bwd_ctx.set_parallelize(self.base.parallelize());
        self.bwd_ctx.set_engine(self.base.engine());
        self.bwd_ctx.set_parameters(self.base.parameters());
        trace!(
            batch = out_grad.first().map_or(0, Tensor::batch_size),
            parallelize = self.base.parallelize(),
            "fully-connected backward"
        );

        let ctx = self.bwd_ctx.set_in_out(TensorIo::Backward {
            in_data,
            out_data,
            out_grad,
            in_grad,
        });
        self.kernels.backward.compute(ctx);
    }
}
