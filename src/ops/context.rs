//! Execution context handed to kernels.
//!
//! A layer keeps one [`OpKernelContext`] per direction and refreshes it on
//! every call: the hint setters overwrite the parallelize flag, engine and
//! parameter list, and [`OpKernelContext::set_in_out`] binds the caller's
//! buffers into a [`BoundContext`]. The bound context borrows those buffers,
//! so it cannot outlive the call that created it and a kernel can never see
//! buffers from an earlier call.

use crate::backend::Backend;
use crate::layers::SharedParam;
use crate::tensors::Tensor;

/// Buffers of a single kernel invocation.
#[derive(Debug)]
pub enum TensorIo<'a> {
    /// Inputs to read and outputs to fill.
    Forward {
        /// Input samples.
        in_data: &'a [Tensor],
        /// Pre-allocated outputs.
        out_data: &'a mut [Tensor],
    },
    /// Forward buffers plus the gradients flowing through the layer.
    Backward {
        /// Inputs of the matching forward call.
        in_data: &'a [Tensor],
        /// Outputs of the matching forward call.
        out_data: &'a [Tensor],
        /// Gradient of the loss w.r.t. the outputs.
        out_grad: &'a [Tensor],
        /// Pre-allocated gradient of the loss w.r.t. the inputs.
        in_grad: &'a mut [Tensor],
    },
}

/// Reusable hint storage of one direction (forward or backward).
#[derive(Debug, Default)]
pub struct OpKernelContext {
    parallelize: bool,
    engine: Backend,
    parameters: Vec<SharedParam>,
}

impl OpKernelContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the kernel may use worker threads.
    pub fn set_parallelize(&mut self, parallelize: bool) {
        self.parallelize = parallelize;
    }

    /// Sets the backend the call runs on.
    pub fn set_engine(&mut self, engine: Backend) {
        self.engine = engine;
    }

    /// Replaces the parameter list, reusing the existing allocation.
    pub fn set_parameters(&mut self, parameters: &[SharedParam]) {
        self.parameters.clear();
        self.parameters.extend(parameters.iter().cloned());
    }

    /// Binds the buffers of the current call.
    #[must_use]
    pub fn set_in_out<'a>(&'a self, io: TensorIo<'a>) -> BoundContext<'a> {
        BoundContext { hints: self, io }
    }

    /// Whether the kernel may use worker threads.
    #[must_use]
    pub const fn parallelize(&self) -> bool {
        self.parallelize
    }

    /// Backend the call runs on.
    #[must_use]
    pub const fn engine(&self) -> Backend {
        self.engine
    }

    /// Parameters of the layer, in registration order.
    #[must_use]
    pub fn parameters(&self) -> &[SharedParam] {
        &self.parameters
    }
}

/// Hints and buffers of exactly one kernel invocation.
#[derive(Debug)]
pub struct BoundContext<'a> {
    hints: &'a OpKernelContext,
    io: TensorIo<'a>,
}

impl<'a> BoundContext<'a> {
    /// Whether the kernel may use worker threads.
    #[must_use]
    pub const fn parallelize(&self) -> bool {
        self.hints.parallelize
    }

    /// Backend the call runs on.
    #[must_use]
    pub const fn engine(&self) -> Backend {
        self.hints.engine
    }

    /// Parameters of the layer, in registration order.
    #[must_use]
    pub fn parameters(&self) -> &'a [SharedParam] {
        &self.hints.parameters
    }

    /// Borrows the bound buffers.
    #[must_use]
    pub const fn io(&self) -> &TensorIo<'a> {
        &self.io
    }

    /// Gives up the context, keeping only the bound buffers.
    #[must_use]
    pub fn into_io(self) -> TensorIo<'a> {
        self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{ParamRole, Parameter};
    use crate::tensor;

    #[test]
    fn parameters_are_replaced_not_appended() {
        let a = Parameter::zeros(vec![1], ParamRole::Weight, true).into_shared();
        let b = Parameter::zeros(vec![1], ParamRole::Bias, true).into_shared();
        let mut ctx = OpKernelContext::new();
        ctx.set_parameters(&[a.clone(), b]);
        ctx.set_parameters(&[a]);
        assert_eq!(ctx.parameters().len(), 1);
        assert_eq!(ctx.parameters()[0].borrow().role(), ParamRole::Weight);
    }

    #[test]
    fn bound_context_reflects_the_current_call() {
        let mut ctx = OpKernelContext::new();
        ctx.set_parallelize(true);
        ctx.set_engine(Backend::Avx);

        let first = [tensor!([1.0])];
        let mut out = [tensor!([0.0])];
        {
            let bound = ctx.set_in_out(TensorIo::Forward {
                in_data: &first,
                out_data: &mut out,
            });
            assert!(bound.parallelize());
            assert_eq!(bound.engine(), Backend::Avx);
        }

        ctx.set_parallelize(false);
        ctx.set_engine(Backend::Internal);
        let second = [tensor!([2.0])];
        let bound = ctx.set_in_out(TensorIo::Forward {
            in_data: &second,
            out_data: &mut out,
        });
        assert!(!bound.parallelize());
        assert_eq!(bound.engine(), Backend::Internal);
        match bound.into_io() {
            TensorIo::Forward { in_data, .. } => assert_eq!(in_data[0].data, vec![2.0]),
            TensorIo::Backward { .. } => panic!("expected forward buffers"),
        }
    }
}
