use crate::tensors::Tensor;
use core::cell::RefCell;
use std::rc::Rc;

/// What a parameter is used for inside its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamRole {
    /// Multiplicative weight matrix.
    Weight,
    /// Additive bias vector.
    Bias,
}

/// A trainable tensor paired with its accumulated gradient.
///
/// `grad` always has the same shape as `value`. Backward passes add into it;
/// whoever owns the training step is expected to zero it between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    role: ParamRole,
    trainable: bool,
    /// Current parameter values.
    pub value: Tensor,
    /// Gradient accumulated since the last reset.
    pub grad: Tensor,
}

/// Parameter handle shared between a layer and the optimizer updating it.
///
/// No lock guards it: the layer writes gradients during backward, the
/// optimizer writes values between steps, and the two never overlap.
pub type SharedParam = Rc<RefCell<Parameter>>;

impl Parameter {
    /// Allocates a zero-filled parameter and matching gradient.
    pub fn zeros(shape: impl Into<Vec<usize>>, role: ParamRole, trainable: bool) -> Self {
        let value = Tensor::zeros(shape);
        let grad = Tensor::zeros(value.shape.clone());
        Self {
            role,
            trainable,
            value,
            grad,
        }
    }

    /// Wraps the parameter in a shareable handle.
    #[must_use]
    pub fn into_shared(self) -> SharedParam {
        Rc::new(RefCell::new(self))
    }

    /// The role tag given at registration.
    #[must_use]
    pub const fn role(&self) -> ParamRole {
        self.role
    }

    /// Whether an optimizer should update this parameter.
    #[must_use]
    pub const fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Shape of the value (and gradient) tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.value.shape
    }

    /// Replaces the values, keeping the gradient untouched.
    ///
    /// # Panics
    /// Panics if `value` does not have the parameter's shape.
    pub fn set_value(&mut self, value: Tensor) {
        self.value.update(value);
    }

    /// Resets the accumulated gradient to zero.
    pub fn zero_grad(&mut self) {
        self.grad.fill_zero();
    }
}
