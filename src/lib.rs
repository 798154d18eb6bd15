//! # `fc_core`
//!
//! A fully-connected (dense) layer node for layered neural-network execution
//! graphs. The layer computes `y = x · Wᵗ + b` on the forward pass and, given
//! the gradient of its output, accumulates weight and bias gradients and
//! produces the gradient of its input on the backward pass.
//!
//! The arithmetic is not done by the layer itself. A forward and a backward
//! kernel are selected for the layer's backend when it is built, and every call
//! hands the chosen kernel an execution context holding the buffers of that
//! call together with the parallelism hint, backend and live parameters.
//!
//! ## Modules
//!
//! - [`layers`] — The [`layers::Layer`] contract, shared layer state and
//!   [`layers::FullyConnectedLayer`]
//! - [`ops`] — Kernel interface, execution context, kernel selection and the
//!   default CPU kernels (parallel via `rayon`, AVX2 with the `simd` feature)
//! - [`backend`] — Backend enumeration and the global default backend
//! - [`params`] — Shape descriptor and configuration records
//! - [`tensors`] — Tensor buffers and the [`tensor!`] literal macro
//! - [`error`] — The crate's error type
//!
//! ## Example
//!
//! ```rust
//! use fc_core::backend::Backend;
//! use fc_core::layers::{FullyConnectedLayer, Layer};
//! use fc_core::tensors::Tensor;
//!
//! let mut fc = FullyConnectedLayer::new(3, 2, true, Backend::Internal)?;
//! assert_eq!(fc.layer_type(), "fully-connected");
//! assert_eq!(fc.parameters().len(), 2);
//!
//! let input = [Tensor::new(vec![4, 3], vec![1.0; 12])];
//! let mut output = [Tensor::zeros(vec![4, 2])];
//! fc.forward_propagation(&input, &mut output);
//! # Ok::<(), fc_core::error::Error>(())
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::many_single_char_names,
    clippy::cast_precision_loss,
    clippy::similar_names,
    clippy::module_name_repetitions
)]
#![deny(unsafe_code)]
#![forbid(missing_docs)]

pub mod backend;
pub mod error;
pub mod layers;
pub mod ops;
pub mod params;
pub mod tensors;
