//! Default CPU kernels of the fully-connected layer.
//!
//! # CPU Backend
//!
//! Every supported backend currently resolves to these kernels.
//!
//! ## Features
//!
//! - Parallel execution over batch rows (forward, input gradient) and weight
//!   rows (weight gradient) using [`rayon`](https://docs.rs/rayon), when the
//!   context asks for it
//! - Optional AVX2/FMA dot products (enabled via the `simd` feature flag)
//! - Pure Rust fallback path when SIMD is disabled or unavailable
//!
//! ## Layout
//!
//! - Weight: `[out_size, in_size]`, row `o` holds the weights of output unit `o`
//! - Bias: `[out_size]`
//! - Samples: any tensor whose trailing dimension is the feature count
//!
//! ## Determinism
//!
//! Each output element is reduced by exactly one task in a fixed order, so
//! parallel and sequential runs produce bit-identical results.

use super::{BoundContext, OpKernel, OpKernelConstruction, TensorIo};
use crate::params::FullyParams;
use crate::tensors::{Tensor, TensorFloat};
use rayon::prelude::*;
use std::sync::Arc;

/// Forward kernel: `y = x · Wᵗ + b` for every sample.
#[derive(Debug, Clone)]
pub struct FullyConnectedOp {
    params: Arc<FullyParams>,
}

impl FullyConnectedOp {
    /// Builds the kernel for the layer described by `ctx`.
    #[must_use]
    pub fn new(ctx: &OpKernelConstruction) -> Self {
        Self {
            params: Arc::clone(&ctx.params),
        }
    }
}

impl OpKernel for FullyConnectedOp {
    fn name(&self) -> &'static str {
        "fully_connected"
    }

    fn compute(&self, ctx: BoundContext<'_>) {
        let parallelize = ctx.parallelize();
        let parameters = ctx.parameters();
        let TensorIo::Forward { in_data, out_data } = ctx.into_io() else {
            unreachable!("forward kernel bound to backward buffers");
        };

        let weight = parameters[0].borrow();
        let bias = self.params.has_bias().then(|| parameters[1].borrow());

        forward(
            &self.params,
            &in_data[0],
            &weight.value,
            bias.as_ref().map(|b| &b.value),
            &mut out_data[0],
            parallelize,
        );
    }
}

/// Backward kernel: parameter gradients and the input gradient.
#[derive(Debug, Clone)]
pub struct FullyConnectedGradOp {
    params: Arc<FullyParams>,
}

impl FullyConnectedGradOp {
    /// Builds the kernel for the layer described by `ctx`.
    #[must_use]
    pub fn new(ctx: &OpKernelConstruction) -> Self {
        Self {
            params: Arc::clone(&ctx.params),
        }
    }
}

impl OpKernel for FullyConnectedGradOp {
    fn name(&self) -> &'static str {
        "fully_connected_grad"
    }

    fn compute(&self, ctx: BoundContext<'_>) {
        let parallelize = ctx.parallelize();
        let parameters = ctx.parameters();
        let TensorIo::Backward {
            in_data,
            out_grad,
            in_grad,
            ..
        } = ctx.into_io()
        else {
            unreachable!("backward kernel bound to forward buffers");
        };

        // gradients only ever grow here; the optimizer resets them
        let mut weight = parameters[0].borrow_mut();
        let weight = &mut *weight;
        backward_input(
            &self.params,
            &weight.value,
            &out_grad[0],
            &mut in_grad[0],
            parallelize,
        );
        accumulate_weight_grad(
            &self.params,
            &in_data[0],
            &out_grad[0],
            &mut weight.grad,
            parallelize,
        );

        if self.params.has_bias() {
            let mut bias = parameters[1].borrow_mut();
            accumulate_bias_grad(&self.params, &out_grad[0], &mut bias.grad);
        }
    }
}

/// Writes `y[r] = W · x[r] + b` for every sample row `r` of `x`.
///
/// Buffers are assumed to be shaped as the descriptor says; only their data
/// is touched.
pub fn forward(
    params: &FullyParams,
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    y: &mut Tensor,
    parallelize: bool,
) {
    let n_in = params.in_size();
    let x = x.data.as_slice();
    let w = weight.data.as_slice();
    let b = bias.map(|b| b.data.as_slice());

    for_each_row(parallelize, &mut y.data, params.out_size(), |r, out_row| {
        let in_row = &x[r * n_in..(r + 1) * n_in];
        for (o, y) in out_row.iter_mut().enumerate() {
            let w_row = &w[o * n_in..(o + 1) * n_in];
            *y = dot(in_row, w_row) + b.map_or(0.0, |b| b[o]);
        }
    });
}

/// Writes `dx[r] = Wᵗ · dy[r]` for every sample row `r`.
///
/// The previous contents of `dx` are discarded.
pub fn backward_input(
    params: &FullyParams,
    weight: &Tensor,
    dy: &Tensor,
    dx: &mut Tensor,
    parallelize: bool,
) {
    let (n_in, n_out) = (params.in_size(), params.out_size());
    let w = weight.data.as_slice();
    let dy = dy.data.as_slice();

    for_each_row(parallelize, &mut dx.data, n_in, |r, dx_row| {
        dx_row.fill(0.0);
        for (o, &g) in dy[r * n_out..(r + 1) * n_out].iter().enumerate() {
            axpy(g, &w[o * n_in..(o + 1) * n_in], dx_row);
        }
    });
}

/// Adds `Σ_r outer(dy[r], x[r])` into `dw`.
///
/// Each element's batch sum is formed first and added once, so repeating the
/// same call doubles the gradient exactly.
pub fn accumulate_weight_grad(
    params: &FullyParams,
    x: &Tensor,
    dy: &Tensor,
    dw: &mut Tensor,
    parallelize: bool,
) {
    let (n_in, n_out) = (params.in_size(), params.out_size());
    let x = x.data.as_slice();
    let dy = dy.data.as_slice();
    let batch = dy.len() / n_out;

    for_each_row(parallelize, &mut dw.data, n_in, |o, dw_row| {
        for (i, acc) in dw_row.iter_mut().enumerate() {
            let sum: TensorFloat = (0..batch).map(|r| dy[r * n_out + o] * x[r * n_in + i]).sum();
            *acc += sum;
        }
    });
}

/// Adds `Σ_r dy[r]` into `db`.
pub fn accumulate_bias_grad(params: &FullyParams, dy: &Tensor, db: &mut Tensor) {
    let n_out = params.out_size();
    let dy = dy.data.as_slice();
    let batch = dy.len() / n_out;

    for (o, acc) in db.data.iter_mut().enumerate() {
        let sum: TensorFloat = (0..batch).map(|r| dy[r * n_out + o]).sum();
        *acc += sum;
    }
}

/// Runs `f(index, row)` over consecutive `width`-sized rows of `data`.
fn for_each_row<F>(parallelize: bool, data: &mut [TensorFloat], width: usize, f: F)
where
    F: Fn(usize, &mut [TensorFloat]) + Send + Sync,
{
    if parallelize {
        data.par_chunks_mut(width)
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    } else {
        data.chunks_mut(width)
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    }
}

/// `y += alpha * x`
#[inline]
fn axpy(alpha: TensorFloat, x: &[TensorFloat], y: &mut [TensorFloat]) {
    for (y, &x) in y.iter_mut().zip(x) {
        *y += alpha * x;
    }
}

#[inline]
#[cfg(not(all(
    feature = "simd",
    target_arch = "x86_64",
    target_feature = "avx2",
    target_feature = "fma"
)))]
fn dot(a: &[TensorFloat], b: &[TensorFloat]) -> TensorFloat {
    a.iter().zip(b).map(|(&a, &b)| a * b).sum()
}

#[inline]
#[cfg(all(
    feature = "simd",
    target_arch = "x86_64",
    target_feature = "avx2",
    target_feature = "fma"
))]
#[allow(unsafe_code, unused_unsafe)]
fn dot(a: &[TensorFloat], b: &[TensorFloat]) -> TensorFloat {
    use core::arch::x86_64::{
        _mm256_fmadd_ps, _mm256_loadu_ps, _mm256_setzero_ps, _mm256_storeu_ps,
    };

    const LANES: usize = 8;
    let len = a.len().min(b.len());
    let mut idx = 0;

    // SAFETY: avx2 and fma are enabled at compile time and every load reads
    // `LANES` elements that lie within both slices.
    let mut acc = unsafe { _mm256_setzero_ps() };
    while idx + LANES <= len {
        unsafe {
            let va = _mm256_loadu_ps(a.as_ptr().add(idx));
            let vb = _mm256_loadu_ps(b.as_ptr().add(idx));
            acc = _mm256_fmadd_ps(va, vb, acc);
        }
        idx += LANES;
    }

    let mut lanes = [0.0; LANES];
    unsafe { _mm256_storeu_ps(lanes.as_mut_ptr(), acc) };
    let mut sum: TensorFloat = lanes.iter().sum();

    for l in idx..len {
        sum += a[l] * b[l];
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    fn params(in_size: usize, out_size: usize, bias: bool) -> FullyParams {
        FullyParams::new(in_size, out_size, bias).unwrap()
    }

    #[test]
    fn forward_matches_hand_computed_values() {
        let p = params(3, 2, true);
        let x = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let w = tensor!([[1.0, 0.0, -1.0], [0.5, 0.5, 0.5]]);
        let b = tensor!([10.0, -1.0]);
        let mut y = Tensor::zeros(vec![2, 2]);

        forward(&p, &x, &w, Some(&b), &mut y, false);

        assert_eq!(y.data, vec![8.0, 2.0, 8.0, 6.5]);
    }

    #[test]
    fn forward_without_bias_ignores_missing_tensor() {
        let p = params(2, 1, false);
        let x = tensor!([3.0, 4.0]);
        let w = tensor!([[2.0, 1.0]]);
        let mut y = Tensor::zeros(vec![1]);
        forward(&p, &x, &w, None, &mut y, true);
        assert_eq!(y.data, vec![10.0]);
    }

    #[test]
    fn backward_input_overwrites_previous_contents() {
        let p = params(2, 2, false);
        let w = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let dy = tensor!([[1.0, 1.0]]);
        let mut dx = tensor!([[100.0, 100.0]]);
        backward_input(&p, &w, &dy, &mut dx, false);
        assert_eq!(dx.data, vec![4.0, 6.0]);
    }

    #[test]
    fn weight_and_bias_gradients_sum_over_batch() {
        let p = params(2, 2, true);
        let x = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let dy = tensor!([[1.0, 0.0], [0.0, 2.0]]);
        let mut dw = Tensor::zeros(vec![2, 2]);
        let mut db = Tensor::zeros(vec![2]);

        accumulate_weight_grad(&p, &x, &dy, &mut dw, true);
        accumulate_bias_grad(&p, &dy, &mut db);

        // row o of dW is Σ_r dy[r][o] * x[r]
        assert_eq!(dw.data, vec![1.0, 2.0, 6.0, 8.0]);
        assert_eq!(db.data, vec![1.0, 2.0]);
    }

    #[test]
    fn parallel_and_sequential_rows_agree() {
        let p = params(17, 5, true);
        let x = Tensor::new(
            vec![6, 17],
            (0..102).map(|i| (i as TensorFloat * 0.37).sin()).collect(),
        );
        let w = Tensor::new(
            vec![5, 17],
            (0..85).map(|i| (i as TensorFloat * 0.11).cos()).collect(),
        );
        let b = Tensor::new(vec![5], vec![0.1, 0.2, 0.3, 0.4, 0.5]);

        let mut seq = Tensor::zeros(vec![6, 5]);
        let mut par = Tensor::zeros(vec![6, 5]);
        forward(&p, &x, &w, Some(&b), &mut seq, false);
        forward(&p, &x, &w, Some(&b), &mut par, true);
        assert_eq!(seq, par);
    }

    #[test]
    fn dot_handles_tails_shorter_than_a_register() {
        let a: Vec<TensorFloat> = (1..=11).map(|i| i as TensorFloat).collect();
        let b = vec![1.0; 11];
        assert_eq!(dot(&a, &b), 66.0);
    }
}
