use fc_core::backend::Backend;
use fc_core::error::Error;
use fc_core::layers::{FullyConnectedLayer, Layer};
use fc_core::ops::dispatch::is_supported;
use fc_core::params::FullyConnectedParams;
use fc_core::tensor;
use fc_core::tensors::{Tensor, TensorFloat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn random_tensor(rng: &mut StdRng, shape: Vec<usize>) -> Tensor {
    let len: usize = shape.iter().product();
    let data = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
    Tensor::new(shape, data)
}

/// Runs forward then backward on a fresh set of buffers and returns `in_grad`.
fn forward_backward(fc: &mut FullyConnectedLayer, x: &Tensor, dy: &Tensor) -> Tensor {
    let batch = x.batch_size();
    let input = [x.clone()];
    let mut output = [Tensor::zeros(vec![batch, fc.fan_out_size()])];
    fc.forward_propagation(&input, &mut output);

    let mut in_grad = [Tensor::zeros(vec![batch, fc.fan_in_size()])];
    fc.back_propagation(&input, &output, &[dy.clone()], &mut in_grad);
    let [dx] = in_grad;
    dx
}

#[test]
fn identity_weight_passes_input_through() {
    init_logging();
    let n = 4;
    let mut fc = FullyConnectedLayer::new(n, n, true, Backend::Internal).unwrap();

    let mut identity = Tensor::zeros(vec![n, n]);
    for i in 0..n {
        identity.data[i * n + i] = 1.0;
    }
    fc.weight().borrow_mut().set_value(identity);

    let x = tensor!([[0.5, -2.0, 3.25, 7.0]]);
    let mut out = [Tensor::zeros(vec![1, n])];
    fc.forward_propagation(&[x.clone()], &mut out);

    assert_eq!(out[0], x);
}

#[test]
fn zero_weight_yields_bias_for_every_row() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(11);
    let mut fc = FullyConnectedLayer::new(5, 3, true, Backend::Avx).unwrap();
    let b = tensor!([1.5, -0.25, 4.0]);
    fc.bias().unwrap().borrow_mut().set_value(b.clone());

    let x = random_tensor(&mut rng, vec![6, 5]);
    let mut out = [Tensor::zeros(vec![6, 3])];
    fc.forward_propagation(&[x], &mut out);

    for r in 0..6 {
        assert_eq!(out[0].row(r), b.data.as_slice());
    }
}

#[test]
fn unit_output_gradient_selects_a_weight_row() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(3);
    let (n_in, n_out) = (4, 3);

    for k in 0..n_out {
        let mut fc = FullyConnectedLayer::new(n_in, n_out, true, Backend::Internal).unwrap();
        let w = random_tensor(&mut rng, vec![n_out, n_in]);
        fc.weight().borrow_mut().set_value(w.clone());

        let x = random_tensor(&mut rng, vec![1, n_in]);
        let mut dy = Tensor::zeros(vec![1, n_out]);
        dy.data[k] = 1.0;

        let dx = forward_backward(&mut fc, &x, &dy);
        assert_eq!(dx.data, w.row(k));

        let weight = fc.weight().borrow();
        for o in 0..n_out {
            let expected: Vec<TensorFloat> = if o == k {
                x.data.clone()
            } else {
                vec![0.0; n_in]
            };
            assert_eq!(weight.grad.row(o), expected.as_slice(), "row {o} of dW");
        }
        assert_eq!(fc.bias().unwrap().borrow().grad.data, dy.data);
    }
}

#[test]
fn repeated_backward_doubles_gradients() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(42);
    let mut fc = FullyConnectedLayer::new(7, 5, true, Backend::Nnpack).unwrap();
    fc.weight()
        .borrow_mut()
        .set_value(random_tensor(&mut rng, vec![5, 7]));

    let x = random_tensor(&mut rng, vec![3, 7]);
    let dy = random_tensor(&mut rng, vec![3, 5]);

    let dx_once = forward_backward(&mut fc, &x, &dy);
    let dw_once = fc.weight().borrow().grad.clone();
    let db_once = fc.bias().unwrap().borrow().grad.clone();

    let dx_twice = forward_backward(&mut fc, &x, &dy);
    let dw_twice = fc.weight().borrow().grad.clone();
    let db_twice = fc.bias().unwrap().borrow().grad.clone();

    // the input gradient is written, not accumulated
    assert_eq!(dx_once, dx_twice);
    for (once, twice) in dw_once.data.iter().zip(&dw_twice.data) {
        assert_eq!(*twice, 2.0 * once);
    }
    for (once, twice) in db_once.data.iter().zip(&db_twice.data) {
        assert_eq!(*twice, 2.0 * once);
    }

    fc.zero_grads();
    assert!(fc.weight().borrow().grad.data.iter().all(|&g| g == 0.0));
    assert!(fc.bias().unwrap().borrow().grad.data.iter().all(|&g| g == 0.0));
}

#[test]
fn backward_without_bias_touches_only_the_weight() {
    init_logging();
    let mut fc = FullyConnectedLayer::new(2, 2, false, Backend::Internal).unwrap();
    fc.weight()
        .borrow_mut()
        .set_value(tensor!([[1.0, 2.0], [3.0, 4.0]]));

    let dx = forward_backward(&mut fc, &tensor!([[1.0, -1.0]]), &tensor!([[1.0, 1.0]]));

    assert_eq!(dx.data, vec![4.0, 6.0]);
    assert_eq!(fc.parameters().len(), 1);
    assert_eq!(fc.weight().borrow().grad.data, vec![1.0, -1.0, 1.0, -1.0]);
}

#[test]
fn unsupported_backends_fail_construction() {
    init_logging();
    for backend in Backend::ALL.into_iter().filter(|b| !is_supported(*b)) {
        let err = FullyConnectedLayer::new(3, 2, true, backend).unwrap_err();
        assert_eq!(err, Error::UnsupportedBackend(backend));
        assert!(err.to_string().contains(backend.name()));

        let options = FullyConnectedParams::default().backend(backend);
        assert!(matches!(
            FullyConnectedLayer::with_params(3, 2, options),
            Err(Error::UnsupportedBackend(b)) if b == backend
        ));
    }
}

#[test]
fn batch_rows_match_single_row_runs() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(2024);
    let (n_in, n_out, batch) = (9, 4, 8);
    let mut fc = FullyConnectedLayer::new(n_in, n_out, true, Backend::Internal).unwrap();
    fc.weight()
        .borrow_mut()
        .set_value(random_tensor(&mut rng, vec![n_out, n_in]));
    fc.bias()
        .unwrap()
        .borrow_mut()
        .set_value(random_tensor(&mut rng, vec![n_out]));

    let x = random_tensor(&mut rng, vec![batch, n_in]);
    let mut batched = [Tensor::zeros(vec![batch, n_out])];
    fc.forward_propagation(&[x.clone()], &mut batched);

    for r in 0..batch {
        let single = [Tensor::new(vec![1, n_in], x.row(r).to_vec())];
        let mut out = [Tensor::zeros(vec![1, n_out])];
        fc.forward_propagation(&single, &mut out);
        assert_eq!(out[0].data, batched[0].row(r));
    }
}

#[test]
fn forward_reuses_caller_buffers() {
    init_logging();
    let mut fc = FullyConnectedLayer::new(2, 3, true, Backend::Internal).unwrap();
    let mut out = [Tensor::zeros(vec![2, 3])];
    let before = out[0].data.as_ptr();

    fc.forward_propagation(&[tensor!([[1.0, 2.0], [3.0, 4.0]])], &mut out);

    assert_eq!(out[0].data.as_ptr(), before);
    assert_eq!(out[0].shape, vec![2, 3]);
}
