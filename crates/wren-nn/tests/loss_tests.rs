// Tests for wren-nn: LossLayer lifecycle, cost families, and gradients
//
// All tests run on the CPU backend.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wren_core::{Error, Result, Shape, Tensor};
use wren_cpu::{CpuBackend, CpuDevice};
use wren_nn::{ActivationKind, CostKind, Layer, LossConfig, LossLayer, LossState};

type T = Tensor<CpuBackend>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn assert_vec_approx(got: &[f32], expected: &[f32], tol: f64) {
    assert_eq!(
        got.len(),
        expected.len(),
        "length mismatch: {} vs {}",
        got.len(),
        expected.len()
    );
    for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
        assert!(
            approx_eq(*g as f64, *e as f64, tol),
            "index {}: got {} expected {} (tol {})",
            i,
            g,
            e,
            tol
        );
    }
}

/// A loss layer configured and initialized as the last stage over `dim`.
fn ready_layer(cost: CostKind, activation: ActivationKind, dim: Shape) -> Result<LossLayer<CpuBackend>> {
    let mut layer = LossLayer::new(LossConfig::default().cost(cost).activation(activation));
    layer.set_input_dim(dim);
    layer.initialize(true)?;
    Ok(layer)
}

/// Reference sigmoid cross-entropy in f64, normalised by width.
fn naive_sigmoid_ce(logits: &[f32], labels: &[f32]) -> f64 {
    let width = logits.len() as f64;
    logits
        .iter()
        .zip(labels)
        .map(|(&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            let s = 1.0 / (1.0 + (-x).exp());
            -y * s.ln() - (1.0 - y) * (1.0 - s).ln()
        })
        .sum::<f64>()
        / width
}

// Lifecycle

#[test]
fn test_initialize_requires_last_layer() {
    init_logger();
    let mut layer = LossLayer::<CpuBackend>::new(LossConfig::default().cost(CostKind::Mse));
    layer.set_input_dim(Shape::new(2, 1, 1, 4));
    assert!(matches!(
        layer.initialize(false),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(layer.state(), LossState::Invalid);
    // Invalid is permanent.
    assert!(layer.initialize(true).is_err());
    assert_eq!(layer.state(), LossState::Invalid);
}

#[test]
fn test_initialize_rejects_zero_dims() {
    let mut layer = LossLayer::<CpuBackend>::new(LossConfig::default().cost(CostKind::Mse));
    layer.set_input_dim(Shape::new(2, 1, 0, 4));
    assert!(matches!(
        layer.initialize(true),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(layer.state(), LossState::Invalid);
}

#[test]
fn test_initialize_sets_output_dim() -> Result<()> {
    let dim = Shape::new(3, 1, 1, 5);
    let layer = ready_layer(CostKind::Mse, ActivationKind::None, dim)?;
    assert_eq!(layer.output_dim(), dim);
    assert_eq!(layer.input_dim(), dim);
    assert!(layer.is_last());
    assert_eq!(layer.state(), LossState::Initialized);
    Ok(())
}

#[test]
fn test_forward_before_initialize_fails() -> Result<()> {
    let mut layer = LossLayer::<CpuBackend>::new(LossConfig::default().cost(CostKind::Mse));
    let x = T::ones((2, 4), &CpuDevice)?;
    assert!(matches!(
        layer.forward_with_label(&x, &x),
        Err(Error::InvalidParameter(_))
    ));
    Ok(())
}

#[test]
fn test_label_less_forward_is_unsupported() -> Result<()> {
    let x = T::ones((2, 4), &CpuDevice)?;
    for cost in CostKind::ALL {
        let mut layer = ready_layer(cost, ActivationKind::Softmax, *x.shape())?;
        assert!(
            matches!(Layer::forward(&mut layer, &x), Err(Error::NotSupported(_))),
            "cost {cost}"
        );
    }
    Ok(())
}

#[test]
fn test_set_property_is_rejected() -> Result<()> {
    let mut layer = ready_layer(CostKind::Mse, ActivationKind::None, Shape::new(1, 1, 1, 2))?;
    assert!(layer.set_property(&["cost=mse".to_string()]).is_err());
    assert!(layer.set_property(&[]).is_err());
    Ok(())
}

#[test]
fn test_backward_before_forward_fails() -> Result<()> {
    let mut layer = ready_layer(CostKind::Mse, ActivationKind::None, Shape::new(1, 1, 1, 2))?;
    let label = T::zeros((1, 2), &CpuDevice)?;
    assert!(matches!(
        layer.backward(&label, 0),
        Err(Error::NotSupported(_))
    ));
    Ok(())
}

#[test]
fn test_forward_rejects_label_shape_mismatch() -> Result<()> {
    let mut layer = ready_layer(CostKind::Mse, ActivationKind::None, Shape::new(2, 1, 1, 4))?;
    let pred = T::ones((2, 4), &CpuDevice)?;
    let label = T::ones((2, 3), &CpuDevice)?;
    assert!(matches!(
        layer.forward_with_label(&pred, &label),
        Err(Error::ShapeMismatch { .. })
    ));
    assert!(layer.saved_prediction().is_none());
    assert_eq!(layer.state(), LossState::Initialized);
    Ok(())
}

// Mean squared error

#[test]
fn test_mse_end_to_end() -> Result<()> {
    let dim = Shape::new(2, 1, 1, 4);
    let mut layer = ready_layer(CostKind::Mse, ActivationKind::None, dim)?;
    let pred = T::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], dim, &CpuDevice)?;
    let label = T::ones(dim, &CpuDevice)?;

    let rows = wren_nn::mse_rows(&pred, &label)?;
    assert_vec_approx(&rows.to_vec()?, &[7.0, 63.0], 1e-5);

    let out = layer.forward_with_label(&pred, &label)?;
    assert!(out.shares_storage_with(&pred));
    assert!(approx_eq(layer.loss() as f64, 35.0, 1e-5));
    assert_eq!(Layer::loss(&layer), layer.loss());
    assert_eq!(layer.state(), LossState::Ready);

    let grad = layer.backward(&label, 1)?;
    assert_eq!(grad.shape(), &dim);
    assert_vec_approx(
        &grad.to_vec()?,
        &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        1e-6,
    );
    Ok(())
}

#[test]
fn test_mse_properties_on_random_batches() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let dim = Shape::new(4, 1, 1, 6);
    let mut layer = ready_layer(CostKind::Mse, ActivationKind::None, dim)?;
    for _ in 0..10 {
        let p: Vec<f32> = (0..dim.elem_count()).map(|_| rng.gen_range(-3.0..3.0)).collect();
        let y: Vec<f32> = (0..dim.elem_count()).map(|_| rng.gen_range(-3.0..3.0)).collect();
        let pred = T::from_slice(&p, dim, &CpuDevice)?;
        let label = T::from_slice(&y, dim, &CpuDevice)?;

        layer.forward_with_label(&pred, &label)?;
        assert!(layer.loss() >= 0.0);

        // Gradient is exactly p - y.
        let expected: Vec<f32> = p.iter().zip(&y).map(|(a, b)| a - b).collect();
        assert_vec_approx(&layer.derivative(&label)?.to_vec()?, &expected, 1e-6);

        // Identical inputs give zero loss.
        layer.forward_with_label(&label, &label)?;
        assert_eq!(layer.loss(), 0.0);
    }
    Ok(())
}

// Sigmoid cross-entropy

#[test]
fn test_sigmoid_ce_matches_naive_for_moderate_logits() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let dim = Shape::new(3, 1, 1, 5);
    let mut layer = ready_layer(CostKind::EntropySigmoid, ActivationKind::Sigmoid, dim)?;
    let x: Vec<f32> = (0..dim.elem_count()).map(|_| rng.gen_range(-8.0..8.0)).collect();
    let y: Vec<f32> = (0..dim.elem_count())
        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 })
        .collect();
    let logits = T::from_slice(&x, dim, &CpuDevice)?;
    let label = T::from_slice(&y, dim, &CpuDevice)?;

    let rows = wren_nn::sigmoid_cross_entropy_rows(&logits, &label)?.to_vec()?;
    let mut mean = 0.0;
    for (r, row) in rows.iter().enumerate() {
        let expected = naive_sigmoid_ce(&x[r * 5..(r + 1) * 5], &y[r * 5..(r + 1) * 5]);
        assert!(approx_eq(*row as f64, expected, 1e-4), "row {r}: {row} vs {expected}");
        mean += expected / 3.0;
    }

    layer.forward_with_label(&logits, &label)?;
    assert!(approx_eq(layer.loss() as f64, mean, 1e-4));

    let expected_grad: Vec<f32> = x
        .iter()
        .zip(&y)
        .map(|(&x, &y)| (1.0 / (1.0 + (-x).exp()) - y) / 5.0)
        .collect();
    assert_vec_approx(&layer.derivative(&label)?.to_vec()?, &expected_grad, 1e-5);
    Ok(())
}

#[test]
fn test_sigmoid_ce_stays_finite_for_extreme_logits() -> Result<()> {
    let dim = Shape::new(1, 1, 1, 4);
    let mut layer = ready_layer(CostKind::EntropySigmoid, ActivationKind::Sigmoid, dim)?;
    let logits = T::from_slice(&[100.0, -100.0, 100.0, -100.0], dim, &CpuDevice)?;
    let label = T::from_slice(&[0.0, 1.0, 1.0, 0.0], dim, &CpuDevice)?;

    layer.forward_with_label(&logits, &label)?;
    // Asymptotically |x| per wrong element, 0 per right one: (100 + 100) / 4.
    assert!(layer.loss().is_finite());
    assert!(approx_eq(layer.loss() as f64, 50.0, 1e-3));

    let grad = layer.derivative(&label)?.to_vec()?;
    assert!(grad.iter().all(|g| g.is_finite()));
    assert_vec_approx(&grad, &[0.25, -0.25, 0.0, 0.0], 1e-6);
    Ok(())
}

#[test]
fn test_sigmoid_ce_zero_logits() -> Result<()> {
    let dim = Shape::new(2, 1, 1, 3);
    let mut layer = ready_layer(CostKind::EntropySigmoid, ActivationKind::Sigmoid, dim)?;
    let logits = T::zeros(dim, &CpuDevice)?;
    let label = T::from_slice(&[1.0, 0.0, 1.0, 0.0, 0.0, 1.0], dim, &CpuDevice)?;
    layer.forward_with_label(&logits, &label)?;
    assert!(approx_eq(layer.loss() as f64, std::f64::consts::LN_2, 1e-5));
    Ok(())
}

#[test]
fn test_sigmoid_ce_soft_labels_at_extreme_logits() -> Result<()> {
    let dim = Shape::new(1, 1, 1, 2);
    let mut layer = ready_layer(CostKind::EntropySigmoid, ActivationKind::Sigmoid, dim)?;
    let logits = T::from_slice(&[90.0, -90.0], dim, &CpuDevice)?;
    let label = T::from_slice(&[0.3, 0.3], dim, &CpuDevice)?;

    // x > 0: x(1 - y); x < 0: -xy; the ln(1 + e^-|x|) tail is ~1e-39.
    // (90 * 0.7 + 90 * 0.3) / 2 = 45.
    let rows = wren_nn::sigmoid_cross_entropy_rows(&logits, &label)?.to_vec()?;
    assert!(approx_eq(rows[0] as f64, 45.0, 1e-4 * 45.0));

    layer.forward_with_label(&logits, &label)?;
    assert!(layer.loss().is_finite());
    assert!(approx_eq(layer.loss() as f64, 45.0, 1e-4 * 45.0));

    // sigmoid(±90) saturates to 1 and 0, so (s - y) / W.
    let grad = layer.derivative(&label)?.to_vec()?;
    assert_vec_approx(&grad, &[0.35, -0.15], 1e-6);
    Ok(())
}

#[test]
fn test_log1p_exp_neg_abs_keeps_small_tails() -> Result<()> {
    let dim = Shape::new(1, 1, 1, 3);
    let x = T::from_slice(&[20.0, -20.0, 0.0], dim, &CpuDevice)?;
    let got = x.log1p_exp_neg_abs()?.to_vec()?;

    // Forming 1 + e^-20 in f32 rounds to 1 and the log to 0.
    let tail = (-20.0f64).exp().ln_1p();
    for &g in &got[..2] {
        assert!(g > 0.0);
        assert!(approx_eq(g as f64 / tail, 1.0, 1e-3));
    }
    assert!(approx_eq(got[2] as f64, std::f64::consts::LN_2, 1e-6));

    // A correct negative prediction keeps that tail as its loss.
    let one = Shape::new(1, 1, 1, 1);
    let logit = T::from_slice(&[-20.0], one, &CpuDevice)?;
    let label = T::from_slice(&[0.0], one, &CpuDevice)?;
    let row = wren_nn::sigmoid_cross_entropy_rows(&logit, &label)?.to_vec()?;
    assert!(approx_eq(row[0] as f64 / tail, 1.0, 1e-3));
    Ok(())
}

// Softmax cross-entropy

#[test]
fn test_softmax_ce_on_probabilities() -> Result<()> {
    let dim = Shape::new(2, 1, 1, 4);
    let mut layer = ready_layer(CostKind::EntropySoftmax, ActivationKind::Softmax, dim)?;
    let logits = T::from_slice(&[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0], dim, &CpuDevice)?;
    let probs = ActivationKind::Softmax.apply(&logits)?;
    let label = T::from_slice(&[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0], dim, &CpuDevice)?;

    layer.forward_with_label(&probs, &label)?;
    let p = probs.to_vec()?;
    let expected = (-(p[1] as f64).ln() / 4.0 + -(p[7] as f64).ln() / 4.0) / 2.0;
    assert!(approx_eq(layer.loss() as f64, expected, 1e-5));

    let y = label.to_vec()?;
    let expected_grad: Vec<f32> = p.iter().zip(&y).map(|(p, y)| (p - y) / 4.0).collect();
    assert_vec_approx(&layer.derivative(&label)?.to_vec()?, &expected_grad, 1e-6);
    Ok(())
}

#[test]
fn test_softmax_ce_requires_softmax_activation() -> Result<()> {
    init_logger();
    let dim = Shape::new(1, 1, 1, 4);
    let pred = T::full(dim, 0.25, &CpuDevice)?;
    let label = T::from_slice(&[1.0, 0.0, 0.0, 0.0], dim, &CpuDevice)?;
    for activation in ActivationKind::ALL {
        if activation == ActivationKind::Softmax {
            continue;
        }
        let mut layer = ready_layer(CostKind::EntropySoftmax, activation, dim)?;
        assert!(
            matches!(
                layer.forward_with_label(&pred, &label),
                Err(Error::NotSupported(_))
            ),
            "activation {activation}"
        );
        assert!(layer.saved_prediction().is_none());
        assert_eq!(layer.loss(), 0.0);
    }
    Ok(())
}

#[test]
fn test_unknown_cost_passes_through() -> Result<()> {
    let dim = Shape::new(2, 1, 1, 2);
    let mut layer = ready_layer(CostKind::Unknown, ActivationKind::None, dim)?;
    let pred = T::from_slice(&[1.0, -2.0, 3.0, -4.0], dim, &CpuDevice)?;
    let label = T::zeros(dim, &CpuDevice)?;
    let out = layer.forward_with_label(&pred, &label)?;
    assert_eq!(out.to_vec()?, pred.to_vec()?);
    assert_eq!(layer.loss(), 0.0);
    assert_eq!(layer.derivative(&label)?.to_vec()?, vec![0.0; 4]);
    Ok(())
}

// Gradient scaling by width

#[test]
fn test_cross_entropy_gradients_scale_with_width() -> Result<()> {
    for width in [1usize, 2, 8] {
        let dim = Shape::new(1, 1, 1, width);
        let mut layer = ready_layer(CostKind::EntropySoftmax, ActivationKind::Softmax, dim)?;
        let pred = T::ones(dim, &CpuDevice)?;
        let label = T::zeros(dim, &CpuDevice)?;
        layer.forward_with_label(&pred, &label)?;
        let grad = layer.derivative(&label)?.to_vec()?;
        assert_vec_approx(&grad, &vec![1.0 / width as f32; width], 1e-6);
    }
    Ok(())
}

#[test]
fn test_derivative_rejects_label_shape_mismatch() -> Result<()> {
    let dim = Shape::new(1, 1, 1, 3);
    let mut layer = ready_layer(CostKind::Mse, ActivationKind::None, dim)?;
    let x = T::ones(dim, &CpuDevice)?;
    layer.forward_with_label(&x, &x)?;
    let bad = T::ones((1, 4), &CpuDevice)?;
    assert!(matches!(
        layer.derivative(&bad),
        Err(Error::ShapeMismatch { .. })
    ));
    Ok(())
}

// Copy and traversal

#[test]
fn test_copy_from_deep_copies_prediction() -> Result<()> {
    let dim = Shape::new(1, 1, 1, 3);
    let mut src = ready_layer(CostKind::Mse, ActivationKind::None, dim)?;
    let pred = T::from_slice(&[1.0, 2.0, 3.0], dim, &CpuDevice)?;
    let label = T::zeros(dim, &CpuDevice)?;
    src.forward_with_label(&pred, &label)?;

    let mut dst = LossLayer::<CpuBackend>::new(LossConfig::default());
    dst.copy_from(&src)?;
    assert_eq!(dst.cost(), CostKind::Mse);
    assert_eq!(dst.state(), LossState::Ready);
    assert_eq!(dst.loss(), src.loss());
    assert_eq!(dst.output_dim(), dim);

    let copied = dst.saved_prediction().cloned().expect("prediction copied");
    assert!(!copied.shares_storage_with(&pred));
    pred.fill(0.0)?;
    assert_eq!(copied.to_vec()?, vec![1.0, 2.0, 3.0]);
    assert_vec_approx(&dst.derivative(&label)?.to_vec()?, &[1.0, 2.0, 3.0], 1e-6);
    Ok(())
}

#[test]
fn test_dyn_layer_traversal() -> Result<()> {
    let dim = Shape::new(2, 1, 1, 2);
    let mut layers: Vec<Box<dyn Layer<CpuBackend>>> = vec![Box::new(LossLayer::new(
        LossConfig::default().cost(CostKind::Mse),
    ))];
    let n = layers.len();
    for (i, layer) in layers.iter_mut().enumerate() {
        layer.set_input_dim(dim);
        layer.initialize(i + 1 == n)?;
    }
    let input = T::from_slice(&[1.0, 1.0, 2.0, 2.0], dim, &CpuDevice)?;
    let label = T::zeros(dim, &CpuDevice)?;

    let last = layers.last_mut().expect("one layer");
    assert_eq!(last.kind(), "loss");
    last.forward_with_label(&input, &label)?;
    // Rows: 0.5 * 2 = 1 and 0.5 * 8 = 4.
    assert!(approx_eq(last.loss() as f64, 2.5, 1e-6));
    let grad = last.backward(&label, 0)?;
    assert_eq!(grad.to_vec()?, vec![1.0, 1.0, 2.0, 2.0]);
    Ok(())
}

#[test]
fn test_cost_and_activation_names() -> Result<()> {
    assert_eq!("mse".parse::<CostKind>()?, CostKind::Mse);
    assert_eq!("cross_sigmoid".parse::<CostKind>()?, CostKind::EntropySigmoid);
    assert_eq!("cross".parse::<CostKind>()?, CostKind::EntropySoftmax);
    assert!("hinge".parse::<CostKind>().is_err());
    for cost in CostKind::ALL {
        assert_eq!(cost.to_string().parse::<CostKind>()?, cost);
    }
    assert_eq!("SoftMax".parse::<ActivationKind>()?, ActivationKind::Softmax);
    Ok(())
}
