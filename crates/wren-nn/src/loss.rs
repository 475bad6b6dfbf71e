// Loss layer — the terminal stage of a training graph
//
// The loss layer receives the network's prediction and the label, records
// the batch-mean loss, passes the prediction through unchanged, and later
// returns d(loss)/d(prediction) for backpropagation.
//
// COST FAMILIES (per batch row, W = width of the feature axis):
//
// 1. Mse: 0.5 * sum((y - p)²)
//    gradient: p - y
//
// 2. EntropySigmoid: input is a LOGIT x, not a probability.
//    sum(-x*y + log(1 + exp(-|x|)) + max(x, 0)) / W
//    Algebraically equal to -y*log(σ(x)) - (1-y)*log(1-σ(x)), but never
//    exponentiates a positive number, so |x| in the hundreds stays finite.
//    gradient: (σ(x) - y) / W
//
// 3. EntropySoftmax: input is already softmax-normalised upstream, so the
//    graph must report a Softmax activation.
//    -sum(y * log(p)) / W
//    gradient: (p - y) / W. The softmax Jacobian cancels against the
//    cross-entropy derivative, so the gradient w.r.t. the softmax INPUT is
//    this simple difference.
//
// 4. Unknown: no loss. Input passes through; backward yields zeros.
//
// The recorded loss is the arithmetic mean of the row losses.
//
// LIFECYCLE:
//
//   Unconfigured ──initialize(true)──▶ Initialized ──forward──▶ Ready ⟲
//        │
//        └──initialize(false) / bad dims──▶ Invalid (permanent)

use std::fmt;
use std::str::FromStr;

use wren_core::backend::Backend;
use wren_core::error::{Error, Result};
use wren_core::shape::Shape;
use wren_core::tensor::Tensor;

use crate::activation::ActivationKind;
use crate::layer::Layer;

/// The closed set of loss families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CostKind {
    /// No loss; the layer only passes its input through.
    #[default]
    Unknown,
    /// Mean squared error (half sum of squares per row).
    Mse,
    /// Sigmoid cross-entropy on logits.
    EntropySigmoid,
    /// Cross-entropy on softmax probabilities.
    EntropySoftmax,
}

impl CostKind {
    pub const ALL: [CostKind; 4] = [
        CostKind::Unknown,
        CostKind::Mse,
        CostKind::EntropySigmoid,
        CostKind::EntropySoftmax,
    ];
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CostKind::Unknown => "unknown",
            CostKind::Mse => "mse",
            CostKind::EntropySigmoid => "cross_sigmoid",
            CostKind::EntropySoftmax => "cross_softmax",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CostKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" | "" => Ok(CostKind::Unknown),
            "mse" => Ok(CostKind::Mse),
            "cross_sigmoid" => Ok(CostKind::EntropySigmoid),
            "cross_softmax" | "cross" => Ok(CostKind::EntropySoftmax),
            other => Err(Error::invalid_parameter(format!("unknown cost '{other}'"))),
        }
    }
}

// Row losses
//
// Each returns a (batch, 1, 1, 1) tensor of per-sample losses. The caller
// has already checked that prediction and label shapes agree.

/// Half sum of squared differences per row.
pub fn mse_rows<B: Backend>(prediction: &Tensor<B>, label: &Tensor<B>) -> Result<Tensor<B>> {
    label.sub(prediction)?.square()?.sum_by_batch()?.scale(0.5)
}

/// Stable sigmoid cross-entropy per row, normalised by width.
pub fn sigmoid_cross_entropy_rows<B: Backend>(
    logits: &Tensor<B>,
    label: &Tensor<B>,
) -> Result<Tensor<B>> {
    let soft = logits.log1p_exp_neg_abs()?;
    let per_elem = logits
        .mul(label)?
        .neg()?
        .add(&soft)?
        .add(&logits.relu()?)?;
    per_elem
        .sum_by_batch()?
        .scale(1.0 / logits.width() as f32)
}

/// Cross-entropy on probabilities per row, normalised by width.
pub fn softmax_cross_entropy_rows<B: Backend>(
    probabilities: &Tensor<B>,
    label: &Tensor<B>,
) -> Result<Tensor<B>> {
    label
        .mul(&probabilities.log()?)?
        .sum_by_batch()?
        .scale(-1.0 / probabilities.width() as f32)
}

// Gradients w.r.t. the prediction

pub fn mse_gradient<B: Backend>(prediction: &Tensor<B>, label: &Tensor<B>) -> Result<Tensor<B>> {
    prediction.sub(label)
}

pub fn sigmoid_cross_entropy_gradient<B: Backend>(
    logits: &Tensor<B>,
    label: &Tensor<B>,
) -> Result<Tensor<B>> {
    logits
        .sigmoid()?
        .sub(label)?
        .scale(1.0 / logits.width() as f32)
}

pub fn softmax_cross_entropy_gradient<B: Backend>(
    probabilities: &Tensor<B>,
    label: &Tensor<B>,
) -> Result<Tensor<B>> {
    probabilities
        .sub(label)?
        .scale(1.0 / probabilities.width() as f32)
}

/// Arithmetic mean of a row-loss tensor.
fn batch_mean<B: Backend>(rows: &Tensor<B>) -> Result<f32> {
    let values = rows.to_vec()?;
    if values.is_empty() {
        return Ok(0.0);
    }
    Ok(values.iter().sum::<f32>() / values.len() as f32)
}

/// Configuration for a [`LossLayer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LossConfig {
    /// Loss family.
    pub cost: CostKind,
    /// Activation of the stage feeding the loss layer.
    pub activation: ActivationKind,
}

impl LossConfig {
    pub fn cost(mut self, cost: CostKind) -> Self {
        self.cost = cost;
        self
    }

    pub fn activation(mut self, activation: ActivationKind) -> Self {
        self.activation = activation;
        self
    }
}

/// Lifecycle of a [`LossLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossState {
    Unconfigured,
    Initialized,
    /// At least one forward pass has succeeded.
    Ready,
    /// Initialization failed; the layer can no longer be used.
    Invalid,
}

/// Terminal loss stage.
///
/// # Example
/// ```ignore
/// let mut loss = LossLayer::<CpuBackend>::new(LossConfig::default().cost(CostKind::Mse));
/// loss.set_input_dim(Shape::new(2, 1, 1, 4));
/// loss.initialize(true)?;
/// let out = loss.forward_with_label(&prediction, &label)?;
/// let grad = loss.derivative(&label)?;
/// ```
pub struct LossLayer<B: Backend> {
    cost: CostKind,
    activation: ActivationKind,
    last_layer: bool,
    loss: f32,
    /// Prediction of the last successful forward pass.
    input: Option<Tensor<B>>,
    input_dim: Shape,
    output_dim: Shape,
    state: LossState,
}

impl<B: Backend> LossLayer<B> {
    pub fn new(config: LossConfig) -> Self {
        LossLayer {
            cost: config.cost,
            activation: config.activation,
            last_layer: false,
            loss: 0.0,
            input: None,
            input_dim: Shape::default(),
            output_dim: Shape::default(),
            state: LossState::Unconfigured,
        }
    }

    pub fn cost(&self) -> CostKind {
        self.cost
    }

    pub fn activation(&self) -> ActivationKind {
        self.activation
    }

    /// Record the upstream activation (set during graph construction).
    pub fn set_activation(&mut self, activation: ActivationKind) {
        self.activation = activation;
    }

    pub fn state(&self) -> LossState {
        self.state
    }

    pub fn is_last(&self) -> bool {
        self.last_layer
    }

    /// Batch-mean loss of the last successful forward pass.
    pub fn loss(&self) -> f32 {
        self.loss
    }

    /// Prediction saved by the last successful forward pass.
    pub fn saved_prediction(&self) -> Option<&Tensor<B>> {
        self.input.as_ref()
    }

    fn ensure_initialized(&self) -> Result<()> {
        match self.state {
            LossState::Initialized | LossState::Ready => Ok(()),
            LossState::Unconfigured => Err(Error::invalid_parameter(
                "loss layer used before initialize",
            )),
            LossState::Invalid => Err(Error::invalid_parameter(
                "loss layer failed initialization and is unusable",
            )),
        }
    }

    /// Compute the loss for `prediction` against `label`.
    ///
    /// Returns `prediction` unchanged. On success the batch-mean loss is
    /// recorded and the prediction is kept for [`LossLayer::derivative`].
    /// On failure neither is touched.
    pub fn forward_with_label(
        &mut self,
        prediction: &Tensor<B>,
        label: &Tensor<B>,
    ) -> Result<Tensor<B>> {
        self.ensure_initialized()?;
        if prediction.shape() != label.shape() {
            return Err(Error::ShapeMismatch {
                expected: *prediction.shape(),
                got: *label.shape(),
            });
        }
        if !prediction.shape().is_valid() {
            return Err(Error::invalid_parameter(format!(
                "prediction shape {} must be positive in every dimension",
                prediction.shape()
            )));
        }

        let rows = match self.cost {
            CostKind::Mse => Some(mse_rows(prediction, label)?),
            CostKind::EntropySigmoid => Some(sigmoid_cross_entropy_rows(prediction, label)?),
            CostKind::EntropySoftmax => {
                if self.activation != ActivationKind::Softmax {
                    log::error!(
                        "softmax cross-entropy needs a softmax activation, got {}",
                        self.activation
                    );
                    return Err(Error::not_supported(format!(
                        "cross_softmax cost with {} activation",
                        self.activation
                    )));
                }
                Some(softmax_cross_entropy_rows(prediction, label)?)
            }
            CostKind::Unknown => None,
        };

        self.loss = match rows {
            Some(rows) => batch_mean(&rows)?,
            None => 0.0,
        };
        self.input = Some(prediction.clone());
        self.state = LossState::Ready;
        Ok(prediction.clone())
    }

    /// Gradient of the recorded loss w.r.t. the saved prediction.
    ///
    /// Depends only on the saved prediction and `label`; may be called any
    /// number of times after a forward pass.
    pub fn derivative(&self, label: &Tensor<B>) -> Result<Tensor<B>> {
        let saved = self.input.as_ref().ok_or_else(|| {
            Error::not_supported("loss backward called before any forward pass")
        })?;
        if saved.shape() != label.shape() {
            return Err(Error::ShapeMismatch {
                expected: *saved.shape(),
                got: *label.shape(),
            });
        }
        match self.cost {
            CostKind::Mse => mse_gradient(saved, label),
            CostKind::EntropySigmoid => sigmoid_cross_entropy_gradient(saved, label),
            CostKind::EntropySoftmax => softmax_cross_entropy_gradient(saved, label),
            CostKind::Unknown => Tensor::zeros_like(saved),
        }
    }

    /// Copy another loss layer's state into this one.
    ///
    /// Flags and scalars are copied; the saved prediction is deep-copied so
    /// the two layers never share memory.
    pub fn copy_from(&mut self, other: &Self) -> Result<()> {
        self.input = match &other.input {
            Some(t) => Some(t.deep_copy()?),
            None => None,
        };
        self.cost = other.cost;
        self.activation = other.activation;
        self.last_layer = other.last_layer;
        self.loss = other.loss;
        self.input_dim = other.input_dim;
        self.output_dim = other.output_dim;
        self.state = other.state;
        Ok(())
    }
}

impl<B: Backend> Layer<B> for LossLayer<B> {
    fn kind(&self) -> &'static str {
        "loss"
    }

    fn set_input_dim(&mut self, dim: Shape) {
        self.input_dim = dim;
    }

    fn input_dim(&self) -> Shape {
        self.input_dim
    }

    fn output_dim(&self) -> Shape {
        self.output_dim
    }

    fn initialize(&mut self, last: bool) -> Result<()> {
        if self.state == LossState::Invalid {
            return Err(Error::invalid_parameter(
                "loss layer failed initialization and is unusable",
            ));
        }
        if !self.input_dim.is_valid() {
            log::error!(
                "loss layer input dimension {} must be greater than 0",
                self.input_dim
            );
            self.state = LossState::Invalid;
            return Err(Error::invalid_parameter(format!(
                "input dimension {} must be greater than 0",
                self.input_dim
            )));
        }
        if !last {
            log::error!("loss layer, if present, must be the last layer");
            self.state = LossState::Invalid;
            return Err(Error::invalid_parameter(
                "loss layer must be the last layer",
            ));
        }
        self.last_layer = true;
        self.output_dim = self.input_dim;
        self.state = LossState::Initialized;
        log::debug!(
            "loss layer initialized: cost={}, activation={}, dim={}",
            self.cost,
            self.activation,
            self.input_dim
        );
        Ok(())
    }

    /// A loss cannot be computed without a label.
    fn forward(&mut self, _input: &Tensor<B>) -> Result<Tensor<B>> {
        Err(Error::not_supported("loss layer forward requires a label"))
    }

    fn forward_with_label(&mut self, input: &Tensor<B>, label: &Tensor<B>) -> Result<Tensor<B>> {
        LossLayer::forward_with_label(self, input, label)
    }

    /// `derivative` is the label for a loss layer.
    fn backward(&mut self, derivative: &Tensor<B>, _iteration: usize) -> Result<Tensor<B>> {
        self.derivative(derivative)
    }

    /// The loss layer recognises no properties.
    fn set_property(&mut self, values: &[String]) -> Result<()> {
        Err(Error::not_supported(format!(
            "loss layer has no properties ({} given)",
            values.len()
        )))
    }

    fn loss(&self) -> f32 {
        self.loss
    }
}
