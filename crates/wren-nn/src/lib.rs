//! # wren-nn
//!
//! Layer surface, activation kinds, and loss layers for Wren.
//!
//! 1. **Layer trait** — the uniform interface the execution engine drives
//! 2. **LossLayer** — terminal stage computing MSE, sigmoid cross-entropy,
//!    or softmax cross-entropy, and the matching gradients
//! 3. **ActivationKind** — which activation feeds the loss, used to validate
//!    cost/activation pairings
//!
//! Like `Tensor<B>`, layers are generic over `Backend`.

pub mod activation;
pub mod layer;
pub mod loss;

pub use activation::ActivationKind;
pub use layer::Layer;
pub use loss::{
    mse_gradient, mse_rows, sigmoid_cross_entropy_gradient, sigmoid_cross_entropy_rows,
    softmax_cross_entropy_gradient, softmax_cross_entropy_rows, CostKind, LossConfig, LossLayer,
    LossState,
};
