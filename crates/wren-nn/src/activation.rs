// Activation kinds
//
// A layer graph records which activation feeds each stage. The loss layer
// needs it to validate pairings: softmax cross-entropy assumes its input is
// already softmax-normalised, so any other activation upstream is rejected.

use std::fmt;
use std::str::FromStr;

use wren_core::backend::Backend;
use wren_core::error::{Error, Result};
use wren_core::tensor::Tensor;

/// Activation function applied by the stage feeding a loss layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivationKind {
    /// No activation (identity), or not yet known.
    #[default]
    None,
    Sigmoid,
    Tanh,
    Relu,
    /// Softmax along the width axis.
    Softmax,
}

impl ActivationKind {
    /// Apply this activation to a tensor.
    pub fn apply<B: Backend>(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        match self {
            ActivationKind::None => Ok(x.clone()),
            ActivationKind::Sigmoid => x.sigmoid(),
            ActivationKind::Tanh => x.tanh(),
            ActivationKind::Relu => x.relu(),
            ActivationKind::Softmax => x.softmax(),
        }
    }

    /// All kinds, in declaration order.
    pub const ALL: [ActivationKind; 5] = [
        ActivationKind::None,
        ActivationKind::Sigmoid,
        ActivationKind::Tanh,
        ActivationKind::Relu,
        ActivationKind::Softmax,
    ];
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivationKind::None => "none",
            ActivationKind::Sigmoid => "sigmoid",
            ActivationKind::Tanh => "tanh",
            ActivationKind::Relu => "relu",
            ActivationKind::Softmax => "softmax",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ActivationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(ActivationKind::None),
            "sigmoid" => Ok(ActivationKind::Sigmoid),
            "tanh" => Ok(ActivationKind::Tanh),
            "relu" => Ok(ActivationKind::Relu),
            "softmax" => Ok(ActivationKind::Softmax),
            other => Err(Error::invalid_parameter(format!(
                "unknown activation '{other}'"
            ))),
        }
    }
}
