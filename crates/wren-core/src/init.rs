// Initializer — how a tensor's storage is filled when it is realized
//
// Tensors remember their initializer so that a lazily created tensor can be
// filled at the moment it is allocated, long after construction.
//
// AVAILABLE INITIALIZERS:
//
//   None           — contents unspecified (backends zero-fill)
//   Zeros / Ones   — constant 0 / 1
//   Constant(v)    — constant v
//   LecunNormal    — N(0, sqrt(1 / fan_in))
//   LecunUniform   — U(-1/sqrt(fan_in), 1/sqrt(fan_in))
//   XavierNormal   — N(0, sqrt(2 / (fan_in + fan_out)))
//   XavierUniform  — U(-l, l), l = sqrt(6 / (fan_in + fan_out))
//   HeNormal       — N(0, sqrt(2 / fan_in))
//   HeUniform      — U(-l, l), l = sqrt(6 / fan_in)
//
// Fans come from the 4-D shape of a dense weight (1, 1, in, out):
// fan_in = height, fan_out = width.

use std::fmt;
use std::str::FromStr;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::shape::Shape;

/// Fill policy applied when a tensor's storage is realized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Initializer {
    #[default]
    None,
    Zeros,
    Ones,
    Constant(f32),
    LecunNormal,
    LecunUniform,
    XavierNormal,
    XavierUniform,
    HeNormal,
    HeUniform,
}

/// Compute (fan_in, fan_out) from a shape.
fn compute_fans(shape: &Shape) -> (f32, f32) {
    (shape.height().max(1) as f32, shape.width().max(1) as f32)
}

impl Initializer {
    /// Produce storage for `shape` filled according to this initializer.
    pub fn fill<B: Backend>(&self, shape: &Shape, device: &B::Device) -> Result<B::Storage> {
        let len = shape.elem_count();
        let (fan_in, fan_out) = compute_fans(shape);
        match *self {
            Initializer::None | Initializer::Zeros => B::zeros(len, device),
            Initializer::Ones => B::full(len, 1.0, device),
            Initializer::Constant(v) => B::full(len, v, device),
            Initializer::LecunNormal => B::rand_normal(len, 0.0, (1.0 / fan_in).sqrt(), device),
            Initializer::LecunUniform => {
                let limit = 1.0 / fan_in.sqrt();
                B::rand_uniform(len, -limit, limit, device)
            }
            Initializer::XavierNormal => {
                B::rand_normal(len, 0.0, (2.0 / (fan_in + fan_out)).sqrt(), device)
            }
            Initializer::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out)).sqrt();
                B::rand_uniform(len, -limit, limit, device)
            }
            Initializer::HeNormal => B::rand_normal(len, 0.0, (2.0 / fan_in).sqrt(), device),
            Initializer::HeUniform => {
                let limit = (6.0 / fan_in).sqrt();
                B::rand_uniform(len, -limit, limit, device)
            }
        }
    }
}

impl fmt::Display for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::None => write!(f, "none"),
            Initializer::Zeros => write!(f, "zeros"),
            Initializer::Ones => write!(f, "ones"),
            Initializer::Constant(v) => write!(f, "constant({v})"),
            Initializer::LecunNormal => write!(f, "lecun_normal"),
            Initializer::LecunUniform => write!(f, "lecun_uniform"),
            Initializer::XavierNormal => write!(f, "xavier_normal"),
            Initializer::XavierUniform => write!(f, "xavier_uniform"),
            Initializer::HeNormal => write!(f, "he_normal"),
            Initializer::HeUniform => write!(f, "he_uniform"),
        }
    }
}

impl FromStr for Initializer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let init = match s.trim().to_ascii_lowercase().as_str() {
            "none" => Initializer::None,
            "zeros" => Initializer::Zeros,
            "ones" => Initializer::Ones,
            "lecun_normal" => Initializer::LecunNormal,
            "lecun_uniform" => Initializer::LecunUniform,
            "xavier_normal" => Initializer::XavierNormal,
            "xavier_uniform" => Initializer::XavierUniform,
            "he_normal" => Initializer::HeNormal,
            "he_uniform" => Initializer::HeUniform,
            other => {
                return Err(Error::invalid_parameter(format!(
                    "unknown initializer '{other}'"
                )))
            }
        };
        Ok(init)
    }
}
