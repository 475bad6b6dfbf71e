// Scalar numeric helpers
//
// Pure, stateless functions shared by the backends and the loss layer.
// Backends vectorise them through `UnaryOp`; the loss layer relies on their
// exact behaviour at the extremes:
//
//   log_float(0)      = ln(1e-20) ≈ -46.05   (finite, never -inf)
//   sigmoid(±100)     = 1 / 0 without overflow
//   relu(x)           = max(x, 0)

/// Offset added before taking a logarithm so that `log(0)` stays finite.
pub const LOG_EPSILON: f32 = 1.0e-20;

/// Natural logarithm guarded against zero: `ln(x + 1e-20)`.
pub fn log_float(x: f32) -> f32 {
    (x + LOG_EPSILON).ln()
}

/// Rectifier: `max(x, 0)`.
pub fn relu(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

/// Logistic sigmoid, evaluated on the branch that never exponentiates a
/// positive number.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `log(1 + exp(-|x|))`, the bounded part of the stable logistic loss.
/// Lies in `(0, ln 2]` for every finite `x`.
pub fn log1p_exp_neg_abs(x: f32) -> f32 {
    (-x.abs()).exp().ln_1p()
}
