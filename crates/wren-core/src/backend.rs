use crate::error::Result;
use std::fmt;

// Backend — Abstraction over compute devices
//
// Each backend implements this trait, providing its own storage type and
// kernel implementations. Tensor<B> dispatches every numeric operation here,
// so the variable/gradient containers and loss layers never touch raw
// buffers themselves.
//
// Storages are flat, contiguous, row-major f32 buffers. A tensor of shape
// (b, c, h, w) stores its b samples back to back, each `c * h * w` long.
// Operations return new storage; in-place writes go through Tensor, which
// swaps the contents of its shared storage slot.

/// Identifies a compute device (e.g., "cpu").
pub trait BackendDevice: Clone + fmt::Debug + Send + Sync + 'static {
    /// A human-readable name for this device.
    fn name(&self) -> String;
}

/// A storage buffer that holds tensor data on a specific device.
pub trait BackendStorage: Clone + fmt::Debug + Send + Sync + 'static {
    /// Total number of elements in this storage.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Element-wise unary operations.
///
/// `Log` is the guarded logarithm `ln(x + 1e-20)` from [`crate::numeric`];
/// `Log1pExpNegAbs` is `ln(1 + exp(-|x|))`, the bounded softplus term of the
/// stable logistic loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
    Exp,
    Log,
    Relu,
    Sigmoid,
    Tanh,
    Square,
    Log1pExpNegAbs,
}

impl UnaryOp {
    /// Scalar reference implementation shared by every backend.
    pub fn apply(self, x: f32) -> f32 {
        use crate::numeric;
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => numeric::log_float(x),
            UnaryOp::Relu => numeric::relu(x),
            UnaryOp::Sigmoid => numeric::sigmoid(x),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Square => x * x,
            UnaryOp::Log1pExpNegAbs => numeric::log1p_exp_neg_abs(x),
        }
    }
}

impl BinaryOp {
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }
}

/// The main Backend trait. Implementing this for a struct (e.g., CpuBackend)
/// makes that struct a complete compute backend for Wren.
pub trait Backend: Clone + Send + Sync + fmt::Debug + 'static {
    /// The device type for this backend.
    type Device: BackendDevice;
    /// The storage type for this backend.
    type Storage: BackendStorage;

    //  Creation

    /// Allocate `len` zeros.
    fn zeros(len: usize, device: &Self::Device) -> Result<Self::Storage>;

    /// Allocate `len` copies of `val`.
    fn full(len: usize, val: f32, device: &Self::Device) -> Result<Self::Storage>;

    /// Copy a host slice into new storage.
    fn from_slice(data: &[f32], device: &Self::Device) -> Result<Self::Storage>;

    /// Uniform random values in `[low, high)`.
    fn rand_uniform(len: usize, low: f32, high: f32, device: &Self::Device)
        -> Result<Self::Storage>;

    /// Normal random values N(mean, std).
    fn rand_normal(len: usize, mean: f32, std: f32, device: &Self::Device)
        -> Result<Self::Storage>;

    //  Element-wise

    /// `result[i] = op(lhs[i], rhs[i])`. Both storages have the same length.
    fn binary_op(op: BinaryOp, lhs: &Self::Storage, rhs: &Self::Storage)
        -> Result<Self::Storage>;

    /// `result[i] = op(input[i])`.
    fn unary_op(op: UnaryOp, input: &Self::Storage) -> Result<Self::Storage>;

    /// `result[i] = input[i] * mul + add`.
    fn affine(input: &Self::Storage, mul: f32, add: f32) -> Result<Self::Storage>;

    //  Reductions

    /// Sum each of the `batch` contiguous rows, producing `batch` values.
    fn sum_by_batch(input: &Self::Storage, batch: usize) -> Result<Self::Storage>;

    /// Softmax over each contiguous run of `row_len` elements.
    fn softmax_by_row(input: &Self::Storage, row_len: usize) -> Result<Self::Storage>;

    //  Data movement

    /// Copy the storage contents to a host vector.
    fn to_vec(input: &Self::Storage) -> Result<Vec<f32>>;
}
