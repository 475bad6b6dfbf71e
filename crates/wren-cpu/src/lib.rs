//! # wren-cpu
//!
//! CPU backend for Wren.
//!
//! Storage is a plain `Vec<f32>`. Element-wise kernels and per-sample
//! reductions switch to rayon once a buffer is large enough for the thread
//! pool to pay off.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use wren_core::backend::{Backend, BackendDevice, BackendStorage, BinaryOp, UnaryOp};
use wren_core::error::{Error, Result};
use wren_core::Tensor;

/// Below this many elements kernels run sequentially.
const PARALLEL_THRESHOLD: usize = 1 << 14;

/// The host CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuDevice;

impl BackendDevice for CpuDevice {
    fn name(&self) -> String {
        "cpu".to_string()
    }
}

/// Contiguous host buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuStorage(pub Vec<f32>);

impl BackendStorage for CpuStorage {
    fn len(&self) -> usize {
        self.0.len()
    }
}

/// The CPU backend marker type.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

/// Convenience alias.
pub type CpuTensor = Tensor<CpuBackend>;

fn map_unary(data: &[f32], f: impl Fn(f32) -> f32 + Sync + Send) -> Vec<f32> {
    if data.len() >= PARALLEL_THRESHOLD {
        data.par_iter().map(|&x| f(x)).collect()
    } else {
        data.iter().map(|&x| f(x)).collect()
    }
}

impl Backend for CpuBackend {
    type Device = CpuDevice;
    type Storage = CpuStorage;

    fn zeros(len: usize, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage(vec![0.0; len]))
    }

    fn full(len: usize, val: f32, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage(vec![val; len]))
    }

    fn from_slice(data: &[f32], _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage(data.to_vec()))
    }

    fn rand_uniform(len: usize, low: f32, high: f32, _device: &CpuDevice) -> Result<CpuStorage> {
        if low >= high {
            return Err(Error::invalid_parameter(format!(
                "uniform range [{low}, {high}) is empty"
            )));
        }
        let mut rng = rand::thread_rng();
        Ok(CpuStorage(
            (0..len).map(|_| rng.gen_range(low..high)).collect(),
        ))
    }

    fn rand_normal(len: usize, mean: f32, std: f32, _device: &CpuDevice) -> Result<CpuStorage> {
        let normal = Normal::new(mean, std).map_err(|e| {
            Error::invalid_parameter(format!("normal distribution N({mean}, {std}): {e}"))
        })?;
        let mut rng = rand::thread_rng();
        Ok(CpuStorage((0..len).map(|_| normal.sample(&mut rng)).collect()))
    }

    fn binary_op(op: BinaryOp, lhs: &CpuStorage, rhs: &CpuStorage) -> Result<CpuStorage> {
        if lhs.len() != rhs.len() {
            return Err(Error::msg(format!(
                "binary op on buffers of {} and {} elements",
                lhs.len(),
                rhs.len()
            )));
        }
        let out = if lhs.len() >= PARALLEL_THRESHOLD {
            lhs.0
                .par_iter()
                .zip(rhs.0.par_iter())
                .map(|(&a, &b)| op.apply(a, b))
                .collect()
        } else {
            lhs.0
                .iter()
                .zip(&rhs.0)
                .map(|(&a, &b)| op.apply(a, b))
                .collect()
        };
        Ok(CpuStorage(out))
    }

    fn unary_op(op: UnaryOp, input: &CpuStorage) -> Result<CpuStorage> {
        Ok(CpuStorage(map_unary(&input.0, |x| op.apply(x))))
    }

    fn affine(input: &CpuStorage, mul: f32, add: f32) -> Result<CpuStorage> {
        Ok(CpuStorage(map_unary(&input.0, |x| x * mul + add)))
    }

    fn sum_by_batch(input: &CpuStorage, batch: usize) -> Result<CpuStorage> {
        if batch == 0 {
            return Ok(CpuStorage(Vec::new()));
        }
        if input.len() % batch != 0 {
            return Err(Error::msg(format!(
                "cannot split {} elements into {} rows",
                input.len(),
                batch
            )));
        }
        let row = input.len() / batch;
        if row == 0 {
            return Ok(CpuStorage(vec![0.0; batch]));
        }
        let sums = if input.len() >= PARALLEL_THRESHOLD {
            input.0.par_chunks(row).map(|r| r.iter().sum()).collect()
        } else {
            input.0.chunks(row).map(|r| r.iter().sum()).collect()
        };
        Ok(CpuStorage(sums))
    }

    fn softmax_by_row(input: &CpuStorage, row_len: usize) -> Result<CpuStorage> {
        if row_len == 0 || input.len() % row_len != 0 {
            return Err(Error::msg(format!(
                "cannot split {} elements into rows of {}",
                input.len(),
                row_len
            )));
        }
        let mut out = input.0.clone();
        let softmax_row = |r: &mut [f32]| {
            let max = r.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0;
            for x in r.iter_mut() {
                *x = (*x - max).exp();
                sum += *x;
            }
            for x in r.iter_mut() {
                *x /= sum;
            }
        };
        if out.len() >= PARALLEL_THRESHOLD {
            out.par_chunks_mut(row_len).for_each(softmax_row);
        } else {
            out.chunks_mut(row_len).for_each(softmax_row);
        }
        Ok(CpuStorage(out))
    }

    fn to_vec(input: &CpuStorage) -> Result<Vec<f32>> {
        Ok(input.0.clone())
    }
}
