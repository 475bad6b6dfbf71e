//! # Wren
//!
//! Variable/gradient containers and numerically stable loss layers for
//! neural-network training.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use wren::prelude::*;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `wren-core` | Tensor, Shape, Backend trait, VarGrad, initializers |
//! | `wren-cpu` | CPU backend with rayon parallelism |
//! | `wren-nn` | Layer trait, activation kinds, loss layer |
//! | `wren-data` | DataProducer contract, random and dataset producers |

/// Re-export core types.
pub use wren_core::{
    backend::{Backend, BackendDevice, BackendStorage, BinaryOp, UnaryOp},
    numeric, Error, Initializer, Ownership, Result, Shape, Tensor, VarGrad,
};

/// Re-export CPU backend.
pub use wren_cpu::{CpuBackend, CpuDevice, CpuStorage, CpuTensor};

/// Re-export layers and losses.
pub mod nn {
    pub use wren_nn::*;
}

/// Re-export data producers.
pub mod data {
    pub use wren_data::*;
}

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::data::{
        DataProducer, Dataset, DatasetProducer, RandomDataConfig, RandomDataOneHotProducer,
        VecDataset, SIZE_UNDEFINED,
    };
    pub use crate::nn::{ActivationKind, CostKind, Layer, LossConfig, LossLayer, LossState};
    pub use crate::{
        CpuBackend, CpuDevice, CpuTensor, Error, Initializer, Ownership, Result, Shape, Tensor,
        VarGrad,
    };
}
