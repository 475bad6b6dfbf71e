//! # wren-core
//!
//! Core tensor primitives, backend traits, and variable/gradient containers
//! for Wren.
//!
//! This crate provides:
//! - [`Tensor`] — 4-D array with empty / lazy / allocated states and
//!   reference-counted storage that can be aliased
//! - [`Shape`] — `(batch, channel, height, width)` descriptor
//! - [`Backend`] trait — abstraction over compute devices
//! - [`VarGrad`] — a variable tensor paired with its gradient
//! - [`Initializer`] — fill policies applied when storage is realized
//! - [`numeric`] — scalar helpers (guarded log, rectifier, sigmoid)

pub mod backend;
pub mod error;
pub mod init;
pub mod numeric;
pub mod shape;
pub mod tensor;
pub mod var_grad;

pub use backend::{Backend, BackendDevice, BackendStorage, BinaryOp, UnaryOp};
pub use error::{Error, Result};
pub use init::Initializer;
pub use shape::Shape;
pub use tensor::{Ownership, Tensor};
pub use var_grad::VarGrad;
