//! # wren-data
//!
//! The batch iteration contract between data sources and the execution
//! engine.
//!
//! This crate provides:
//! - [`DataProducer`] trait — finalize against graph dims, then call the
//!   returned generator once per batch
//! - [`RandomDataOneHotProducer`] — synthetic inputs with one-hot labels
//! - [`DatasetProducer`] — batches gathered from an indexed [`Dataset`]
//! - [`VecDataset`] — in-memory dataset built from flat buffers

pub mod dataset;
pub mod from_dataset;
pub mod producer;
pub mod random;

pub use dataset::{Dataset, Sample, VecDataset};
pub use from_dataset::DatasetProducer;
pub use producer::{
    parse_property, validate_dims, DataProducer, Generator, Iteration, SIZE_UNDEFINED,
};
pub use random::{RandomDataConfig, RandomDataOneHotProducer};
