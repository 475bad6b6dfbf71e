// DatasetProducer — batches drawn from an indexed Dataset
//
// One epoch visits floor(len / batch) batches; the trailing partial batch is
// dropped so every iteration has the graph's fixed batch size. With shuffle
// enabled the visiting order is re-drawn at the start of every epoch.
//
// PROPERTIES:
//
//   shuffle=<bool>   re-order samples each epoch (default false)
//   seed=<u64>       reproducible shuffling

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use wren_core::backend::Backend;
use wren_core::error::{Error, Result};
use wren_core::shape::Shape;
use wren_core::tensor::Tensor;

use crate::dataset::{Dataset, Sample};
use crate::producer::{
    parse_property, parse_value, validate_dims, DataProducer, EpochCursor, Generator, Iteration,
};

/// Gather batches above this size on the rayon pool.
const PARALLEL_GATHER: usize = 64;

/// Serves batches from a [`Dataset`].
pub struct DatasetProducer<B: Backend> {
    dataset: Arc<dyn Dataset>,
    shuffle: bool,
    seed: Option<u64>,
    device: B::Device,
}

impl<B: Backend> DatasetProducer<B> {
    pub fn new(dataset: Arc<dyn Dataset>, device: B::Device) -> Self {
        Self {
            dataset,
            shuffle: false,
            seed: None,
            device,
        }
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

fn fetch_samples(dataset: &dyn Dataset, indices: &[usize]) -> Vec<Sample> {
    if indices.len() >= PARALLEL_GATHER {
        indices.par_iter().map(|&i| dataset.get(i)).collect()
    } else {
        indices.iter().map(|&i| dataset.get(i)).collect()
    }
}

impl<B: Backend> DataProducer<B> for DatasetProducer<B> {
    fn kind(&self) -> &'static str {
        "dataset"
    }

    fn set_property(&mut self, values: &[String]) -> Result<()> {
        for value in values {
            let (key, val) = parse_property(value)?;
            match key.as_str() {
                "shuffle" => self.shuffle = parse_value(&key, &val)?,
                "seed" => self.seed = Some(parse_value(&key, &val)?),
                _ => {
                    return Err(Error::invalid_parameter(format!(
                        "dataset producer: unknown property '{key}'"
                    )))
                }
            }
        }
        Ok(())
    }

    fn finalize(&self, input_dims: &[Shape], label_dims: &[Shape]) -> Result<Generator<B>> {
        let batch = validate_dims(input_dims, label_dims)?;
        if input_dims.len() != 1 || label_dims.len() != 1 {
            return Err(Error::invalid_parameter(
                "dataset producer supports exactly one input and one label",
            ));
        }
        let (input_dim, label_dim) = (input_dims[0], label_dims[0]);
        let (feature_shape, target_shape) =
            (self.dataset.feature_shape(), self.dataset.target_shape());
        if feature_shape.feature_len() != input_dim.feature_len() {
            return Err(Error::invalid_parameter(format!(
                "{}: sample features {feature_shape} do not fit input dim {input_dim}",
                self.dataset.name()
            )));
        }
        if target_shape.feature_len() != label_dim.feature_len() {
            return Err(Error::invalid_parameter(format!(
                "{}: sample targets {target_shape} do not fit label dim {label_dim}",
                self.dataset.name()
            )));
        }
        let len = self.dataset.len();
        if len < batch {
            return Err(Error::invalid_parameter(format!(
                "{}: {len} samples cannot fill a batch of {batch}",
                self.dataset.name()
            )));
        }

        let dataset = Arc::clone(&self.dataset);
        let device = self.device.clone();
        let shuffle = self.shuffle;
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..len).collect();
        let mut cursor = EpochCursor::new(Some(len / batch));

        Ok(Box::new(move || {
            if cursor.advance() {
                return Ok(Iteration::end_of_epoch());
            }
            let index = cursor.batch_index();
            if index == 0 && shuffle {
                order.shuffle(&mut rng);
            }
            let samples = fetch_samples(dataset.as_ref(), &order[index * batch..(index + 1) * batch]);

            let mut features = Vec::with_capacity(input_dim.elem_count());
            let mut targets = Vec::with_capacity(label_dim.elem_count());
            for s in &samples {
                features.extend_from_slice(&s.features);
                targets.extend_from_slice(&s.target);
            }
            Ok(Iteration {
                last: false,
                inputs: vec![Tensor::from_slice(&features, input_dim, &device)?],
                labels: vec![Tensor::from_slice(&targets, label_dim, &device)?],
            })
        }))
    }

    fn size(&self, _input_dims: &[Shape], _label_dims: &[Shape]) -> usize {
        self.dataset.len()
    }
}
