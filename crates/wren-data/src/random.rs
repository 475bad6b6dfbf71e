// RandomDataOneHotProducer — synthetic inputs with one-hot labels
//
// Inputs are drawn from U(min, max); each label row has a single 1 at a
// random class index. Useful for smoke-testing a graph and for exercising
// the iteration contract without real data.
//
// PROPERTIES:
//
//   num_samples=<n>  fixed epoch of n samples (unset: unbounded)
//   min=<f>          lower bound of inputs (default 0)
//   max=<f>          upper bound of inputs (default 1)
//   seed=<u64>       reproducible stream

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wren_core::backend::Backend;
use wren_core::error::{Error, Result};
use wren_core::shape::Shape;
use wren_core::tensor::Tensor;

use crate::producer::{
    parse_property, parse_value, validate_dims, DataProducer, EpochCursor, Generator, Iteration,
    SIZE_UNDEFINED,
};

/// Configuration for [`RandomDataOneHotProducer`].
#[derive(Debug, Clone)]
pub struct RandomDataConfig {
    /// Samples per epoch; `None` produces forever.
    pub num_samples: Option<usize>,
    pub min: f32,
    pub max: f32,
    /// Optional random seed for reproducible data.
    pub seed: Option<u64>,
}

impl Default for RandomDataConfig {
    fn default() -> Self {
        Self {
            num_samples: None,
            min: 0.0,
            max: 1.0,
            seed: None,
        }
    }
}

impl RandomDataConfig {
    pub fn num_samples(mut self, n: usize) -> Self {
        self.num_samples = Some(n);
        self
    }

    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// Produces uniformly random inputs and random one-hot labels.
pub struct RandomDataOneHotProducer<B: Backend> {
    config: RandomDataConfig,
    device: B::Device,
}

impl<B: Backend> RandomDataOneHotProducer<B> {
    pub fn new(config: RandomDataConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    pub fn config(&self) -> &RandomDataConfig {
        &self.config
    }
}

fn one_hot_rows<R: Rng>(rng: &mut R, dim: &Shape) -> Vec<f32> {
    let classes = dim.width();
    let mut data = vec![0.0f32; dim.elem_count()];
    for row in data.chunks_mut(classes) {
        row[rng.gen_range(0..classes)] = 1.0;
    }
    data
}

impl<B: Backend> DataProducer<B> for RandomDataOneHotProducer<B> {
    fn kind(&self) -> &'static str {
        "random_data_one_hot"
    }

    fn set_property(&mut self, values: &[String]) -> Result<()> {
        for value in values {
            let (key, val) = parse_property(value)?;
            match key.as_str() {
                "num_samples" => self.config.num_samples = Some(parse_value(&key, &val)?),
                "min" => self.config.min = parse_value(&key, &val)?,
                "max" => self.config.max = parse_value(&key, &val)?,
                "seed" => self.config.seed = Some(parse_value(&key, &val)?),
                _ => {
                    return Err(Error::invalid_parameter(format!(
                        "{}: unknown property '{key}'",
                        DataProducer::<B>::kind(self)
                    )))
                }
            }
        }
        Ok(())
    }

    fn finalize(&self, input_dims: &[Shape], label_dims: &[Shape]) -> Result<Generator<B>> {
        let batch = validate_dims(input_dims, label_dims)?;
        let RandomDataConfig {
            num_samples,
            min,
            max,
            seed,
        } = self.config.clone();

        if !(min < max) {
            return Err(Error::invalid_parameter(format!(
                "min ({min}) must be smaller than max ({max})"
            )));
        }
        // The sampler needs finite bounds and a finite span.
        if !(min.is_finite() && max.is_finite() && (max - min).is_finite()) {
            return Err(Error::invalid_parameter(format!(
                "input range [{min}, {max}) must be finite"
            )));
        }
        if let Some(label) = label_dims
            .iter()
            .find(|d| d.channel() != 1 || d.height() != 1)
        {
            return Err(Error::invalid_parameter(format!(
                "one-hot label dim {label} must have channel 1 and height 1"
            )));
        }
        let batches_per_epoch = match num_samples {
            Some(n) if n < batch => {
                return Err(Error::invalid_parameter(format!(
                    "num_samples ({n}) is smaller than the batch size ({batch})"
                )))
            }
            Some(n) => Some(n / batch),
            None => None,
        };
        log::debug!(
            "random one-hot producer finalized: batch={batch}, batches_per_epoch={batches_per_epoch:?}"
        );

        let input_dims = input_dims.to_vec();
        let label_dims = label_dims.to_vec();
        let device = self.device.clone();
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let mut cursor = EpochCursor::new(batches_per_epoch);

        Ok(Box::new(move || {
            if cursor.advance() {
                return Ok(Iteration::end_of_epoch());
            }
            let inputs = input_dims
                .iter()
                .map(|dim| {
                    let data: Vec<f32> = (0..dim.elem_count())
                        .map(|_| rng.gen_range(min..max))
                        .collect();
                    Tensor::from_slice(&data, *dim, &device)
                })
                .collect::<Result<Vec<_>>>()?;
            let labels = label_dims
                .iter()
                .map(|dim| Tensor::from_slice(&one_hot_rows(&mut rng, dim), *dim, &device))
                .collect::<Result<Vec<_>>>()?;
            Ok(Iteration {
                last: false,
                inputs,
                labels,
            })
        }))
    }

    fn size(&self, _input_dims: &[Shape], _label_dims: &[Shape]) -> usize {
        self.config.num_samples.unwrap_or(SIZE_UNDEFINED)
    }
}
