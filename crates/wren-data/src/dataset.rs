// Dataset trait — indexed source of samples for DatasetProducer

use wren_core::error::{Error, Result};
use wren_core::shape::Shape;

/// A single sample: input features and label, both flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Vec<f32>,
    pub target: Vec<f32>,
}

/// A dataset is an indexed collection of samples.
///
/// Implementations must be `Send + Sync` so producers can gather a batch
/// from several threads.
pub trait Dataset: Send + Sync {
    /// Total number of samples in the dataset.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve the sample at position `index`.
    ///
    /// # Panics
    /// May panic if `index >= self.len()`.
    fn get(&self, index: usize) -> Sample;

    /// Shape of one feature sample (batch dimension 1).
    fn feature_shape(&self) -> Shape;

    /// Shape of one target sample (batch dimension 1).
    fn target_shape(&self) -> Shape;

    fn name(&self) -> &str {
        "dataset"
    }
}

/// A simple in-memory dataset backed by a `Vec<Sample>`.
pub struct VecDataset {
    samples: Vec<Sample>,
    feature_shape: Shape,
    target_shape: Shape,
    dataset_name: String,
}

impl VecDataset {
    /// Build from row-major feature/target buffers.
    ///
    /// `features` holds `n * feature_shape.feature_len()` values and
    /// `targets` holds `n * target_shape.feature_len()`.
    pub fn from_flat(
        features: &[f32],
        feature_shape: Shape,
        targets: &[f32],
        target_shape: Shape,
        name: &str,
    ) -> Result<Self> {
        let feat_per_sample = feature_shape.feature_len();
        let tgt_per_sample = target_shape.feature_len();
        if feat_per_sample == 0 || tgt_per_sample == 0 {
            return Err(Error::invalid_parameter(format!(
                "{name}: sample shapes {feature_shape} / {target_shape} are empty"
            )));
        }
        let n = features.len() / feat_per_sample;
        if features.len() != n * feat_per_sample || targets.len() != n * tgt_per_sample {
            return Err(Error::invalid_parameter(format!(
                "{name}: {} feature values and {} target values do not form whole samples",
                features.len(),
                targets.len()
            )));
        }

        let samples = (0..n)
            .map(|i| Sample {
                features: features[i * feat_per_sample..(i + 1) * feat_per_sample].to_vec(),
                target: targets[i * tgt_per_sample..(i + 1) * tgt_per_sample].to_vec(),
            })
            .collect();

        Ok(Self {
            samples,
            feature_shape: feature_shape.with_batch(1),
            target_shape: target_shape.with_batch(1),
            dataset_name: name.to_string(),
        })
    }
}

impl Dataset for VecDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Sample {
        self.samples[index].clone()
    }

    fn feature_shape(&self) -> Shape {
        self.feature_shape
    }

    fn target_shape(&self) -> Shape {
        self.target_shape
    }

    fn name(&self) -> &str {
        &self.dataset_name
    }
}
