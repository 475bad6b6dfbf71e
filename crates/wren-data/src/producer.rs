// DataProducer — the batch iteration contract consumed by the engine
//
// A producer is configured with key=value properties, then finalized
// against the input and label dims of the graph. Finalizing returns a
// generator; every call to the generator yields one Iteration.
//
// EPOCH SEMANTICS (fixed-size producer, n samples, batch b):
//
//   calls 1 ..= n / b   → last = false, one valid batch each
//   call  n / b + 1     → last = true, no data
//   call  n / b + 2     → first batch of the next epoch, last = false
//
// A producer whose size is SIZE_UNDEFINED never reports last.

use wren_core::backend::Backend;
use wren_core::error::{Error, Result};
use wren_core::shape::Shape;
use wren_core::tensor::Tensor;

/// Size reported by producers that generate data without end.
pub const SIZE_UNDEFINED: usize = usize::MAX;

/// One generator step.
#[derive(Debug)]
pub struct Iteration<B: Backend> {
    /// True for the epoch-boundary marker; inputs and labels are then empty.
    pub last: bool,
    pub inputs: Vec<Tensor<B>>,
    pub labels: Vec<Tensor<B>>,
}

impl<B: Backend> Iteration<B> {
    pub(crate) fn end_of_epoch() -> Self {
        Iteration {
            last: true,
            inputs: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// Callable returned by [`DataProducer::finalize`].
pub type Generator<B> = Box<dyn FnMut() -> Result<Iteration<B>>>;

/// A source of training batches.
pub trait DataProducer<B: Backend> {
    /// Short type name, e.g. `"random_data_one_hot"`.
    fn kind(&self) -> &'static str;

    /// Apply `key=value` configuration strings.
    fn set_property(&mut self, values: &[String]) -> Result<()>;

    /// Validate the dims and build the generator.
    fn finalize(&self, input_dims: &[Shape], label_dims: &[Shape]) -> Result<Generator<B>>;

    /// Number of samples per epoch, or [`SIZE_UNDEFINED`].
    fn size(&self, input_dims: &[Shape], label_dims: &[Shape]) -> usize;
}

/// Split a `key=value` property string. Keys are lower-cased and trimmed.
pub fn parse_property(property: &str) -> Result<(String, String)> {
    let (key, value) = property.split_once('=').ok_or_else(|| {
        Error::invalid_parameter(format!("property '{property}' is not key=value"))
    })?;
    let key = key.trim().to_ascii_lowercase();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return Err(Error::invalid_parameter(format!(
            "property '{property}' has an empty key or value"
        )));
    }
    Ok((key, value.to_string()))
}

/// Parse a property value, mapping failures to `InvalidParameter`.
pub(crate) fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid_parameter(format!("invalid value '{value}' for '{key}'")))
}

/// Check that the dims are non-empty, valid, and share one batch size.
/// Returns that batch size.
pub fn validate_dims(input_dims: &[Shape], label_dims: &[Shape]) -> Result<usize> {
    let first = input_dims
        .first()
        .ok_or_else(|| Error::invalid_parameter("at least one input dim is required"))?;
    if label_dims.is_empty() {
        return Err(Error::invalid_parameter("at least one label dim is required"));
    }
    let batch = first.batch();
    for dim in input_dims.iter().chain(label_dims) {
        if !dim.is_valid() {
            return Err(Error::invalid_parameter(format!(
                "dim {dim} must be positive in every dimension"
            )));
        }
        if dim.batch() != batch {
            return Err(Error::invalid_parameter(format!(
                "dim {dim} has batch {}, expected {batch}",
                dim.batch()
            )));
        }
    }
    Ok(batch)
}

/// Tracks the position inside an epoch.
#[derive(Debug, Clone)]
pub(crate) struct EpochCursor {
    /// `None` for unbounded producers.
    batches_per_epoch: Option<usize>,
    served: usize,
}

impl EpochCursor {
    pub(crate) fn new(batches_per_epoch: Option<usize>) -> Self {
        EpochCursor {
            batches_per_epoch,
            served: 0,
        }
    }

    /// Advance one call. Returns true when this call is the epoch boundary.
    pub(crate) fn advance(&mut self) -> bool {
        match self.batches_per_epoch {
            Some(n) if self.served == n => {
                self.served = 0;
                true
            }
            _ => {
                self.served += 1;
                false
            }
        }
    }

    /// Index of the batch being served within the epoch (after `advance`).
    pub(crate) fn batch_index(&self) -> usize {
        self.served.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property(" Num_Samples = 10 ").unwrap(),
            ("num_samples".to_string(), "10".to_string())
        );
        assert!(matches!(parse_property("oops"), Err(Error::InvalidParameter(_))));
        assert!(matches!(parse_property("min="), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_validate_dims_batch_mismatch() {
        let inputs = [Shape::new(4, 1, 1, 3)];
        let labels = [Shape::new(2, 1, 1, 2)];
        assert!(matches!(
            validate_dims(&inputs, &labels),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(validate_dims(&inputs, &[Shape::new(4, 1, 1, 2)]).unwrap(), 4);
        assert!(validate_dims(&[], &labels).is_err());
    }

    #[test]
    fn test_epoch_cursor_boundary() {
        let mut c = EpochCursor::new(Some(2));
        assert!(!c.advance());
        assert_eq!(c.batch_index(), 0);
        assert!(!c.advance());
        assert_eq!(c.batch_index(), 1);
        assert!(c.advance());
        assert!(!c.advance());
        assert_eq!(c.batch_index(), 0);
    }

    #[test]
    fn test_epoch_cursor_unbounded() {
        let mut c = EpochCursor::new(None);
        assert!((0..100).all(|_| !c.advance()));
    }
}
