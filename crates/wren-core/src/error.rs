use crate::shape::Shape;

/// All errors that can occur within Wren.
///
/// The first three variants form the lifecycle taxonomy surfaced to the
/// execution engine. The remaining variants come from the tensor layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed shape, non-terminal loss stage, bad configuration value, or
    /// use of a stage that failed initialization.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation exists for uniformity but has no meaning here.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Shape mismatch when binding a tensor to externally owned memory.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Shape mismatch between two tensors in an element-wise operation.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// The tensor has a shape but no backing memory yet.
    #[error("tensor is not allocated: {0}")]
    NotAllocated(String),

    /// Element count mismatch when creating from a slice.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    pub fn invalid_parameter(s: impl Into<String>) -> Self {
        Error::InvalidParameter(s.into())
    }

    pub fn not_supported(s: impl Into<String>) -> Self {
        Error::NotSupported(s.into())
    }

    pub fn invalid_argument(s: impl Into<String>) -> Self {
        Error::InvalidArgument(s.into())
    }
}

/// Convenience Result type used throughout Wren.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
