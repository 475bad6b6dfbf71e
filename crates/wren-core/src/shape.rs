use std::fmt;

// Shape — 4-D tensor dimension descriptor
//
// Every tensor in Wren is described by four dimensions:
//
//   batch   — number of samples processed together
//   channel — feature maps per sample
//   height  — rows per channel
//   width   — the feature axis; loss formulas normalise by this size
//
// Lower-rank data is expressed by setting the leading dimensions to 1:
//   - Vector of 4 features, batch 2: Shape(2, 1, 1, 4)
//   - Dense weight in→out:            Shape(1, 1, in, out)
//
// A shape is VALID when all four dimensions are positive. Zero-sized shapes
// are representable (they describe a zero-sized tensor) but layers reject
// them during initialization.

/// 4-D shape of a tensor: `(batch, channel, height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shape([usize; 4]);

impl Shape {
    /// Create a new shape from its four dimensions.
    pub const fn new(batch: usize, channel: usize, height: usize, width: usize) -> Self {
        Shape([batch, channel, height, width])
    }

    /// The dimension sizes as a slice, in `[batch, channel, height, width]` order.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn batch(&self) -> usize {
        self.0[0]
    }

    pub fn channel(&self) -> usize {
        self.0[1]
    }

    pub fn height(&self) -> usize {
        self.0[2]
    }

    pub fn width(&self) -> usize {
        self.0[3]
    }

    /// Number of elements in one sample (channel * height * width).
    pub fn feature_len(&self) -> usize {
        self.0[1] * self.0[2] * self.0[3]
    }

    /// Total number of elements (product of all dimensions).
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Whether every dimension is strictly positive.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|&d| d > 0)
    }

    /// The same shape with a different batch size.
    pub fn with_batch(&self, batch: usize) -> Self {
        Shape([batch, self.0[1], self.0[2], self.0[3]])
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}:{}:{}]",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

// Convenient From implementations
// Missing leading dimensions are filled with 1:
//   Shape::from(4)            → [1:1:1:4]
//   Shape::from((2, 4))       → [2:1:1:4]
//   Shape::from((2, 3, 4))    → [2:1:3:4]

impl From<usize> for Shape {
    fn from(w: usize) -> Self {
        Shape([1, 1, 1, w])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((b, w): (usize, usize)) -> Self {
        Shape([b, 1, 1, w])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((b, h, w): (usize, usize, usize)) -> Self {
        Shape([b, 1, h, w])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((b, c, h, w): (usize, usize, usize, usize)) -> Self {
        Shape([b, c, h, w])
    }
}

impl From<[usize; 4]> for Shape {
    fn from(dims: [usize; 4]) -> Self {
        Shape(dims)
    }
}
