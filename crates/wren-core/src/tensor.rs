use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::{Backend, BinaryOp, UnaryOp};
use crate::error::{Error, Result};
use crate::init::Initializer;
use crate::shape::Shape;

// Tensor — The fundamental data structure
//
// A Tensor is a 4-D array of f32 values living on a backend device. Besides
// the usual shape and data, a Wren tensor tracks WHEN its memory exists and
// WHO provided it, because layers plan memory for a whole graph before any
// buffer is committed.
//
// ALLOCATION STATES:
//
//   Empty        — Tensor::empty(): no shape, no storage. The sentinel used
//                  for "no gradient". Distinct from a zero-sized tensor.
//   Unallocated  — has a shape, storage not realized yet (lazy mode).
//   Allocated    — shape and storage present.
//
// MEMORY MODEL:
//
//   Storage lives in a shared slot: Arc<RwLock<Option<Storage>>>.
//   - Cloning a Tensor copies the handle; both handles see the same slot.
//   - alias() / share_from() build a NEW handle (own shape, own tag) over an
//     existing slot. Writes through one handle are visible through the other.
//   - Realizing a lazy slot (allocate) is visible to every alias.
//
// OWNERSHIP TAG:
//
//   Owned     — this handle created the slot.
//   Borrowed  — this handle views a slot created by someone else (a memory
//               pool, another tensor). The slot is reference counted, so a
//               borrowed view keeps the arena buffer alive; a dangling view
//               cannot be expressed.

/// Whether a tensor handle created its storage slot or views someone else's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

type StorageSlot<S> = Arc<RwLock<Option<S>>>;

/// Inner data of a tensor, shared via Arc.
struct TensorInner<B: Backend> {
    shape: Shape,
    /// True only for the `Tensor::empty()` sentinel.
    empty: bool,
    storage: StorageSlot<B::Storage>,
    ownership: Ownership,
    /// Applied when a lazy tensor is allocated, or on `initialize()`.
    initializer: Initializer,
    device: B::Device,
}

/// A 4-D array of f32 values on a specific backend.
///
/// # Example
/// ```ignore
/// use wren_core::Tensor;
/// use wren_cpu::{CpuBackend, CpuDevice};
///
/// let a = Tensor::<CpuBackend>::from_slice(&[1.0, 2.0, 3.0, 4.0], (2, 2), &CpuDevice)?;
/// let b = Tensor::<CpuBackend>::ones((2, 2), &CpuDevice)?;
/// let c = a.sub(&b)?;
/// ```
pub struct Tensor<B: Backend> {
    inner: Arc<TensorInner<B>>,
}

impl<B: Backend> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        Tensor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "Tensor(empty)");
        }
        write!(
            f,
            "Tensor(shape={}, allocated={}, ownership={:?}, device={:?})",
            self.inner.shape,
            self.is_allocated(),
            self.inner.ownership,
            self.inner.device,
        )
    }
}

impl<B: Backend> Tensor<B> {
    // Internal constructors

    fn new_inner(
        shape: Shape,
        storage: Option<B::Storage>,
        initializer: Initializer,
        device: B::Device,
    ) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                shape,
                empty: false,
                storage: Arc::new(RwLock::new(storage)),
                ownership: Ownership::Owned,
                initializer,
                device,
            }),
        }
    }

    /// Create an allocated tensor from backend storage.
    pub(crate) fn from_storage(storage: B::Storage, shape: Shape, device: B::Device) -> Self {
        Self::new_inner(shape, Some(storage), Initializer::None, device)
    }

    // Creation methods

    /// The empty sentinel: no shape and no storage.
    pub fn empty(device: &B::Device) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                shape: Shape::default(),
                empty: true,
                storage: Arc::new(RwLock::new(None)),
                ownership: Ownership::Owned,
                initializer: Initializer::None,
                device: device.clone(),
            }),
        }
    }

    /// A tensor whose storage is realized later by [`Tensor::allocate`].
    pub fn lazy(shape: impl Into<Shape>, init: Initializer, device: &B::Device) -> Self {
        Self::new_inner(shape.into(), None, init, device.clone())
    }

    /// Create a tensor with an initializer, allocating now or deferring.
    pub fn with_initializer(
        shape: impl Into<Shape>,
        init: Initializer,
        alloc_now: bool,
        device: &B::Device,
    ) -> Result<Self> {
        let t = Self::lazy(shape, init, device);
        if alloc_now {
            t.allocate()?;
        }
        Ok(t)
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        Self::with_initializer(shape, Initializer::Zeros, true, device)
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        Self::with_initializer(shape, Initializer::Ones, true, device)
    }

    /// Create a tensor filled with a constant value.
    pub fn full(shape: impl Into<Shape>, val: f32, device: &B::Device) -> Result<Self> {
        Self::with_initializer(shape, Initializer::Constant(val), true, device)
    }

    /// Create a tensor from a flat row-major slice.
    pub fn from_slice(data: &[f32], shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                shape,
                expected: shape.elem_count(),
                got: data.len(),
            });
        }
        let storage = B::from_slice(data, device)?;
        Ok(Self::from_storage(storage, shape, device.clone()))
    }

    /// Zeros with the same shape and device as `other`.
    pub fn zeros_like(other: &Self) -> Result<Self> {
        Self::zeros(*other.shape(), other.device())
    }

    // Accessors

    /// The shape of this tensor. The empty sentinel reports `[0:0:0:0]`.
    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.inner.shape.dims()
    }

    pub fn batch(&self) -> usize {
        self.inner.shape.batch()
    }

    pub fn width(&self) -> usize {
        self.inner.shape.width()
    }

    pub fn elem_count(&self) -> usize {
        self.inner.shape.elem_count()
    }

    pub fn device(&self) -> &B::Device {
        &self.inner.device
    }

    pub fn initializer(&self) -> Initializer {
        self.inner.initializer
    }

    pub fn ownership(&self) -> Ownership {
        self.inner.ownership
    }

    /// Whether this is the `Tensor::empty()` sentinel.
    pub fn is_empty(&self) -> bool {
        self.inner.empty
    }

    /// Whether backing memory exists for this tensor.
    pub fn is_allocated(&self) -> bool {
        self.read_storage().is_some()
    }

    /// Whether both handles observe the same storage slot.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner.storage, &other.inner.storage)
    }

    // Every write replaces the whole Option in one assignment, after the new
    // storage is built. A panic while the lock is held therefore leaves the
    // previous value intact, so a poisoned slot is still read as-is.

    fn read_storage(&self) -> RwLockReadGuard<'_, Option<B::Storage>> {
        self.inner
            .storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_storage(&self) -> RwLockWriteGuard<'_, Option<B::Storage>> {
        self.inner
            .storage
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the realized storage, failing if there is none.
    fn with_storage<R>(&self, f: impl FnOnce(&B::Storage) -> Result<R>) -> Result<R> {
        let guard = self.read_storage();
        match guard.as_ref() {
            Some(storage) => f(storage),
            None if self.is_empty() => Err(Error::NotAllocated("empty tensor".into())),
            None => Err(Error::NotAllocated(format!("tensor {}", self.inner.shape))),
        }
    }

    // Memory lifecycle

    /// Realize the storage slot using this tensor's initializer.
    ///
    /// No-op when already allocated. Every alias of the slot observes the
    /// new memory.
    pub fn allocate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::NotAllocated(
                "cannot allocate the empty tensor".into(),
            ));
        }
        let mut guard = self.write_storage();
        if guard.is_none() {
            log::debug!(
                "allocating tensor {} with {} initializer",
                self.inner.shape,
                self.inner.initializer
            );
            *guard = Some(
                self.inner
                    .initializer
                    .fill::<B>(&self.inner.shape, &self.inner.device)?,
            );
        }
        Ok(())
    }

    /// Re-apply the initializer to already allocated storage.
    pub fn initialize(&self) -> Result<()> {
        let mut guard = self.write_storage();
        if guard.is_none() {
            return Err(Error::NotAllocated(format!("tensor {}", self.inner.shape)));
        }
        *guard = Some(
            self.inner
                .initializer
                .fill::<B>(&self.inner.shape, &self.inner.device)?,
        );
        Ok(())
    }

    /// A borrowed handle over this tensor's storage slot.
    ///
    /// Writes through either handle are visible through the other, including
    /// a later `allocate()` of a lazy slot.
    pub fn alias(&self) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                shape: self.inner.shape,
                empty: self.inner.empty,
                storage: Arc::clone(&self.inner.storage),
                ownership: Ownership::Borrowed,
                initializer: self.inner.initializer,
                device: self.inner.device.clone(),
            }),
        }
    }

    /// Rebind: a borrowed handle with this tensor's shape and initializer
    /// whose storage is `source`'s slot. No data is copied.
    ///
    /// Fails with `InvalidArgument` if the shapes differ or `source` is the
    /// empty sentinel. `self` is never modified.
    pub fn share_from(&self, source: &Self) -> Result<Self> {
        if source.is_empty() {
            return Err(Error::invalid_argument(
                "cannot share memory with the empty tensor",
            ));
        }
        if source.shape() != self.shape() {
            return Err(Error::invalid_argument(format!(
                "shared buffer shape {} differs from tensor shape {}",
                source.shape(),
                self.shape()
            )));
        }
        log::debug!("binding tensor {} to external storage", self.inner.shape);
        Ok(Tensor {
            inner: Arc::new(TensorInner {
                shape: self.inner.shape,
                empty: false,
                storage: Arc::clone(&source.inner.storage),
                ownership: Ownership::Borrowed,
                initializer: self.inner.initializer,
                device: self.inner.device.clone(),
            }),
        })
    }

    /// Deep copy into a fresh owned slot, preserving the allocation state.
    pub fn deep_copy(&self) -> Result<Self> {
        if self.is_empty() {
            return Ok(Self::empty(self.device()));
        }
        let storage = self.read_storage().clone();
        Ok(Self::new_inner(
            self.inner.shape,
            storage,
            self.inner.initializer,
            self.inner.device.clone(),
        ))
    }

    // In-place mutation

    /// Overwrite the contents of the storage slot.
    ///
    /// Every tensor sharing the slot sees the new values. Also realizes a
    /// lazy slot.
    pub fn update_data_inplace(&self, new_data: &[f32]) -> Result<()> {
        if self.is_empty() {
            return Err(Error::NotAllocated("empty tensor".into()));
        }
        let expected = self.elem_count();
        if new_data.len() != expected {
            return Err(Error::ElementCountMismatch {
                shape: self.inner.shape,
                expected,
                got: new_data.len(),
            });
        }
        let new_storage = B::from_slice(new_data, self.device())?;
        let mut guard = self.write_storage();
        *guard = Some(new_storage);
        Ok(())
    }

    /// Set every element to `val`. Requires allocated storage.
    pub fn fill(&self, val: f32) -> Result<()> {
        let mut guard = self.write_storage();
        if guard.is_none() {
            return Err(Error::NotAllocated(format!("tensor {}", self.inner.shape)));
        }
        *guard = Some(B::full(self.elem_count(), val, self.device())?);
        Ok(())
    }

    // Arithmetic operations

    /// Element-wise addition: self + rhs.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Add)
    }

    /// Element-wise subtraction: self - rhs.
    pub fn sub(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Sub)
    }

    /// Element-wise multiplication: self * rhs.
    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Mul)
    }

    /// Element-wise division: self / rhs.
    pub fn div(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Div)
    }

    fn binary_op(&self, rhs: &Self, op: BinaryOp) -> Result<Self> {
        if self.shape() != rhs.shape() {
            return Err(Error::ShapeMismatch {
                expected: *self.shape(),
                got: *rhs.shape(),
            });
        }
        // Aliased operands share one lock; take it once.
        let result = if self.shares_storage_with(rhs) {
            self.with_storage(|s| B::binary_op(op, s, s))?
        } else {
            self.with_storage(|l| rhs.with_storage(|r| B::binary_op(op, l, r)))?
        };
        Ok(Self::from_storage(
            result,
            self.inner.shape,
            self.inner.device.clone(),
        ))
    }

    // Unary operations

    pub fn neg(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Neg)
    }

    pub fn abs(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Abs)
    }

    pub fn exp(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Exp)
    }

    /// Guarded natural logarithm: `ln(x + 1e-20)`.
    pub fn log(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Log)
    }

    pub fn relu(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Relu)
    }

    pub fn sigmoid(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sigmoid)
    }

    pub fn tanh(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Tanh)
    }

    pub fn square(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Square)
    }

    /// `ln(1 + exp(-|x|))`, computed with `ln_1p` so small tails keep their
    /// precision.
    pub fn log1p_exp_neg_abs(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Log1pExpNegAbs)
    }

    fn unary_op(&self, op: UnaryOp) -> Result<Self> {
        let result = self.with_storage(|s| B::unary_op(op, s))?;
        Ok(Self::from_storage(
            result,
            self.inner.shape,
            self.inner.device.clone(),
        ))
    }

    /// Affine transform: result[i] = self[i] * mul + add.
    pub fn affine(&self, mul: f32, add: f32) -> Result<Self> {
        let result = self.with_storage(|s| B::affine(s, mul, add))?;
        Ok(Self::from_storage(
            result,
            self.inner.shape,
            self.inner.device.clone(),
        ))
    }

    /// Multiply every element by `factor`.
    pub fn scale(&self, factor: f32) -> Result<Self> {
        self.affine(factor, 0.0)
    }

    // Reductions

    /// Sum each sample: shape (b, c, h, w) → (b, 1, 1, 1).
    pub fn sum_by_batch(&self) -> Result<Self> {
        let batch = self.batch();
        let result = self.with_storage(|s| B::sum_by_batch(s, batch))?;
        Ok(Self::from_storage(
            result,
            Shape::new(batch, 1, 1, 1),
            self.inner.device.clone(),
        ))
    }

    /// Softmax along the width axis.
    pub fn softmax(&self) -> Result<Self> {
        let width = self.width();
        let result = self.with_storage(|s| B::softmax_by_row(s, width))?;
        Ok(Self::from_storage(
            result,
            self.inner.shape,
            self.inner.device.clone(),
        ))
    }

    // Data extraction

    /// Extract all elements as a flat row-major vector.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        self.with_storage(|s| B::to_vec(s))
    }

    /// Extract a scalar value (tensor must have exactly 1 element).
    pub fn to_scalar(&self) -> Result<f32> {
        if self.elem_count() != 1 {
            crate::bail!("not a scalar: tensor has shape {}", self.inner.shape);
        }
        Ok(self.to_vec()?[0])
    }
}
