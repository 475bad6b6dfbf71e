// VarGrad — a variable tensor paired with its gradient
//
// Every trainable layer keeps its parameters and activations in VarGrads.
// The pair supports three memory lifecycles:
//
//   eager   — both tensors allocated at construction
//   lazy    — both tensors carry a shape only; memory arrives later through
//             allocate_*() or initialize_*() once the graph-wide memory plan
//             is known
//   shared  — var and/or grad are rebound to buffers owned by someone else
//             (a memory pool, or grad aliasing var)
//
// INVARIANTS:
//
//   - grad, when present, has exactly var's shape
//   - grad() reports the empty sentinel whenever the gradient is not needed
//   - a failed rebind leaves both tensors untouched
//
// Rebinding replaces the handle stored here. Handles cloned out of the pair
// before a rebind keep observing the old storage.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::init::Initializer;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// A variable tensor and its (optional) gradient of the same shape.
///
/// `var()` and `grad()` hand out the handle currently stored in the pair.
/// The `initialize_*` binding calls store a new handle, so anything cloned
/// out before binding still points at the previous storage: fetch handles
/// again after the memory plan has been applied.
///
/// # Example
/// ```ignore
/// let w = VarGrad::<CpuBackend>::new(
///     Shape::new(1, 1, 4, 2), Initializer::XavierUniform, true, true, "fc:weight", &CpuDevice,
/// )?;
/// assert!(w.grad().is_allocated());
/// ```
pub struct VarGrad<B: Backend> {
    dim: Shape,
    var: Tensor<B>,
    /// Kept even while the gradient is switched off, see `set_needs_gradient`.
    grad: Tensor<B>,
    /// Returned by `grad()` while the gradient is not needed.
    no_grad: Tensor<B>,
    need_gradient: bool,
    alloc_now: bool,
    name: String,
}

impl<B: Backend> VarGrad<B> {
    /// Build the pair.
    ///
    /// `var` is created with `init`; `grad` (when needed) with zeros. With
    /// `alloc_now == false` neither tensor has memory until it is allocated
    /// or bound to an external buffer.
    pub fn new(
        dim: impl Into<Shape>,
        init: Initializer,
        need_gradient: bool,
        alloc_now: bool,
        name: impl Into<String>,
        device: &B::Device,
    ) -> Result<Self> {
        let dim = dim.into();
        let var = Tensor::with_initializer(dim, init, alloc_now, device)?;
        let grad = if need_gradient {
            Tensor::with_initializer(dim, Initializer::Zeros, alloc_now, device)?
        } else {
            Tensor::empty(device)
        };
        Ok(VarGrad {
            dim,
            var,
            grad,
            no_grad: Tensor::empty(device),
            need_gradient,
            alloc_now,
            name: name.into(),
        })
    }

    // Accessors

    pub fn dim(&self) -> &Shape {
        &self.dim
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var(&self) -> &Tensor<B> {
        &self.var
    }

    /// The gradient, or the empty sentinel when the gradient is not needed.
    pub fn grad(&self) -> &Tensor<B> {
        if self.need_gradient {
            &self.grad
        } else {
            &self.no_grad
        }
    }

    pub fn needs_gradient(&self) -> bool {
        self.need_gradient
    }

    /// Whether the pair was constructed in eager mode.
    pub fn is_allocated_now(&self) -> bool {
        self.alloc_now
    }

    fn check_buffer(&self, what: &str, buffer: &Tensor<B>) -> Result<()> {
        if *buffer.shape() != self.dim {
            let msg = format!(
                "{}: {} buffer shape {} differs from {}",
                self.name,
                what,
                buffer.shape(),
                self.dim
            );
            log::error!("{msg}");
            return Err(Error::invalid_argument(msg));
        }
        Ok(())
    }

    // Memory binding

    /// Make the variable alias `preallocated` (no copy).
    ///
    /// Ownership of the buffer stays with the caller. An empty buffer is a
    /// no-op; a buffer of a different shape fails with `InvalidArgument`.
    /// Handles previously returned by `var()` are not redirected.
    pub fn initialize_variable(&mut self, preallocated: &Tensor<B>) -> Result<()> {
        if preallocated.is_empty() {
            return Ok(());
        }
        self.check_buffer("variable", preallocated)?;
        self.var = self.var.share_from(preallocated)?;
        Ok(())
    }

    /// Make the gradient alias `preallocated` (no copy).
    ///
    /// The gradient is not reset here: with pooled buffers the owner of the
    /// pool zero-fills once, instead of every sharing layer doing so.
    /// Handles previously returned by `grad()` are not redirected.
    pub fn initialize_gradient(&mut self, preallocated: &Tensor<B>) -> Result<()> {
        if preallocated.is_empty() {
            return Ok(());
        }
        self.check_buffer("gradient", preallocated)?;
        // The sentinel has no shape to rebind, so bind a fresh lazy handle.
        let target = if self.grad.is_empty() {
            Tensor::lazy(self.dim, Initializer::Zeros, self.var.device())
        } else {
            self.grad.clone()
        };
        self.grad = target.share_from(preallocated)?;
        Ok(())
    }

    /// Make the gradient alias the variable's storage.
    ///
    /// Lossy: writing the gradient overwrites the variable. Only valid for
    /// layers that never read the variable after writing the gradient; the
    /// calling layer must say so where it calls this.
    pub fn initialize_shared(&mut self) {
        log::debug!("{}: gradient aliases variable storage", self.name);
        self.grad = self.var.alias();
    }

    /// Realize the variable's own memory if it is still lazy.
    pub fn allocate_variable(&self) -> Result<()> {
        self.var.allocate()
    }

    /// Realize the gradient's own memory if it is needed and still lazy.
    pub fn allocate_gradient(&self) -> Result<()> {
        if self.need_gradient && !self.grad.is_empty() {
            self.grad.allocate()?;
        }
        Ok(())
    }

    /// Zero the gradient in place. No-op if untracked or unallocated.
    pub fn reset_gradient(&self) -> Result<()> {
        if self.need_gradient && self.grad.is_allocated() {
            self.grad.fill(0.0)?;
        }
        Ok(())
    }

    /// Toggle gradient tracking.
    ///
    /// Turning tracking on while no gradient tensor exists creates a zeroed
    /// one in the variable's CURRENT allocation state: a lazy variable gets a
    /// lazy gradient. A gradient that already exists is kept as is, even
    /// across an off/on toggle, so its previous contents survive.
    pub fn set_needs_gradient(&mut self, need: bool) -> Result<()> {
        self.need_gradient = need;
        if need && self.grad.is_empty() {
            let alloc_now = self.var.is_allocated();
            self.grad =
                Tensor::with_initializer(self.dim, Initializer::Zeros, alloc_now, self.var.device())?;
        }
        Ok(())
    }
}

impl<B: Backend> std::fmt::Debug for VarGrad<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarGrad")
            .field("name", &self.name)
            .field("dim", &self.dim)
            .field("var", &self.var)
            .field("grad", self.grad())
            .field("need_gradient", &self.need_gradient)
            .finish()
    }
}
