// Layer trait — the uniform surface the execution engine drives
//
// The engine walks the graph and calls the same methods on every layer:
//
//   set_input_dim → initialize(last) → forward / forward_with_label
//                                    → backward(derivative, iteration)
//
// Layers that have no use for a label inherit the default
// `forward_with_label`, which ignores it. Loss layers do the opposite: their
// label-less `forward` exists only so traversal code needs no special case.

use wren_core::backend::Backend;
use wren_core::error::Result;
use wren_core::shape::Shape;
use wren_core::tensor::Tensor;

/// A computational stage in a layer graph.
pub trait Layer<B: Backend> {
    /// Short type name, e.g. `"loss"`.
    fn kind(&self) -> &'static str;

    /// Record the input dimension chosen by graph construction.
    fn set_input_dim(&mut self, dim: Shape);

    fn input_dim(&self) -> Shape;

    fn output_dim(&self) -> Shape;

    /// Validate configuration once dims are known. `last` tells the layer
    /// whether it is the final stage of the graph.
    fn initialize(&mut self, last: bool) -> Result<()>;

    /// Forward pass without a label.
    fn forward(&mut self, input: &Tensor<B>) -> Result<Tensor<B>>;

    /// Forward pass for the final stage, which also receives the label.
    fn forward_with_label(&mut self, input: &Tensor<B>, _label: &Tensor<B>) -> Result<Tensor<B>> {
        self.forward(input)
    }

    /// Backward pass: gradient w.r.t. this layer's input.
    fn backward(&mut self, derivative: &Tensor<B>, iteration: usize) -> Result<Tensor<B>>;

    /// Apply `key=value` configuration strings.
    fn set_property(&mut self, values: &[String]) -> Result<()>;

    /// Loss recorded by the last forward pass (0 for non-loss layers).
    fn loss(&self) -> f32 {
        0.0
    }
}
