//! Metric trait for image similarity measurement.

use crate::error::Result;

/// Cost function over transform parameters.
///
/// Lower values indicate better alignment. Implementations own their
/// scratch state, so evaluation takes `&mut self`.
pub trait Metric {
    /// Get the name of this metric.
    fn name(&self) -> &'static str;

    /// Length of the parameter vectors accepted by the evaluation methods.
    fn number_of_parameters(&self) -> usize;

    /// Validate collaborators and precompute everything evaluation needs.
    ///
    /// Must succeed before any evaluation.
    fn initialize(&mut self) -> Result<()>;

    fn value(&mut self, parameters: &[f64]) -> Result<f64>;

    fn derivative(&mut self, parameters: &[f64]) -> Result<Vec<f64>> {
        Ok(self.value_and_derivative(parameters)?.1)
    }

    /// Value and derivative from a single pass over the samples.
    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, Vec<f64>)>;
}
