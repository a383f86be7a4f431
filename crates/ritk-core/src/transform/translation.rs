//! Translation transform implementation.

use crate::spatial::{Point, Vector};
use super::trait_::{Transform, TransformJacobian};

/// Translates points by a fixed offset vector.
///
/// Parameters are the offset components.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationTransform<const D: usize> {
    offset: Vector<D>,
}

impl<const D: usize> TranslationTransform<D> {
    pub fn new(offset: Vector<D>) -> Self {
        Self { offset }
    }

    pub fn identity() -> Self {
        Self::new(Vector::zeros())
    }

    pub fn offset(&self) -> &Vector<D> {
        &self.offset
    }
}

impl<const D: usize> Transform<D> for TranslationTransform<D> {
    fn number_of_parameters(&self) -> usize {
        D
    }

    fn parameters(&self) -> Vec<f64> {
        self.offset.to_array().to_vec()
    }

    fn set_parameters(&mut self, parameters: &[f64]) {
        assert_eq!(parameters.len(), D, "Translation expects {D} parameters");
        self.offset = Vector::from_fn(|i| parameters[i]);
    }

    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        *point + self.offset
    }

    fn number_of_nonzero_jacobian_indices(&self) -> usize {
        D
    }

    fn jacobian(&self, _point: &Point<D>, jacobian: &mut TransformJacobian) {
        jacobian.reset(D, D);
        for i in 0..D {
            jacobian.set(i, i, 1.0);
            jacobian.nonzero_indices_mut()[i] = i;
        }
    }
}
