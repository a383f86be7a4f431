//! Spacing type for physical distances between neighbouring pixels.

use super::Vector;

/// Physical distance between adjacent pixels along each index axis.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing on every axis.
    pub fn uniform(value: f64) -> Self {
        Self::from_fn(|_| value)
    }

    /// Whether every component is strictly positive and finite.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self[i] > 0.0 && self[i].is_finite())
    }
}
