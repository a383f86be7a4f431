//! Direction type for representing image orientation.

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};
use super::Vector;

/// Direction matrix of an image.
///
/// Column `i` is the physical direction of index axis `i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    /// Create an identity direction matrix (axis-aligned image).
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Build a direction matrix from row-major entries.
    pub fn from_row_slice(entries: &[f64]) -> Self {
        assert!(entries.len() == D * D, "Direction needs D*D entries");
        Self(SMatrix::from_row_slice(entries))
    }

    /// Check if the matrix is orthonormal within `1e-6`.
    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        (0..D).all(|i| {
            (0..D).all(|j| {
                let expected = if i == j { 1.0 } else { 0.0 };
                (product[(i, j)] - expected).abs() < 1e-6
            })
        })
    }

    /// Try to compute the inverse of the direction matrix.
    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Physical direction of index axis `axis`.
    pub fn axis(&self, axis: usize) -> Vector<D> {
        Vector::from_fn(|row| self.0[(row, axis)])
    }

    /// Get the inner nalgebra matrix.
    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}
