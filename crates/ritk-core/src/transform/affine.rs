//! Affine transform implementation.
//!
//! This module provides an affine transform (linear transformation + translation).

use nalgebra::SMatrix;
use crate::spatial::{Point, Vector};
use super::trait_::{Transform, TransformJacobian};

/// Affine Transform (Linear transformation + Translation).
///
/// Represents a general affine transformation with a fixed center:
/// T(x) = A(x - c) + c + t
///
/// where:
/// * A is a D×D matrix (linear transformation: rotation, scale, shear)
/// * t is a D-dimensional translation vector
/// * c is a D-dimensional fixed center of rotation/scaling
///
/// Parameters are the entries of A in row-major order followed by t.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransform<const D: usize> {
    matrix: SMatrix<f64, D, D>,
    translation: Vector<D>,
    center: Point<D>,
}

impl<const D: usize> AffineTransform<D> {
    pub fn new(matrix: SMatrix<f64, D, D>, translation: Vector<D>, center: Point<D>) -> Self {
        Self {
            matrix,
            translation,
            center,
        }
    }

    /// Identity transform about `center`.
    pub fn identity(center: Point<D>) -> Self {
        Self::new(SMatrix::identity(), Vector::zeros(), center)
    }

    pub fn matrix(&self) -> &SMatrix<f64, D, D> {
        &self.matrix
    }

    pub fn translation(&self) -> &Vector<D> {
        &self.translation
    }

    pub fn center(&self) -> &Point<D> {
        &self.center
    }
}

impl<const D: usize> Transform<D> for AffineTransform<D> {
    fn number_of_parameters(&self) -> usize {
        D * D + D
    }

    fn parameters(&self) -> Vec<f64> {
        let mut parameters = Vec::with_capacity(D * D + D);
        for row in 0..D {
            for col in 0..D {
                parameters.push(self.matrix[(row, col)]);
            }
        }
        parameters.extend_from_slice(&self.translation.to_array());
        parameters
    }

    fn set_parameters(&mut self, parameters: &[f64]) {
        assert_eq!(parameters.len(), D * D + D, "Affine expects {} parameters", D * D + D);
        self.matrix = SMatrix::from_fn(|row, col| parameters[row * D + col]);
        self.translation = Vector::from_fn(|i| parameters[D * D + i]);
    }

    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        let centered = *point - self.center;
        let mapped = Vector(self.matrix * centered.0);
        self.center + mapped + self.translation
    }

    fn number_of_nonzero_jacobian_indices(&self) -> usize {
        D * D + D
    }

    fn jacobian(&self, point: &Point<D>, jacobian: &mut TransformJacobian) {
        let n = D * D + D;
        jacobian.reset(D, n);
        let centered = *point - self.center;
        for row in 0..D {
            for col in 0..D {
                jacobian.set(row, row * D + col, centered[col]);
            }
            jacobian.set(row, D * D + row, 1.0);
        }
        for (c, index) in jacobian.nonzero_indices_mut().iter_mut().enumerate() {
            *index = c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_about_center() {
        let mut transform = AffineTransform::<2>::identity(Point::new([1.0, 1.0]));
        // 90 degree rotation, shifted by (0.5, 0)
        transform.set_parameters(&[0.0, -1.0, 1.0, 0.0, 0.5, 0.0]);
        let moved = transform.transform_point(&Point::new([2.0, 1.0]));
        assert!((moved[0] - 1.5).abs() < 1e-12);
        assert!((moved[1] - 2.0).abs() < 1e-12);
        assert_eq!(transform.parameters(), vec![0.0, -1.0, 1.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_affine_jacobian_matches_difference_quotient() {
        let mut transform = AffineTransform::<2>::identity(Point::new([0.5, -1.0]));
        let base = vec![1.1, 0.2, -0.3, 0.9, 0.4, -0.7];
        transform.set_parameters(&base);
        let point = Point::new([2.0, 3.5]);
        let mut jacobian = TransformJacobian::new();
        transform.jacobian(&point, &mut jacobian);
        let h = 1e-6;
        for p in 0..base.len() {
            let mut plus = base.clone();
            plus[p] += h;
            let mut minus = base.clone();
            minus[p] -= h;
            transform.set_parameters(&plus);
            let a = transform.transform_point(&point);
            transform.set_parameters(&minus);
            let b = transform.transform_point(&point);
            for row in 0..2 {
                let numeric = (a[row] - b[row]) / (2.0 * h);
                assert!((numeric - jacobian.get(row, p)).abs() < 1e-6);
            }
        }
    }
}
