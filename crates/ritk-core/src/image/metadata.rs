//! Physical-space geometry of an image.
//!
//! Metadata maps discrete pixel indices to physical coordinates:
//! `point = origin + Direction * (index ⊙ spacing)`.

use serde::{Deserialize, Serialize};
use crate::spatial::{Direction, Point, Spacing, Vector};

/// Origin, spacing and direction of an image grid.
///
/// The inverse direction is cached at construction because the
/// physical-to-index mapping runs for every interpolated sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata<const D: usize> {
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    inverse_direction: Direction<D>,
}

impl<const D: usize> ImageMetadata<D> {
    /// Create new image metadata.
    ///
    /// # Panics
    /// If the direction matrix is singular or the spacing is not strictly positive.
    pub fn new(origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self::try_new(origin, spacing, direction)
            .expect("Direction matrix must be invertible and spacing positive")
    }

    /// Create new image metadata, returning `None` for a singular direction
    /// matrix or a non-positive spacing.
    pub fn try_new(origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Option<Self> {
        if !spacing.is_valid() {
            return None;
        }
        let inverse_direction = direction.try_inverse()?;
        Some(Self {
            origin,
            spacing,
            direction,
            inverse_direction,
        })
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Physical location of an integer pixel index.
    pub fn index_to_physical_point(&self, index: &[usize; D]) -> Point<D> {
        let continuous = Point::from_fn(|i| index[i] as f64);
        self.continuous_index_to_physical_point(&continuous)
    }

    /// `point = origin + Direction * (index ⊙ spacing)`
    pub fn continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let scaled = Vector::from_fn(|i| index[i] * self.spacing[i]);
        self.origin + self.direction * scaled
    }

    /// `index = (Direction^-1 * (point - origin)) ⊘ spacing`
    pub fn physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        let rotated = self.inverse_direction * (*point - self.origin);
        Point::from_fn(|i| rotated[i] / self.spacing[i])
    }

    /// Convert a gradient taken with respect to continuous index coordinates
    /// into a gradient with respect to physical coordinates.
    ///
    /// `∇_p = Direction^-T * (∇_index ⊘ spacing)`
    pub fn index_gradient_to_physical(&self, gradient: &Vector<D>) -> Vector<D> {
        let scaled = Vector::from_fn(|i| gradient[i] / self.spacing[i]);
        Vector(self.inverse_direction.0.transpose() * scaled.0)
    }
}

impl<const D: usize> Default for ImageMetadata<D> {
    fn default() -> Self {
        Self {
            origin: Point::origin(),
            spacing: Spacing::uniform(1.0),
            direction: Direction::identity(),
            inverse_direction: Direction::identity(),
        }
    }
}
