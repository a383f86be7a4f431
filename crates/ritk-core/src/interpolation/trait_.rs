//! Interpolator trait for sampling values at physical points.

use crate::image::ImageBuffer;
use crate::spatial::{Point, Vector};

/// Interpolator trait for sampling image values at continuous positions.
///
/// Interpolators own a shared handle to the image they sample. Callers
/// check [`Interpolator::is_inside_buffer`] before evaluating; behaviour
/// outside the buffer is implementation defined but never panics.
///
/// # Type Parameters
/// * `D` - The image dimensionality
pub trait Interpolator<const D: usize>: Send + Sync {
    /// The sampled image.
    fn image(&self) -> &ImageBuffer<D>;

    /// Whether `point` maps inside `[0, size - 1]` on every index axis.
    fn is_inside_buffer(&self, point: &Point<D>) -> bool {
        self.image().is_inside(point)
    }

    /// Interpolated intensity at a physical point.
    fn evaluate(&self, point: &Point<D>) -> f64;

    /// Physical-space intensity gradient, when the interpolator has an
    /// analytic derivative.
    fn evaluate_derivative(&self, point: &Point<D>) -> Option<Vector<D>> {
        let _ = point;
        None
    }
}
