//! Linear interpolation implementation.
//!
//! Multilinear interpolation over the `2^D` pixels surrounding a point.

use std::sync::Arc;
use crate::image::ImageBuffer;
use crate::spatial::Point;
use super::trait_::Interpolator;

/// Linear Interpolator.
///
/// Performs linear interpolation (bilinear for 2D, trilinear for 3D).
/// Neighbours beyond the last pixel are clamped, so the value on the far
/// boundary equals the boundary pixel.
#[derive(Debug, Clone)]
pub struct LinearInterpolator<const D: usize> {
    image: Arc<ImageBuffer<D>>,
}

impl<const D: usize> LinearInterpolator<D> {
    pub fn new(image: Arc<ImageBuffer<D>>) -> Self {
        Self { image }
    }
}

impl<const D: usize> Interpolator<D> for LinearInterpolator<D> {
    fn image(&self) -> &ImageBuffer<D> {
        &self.image
    }

    fn evaluate(&self, point: &Point<D>) -> f64 {
        let index = self.image.physical_point_to_continuous_index(point);
        let base: [isize; D] = std::array::from_fn(|i| index[i].floor() as isize);
        let fraction: [f64; D] = std::array::from_fn(|i| index[i] - base[i] as f64);

        let mut value = 0.0;
        for corner in 0..(1usize << D) {
            let mut weight = 1.0;
            let neighbour: [isize; D] = std::array::from_fn(|i| {
                if corner & (1 << i) != 0 {
                    weight *= fraction[i];
                    base[i] + 1
                } else {
                    weight *= 1.0 - fraction[i];
                    base[i]
                }
            });
            if weight != 0.0 {
                value += weight * self.image.value_clamped(&neighbour);
            }
        }
        value
    }
}
