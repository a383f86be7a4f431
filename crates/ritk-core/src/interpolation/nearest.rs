//! Nearest neighbor interpolation implementation.

use std::sync::Arc;
use crate::image::ImageBuffer;
use crate::spatial::Point;
use super::trait_::Interpolator;

/// Nearest Neighbor Interpolator.
///
/// Rounds the continuous index to the closest pixel, clamped into the buffer.
#[derive(Debug, Clone)]
pub struct NearestNeighborInterpolator<const D: usize> {
    image: Arc<ImageBuffer<D>>,
}

impl<const D: usize> NearestNeighborInterpolator<D> {
    pub fn new(image: Arc<ImageBuffer<D>>) -> Self {
        Self { image }
    }
}

impl<const D: usize> Interpolator<D> for NearestNeighborInterpolator<D> {
    fn image(&self) -> &ImageBuffer<D> {
        &self.image
    }

    fn evaluate(&self, point: &Point<D>) -> f64 {
        let index = self.image.physical_point_to_continuous_index(point);
        let rounded: [isize; D] = std::array::from_fn(|i| index[i].round() as isize);
        self.image.value_clamped(&rounded)
    }
}
