//! Spatial masks restricting where metrics sample.

use std::sync::Arc;
use crate::image::ImageBuffer;
use crate::spatial::Point;

/// Point containment test in physical space.
pub trait Mask<const D: usize>: Send + Sync {
    fn is_inside(&self, point: &Point<D>) -> bool;
}

impl<const D: usize, F> Mask<D> for F
where
    F: Fn(&Point<D>) -> bool + Send + Sync,
{
    fn is_inside(&self, point: &Point<D>) -> bool {
        self(point)
    }
}

/// Mask defined by the non-zero pixels of an image.
///
/// A point is inside when it maps into the buffer and the nearest pixel is
/// non-zero.
#[derive(Debug, Clone)]
pub struct ImageMask<const D: usize> {
    image: Arc<ImageBuffer<D>>,
}

impl<const D: usize> ImageMask<D> {
    pub fn new(image: Arc<ImageBuffer<D>>) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &ImageBuffer<D> {
        &self.image
    }

    /// Number of non-zero pixels.
    pub fn count(&self) -> usize {
        self.image.pixels().iter().filter(|&&v| v != 0.0).count()
    }
}

impl<const D: usize> Mask<D> for ImageMask<D> {
    fn is_inside(&self, point: &Point<D>) -> bool {
        let index = self.image.physical_point_to_continuous_index(point);
        let size = self.image.size();
        let mut nearest = [0usize; D];
        for i in 0..D {
            let rounded = index[i].round();
            if !(rounded >= 0.0 && rounded <= (size[i] - 1) as f64) {
                return false;
            }
            nearest[i] = rounded as usize;
        }
        self.image.value(&nearest) != 0.0
    }
}
