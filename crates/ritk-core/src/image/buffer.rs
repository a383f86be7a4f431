//! Host-side pixel buffer used on evaluation hot paths.

use std::sync::Arc;
use super::{ImageMetadata, ImageRegion};
use crate::spatial::Point;

/// Contiguous `f64` pixels plus physical geometry.
///
/// Index component 0 is the fastest-varying axis, so the pixel at
/// `index` lives at `Σ index[i] * stride[i]` with `stride[0] = 1`.
/// Interpolators, masks and metrics share one buffer through `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer<const D: usize> {
    size: [usize; D],
    strides: [usize; D],
    pixels: Vec<f64>,
    metadata: ImageMetadata<D>,
}

impl<const D: usize> ImageBuffer<D> {
    /// Wrap existing pixels.
    ///
    /// # Panics
    /// If `pixels.len()` differs from the product of `size`.
    pub fn new(size: [usize; D], pixels: Vec<f64>, metadata: ImageMetadata<D>) -> Self {
        assert_eq!(
            pixels.len(),
            size.iter().product::<usize>(),
            "Pixel count must match image size"
        );
        let mut strides = [1usize; D];
        for i in 1..D {
            strides[i] = strides[i - 1] * size[i - 1];
        }
        Self {
            size,
            strides,
            pixels,
            metadata,
        }
    }

    /// Fill a buffer by evaluating `f` at every index.
    pub fn from_fn(
        size: [usize; D],
        metadata: ImageMetadata<D>,
        mut f: impl FnMut([usize; D]) -> f64,
    ) -> Self {
        let pixels = ImageRegion::from_size(size).iter().map(|index| f(index)).collect();
        Self::new(size, pixels, metadata)
    }

    /// Convenience for sharing the buffer between collaborators.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn metadata(&self) -> &ImageMetadata<D> {
        &self.metadata
    }

    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    /// The region covering the whole buffer.
    pub fn largest_region(&self) -> ImageRegion<D> {
        ImageRegion::from_size(self.size)
    }

    /// Linear offset of an index.
    pub fn offset(&self, index: &[usize; D]) -> usize {
        (0..D).map(|i| index[i] * self.strides[i]).sum()
    }

    /// Pixel value at an index inside the buffer.
    pub fn value(&self, index: &[usize; D]) -> f64 {
        self.pixels[self.offset(index)]
    }

    /// Pixel value with each index component clamped into the buffer.
    pub fn value_clamped(&self, index: &[isize; D]) -> f64 {
        let clamped: [usize; D] = std::array::from_fn(|i| {
            index[i].clamp(0, self.size[i] as isize - 1) as usize
        });
        self.value(&clamped)
    }

    /// Iterate `(index, value)` pairs of a region, x-fastest.
    pub fn iter_region<'a>(
        &'a self,
        region: &ImageRegion<D>,
    ) -> impl Iterator<Item = ([usize; D], f64)> + 'a {
        region.iter().map(move |index| (index, self.value(&index)))
    }

    /// Minimum and maximum intensity over a region, `None` for an empty region.
    pub fn min_max(&self, region: &ImageRegion<D>) -> Option<(f64, f64)> {
        self.iter_region(region).fold(None, |acc, (_, v)| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Physical location of a pixel index.
    pub fn index_to_physical_point(&self, index: &[usize; D]) -> Point<D> {
        self.metadata.index_to_physical_point(index)
    }

    /// Continuous index of a physical point.
    pub fn physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        self.metadata.physical_point_to_continuous_index(point)
    }

    /// Whether a continuous index lies within `[0, size - 1]` on every axis.
    pub fn is_inside_continuous_index(&self, index: &Point<D>) -> bool {
        (0..D).all(|i| index[i] >= 0.0 && index[i] <= (self.size[i] - 1) as f64)
    }

    /// Whether a physical point maps inside the buffer.
    pub fn is_inside(&self, point: &Point<D>) -> bool {
        self.is_inside_continuous_index(&self.physical_point_to_continuous_index(point))
    }
}
