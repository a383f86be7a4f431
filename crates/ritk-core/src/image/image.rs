//! Image type with tensor storage and physical metadata.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use super::{ImageBuffer, ImageMetadata, ImageRegion};
use crate::spatial::{Direction, Point, Spacing};

/// Medical image with physical metadata.
///
/// Pixels live in a burn tensor on any backend. Tensor dimension `D-1-i`
/// holds index component `i`, so a 2D tensor of shape `[rows, cols]` has
/// `cols` pixels along index axis 0 (x).
///
/// # Type Parameters
/// * `B` - The backend holding the pixel tensor
/// * `D` - The dimensionality of the image
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    metadata: ImageMetadata<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and geometry.
    ///
    /// # Examples
    /// ```rust
    /// use ritk_core::Image;
    /// use ritk_core::spatial::{Point2, Spacing2, Direction2};
    /// use burn::tensor::Tensor;
    /// use burn_ndarray::NdArray;
    ///
    /// let device = Default::default();
    /// let data = Tensor::<NdArray<f32>, 2>::zeros([8, 16], &device);
    /// let image = Image::new(data, Point2::origin(), Spacing2::uniform(1.0), Direction2::identity());
    /// assert_eq!(image.size(), [16, 8]);
    /// ```
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self::with_metadata(data, ImageMetadata::new(origin, spacing, direction))
    }

    pub fn with_metadata(data: Tensor<B, D>, metadata: ImageMetadata<D>) -> Self {
        Self { data, metadata }
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn metadata(&self) -> &ImageMetadata<D> {
        &self.metadata
    }

    pub fn origin(&self) -> &Point<D> {
        self.metadata.origin()
    }

    pub fn spacing(&self) -> &Spacing<D> {
        self.metadata.spacing()
    }

    pub fn direction(&self) -> &Direction<D> {
        self.metadata.direction()
    }

    /// Tensor shape (slowest axis first).
    pub fn shape(&self) -> [usize; D] {
        let dims = self.data.shape().dims;
        std::array::from_fn(|i| dims[i])
    }

    /// Number of pixels along each index axis (x first).
    pub fn size(&self) -> [usize; D] {
        let shape = self.shape();
        std::array::from_fn(|i| shape[D - 1 - i])
    }

    pub fn largest_region(&self) -> ImageRegion<D> {
        ImageRegion::from_size(self.size())
    }

    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        self.metadata.physical_point_to_continuous_index(point)
    }

    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.metadata.continuous_index_to_physical_point(index)
    }

    /// Read the pixels back to the host as `f64`.
    ///
    /// Row-major tensor order already is x-fastest index order, so no
    /// reshuffling is needed.
    pub fn to_buffer(&self) -> ImageBuffer<D> {
        let data = self.data.to_data();
        let pixels: Vec<f64> = data.iter::<f64>().collect();
        ImageBuffer::new(self.size(), pixels, self.metadata.clone())
    }
}
