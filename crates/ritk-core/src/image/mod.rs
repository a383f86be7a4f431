//! Image types.
//!
//! [`Image`] keeps pixels in a burn tensor for interoperability with the
//! rest of the toolkit; [`ImageBuffer`] is the host-side snapshot that
//! metrics, interpolators and masks read on their hot paths.

pub mod image;
pub mod metadata;
pub mod region;
pub mod buffer;

pub use image::Image;
pub use metadata::ImageMetadata;
pub use region::{ImageRegion, RegionIter};
pub use buffer::ImageBuffer;
