//! Geometry and sampling collaborators for image registration metrics.
//!
//! Images carry physical metadata, transforms map fixed points into the
//! moving domain, interpolators sample the moving image, and masks restrict
//! where samples are drawn.

pub mod image;
pub mod spatial;
pub mod kernel;
pub mod transform;
pub mod interpolation;
pub mod mask;

pub use image::{Image, ImageBuffer, ImageMetadata, ImageRegion};
pub use spatial::{Point, Vector, Spacing, Direction};
pub use transform::{Transform, TransformJacobian};
pub use interpolation::Interpolator;
pub use mask::Mask;
