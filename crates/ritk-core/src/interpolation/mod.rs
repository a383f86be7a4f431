//! Interpolation types and operations.
//!
//! This module provides the interpolator capability trait and its
//! implementations for sampling images at physical points.

pub mod trait_;
pub mod nearest;
pub mod linear;
pub mod bspline;
pub mod central_difference;

pub use trait_::Interpolator;
pub use nearest::NearestNeighborInterpolator;
pub use linear::LinearInterpolator;
pub use bspline::BSplineInterpolator;
pub use central_difference::CentralDifferenceGradient;
