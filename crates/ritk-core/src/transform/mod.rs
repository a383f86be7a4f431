//! Transform types and operations.
//!
//! This module provides the transform capability trait, its
//! implementations, and the recursive B-spline evaluator behind the
//! grid transform.

pub mod trait_;
pub mod recursive;
pub mod translation;
pub mod affine;
pub mod bspline;

pub use trait_::{GridSupport, LocalSupport, Transform, TransformJacobian};
pub use recursive::RecursiveTransformEvaluator;
pub use translation::TranslationTransform;
pub use affine::AffineTransform;
pub use bspline::BSplineTransform;
