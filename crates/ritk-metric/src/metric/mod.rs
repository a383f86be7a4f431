//! Similarity metrics and their evaluation machinery.

pub mod trait_;
pub mod histogram;
pub mod sampler;
pub mod mattes;
pub mod finite_difference;
pub mod shape_model;

pub use trait_::Metric;
pub use histogram::{Binning, HistogramWorkspace};
pub use sampler::{ImageSampler, Sample};
pub use mattes::{DerivativePath, GradientSource, MattesMutualInformation};
pub use finite_difference::central_difference;
pub use shape_model::{ShapeModelMetric, StatisticalShapeModel};
