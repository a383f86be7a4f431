//! Registration metrics with analytic parameter derivatives.
//!
//! [`MattesMutualInformation`] estimates mutual information between a fixed
//! and a moving image from Parzen-windowed joint histograms.
//! [`ShapeModelMetric`] scores point-set deformations against statistical
//! shape models.

pub mod metric;
pub mod config;
pub mod error;

pub use config::{MattesConfig, RunMode};
pub use error::{HistogramKind, MetricError, Result};
pub use metric::{
    DerivativePath, GradientSource, MattesMutualInformation, Metric, ShapeModelMetric,
    StatisticalShapeModel,
};
