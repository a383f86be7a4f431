//! Error types for metric evaluation.
//!
//! Every failure is raised from the call that detected it and reaches the
//! caller unchanged; nothing in this crate retries.

use thiserror::Error;

/// Which normalization found a zero total.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramKind {
    #[error("joint PDF")]
    Joint,
    #[error("fixed image marginal PDF")]
    FixedMarginal,
}

/// Main error type for metric operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Missing or empty collaborator detected at initialization.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Too many samples mapped outside the valid moving domain.
    #[error("Too many samples map outside moving image buffer: {accepted} / {total}")]
    Sampling { accepted: usize, total: usize },

    /// A histogram summed to zero during normalization.
    #[error("Degenerate histogram: {0} sums to zero")]
    DegenerateHistogram(HistogramKind),

    /// A computed value is not a number.
    #[error("Numeric anomaly: {0}")]
    NumericAnomaly(String),

    /// Evaluation requested before a successful `initialize`.
    #[error("Metric used before initialization")]
    NotInitialized,

    /// Parameter vector length does not match the transform.
    #[error("Parameter count mismatch: expected {expected}, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
}

/// Result type for metric operations.
pub type Result<T> = std::result::Result<T, MetricError>;

impl MetricError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a numeric anomaly error.
    pub fn numeric_anomaly(msg: impl Into<String>) -> Self {
        Self::NumericAnomaly(msg.into())
    }

    /// Create a sampling error.
    pub fn sampling(accepted: usize, total: usize) -> Self {
        Self::Sampling { accepted, total }
    }

    /// Create a degenerate histogram error.
    pub fn degenerate(kind: HistogramKind) -> Self {
        Self::DegenerateHistogram(kind)
    }

    /// Whether the error concerns one evaluation rather than the setup.
    ///
    /// Optimizers may retry these with different parameters.
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(
            self,
            Self::Sampling { .. } | Self::DegenerateHistogram(_) | Self::NumericAnomaly(_)
        )
    }
}
