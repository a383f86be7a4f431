//! Configuration for the Mattes mutual information metric.

use serde::{Deserialize, Serialize};
use crate::error::{MetricError, Result};

/// Whether the metric runs inside a host application or a standalone tool.
///
/// Replaces a process-wide switch: in `Executable` mode every evaluation
/// logs a summary at info level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    #[default]
    Library,
    Executable,
}

/// Mattes mutual information configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MattesConfig {
    /// Histogram bins per image, including two padding bins on each side.
    pub number_of_histogram_bins: usize,
    /// Samples drawn from the fixed region per evaluation.
    pub number_of_spatial_samples: usize,
    /// Evaluate over every pixel of the fixed region.
    pub use_exact_derivative: bool,
    /// Seed of the sampler's random source.
    pub random_seed: u64,
    /// Draw budget multiplier for mask rejection sampling.
    pub mask_oversampling_factor: usize,
    pub run_mode: RunMode,
}

impl Default for MattesConfig {
    fn default() -> Self {
        Self {
            number_of_histogram_bins: 50,
            number_of_spatial_samples: 500,
            use_exact_derivative: false,
            random_seed: 0,
            mask_oversampling_factor: 50,
            run_mode: RunMode::Library,
        }
    }
}

impl MattesConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.number_of_histogram_bins = bins;
        self
    }

    pub fn with_spatial_samples(mut self, samples: usize) -> Self {
        self.number_of_spatial_samples = samples;
        self
    }

    pub fn with_exact_derivative(mut self, exact: bool) -> Self {
        self.use_exact_derivative = exact;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_mask_oversampling_factor(mut self, factor: usize) -> Self {
        self.mask_oversampling_factor = factor;
        self
    }

    pub fn with_run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    /// Sample count the 25% acceptance rule compares against.
    ///
    /// Exact evaluation treats the configured count as one, so only an
    /// empty histogram can fail it.
    pub fn acceptance_reference(&self) -> usize {
        if self.use_exact_derivative {
            1
        } else {
            self.number_of_spatial_samples
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.number_of_histogram_bins < 5 {
            return Err(MetricError::configuration(format!(
                "number_of_histogram_bins must be at least 5, got {}",
                self.number_of_histogram_bins
            )));
        }
        if self.number_of_spatial_samples == 0 {
            return Err(MetricError::configuration("number_of_spatial_samples must be positive"));
        }
        if self.mask_oversampling_factor == 0 {
            return Err(MetricError::configuration("mask_oversampling_factor must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MattesConfig::default();
        assert_eq!(config.number_of_histogram_bins, 50);
        assert_eq!(config.number_of_spatial_samples, 500);
        assert!(!config.use_exact_derivative);
        assert_eq!(config.run_mode, RunMode::Library);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(MattesConfig::new().with_histogram_bins(4).validate().is_err());
        assert!(MattesConfig::new().with_histogram_bins(5).validate().is_ok());
        assert!(MattesConfig::new().with_spatial_samples(0).validate().is_err());
        assert!(MattesConfig::new().with_mask_oversampling_factor(0).validate().is_err());
    }

    #[test]
    fn test_acceptance_reference() {
        let config = MattesConfig::new().with_spatial_samples(400);
        assert_eq!(config.acceptance_reference(), 400);
        assert_eq!(config.with_exact_derivative(true).acceptance_reference(), 1);
    }
}
