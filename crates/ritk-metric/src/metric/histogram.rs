//! Histogram computation utilities for Mattes mutual information.
//!
//! [`Binning`] maps intensities to Parzen window positions and
//! [`HistogramWorkspace`] holds the per-evaluation scratch state: the joint
//! PDF, its derivative volume, and both marginals.

use crate::error::{HistogramKind, MetricError, Result};

/// Empty bins kept on each side of the intensity range so the cubic
/// Parzen window never leaves the histogram.
pub const PADDING: usize = 2;

/// Entries at or below this are treated as empty when computing logarithms.
pub const PDF_EPSILON: f64 = 1e-16;

/// Intensity-to-bin mapping for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binning {
    true_min: f64,
    true_max: f64,
    bin_size: f64,
    normalized_min: f64,
    bins: usize,
}

impl Binning {
    /// Derive the mapping from an intensity range.
    ///
    /// `bin_size = (max - min) / (bins - 2 * PADDING)` and
    /// `normalized_min = min / bin_size - PADDING`.
    pub fn new(true_min: f64, true_max: f64, bins: usize) -> Result<Self> {
        if bins < 2 * PADDING + 1 {
            return Err(MetricError::configuration(format!(
                "at least {} histogram bins are required, got {bins}",
                2 * PADDING + 1
            )));
        }
        if !(true_min.is_finite() && true_max.is_finite()) || true_max <= true_min {
            return Err(MetricError::configuration(format!(
                "intensity range [{true_min}, {true_max}] is empty or not finite"
            )));
        }
        let bin_size = (true_max - true_min) / (bins - 2 * PADDING) as f64;
        Ok(Self {
            true_min,
            true_max,
            bin_size,
            normalized_min: true_min / bin_size - PADDING as f64,
            bins,
        })
    }

    pub fn true_min(&self) -> f64 {
        self.true_min
    }

    pub fn true_max(&self) -> f64 {
        self.true_max
    }

    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    pub fn normalized_min(&self) -> f64 {
        self.normalized_min
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Whether `value` lies in `[true_min, true_max]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.true_min && value <= self.true_max
    }

    /// Continuous Parzen window position of an intensity.
    pub fn parzen_term(&self, value: f64) -> f64 {
        value / self.bin_size - self.normalized_min
    }

    /// Floored window position, clamped into `[PADDING, bins - PADDING - 1]`.
    pub fn bin_index(&self, value: f64) -> usize {
        let term = self.parzen_term(value).floor();
        let lo = PADDING as f64;
        let hi = (self.bins - PADDING - 1) as f64;
        if term < lo || term.is_nan() {
            PADDING
        } else if term > hi {
            self.bins - PADDING - 1
        } else {
            term as usize
        }
    }
}

/// Evaluation-scoped histogram state.
///
/// One workspace belongs to one metric instance and is reset at the start
/// of every evaluation; it must not be shared between concurrent callers.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramWorkspace {
    bins: usize,
    parameters: usize,
    joint: Vec<f64>,
    joint_derivative: Vec<f64>,
    fixed_marginal: Vec<f64>,
    moving_marginal: Vec<f64>,
}

impl HistogramWorkspace {
    /// Allocate a `bins x bins` joint PDF and a `bins x bins x parameters`
    /// derivative volume.
    pub fn new(bins: usize, parameters: usize) -> Self {
        Self {
            bins,
            parameters,
            joint: vec![0.0; bins * bins],
            joint_derivative: vec![0.0; bins * bins * parameters],
            fixed_marginal: vec![0.0; bins],
            moving_marginal: vec![0.0; bins],
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn number_of_parameters(&self) -> usize {
        self.parameters
    }

    /// Zero the histograms, and the derivative volume when requested.
    pub fn reset(&mut self, with_derivative: bool) {
        self.joint.fill(0.0);
        self.fixed_marginal.fill(0.0);
        self.moving_marginal.fill(0.0);
        if with_derivative {
            self.joint_derivative.fill(0.0);
        }
    }

    /// Box-car contribution of one fixed sample.
    pub fn add_fixed(&mut self, fixed_bin: usize) {
        self.fixed_marginal[fixed_bin] += 1.0;
    }

    pub fn add_joint(&mut self, fixed_bin: usize, moving_bin: usize, weight: f64) {
        self.joint[fixed_bin * self.bins + moving_bin] += weight;
    }

    /// Derivative entries of joint bin `(fixed_bin, moving_bin)`, one per parameter.
    pub fn derivative_mut(&mut self, fixed_bin: usize, moving_bin: usize) -> &mut [f64] {
        let start = (fixed_bin * self.bins + moving_bin) * self.parameters;
        &mut self.joint_derivative[start..start + self.parameters]
    }

    pub fn derivative(&self, fixed_bin: usize, moving_bin: usize) -> &[f64] {
        let start = (fixed_bin * self.bins + moving_bin) * self.parameters;
        &self.joint_derivative[start..start + self.parameters]
    }

    /// Normalize the joint PDF and the fixed marginal, then derive the
    /// moving marginal by summing the joint PDF over fixed bins.
    pub fn normalize(&mut self) -> Result<()> {
        let joint_sum: f64 = self.joint.iter().sum();
        if joint_sum == 0.0 {
            return Err(MetricError::degenerate(HistogramKind::Joint));
        }
        for p in self.joint.iter_mut() {
            *p /= joint_sum;
        }

        let fixed_sum: f64 = self.fixed_marginal.iter().sum();
        if fixed_sum == 0.0 {
            return Err(MetricError::degenerate(HistogramKind::FixedMarginal));
        }
        for p in self.fixed_marginal.iter_mut() {
            *p /= fixed_sum;
        }

        for m in 0..self.bins {
            self.moving_marginal[m] = (0..self.bins).map(|f| self.joint[f * self.bins + m]).sum();
        }
        Ok(())
    }

    /// Multiply every derivative entry by `factor`.
    pub fn scale_derivative(&mut self, factor: f64) {
        for d in self.joint_derivative.iter_mut() {
            *d *= factor;
        }
    }

    /// Negative mutual information of the normalized histograms.
    pub fn value(&self) -> f64 {
        self.reduce(None)
    }

    /// Negative mutual information and its gradient from the derivative volume.
    pub fn value_and_gradient(&self, gradient: &mut [f64]) -> f64 {
        gradient.fill(0.0);
        self.reduce(Some(gradient))
    }

    fn reduce(&self, mut gradient: Option<&mut [f64]>) -> f64 {
        let mut sum = 0.0;
        for f in 0..self.bins {
            let pf = self.fixed_marginal[f];
            for m in 0..self.bins {
                let pm = self.moving_marginal[m];
                let p = self.joint[f * self.bins + m];
                if p > PDF_EPSILON && pm > PDF_EPSILON {
                    let ratio = (p / pm).ln();
                    if pf > PDF_EPSILON {
                        sum += p * (ratio - pf.ln());
                    }
                    if let Some(gradient) = gradient.as_deref_mut() {
                        for (g, d) in gradient.iter_mut().zip(self.derivative(f, m)) {
                            *g -= d * ratio;
                        }
                    }
                }
            }
        }
        -sum
    }

    /// Normalized joint PDF, row-major by fixed bin.
    pub fn joint_pdf(&self) -> &[f64] {
        &self.joint
    }

    pub fn joint(&self, fixed_bin: usize, moving_bin: usize) -> f64 {
        self.joint[fixed_bin * self.bins + moving_bin]
    }

    pub fn fixed_marginal(&self) -> &[f64] {
        &self.fixed_marginal
    }

    pub fn moving_marginal(&self) -> &[f64] {
        &self.moving_marginal
    }
}
