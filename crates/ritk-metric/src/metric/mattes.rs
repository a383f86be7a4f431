//! Mattes mutual information metric.
//!
//! Joint and marginal intensity PDFs are estimated with Parzen windows: a
//! zero-order (box-car) kernel on the fixed image and a cubic B-spline
//! kernel on the moving image. The derivative of the joint PDF with respect
//! to the transform parameters is accumulated alongside, which gives the
//! analytic metric gradient (Mattes et al., Thévenaz & Unser).
//!
//! # Lifecycle
//! Build the metric with its collaborators, call
//! [`Metric::initialize`] once, then evaluate any number of times. The
//! histograms are scratch state owned by the instance, so a metric must not
//! be evaluated from several threads at once; give every worker its own
//! instance instead.

use std::sync::Arc;
use burn::tensor::backend::Backend;
use ritk_core::image::{Image, ImageBuffer, ImageRegion};
use ritk_core::interpolation::{CentralDifferenceGradient, Interpolator};
use ritk_core::kernel;
use ritk_core::mask::Mask;
use ritk_core::spatial::Point;
use ritk_core::transform::{GridSupport, LocalSupport, Transform, TransformJacobian};
use crate::config::{MattesConfig, RunMode};
use crate::error::{MetricError, Result};
use super::histogram::{Binning, HistogramWorkspace};
use super::sampler::{full_region, ImageSampler, Sample};
use super::trait_::Metric;

/// How per-sample parameter derivatives are formed.
///
/// Chosen once at initialization from the transform's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativePath {
    /// Full transform Jacobian contracted with the image gradient.
    Generic,
    /// Only the control points supporting the mapped point.
    Grid(GridSupport),
}

/// Where the moving image gradient comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientSource {
    /// The interpolator's own derivative.
    Analytic,
    /// [`CentralDifferenceGradient`] over the interpolator.
    CentralDifference,
}

#[derive(Debug, Clone)]
struct EngineState<const D: usize> {
    region: ImageRegion<D>,
    fixed_binning: Binning,
    moving_binning: Binning,
    workspace: HistogramWorkspace,
    derivative_path: DerivativePath,
    gradient_source: GradientSource,
}

/// Mattes mutual information between a fixed and a moving image.
///
/// The value is the negative mutual information, so better alignment
/// gives a lower value.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use ritk_core::image::{ImageBuffer, ImageMetadata};
/// use ritk_core::interpolation::LinearInterpolator;
/// use ritk_core::transform::TranslationTransform;
/// use ritk_metric::{MattesConfig, MattesMutualInformation, Metric};
///
/// let image = Arc::new(ImageBuffer::from_fn([32, 32], ImageMetadata::default(), |[x, y]| {
///     ((x as f64 - 16.0).powi(2) + (y as f64 - 16.0).powi(2)).sqrt()
/// }));
/// let mut metric = MattesMutualInformation::new(MattesConfig::default().with_spatial_samples(400))
///     .with_fixed_image(image.clone())
///     .with_moving_image(image.clone())
///     .with_transform(TranslationTransform::<2>::identity())
///     .with_interpolator(LinearInterpolator::new(image));
/// metric.initialize().unwrap();
/// let (value, gradient) = metric.value_and_derivative(&[0.5, 0.0]).unwrap();
/// assert!(value < 0.0);
/// assert_eq!(gradient.len(), 2);
/// ```
pub struct MattesMutualInformation<const D: usize> {
    config: MattesConfig,
    fixed_image: Option<Arc<ImageBuffer<D>>>,
    moving_image: Option<Arc<ImageBuffer<D>>>,
    fixed_region: Option<ImageRegion<D>>,
    transform: Option<Box<dyn Transform<D>>>,
    interpolator: Option<Box<dyn Interpolator<D>>>,
    fixed_mask: Option<Box<dyn Mask<D>>>,
    moving_mask: Option<Box<dyn Mask<D>>>,
    central_difference: CentralDifferenceGradient,
    sampler: ImageSampler,
    samples: Vec<Sample<D>>,
    state: Option<EngineState<D>>,
}

impl<const D: usize> MattesMutualInformation<D> {
    pub fn new(config: MattesConfig) -> Self {
        let sampler = ImageSampler::new(config.random_seed);
        Self {
            config,
            fixed_image: None,
            moving_image: None,
            fixed_region: None,
            transform: None,
            interpolator: None,
            fixed_mask: None,
            moving_mask: None,
            central_difference: CentralDifferenceGradient::new(),
            sampler,
            samples: Vec::new(),
            state: None,
        }
    }

    pub fn with_fixed_image(mut self, image: Arc<ImageBuffer<D>>) -> Self {
        self.fixed_image = Some(image);
        self.state = None;
        self
    }

    pub fn with_moving_image(mut self, image: Arc<ImageBuffer<D>>) -> Self {
        self.moving_image = Some(image);
        self.state = None;
        self
    }

    /// Snapshot a pair of tensor images as the fixed and moving inputs.
    pub fn with_images<B: Backend>(self, fixed: &Image<B, D>, moving: &Image<B, D>) -> Self {
        self.with_fixed_image(fixed.to_buffer().into_shared())
            .with_moving_image(moving.to_buffer().into_shared())
    }

    /// Restrict sampling to part of the fixed image. Defaults to all of it.
    pub fn with_fixed_region(mut self, region: ImageRegion<D>) -> Self {
        self.fixed_region = Some(region);
        self.state = None;
        self
    }

    pub fn with_transform(mut self, transform: impl Transform<D> + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self.state = None;
        self
    }

    pub fn with_interpolator(mut self, interpolator: impl Interpolator<D> + 'static) -> Self {
        self.interpolator = Some(Box::new(interpolator));
        self.state = None;
        self
    }

    pub fn with_fixed_mask(mut self, mask: impl Mask<D> + 'static) -> Self {
        self.fixed_mask = Some(Box::new(mask));
        self.state = None;
        self
    }

    pub fn with_moving_mask(mut self, mask: impl Mask<D> + 'static) -> Self {
        self.moving_mask = Some(Box::new(mask));
        self.state = None;
        self
    }

    pub fn with_central_difference(mut self, gradient: CentralDifferenceGradient) -> Self {
        self.central_difference = gradient;
        self
    }

    pub fn config(&self) -> &MattesConfig {
        &self.config
    }

    pub fn transform(&self) -> Option<&dyn Transform<D>> {
        self.transform.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Samples used by the sampled evaluation path.
    pub fn samples(&self) -> &[Sample<D>] {
        &self.samples
    }

    /// Replace the sample set, e.g. to evaluate on a fixed list of points.
    pub fn set_samples(&mut self, samples: Vec<Sample<D>>) {
        self.samples = samples;
    }

    /// Restart the sampler's random sequence. Takes effect on the next
    /// [`MattesMutualInformation::sample_fixed_image_domain`].
    pub fn reseed(&mut self, seed: u64) {
        self.sampler.reseed(seed);
    }

    /// Draw a fresh sample set from the fixed region.
    pub fn sample_fixed_image_domain(&mut self) -> Result<()> {
        let region = self.state.as_ref().ok_or(MetricError::NotInitialized)?.region;
        let fixed = self.fixed_image.as_ref().ok_or(MetricError::NotInitialized)?;
        self.samples = if self.config.use_exact_derivative {
            full_region(fixed, &region, self.fixed_mask.as_deref())
        } else {
            self.sampler.sample_region(
                fixed,
                &region,
                self.config.number_of_spatial_samples,
                self.fixed_mask.as_deref(),
                self.config.mask_oversampling_factor,
            )
        };
        tracing::debug!("Sampled {} fixed image points", self.samples.len());
        Ok(())
    }

    pub fn fixed_binning(&self) -> Option<&Binning> {
        self.state.as_ref().map(|s| &s.fixed_binning)
    }

    pub fn moving_binning(&self) -> Option<&Binning> {
        self.state.as_ref().map(|s| &s.moving_binning)
    }

    pub fn derivative_path(&self) -> Option<DerivativePath> {
        self.state.as_ref().map(|s| s.derivative_path)
    }

    pub fn gradient_source(&self) -> Option<GradientSource> {
        self.state.as_ref().map(|s| s.gradient_source)
    }

    /// Normalized histograms of the last successful evaluation.
    pub fn histograms(&self) -> Option<&HistogramWorkspace> {
        self.state.as_ref().map(|s| &s.workspace)
    }

    /// Value over every pixel of the fixed region.
    pub fn exact_value(&mut self, parameters: &[f64]) -> Result<f64> {
        let samples = self.exact_samples()?;
        Ok(self.evaluate(parameters, &samples, false, 1)?.0)
    }

    /// Value and derivative over every pixel of the fixed region.
    pub fn exact_value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, Vec<f64>)> {
        let samples = self.exact_samples()?;
        self.evaluate(parameters, &samples, true, 1)
    }

    fn exact_samples(&self) -> Result<Vec<Sample<D>>> {
        let region = self.state.as_ref().ok_or(MetricError::NotInitialized)?.region;
        let fixed = self.fixed_image.as_ref().ok_or(MetricError::NotInitialized)?;
        Ok(full_region(fixed, &region, self.fixed_mask.as_deref()))
    }

    fn evaluate_samples(&mut self, parameters: &[f64], with_derivative: bool) -> Result<(f64, Vec<f64>)> {
        let samples = std::mem::take(&mut self.samples);
        let result = self.evaluate(parameters, &samples, with_derivative, self.config.acceptance_reference());
        self.samples = samples;
        result
    }

    /// Accumulate the histograms over `samples` and reduce them.
    ///
    /// `reference` is the sample count the 25% acceptance rule compares to.
    fn evaluate(
        &mut self,
        parameters: &[f64],
        samples: &[Sample<D>],
        with_derivative: bool,
        reference: usize,
    ) -> Result<(f64, Vec<f64>)> {
        let state = self.state.as_mut().ok_or(MetricError::NotInitialized)?;
        let transform = self.transform.as_mut().ok_or(MetricError::NotInitialized)?;
        let interpolator = self.interpolator.as_deref().ok_or(MetricError::NotInitialized)?;
        let moving_mask = self.moving_mask.as_deref();

        let expected = transform.number_of_parameters();
        if parameters.len() != expected {
            return Err(MetricError::ParameterCount {
                expected,
                actual: parameters.len(),
            });
        }
        transform.set_parameters(parameters);
        let transform: &dyn Transform<D> = transform.as_ref();

        let EngineState {
            fixed_binning,
            moving_binning,
            workspace,
            derivative_path,
            gradient_source,
            ..
        } = state;
        workspace.reset(with_derivative);

        let nonzero = transform.number_of_nonzero_jacobian_indices();
        let mut inner = vec![0.0; if with_derivative { nonzero } else { 0 }];
        let mut jacobian = TransformJacobian::new();
        let mut local = LocalSupport::default();
        let mut accepted = 0usize;

        for sample in samples {
            let mapped = match derivative_path {
                DerivativePath::Grid(_) => match transform.transform_point_local(&sample.point, &mut local) {
                    Some(mapped) => mapped,
                    None => continue,
                },
                DerivativePath::Generic => {
                    if !transform.is_valid_point(&sample.point) {
                        continue;
                    }
                    transform.transform_point(&sample.point)
                }
            };
            let Some(moving_value) = moving_sample(interpolator, moving_mask, moving_binning, &mapped) else {
                continue;
            };
            accepted += 1;

            let fixed_bin = fixed_binning.bin_index(sample.value);
            let moving_term = moving_binning.parzen_term(moving_value);
            let moving_bin = moving_binning.bin_index(moving_value);
            workspace.add_fixed(fixed_bin);

            let indices: &[usize] = if with_derivative {
                let gradient = match gradient_source {
                    GradientSource::Analytic => interpolator
                        .evaluate_derivative(&mapped)
                        .unwrap_or_else(|| self.central_difference.evaluate(interpolator, &mapped)),
                    GradientSource::CentralDifference => self.central_difference.evaluate(interpolator, &mapped),
                };
                let gradient = gradient.to_array();
                match derivative_path {
                    DerivativePath::Grid(support) => {
                        support
                            .evaluator
                            .jacobian_gradient_product(&local.weights, &gradient, &mut inner);
                        local.nonzero_indices.as_slice()
                    }
                    DerivativePath::Generic => {
                        transform.jacobian(&sample.point, &mut jacobian);
                        for (c, value) in inner.iter_mut().enumerate() {
                            *value = jacobian.column_dot(c, &gradient);
                        }
                        jacobian.nonzero_indices()
                    }
                }
            } else {
                &[]
            };

            for pdf_moving in moving_bin - 1..=moving_bin + 2 {
                let argument = pdf_moving as f64 - moving_term;
                workspace.add_joint(fixed_bin, pdf_moving, kernel::cubic(argument));
                if with_derivative {
                    let slope = kernel::cubic_derivative(argument);
                    let row = workspace.derivative_mut(fixed_bin, pdf_moving);
                    for (&parameter, &product) in indices.iter().zip(inner.iter()) {
                        row[parameter] -= product * slope;
                    }
                }
            }
        }

        tracing::trace!("Samples mapping into moving image buffer: {} / {}", accepted, samples.len());
        if accepted < reference / 4 {
            return Err(MetricError::sampling(accepted, reference));
        }

        workspace.normalize()?;
        let mut derivative = Vec::new();
        let value = if with_derivative {
            workspace.scale_derivative(1.0 / (moving_binning.bin_size() * accepted as f64));
            derivative.resize(expected, 0.0);
            workspace.value_and_gradient(&mut derivative)
        } else {
            workspace.value()
        };

        if self.config.run_mode == RunMode::Executable {
            tracing::info!("Mattes MI value {:.6} from {} / {} samples", value, accepted, samples.len());
        }
        Ok((value, derivative))
    }
}

/// Intensity at a mapped point, or `None` when the sample must be dropped.
fn moving_sample<const D: usize>(
    interpolator: &dyn Interpolator<D>,
    mask: Option<&dyn Mask<D>>,
    binning: &Binning,
    mapped: &Point<D>,
) -> Option<f64> {
    if !interpolator.is_inside_buffer(mapped) {
        return None;
    }
    if let Some(mask) = mask {
        if !mask.is_inside(mapped) {
            return None;
        }
    }
    let value = interpolator.evaluate(mapped);
    binning.contains(value).then_some(value)
}

impl<const D: usize> Metric for MattesMutualInformation<D> {
    fn name(&self) -> &'static str {
        "MattesMutualInformation"
    }

    fn number_of_parameters(&self) -> usize {
        self.transform.as_ref().map_or(0, |t| t.number_of_parameters())
    }

    fn initialize(&mut self) -> Result<()> {
        self.state = None;
        self.config.validate()?;
        let fixed = self
            .fixed_image
            .clone()
            .ok_or_else(|| MetricError::configuration("fixed image is not present"))?;
        let moving = self
            .moving_image
            .clone()
            .ok_or_else(|| MetricError::configuration("moving image is not present"))?;
        let transform = self
            .transform
            .as_deref()
            .ok_or_else(|| MetricError::configuration("transform is not present"))?;
        let interpolator = self
            .interpolator
            .as_deref()
            .ok_or_else(|| MetricError::configuration("interpolator is not present"))?;

        let region = self.fixed_region.unwrap_or_else(|| fixed.largest_region());
        if region.is_empty() || !fixed.largest_region().contains_region(&region) {
            return Err(MetricError::configuration(format!(
                "fixed region {:?} + {:?} is empty or outside the fixed image",
                region.index(),
                region.size()
            )));
        }

        let bins = self.config.number_of_histogram_bins;
        let (fixed_min, fixed_max) = fixed
            .min_max(&region)
            .ok_or_else(|| MetricError::configuration("fixed region holds no pixels"))?;
        let (moving_min, moving_max) = moving
            .min_max(&moving.largest_region())
            .ok_or_else(|| MetricError::configuration("moving image holds no pixels"))?;
        let fixed_binning = Binning::new(fixed_min, fixed_max, bins)?;
        let moving_binning = Binning::new(moving_min, moving_max, bins)?;
        tracing::debug!(
            "Fixed image range [{}, {}], bin size {}, normalized min {}",
            fixed_min,
            fixed_max,
            fixed_binning.bin_size(),
            fixed_binning.normalized_min()
        );
        tracing::debug!(
            "Moving image range [{}, {}], bin size {}, normalized min {}",
            moving_min,
            moving_max,
            moving_binning.bin_size(),
            moving_binning.normalized_min()
        );

        let derivative_path = match transform.grid_support() {
            Some(support) => DerivativePath::Grid(support),
            None => DerivativePath::Generic,
        };
        let probe = moving.index_to_physical_point(&[0; D]);
        let gradient_source = if interpolator.evaluate_derivative(&probe).is_some() {
            GradientSource::Analytic
        } else {
            GradientSource::CentralDifference
        };
        tracing::debug!("Derivative path {:?}, gradient source {:?}", derivative_path, gradient_source);

        self.state = Some(EngineState {
            region,
            fixed_binning,
            moving_binning,
            workspace: HistogramWorkspace::new(bins, transform.number_of_parameters()),
            derivative_path,
            gradient_source,
        });

        self.sample_fixed_image_domain()?;
        if self.samples.is_empty() {
            self.state = None;
            return Err(MetricError::configuration("no fixed image samples could be drawn"));
        }
        Ok(())
    }

    fn value(&mut self, parameters: &[f64]) -> Result<f64> {
        Ok(self.evaluate_samples(parameters, false)?.0)
    }

    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, Vec<f64>)> {
        self.evaluate_samples(parameters, true)
    }
}

impl<const D: usize> std::fmt::Debug for MattesMutualInformation<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattesMutualInformation")
            .field("config", &self.config)
            .field("initialized", &self.state.is_some())
            .field("samples", &self.samples.len())
            .finish()
    }
}
