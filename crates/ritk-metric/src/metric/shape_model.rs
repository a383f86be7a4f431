//! Point-set metric against statistical shape models.
//!
//! Each model holds a mean shape (flattened point coordinates) and an
//! orthonormal basis of shape variation. The metric warps the mean shape,
//! removes the part of the displacement the model can explain, and scores
//! what is left. A transform that only produces plausible shape variation
//! scores zero.

use nalgebra::{DMatrix, DVector};
use ritk_core::spatial::Point;
use ritk_core::transform::{Transform, TransformJacobian};
use serde::{Deserialize, Serialize};
use crate::error::{MetricError, Result};
use super::finite_difference::{central_difference, DEFAULT_STEP};
use super::trait_::Metric;

/// Mean shape and principal variation basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalShapeModel {
    /// Point coordinates, `D` consecutive entries per point.
    pub mean: DVector<f64>,
    /// One column per mode, `mean.len()` rows.
    pub basis: DMatrix<f64>,
    pub noise_variance: f64,
}

impl StatisticalShapeModel {
    pub fn new(mean: DVector<f64>, basis: DMatrix<f64>, noise_variance: f64) -> Self {
        Self {
            mean,
            basis,
            noise_variance,
        }
    }

    /// Projection of `shape` onto the basis.
    pub fn reconstruct(&self, shape: &DVector<f64>) -> DVector<f64> {
        let coefficients = self.basis.tr_mul(shape);
        &self.basis * coefficients
    }
}

/// Shape-model metric for a transform acting on `D`-dimensional points.
pub struct ShapeModelMetric<const D: usize> {
    transform: Option<Box<dyn Transform<D>>>,
    models: Vec<StatisticalShapeModel>,
    initialized: bool,
}

impl<const D: usize> Default for ShapeModelMetric<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> ShapeModelMetric<D> {
    pub fn new() -> Self {
        Self {
            transform: None,
            models: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_transform(mut self, transform: impl Transform<D> + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self.initialized = false;
        self
    }

    pub fn with_model(mut self, model: StatisticalShapeModel) -> Self {
        self.models.push(model);
        self.initialized = false;
        self
    }

    pub fn models(&self) -> &[StatisticalShapeModel] {
        &self.models
    }

    /// Apply `parameters` to the transform after checking their count.
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        if !self.initialized {
            return Err(MetricError::NotInitialized);
        }
        let transform = self.transform.as_mut().ok_or(MetricError::NotInitialized)?;
        let expected = transform.number_of_parameters();
        if parameters.len() != expected {
            return Err(MetricError::ParameterCount {
                expected,
                actual: parameters.len(),
            });
        }
        transform.set_parameters(parameters);
        Ok(())
    }

    /// Score of one model under `parameters`.
    pub fn model_value(&mut self, model: usize, parameters: &[f64]) -> Result<f64> {
        self.set_parameters(parameters)?;
        let transform = self.transform.as_deref().ok_or(MetricError::NotInitialized)?;
        let model = self
            .models
            .get(model)
            .ok_or_else(|| MetricError::configuration(format!("no shape model {model}")))?;
        let (value, _) = score(transform, model);
        finite(value)
    }

    /// Value and derivative by central differences with step 0.01.
    ///
    /// The transform is left at `parameters` afterwards.
    pub fn value_and_finite_difference_derivative(&mut self, parameters: &[f64]) -> Result<(f64, Vec<f64>)> {
        let value = self.value(parameters)?;
        let derivative = central_difference(|p| self.value(p), parameters, DEFAULT_STEP)?;
        self.set_parameters(parameters)?;
        Ok((value, derivative))
    }
}

/// Warped-minus-mean displacement, its residual after projection, and
/// `residual · displacement * D / len`.
fn score<const D: usize>(transform: &dyn Transform<D>, model: &StatisticalShapeModel) -> (f64, DVector<f64>) {
    let len = model.mean.len();
    let mut displacement = DVector::zeros(len);
    for (i, coords) in model.mean.as_slice().chunks_exact(D).enumerate() {
        let mapped = transform.transform_point(&Point::from_slice(coords));
        for j in 0..D {
            displacement[i * D + j] = mapped[j] - coords[j];
        }
    }
    let residual = &displacement - model.reconstruct(&displacement);
    let value = residual.dot(&displacement) * D as f64 / len as f64;
    (value, residual)
}

fn finite(value: f64) -> Result<f64> {
    if value.is_nan() {
        Err(MetricError::numeric_anomaly("shape model value is NaN"))
    } else {
        Ok(value)
    }
}

impl<const D: usize> Metric for ShapeModelMetric<D> {
    fn name(&self) -> &'static str {
        "ShapeModelMetric"
    }

    fn number_of_parameters(&self) -> usize {
        self.transform.as_ref().map_or(0, |t| t.number_of_parameters())
    }

    fn initialize(&mut self) -> Result<()> {
        self.initialized = false;
        if self.transform.is_none() {
            return Err(MetricError::configuration("transform is not present"));
        }
        if self.models.is_empty() {
            return Err(MetricError::configuration("no shape models are present"));
        }
        for (i, model) in self.models.iter().enumerate() {
            if model.mean.is_empty() || model.basis.is_empty() {
                return Err(MetricError::configuration(format!("shape model {i} has an empty mean or basis")));
            }
            if model.mean.len() % D != 0 || model.basis.nrows() != model.mean.len() {
                return Err(MetricError::configuration(format!(
                    "shape model {i}: mean length {} and basis rows {} do not describe {D}-d points",
                    model.mean.len(),
                    model.basis.nrows()
                )));
            }
        }
        tracing::debug!("Shape model metric over {} models", self.models.len());
        self.initialized = true;
        Ok(())
    }

    fn value(&mut self, parameters: &[f64]) -> Result<f64> {
        self.set_parameters(parameters)?;
        let transform = self.transform.as_deref().ok_or(MetricError::NotInitialized)?;
        let mut total = 0.0;
        for model in &self.models {
            total += finite(score(transform, model).0)?;
        }
        Ok(total / self.models.len() as f64)
    }

    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, Vec<f64>)> {
        self.set_parameters(parameters)?;
        let transform = self.transform.as_deref().ok_or(MetricError::NotInitialized)?;
        let mut value = 0.0;
        let mut derivative = vec![0.0; transform.number_of_parameters()];
        let mut jacobian = TransformJacobian::new();
        let mut model_derivative = vec![0.0; derivative.len()];

        for model in &self.models {
            let (model_value, residual) = score(transform, model);
            let model_value = finite(model_value)?;
            model_derivative.fill(0.0);
            for (i, coords) in model.mean.as_slice().chunks_exact(D).enumerate() {
                transform.jacobian(&Point::from_slice(coords), &mut jacobian);
                let local = &residual.as_slice()[i * D..(i + 1) * D];
                for (c, &parameter) in jacobian.nonzero_indices().iter().enumerate() {
                    model_derivative[parameter] += jacobian.column_dot(c, local);
                }
            }
            let scale = D as f64 / model.mean.len() as f64;
            value += model_value;
            for (d, m) in derivative.iter_mut().zip(&model_derivative) {
                *d += 2.0 * m * scale;
            }
        }

        let count = self.models.len() as f64;
        for d in derivative.iter_mut() {
            *d /= count;
        }
        Ok((value / count, derivative))
    }
}
