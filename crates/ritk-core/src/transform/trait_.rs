//! Transform capability used by similarity metrics.
//!
//! A transform maps fixed-domain points into the moving domain and exposes
//! its Jacobian with respect to its parameters. Grid-based transforms with
//! bounded local support additionally advertise [`GridSupport`] so metrics
//! can restrict derivative work to the active control points.

use crate::spatial::Point;
use super::recursive::RecursiveTransformEvaluator;

/// Transform trait for parametric spatial transformations.
///
/// # Type Parameters
/// * `D` - The spatial dimensionality (input and output)
pub trait Transform<const D: usize>: Send + Sync {
    /// Total number of parameters.
    fn number_of_parameters(&self) -> usize;

    /// Current parameter vector.
    fn parameters(&self) -> Vec<f64>;

    /// Replace the parameter vector.
    ///
    /// # Panics
    /// If `parameters.len()` differs from [`Transform::number_of_parameters`].
    fn set_parameters(&mut self, parameters: &[f64]);

    /// Map one point.
    fn transform_point(&self, point: &Point<D>) -> Point<D>;

    /// Number of parameters with a possibly non-zero derivative at any point.
    fn number_of_nonzero_jacobian_indices(&self) -> usize;

    /// Jacobian with respect to the parameters at `point`.
    ///
    /// Fills a `D x number_of_nonzero_jacobian_indices()` matrix whose column
    /// `c` is the derivative with respect to parameter
    /// `jacobian.nonzero_indices()[c]`.
    fn jacobian(&self, point: &Point<D>, jacobian: &mut TransformJacobian);

    /// Whether `point` lies where the mapping is defined.
    ///
    /// Transforms with bounded support return `false` outside it, where
    /// [`Transform::transform_point`] falls back to the identity.
    fn is_valid_point(&self, point: &Point<D>) -> bool {
        let _ = point;
        true
    }

    /// Grid capability probe. `None` for transforms without local support.
    fn grid_support(&self) -> Option<GridSupport> {
        None
    }

    /// Map a point and record the active support region.
    ///
    /// Returns `None` when the point lies outside the region where the
    /// support is valid. Transforms without [`GridSupport`] leave `local`
    /// untouched.
    fn transform_point_local(&self, point: &Point<D>, local: &mut LocalSupport) -> Option<Point<D>> {
        let _ = local;
        Some(self.transform_point(point))
    }
}

/// Dense row-major Jacobian restricted to the non-zero parameter columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformJacobian {
    rows: usize,
    columns: usize,
    values: Vec<f64>,
    nonzero_indices: Vec<usize>,
}

impl TransformJacobian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to `rows x columns` and zero every entry.
    pub fn reset(&mut self, rows: usize, columns: usize) {
        self.rows = rows;
        self.columns = columns;
        self.values.clear();
        self.values.resize(rows * columns, 0.0);
        self.nonzero_indices.clear();
        self.nonzero_indices.resize(columns, 0);
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.values[row * self.columns + column]
    }

    pub fn set(&mut self, row: usize, column: usize, value: f64) {
        self.values[row * self.columns + column] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn nonzero_indices(&self) -> &[usize] {
        &self.nonzero_indices
    }

    pub fn nonzero_indices_mut(&mut self) -> &mut [usize] {
        &mut self.nonzero_indices
    }

    /// `Σ_row gradient[row] * J[row][column]`.
    pub fn column_dot(&self, column: usize, gradient: &[f64]) -> f64 {
        (0..self.rows).map(|row| self.get(row, column) * gradient[row]).sum()
    }
}

/// Static description of a grid transform's local support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSupport {
    pub evaluator: RecursiveTransformEvaluator,
    /// Parameters in one output-dimension block.
    pub parameters_per_dimension: usize,
}

impl GridSupport {
    /// Control points influencing one location.
    pub fn support_size(&self) -> usize {
        self.evaluator.support_size()
    }

    /// Non-zero parameters per location, `support_size * output_dimension`.
    pub fn number_of_nonzero_indices(&self) -> usize {
        self.support_size() * self.evaluator.output_dimension()
    }
}

/// Per-point support record filled by [`Transform::transform_point_local`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSupport {
    /// Axis-major 1D weights, `(order + 1) * D` entries.
    pub weights: Vec<f64>,
    /// Global parameter indices, `support_size * D` entries.
    pub nonzero_indices: Vec<usize>,
}
