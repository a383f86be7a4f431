//! B-Spline transform implementation.
//!
//! This module provides a B-Spline free-form deformation transform whose
//! evaluation, Jacobian and spatial Jacobian all run through the
//! [`RecursiveTransformEvaluator`].

use nalgebra::SMatrix;
use crate::image::ImageBuffer;
use crate::kernel::{self, MAX_SPLINE_ORDER};
use crate::spatial::{Point, Spacing, Vector};
use super::recursive::{RecursiveTransformEvaluator, MAX_SPACE_DIMENSION};
use super::trait_::{GridSupport, LocalSupport, Transform, TransformJacobian};

const MAX_WEIGHTS: usize = (MAX_SPLINE_ORDER + 1) * MAX_SPACE_DIMENSION;

/// B-Spline Transform (Free-form deformation).
///
/// Uses an axis-aligned grid of control points to define a smooth
/// displacement field: `T(x) = x + Σ_c w_c(x) · d_c`.
///
/// Parameters are laid out output-dimension-major: all x displacements
/// (grid order, x-fastest), then all y displacements, and so on. Points
/// whose support region leaves the grid are mapped by the identity and
/// have a zero Jacobian.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineTransform<const D: usize> {
    grid_origin: Point<D>,
    grid_spacing: Spacing<D>,
    grid_size: [usize; D],
    offsets: [usize; D],
    evaluator: RecursiveTransformEvaluator,
    parameters: Vec<f64>,
}

impl<const D: usize> BSplineTransform<D> {
    /// Create a transform with zero displacement.
    ///
    /// # Arguments
    /// * `grid_origin` - Physical location of control point `[0; D]`
    /// * `grid_spacing` - Distance between control points along each axis
    /// * `grid_size` - Number of control points along each axis
    /// * `spline_order` - 1 (linear) to 3 (cubic)
    ///
    /// # Panics
    /// If the order is unsupported or the grid is smaller than one support region.
    pub fn new(grid_origin: Point<D>, grid_spacing: Spacing<D>, grid_size: [usize; D], spline_order: usize) -> Self {
        assert!(
            (1..=MAX_SPLINE_ORDER).contains(&spline_order),
            "Spline order must be in 1..={MAX_SPLINE_ORDER}"
        );
        assert!(grid_spacing.is_valid(), "Grid spacing must be positive");
        assert!(
            grid_size.iter().all(|&n| n > spline_order),
            "Grid must hold at least one support region per axis"
        );
        let mut offsets = [1usize; D];
        for i in 1..D {
            offsets[i] = offsets[i - 1] * grid_size[i - 1];
        }
        let parameters_per_dimension: usize = grid_size.iter().product();
        Self {
            grid_origin,
            grid_spacing,
            grid_size,
            offsets,
            evaluator: RecursiveTransformEvaluator::new(D, spline_order, D),
            parameters: vec![0.0; parameters_per_dimension * D],
        }
    }

    /// Grid covering the physical bounding box of an image.
    ///
    /// `mesh_size` is the number of grid intervals spanning the image along
    /// each axis. Extra control points are added around the image so that
    /// every pixel has a valid support region.
    pub fn covering(image: &ImageBuffer<D>, mesh_size: [usize; D], spline_order: usize) -> Self {
        let size = image.size();
        let mut lower = [f64::INFINITY; D];
        let mut upper = [f64::NEG_INFINITY; D];
        for corner in 0..(1usize << D) {
            let index: [usize; D] = std::array::from_fn(|i| {
                if corner & (1 << i) != 0 {
                    size[i].saturating_sub(1)
                } else {
                    0
                }
            });
            let point = image.index_to_physical_point(&index);
            for i in 0..D {
                lower[i] = lower[i].min(point[i]);
                upper[i] = upper[i].max(point[i]);
            }
        }
        let mesh: [usize; D] = std::array::from_fn(|i| mesh_size[i].max(1));
        let spacing = Vector::from_fn(|i| {
            let extent = upper[i] - lower[i];
            if extent > 0.0 {
                extent / mesh[i] as f64
            } else {
                1.0
            }
        });
        let border = ((spline_order + 1) / 2) as f64;
        let origin = Point::from_fn(|i| lower[i] - border * spacing[i]);
        let grid_size = std::array::from_fn(|i| mesh[i] + spline_order + 2);
        Self::new(origin, spacing, grid_size, spline_order)
    }

    pub fn grid_origin(&self) -> &Point<D> {
        &self.grid_origin
    }

    pub fn grid_spacing(&self) -> &Spacing<D> {
        &self.grid_spacing
    }

    pub fn grid_size(&self) -> [usize; D] {
        self.grid_size
    }

    pub fn spline_order(&self) -> usize {
        self.evaluator.spline_order()
    }

    /// Coefficient stride of each grid axis.
    pub fn offsets(&self) -> [usize; D] {
        self.offsets
    }

    pub fn parameters_per_dimension(&self) -> usize {
        self.parameters.len() / D
    }

    /// Continuous grid coordinate of a physical point.
    pub fn continuous_grid_index(&self, point: &Point<D>) -> [f64; D] {
        std::array::from_fn(|i| (point[i] - self.grid_origin[i]) / self.grid_spacing[i])
    }

    /// Fill axis-major weights and return the flat index of the first
    /// support point, or `None` if the support leaves the grid.
    fn support(&self, point: &Point<D>, weights: &mut [f64], derivative_weights: Option<&mut [f64]>) -> Option<usize> {
        let order = self.spline_order();
        let cindex = self.continuous_grid_index(point);
        if cindex.iter().any(|x| !x.is_finite()) {
            return None;
        }
        let mut base = 0;
        for axis in 0..D {
            let span = axis * (order + 1)..(axis + 1) * (order + 1);
            let start = kernel::weights(order, cindex[axis], &mut weights[span]);
            if start < 0 || start as usize + order >= self.grid_size[axis] {
                return None;
            }
            base += start as usize * self.offsets[axis];
        }
        if let Some(derivative) = derivative_weights {
            for axis in 0..D {
                let span = axis * (order + 1)..(axis + 1) * (order + 1);
                kernel::derivative_weights(order, cindex[axis], &mut derivative[span]);
            }
        }
        Some(base)
    }

    fn coefficient_blocks(&self) -> [&[f64]; D] {
        let n = self.parameters_per_dimension();
        std::array::from_fn(|j| &self.parameters[j * n..(j + 1) * n])
    }

    fn displace(&self, point: &Point<D>, base: usize, weights: &[f64]) -> Point<D> {
        let mut displacement = [0.0; D];
        self.evaluator
            .transform_point_with_offsets(&self.coefficient_blocks(), base, &self.offsets, weights, &mut displacement);
        *point + Vector::new(displacement)
    }

    /// Derivative of the mapped point with respect to the input point.
    ///
    /// Entry `(j, i)` is `∂T_j / ∂x_i`. Outside the valid support region the
    /// transform is the identity.
    pub fn spatial_jacobian(&self, point: &Point<D>) -> SMatrix<f64, D, D> {
        let mut weights = [0.0; MAX_WEIGHTS];
        let mut derivative_weights = [0.0; MAX_WEIGHTS];
        let Some(base) = self.support(point, &mut weights, Some(&mut derivative_weights)) else {
            return SMatrix::identity();
        };
        let mut sj = vec![0.0; D * (D + 1)];
        self.evaluator.spatial_jacobian(
            &self.coefficient_blocks(),
            base,
            &self.offsets,
            &weights,
            &derivative_weights,
            &mut sj,
        );
        SMatrix::from_fn(|j, i| {
            let identity = if i == j { 1.0 } else { 0.0 };
            identity + sj[j + D * (i + 1)] / self.grid_spacing[i]
        })
    }
}

impl<const D: usize> Transform<D> for BSplineTransform<D> {
    fn number_of_parameters(&self) -> usize {
        self.parameters.len()
    }

    fn parameters(&self) -> Vec<f64> {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, parameters: &[f64]) {
        assert_eq!(
            parameters.len(),
            self.parameters.len(),
            "B-spline transform expects {} parameters",
            self.parameters.len()
        );
        self.parameters.copy_from_slice(parameters);
    }

    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        let mut weights = [0.0; MAX_WEIGHTS];
        match self.support(point, &mut weights, None) {
            Some(base) => self.displace(point, base, &weights),
            None => *point,
        }
    }

    fn number_of_nonzero_jacobian_indices(&self) -> usize {
        self.evaluator.support_size() * D
    }

    fn is_valid_point(&self, point: &Point<D>) -> bool {
        let mut weights = [0.0; MAX_WEIGHTS];
        self.support(point, &mut weights, None).is_some()
    }

    fn jacobian(&self, point: &Point<D>, jacobian: &mut TransformJacobian) {
        let nonzero = self.number_of_nonzero_jacobian_indices();
        jacobian.reset(D, nonzero);
        let mut weights = [0.0; MAX_WEIGHTS];
        match self.support(point, &mut weights, None) {
            Some(base) => {
                self.evaluator.jacobian(&weights, jacobian.values_mut());
                self.evaluator.nonzero_jacobian_indices(
                    self.parameters_per_dimension(),
                    base,
                    &self.offsets,
                    jacobian.nonzero_indices_mut(),
                );
            }
            None => {
                for (c, index) in jacobian.nonzero_indices_mut().iter_mut().enumerate() {
                    *index = c;
                }
            }
        }
    }

    fn grid_support(&self) -> Option<GridSupport> {
        Some(GridSupport {
            evaluator: self.evaluator,
            parameters_per_dimension: self.parameters_per_dimension(),
        })
    }

    fn transform_point_local(&self, point: &Point<D>, local: &mut LocalSupport) -> Option<Point<D>> {
        local.weights.resize(self.evaluator.weights_len(), 0.0);
        local
            .nonzero_indices
            .resize(self.number_of_nonzero_jacobian_indices(), 0);
        let base = self.support(point, &mut local.weights, None)?;
        self.evaluator.nonzero_jacobian_indices(
            self.parameters_per_dimension(),
            base,
            &self.offsets,
            &mut local.nonzero_indices,
        );
        Some(self.displace(point, base, &local.weights))
    }
}
