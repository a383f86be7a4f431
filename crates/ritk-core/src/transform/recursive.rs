//! Dimension-recursive evaluation of tensor-product B-spline transforms.
//!
//! Every operation walks the `(order + 1)^dim` control-point neighbourhood of
//! a point depth first. The outermost loop runs over the last axis and the
//! innermost over axis 0, so leaves are visited in x-fastest order. Jacobian
//! columns and non-zero parameter indices come out in that order.
//!
//! Weight tables are laid out axis-major: the weight of the `k`-th support
//! point along `axis` lives at `weights[k + axis * (order + 1)]`.
//!
//! Nothing here validates memory ranges. Callers check that the support
//! region lies inside the coefficient grid before calling.

use crate::kernel::MAX_SPLINE_ORDER;

/// Highest space dimension the evaluator recurses over.
pub const MAX_SPACE_DIMENSION: usize = 4;

/// Stateless evaluator for one `(space dimension, spline order, output dimension)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveTransformEvaluator {
    space_dimension: usize,
    spline_order: usize,
    output_dimension: usize,
}

impl RecursiveTransformEvaluator {
    /// # Panics
    /// If the space dimension exceeds [`MAX_SPACE_DIMENSION`] or the order
    /// exceeds [`MAX_SPLINE_ORDER`].
    pub fn new(space_dimension: usize, spline_order: usize, output_dimension: usize) -> Self {
        assert!(
            space_dimension <= MAX_SPACE_DIMENSION,
            "Space dimension {space_dimension} exceeds {MAX_SPACE_DIMENSION}"
        );
        assert!(
            spline_order <= MAX_SPLINE_ORDER,
            "Spline order {spline_order} exceeds {MAX_SPLINE_ORDER}"
        );
        Self {
            space_dimension,
            spline_order,
            output_dimension,
        }
    }

    pub fn space_dimension(&self) -> usize {
        self.space_dimension
    }

    pub fn spline_order(&self) -> usize {
        self.spline_order
    }

    pub fn output_dimension(&self) -> usize {
        self.output_dimension
    }

    /// Number of control points influencing one location, `(order + 1)^dim`.
    pub fn support_size(&self) -> usize {
        (self.spline_order + 1).pow(self.space_dimension as u32)
    }

    /// Length of the weight tables this evaluator reads.
    pub fn weights_len(&self) -> usize {
        (self.spline_order + 1) * self.space_dimension
    }

    /// Interpolate one coordinate per output dimension using a step table.
    ///
    /// `coefficients[j]` holds the coefficients of output dimension `j` and
    /// `base` is the offset of the first support point. `steps[k + axis *
    /// (order + 1)]` is the offset of the `k`-th support point along `axis`
    /// relative to the enclosing level.
    pub fn transform_point(
        &self,
        coefficients: &[&[f64]],
        base: usize,
        steps: &[usize],
        weights: &[f64],
        out: &mut [f64],
    ) {
        for (j, value) in out.iter_mut().enumerate().take(self.output_dimension) {
            *value = self.point_with_steps(self.space_dimension, coefficients[j], base, steps, weights);
        }
    }

    /// Interpolate one coordinate per output dimension using per-axis grid strides.
    ///
    /// `offsets[axis]` is the coefficient stride of `axis`.
    pub fn transform_point_with_offsets(
        &self,
        coefficients: &[&[f64]],
        base: usize,
        offsets: &[usize],
        weights: &[f64],
        out: &mut [f64],
    ) {
        for (j, value) in out.iter_mut().enumerate().take(self.output_dimension) {
            *value = self.point_with_offsets(self.space_dimension, coefficients[j], base, offsets, weights);
        }
    }

    /// Product of the per-axis weights for every support point, in visiting order.
    ///
    /// Returns the number of entries written, `support_size()`.
    pub fn jacobian_values(&self, weights: &[f64], out: &mut [f64]) -> usize {
        let mut cursor = 0;
        self.visit_leaves(self.space_dimension, weights, 1.0, &mut |value| {
            out[cursor] = value;
            cursor += 1;
        });
        cursor
    }

    /// Block-diagonal Jacobian of the output with respect to the local parameters.
    ///
    /// `out` is row-major with `output_dimension` rows and
    /// `support_size() * output_dimension` columns. Row `j` carries the
    /// support weights in columns `j * N .. (j + 1) * N` and zeros
    /// elsewhere, `N` being the support size.
    pub fn jacobian(&self, weights: &[f64], out: &mut [f64]) {
        let n = self.support_size();
        let out_dim = self.output_dimension;
        out[..out_dim * n * out_dim].fill(0.0);
        let mut cursor = 0;
        self.visit_leaves(self.space_dimension, weights, 1.0, &mut |value| {
            for j in 0..out_dim {
                out[cursor + j * n * (out_dim + 1)] = value;
            }
            cursor += 1;
        });
    }

    /// Jacobian contracted with an image gradient.
    ///
    /// Writes `out[c + j * N] = weight(c) * gradient[j]`, the derivative of
    /// `gradient · T(x)` with respect to the parameter at non-zero index
    /// `c + j * N`.
    pub fn jacobian_gradient_product(&self, weights: &[f64], gradient: &[f64], out: &mut [f64]) {
        let n = self.support_size();
        let out_dim = self.output_dimension;
        let mut cursor = 0;
        self.visit_leaves(self.space_dimension, weights, 1.0, &mut |value| {
            for j in 0..out_dim {
                out[cursor + j * n] = value * gradient[j];
            }
            cursor += 1;
        });
    }

    /// Global parameter indices of the support region starting at `current_index`.
    ///
    /// Writes `support_size() * output_dimension` indices: entry `c + j * N`
    /// is the `c`-th grid index shifted into the parameter block of output
    /// dimension `j`.
    pub fn nonzero_jacobian_indices(
        &self,
        parameters_per_dimension: usize,
        current_index: usize,
        offsets: &[usize],
        out: &mut [usize],
    ) {
        let n = self.support_size();
        let out_dim = self.output_dimension;
        let mut cursor = 0;
        self.visit_indices(self.space_dimension, current_index, offsets, &mut |index| {
            for j in 0..out_dim {
                out[cursor + j * n] = index + j * parameters_per_dimension;
            }
            cursor += 1;
        });
    }

    /// Transformed value and spatial derivatives in a single pass.
    ///
    /// `out` has `output_dimension * (space_dimension + 1)` entries laid out
    /// as `out[j + output_dimension * n]`: column `n = 0` is the
    /// interpolated value and column `n >= 1` the derivative with respect to
    /// axis `n - 1` in grid units.
    pub fn spatial_jacobian(
        &self,
        coefficients: &[&[f64]],
        base: usize,
        offsets: &[usize],
        weights: &[f64],
        derivative_weights: &[f64],
        out: &mut [f64],
    ) {
        let out_dim = self.output_dimension;
        let columns = self.space_dimension + 1;
        let mut column = [0.0; MAX_SPACE_DIMENSION + 1];
        for j in 0..out_dim {
            self.spatial_column(
                self.space_dimension,
                coefficients[j],
                base,
                offsets,
                weights,
                derivative_weights,
                &mut column[..columns],
            );
            for n in 0..columns {
                out[j + out_dim * n] = column[n];
            }
        }
    }

    fn weight_index(&self, dim: usize, k: usize) -> usize {
        k + (dim - 1) * (self.spline_order + 1)
    }

    fn point_with_steps(&self, dim: usize, coefficients: &[f64], offset: usize, steps: &[usize], weights: &[f64]) -> f64 {
        if dim == 0 {
            return coefficients[offset];
        }
        let mut coord = 0.0;
        for k in 0..=self.spline_order {
            let w = self.weight_index(dim, k);
            coord += self.point_with_steps(dim - 1, coefficients, offset + steps[w], steps, weights) * weights[w];
        }
        coord
    }

    fn point_with_offsets(&self, dim: usize, coefficients: &[f64], offset: usize, offsets: &[usize], weights: &[f64]) -> f64 {
        if dim == 0 {
            return coefficients[offset];
        }
        let stride = offsets[dim - 1];
        let mut coord = 0.0;
        let mut current = offset;
        for k in 0..=self.spline_order {
            coord += self.point_with_offsets(dim - 1, coefficients, current, offsets, weights)
                * weights[self.weight_index(dim, k)];
            current += stride;
        }
        coord
    }

    fn visit_leaves(&self, dim: usize, weights: &[f64], value: f64, leaf: &mut impl FnMut(f64)) {
        if dim == 0 {
            leaf(value);
            return;
        }
        for k in 0..=self.spline_order {
            self.visit_leaves(dim - 1, weights, value * weights[self.weight_index(dim, k)], leaf);
        }
    }

    fn visit_indices(&self, dim: usize, current: usize, offsets: &[usize], leaf: &mut impl FnMut(usize)) {
        if dim == 0 {
            leaf(current);
            return;
        }
        let stride = offsets[dim - 1];
        let mut index = current;
        for _ in 0..=self.spline_order {
            self.visit_indices(dim - 1, index, offsets, leaf);
            index += stride;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spatial_column(
        &self,
        dim: usize,
        coefficients: &[f64],
        offset: usize,
        offsets: &[usize],
        weights: &[f64],
        derivative_weights: &[f64],
        out: &mut [f64],
    ) {
        if dim == 0 {
            out[0] = coefficients[offset];
            return;
        }
        out[..=dim].fill(0.0);
        let stride = offsets[dim - 1];
        let mut current = offset;
        let mut sub = [0.0; MAX_SPACE_DIMENSION + 1];
        for k in 0..=self.spline_order {
            self.spatial_column(dim - 1, coefficients, current, offsets, weights, derivative_weights, &mut sub[..dim]);
            let w = self.weight_index(dim, k);
            for n in 0..dim {
                out[n] += sub[n] * weights[w];
            }
            out[dim] += sub[0] * derivative_weights[w];
            current += stride;
        }
    }
}
