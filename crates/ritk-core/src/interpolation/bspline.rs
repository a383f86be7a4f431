//! B-Spline interpolation implementation.
//!
//! This module provides cubic B-Spline interpolation for smooth sampling
//! of image values at continuous coordinates, together with its analytic
//! gradient.

use std::sync::Arc;
use crate::image::{ImageBuffer, ImageRegion};
use crate::kernel;
use crate::spatial::{Point, Vector};
use super::trait_::Interpolator;

const ORDER: usize = 3;

/// Cubic B-Spline interpolator.
///
/// The pixels are first converted to B-spline coefficients with the
/// recursive prefilter, so the spline passes through every pixel value.
/// Samples reaching past the border use mirror boundary conditions.
#[derive(Debug, Clone)]
pub struct BSplineInterpolator<const D: usize> {
    image: Arc<ImageBuffer<D>>,
    coefficients: Vec<f64>,
    strides: [usize; D],
}

impl<const D: usize> BSplineInterpolator<D> {
    pub fn new(image: Arc<ImageBuffer<D>>) -> Self {
        let size = image.size();
        let mut strides = [1usize; D];
        for i in 1..D {
            strides[i] = strides[i - 1] * size[i - 1];
        }
        let mut coefficients = image.pixels().to_vec();
        for axis in 0..D {
            prefilter_axis(&mut coefficients, size, &strides, axis);
        }
        Self {
            image,
            coefficients,
            strides,
        }
    }

    /// Value and index-space gradient at a continuous index.
    fn evaluate_at_index(&self, index: &Point<D>, with_gradient: bool) -> (f64, [f64; D]) {
        let size = self.image.size();
        let mut weights = [[0.0; ORDER + 1]; D];
        let mut derivative = [[0.0; ORDER + 1]; D];
        let mut start = [0isize; D];
        for axis in 0..D {
            start[axis] = kernel::weights(ORDER, index[axis], &mut weights[axis]);
            if with_gradient {
                kernel::derivative_weights(ORDER, index[axis], &mut derivative[axis]);
            }
        }

        let mut value = 0.0;
        let mut gradient = [0.0; D];
        for n in 0..(ORDER + 1).pow(D as u32) {
            let mut rest = n;
            let mut offset = 0;
            let mut k = [0usize; D];
            for axis in 0..D {
                k[axis] = rest % (ORDER + 1);
                rest /= ORDER + 1;
                offset += mirror(start[axis] + k[axis] as isize, size[axis]) * self.strides[axis];
            }
            let c = self.coefficients[offset];
            let w: f64 = (0..D).map(|axis| weights[axis][k[axis]]).product();
            value += c * w;
            if with_gradient {
                for (a, g) in gradient.iter_mut().enumerate() {
                    let partial: f64 = (0..D)
                        .map(|axis| if axis == a { derivative[axis][k[axis]] } else { weights[axis][k[axis]] })
                        .product();
                    *g += c * partial;
                }
            }
        }
        (value, gradient)
    }
}

impl<const D: usize> Interpolator<D> for BSplineInterpolator<D> {
    fn image(&self) -> &ImageBuffer<D> {
        &self.image
    }

    fn evaluate(&self, point: &Point<D>) -> f64 {
        let index = self.image.physical_point_to_continuous_index(point);
        self.evaluate_at_index(&index, false).0
    }

    fn evaluate_derivative(&self, point: &Point<D>) -> Option<Vector<D>> {
        let index = self.image.physical_point_to_continuous_index(point);
        let (_, gradient) = self.evaluate_at_index(&index, true);
        Some(self.image.metadata().index_gradient_to_physical(&Vector::new(gradient)))
    }
}

/// Mirror an index into `[0, n)` without repeating the border sample.
fn mirror(index: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let mut i = index.rem_euclid(period);
    if i >= n as isize {
        i = period - i;
    }
    i as usize
}

/// Convert samples along one axis into cubic B-spline coefficients.
fn prefilter_axis<const D: usize>(data: &mut [f64], size: [usize; D], strides: &[usize; D], axis: usize) {
    let n = size[axis];
    if n < 2 {
        return;
    }
    let mut lines_size = size;
    lines_size[axis] = 1;
    let mut line = vec![0.0; n];
    for start in ImageRegion::from_size(lines_size).iter() {
        let base: usize = (0..D).map(|i| start[i] * strides[i]).sum();
        for (k, v) in line.iter_mut().enumerate() {
            *v = data[base + k * strides[axis]];
        }
        prefilter_line(&mut line);
        for (k, v) in line.iter().enumerate() {
            data[base + k * strides[axis]] = *v;
        }
    }
}

/// Causal then anti-causal recursive filter with mirror boundaries.
fn prefilter_line(c: &mut [f64]) {
    let n = c.len();
    let z = 3.0_f64.sqrt() - 2.0;
    let gain = (1.0 - z) * (1.0 - 1.0 / z);
    for v in c.iter_mut() {
        *v *= gain;
    }

    // exact mirror-symmetric initialisation
    let iz = 1.0 / z;
    let mut zn = z;
    let mut z2n = z.powi(n as i32 - 1);
    let mut sum = c[0] + z2n * c[n - 1];
    z2n *= z2n * iz;
    for v in c.iter().take(n - 1).skip(1) {
        sum += (zn + z2n) * v;
        zn *= z;
        z2n *= iz;
    }
    c[0] = sum / (1.0 - zn * zn);

    for k in 1..n {
        c[k] += z * c[k - 1];
    }
    c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
    for k in (0..n - 1).rev() {
        c[k] = z * (c[k + 1] - c[k]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageMetadata;
    use crate::spatial::{Direction, Spacing};

    fn smooth_image() -> Arc<ImageBuffer<2>> {
        let metadata = ImageMetadata::new(Point::new([-1.0, 0.5]), Spacing::new([0.5, 0.25]), Direction::identity());
        Arc::new(ImageBuffer::from_fn([12, 10], metadata, |[x, y]| {
            (0.4 * x as f64).sin() * 10.0 + (y as f64 * 0.3).cos() * 5.0
        }))
    }

    #[test]
    fn test_bspline_interpolates_pixels() {
        let image = smooth_image();
        let interpolator = BSplineInterpolator::new(image.clone());
        for index in [[0, 0], [3, 4], [11, 9], [7, 2]] {
            let point = image.index_to_physical_point(&index);
            assert!((interpolator.evaluate(&point) - image.value(&index)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bspline_gradient_matches_difference_quotient() {
        let image = smooth_image();
        let interpolator = BSplineInterpolator::new(image);
        let point = Point::new([1.37, 1.61]);
        let gradient = interpolator.evaluate_derivative(&point).unwrap();
        let h = 1e-5;
        for axis in 0..2 {
            let mut plus = point;
            plus[axis] += h;
            let mut minus = point;
            minus[axis] -= h;
            let numeric = (interpolator.evaluate(&plus) - interpolator.evaluate(&minus)) / (2.0 * h);
            assert!((numeric - gradient[axis]).abs() < 1e-5 * numeric.abs().max(1.0));
        }
    }

    #[test]
    fn test_bspline_constant_image() {
        let image = Arc::new(ImageBuffer::from_fn([5, 5, 3], ImageMetadata::default(), |_| 4.0));
        let interpolator = BSplineInterpolator::new(image);
        let point = Point::new([1.3, 2.7, 0.4]);
        assert!((interpolator.evaluate(&point) - 4.0).abs() < 1e-12);
        let gradient = interpolator.evaluate_derivative(&point).unwrap();
        assert!(gradient.norm() < 1e-12);
    }

    #[test]
    fn test_mirror() {
        assert_eq!(mirror(-1, 4), 1);
        assert_eq!(mirror(4, 4), 2);
        assert_eq!(mirror(5, 4), 1);
        assert_eq!(mirror(2, 1), 0);
    }
}
