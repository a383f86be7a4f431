use std::sync::Arc;
use ritk_core::image::{ImageBuffer, ImageMetadata, ImageRegion};
use ritk_core::interpolation::{BSplineInterpolator, LinearInterpolator};
use ritk_core::spatial::{Point, Vector};
use ritk_core::transform::{
    AffineTransform, BSplineTransform, LocalSupport, Transform, TransformJacobian, TranslationTransform,
};
use ritk_metric::metric::finite_difference::{central_difference, DEFAULT_STEP};
use ritk_metric::{DerivativePath, GradientSource, MattesConfig, MattesMutualInformation, Metric};

const SIZE: usize = 32;

/// Ramp with a blob; extremes sit at the image corners.
fn image(shift: [f64; 2]) -> Arc<ImageBuffer<2>> {
    Arc::new(ImageBuffer::from_fn([SIZE, SIZE], ImageMetadata::default(), |[x, y]| {
        let dx = x as f64 - 15.0 - shift[0];
        let dy = y as f64 - 14.0 - shift[1];
        6.0 * x as f64 + 4.0 * y as f64 + 60.0 * (-(dx * dx + dy * dy) / 40.0).exp()
    }))
}

fn interior() -> ImageRegion<2> {
    ImageRegion::new([8, 8], [16, 16])
}

fn metric(transform: impl Transform<2> + 'static) -> MattesMutualInformation<2> {
    let moving = image([1.5, -1.0]);
    MattesMutualInformation::new(MattesConfig::default().with_histogram_bins(32).with_exact_derivative(true))
        .with_fixed_image(image([0.0, 0.0]))
        .with_moving_image(moving.clone())
        .with_fixed_region(interior())
        .with_transform(transform)
        .with_interpolator(BSplineInterpolator::new(moving))
}

fn assert_matches_finite_difference(metric: &mut MattesMutualInformation<2>, parameters: &[f64]) {
    let (_, analytic) = metric.value_and_derivative(parameters).unwrap();
    let numeric = central_difference(|p| metric.value(p), parameters, DEFAULT_STEP).unwrap();
    assert_eq!(analytic.len(), parameters.len());
    for (i, (a, n)) in analytic.iter().zip(&numeric).enumerate() {
        assert!(
            (a - n).abs() <= 1e-3 * (1.0 + n.abs()),
            "parameter {i}: analytic {a} vs finite difference {n}"
        );
    }
}

/// Delegates everything but the grid capability.
struct Opaque<T>(T);

impl<T: Transform<2>> Transform<2> for Opaque<T> {
    fn number_of_parameters(&self) -> usize {
        self.0.number_of_parameters()
    }

    fn parameters(&self) -> Vec<f64> {
        self.0.parameters()
    }

    fn set_parameters(&mut self, parameters: &[f64]) {
        self.0.set_parameters(parameters)
    }

    fn transform_point(&self, point: &Point<2>) -> Point<2> {
        self.0.transform_point(point)
    }

    fn number_of_nonzero_jacobian_indices(&self) -> usize {
        self.0.number_of_nonzero_jacobian_indices()
    }

    fn is_valid_point(&self, point: &Point<2>) -> bool {
        self.0.is_valid_point(point)
    }

    fn jacobian(&self, point: &Point<2>, jacobian: &mut TransformJacobian) {
        self.0.jacobian(point, jacobian)
    }
}

fn bspline_transform() -> BSplineTransform<2> {
    BSplineTransform::covering(&image([0.0, 0.0]), [4, 4], 3)
}

fn bspline_parameters(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.4 * (i as f64 * 0.7).sin()).collect()
}

#[test]
fn test_translation_gradient() {
    let mut metric = metric(TranslationTransform::<2>::identity());
    metric.initialize().unwrap();
    assert_eq!(metric.gradient_source(), Some(GradientSource::Analytic));
    assert_eq!(metric.derivative_path(), Some(DerivativePath::Generic));
    assert_matches_finite_difference(&mut metric, &[0.6, -0.3]);
}

#[test]
fn test_affine_gradient() {
    let mut metric = metric(AffineTransform::<2>::identity(Point::new([15.5, 15.5])));
    metric.initialize().unwrap();
    assert_matches_finite_difference(&mut metric, &[1.02, 0.03, -0.02, 0.97, 0.8, -0.5]);
}

#[test]
fn test_bspline_gradient_on_grid_path() {
    let transform = bspline_transform();
    let parameters = bspline_parameters(transform.number_of_parameters());
    let mut metric = metric(transform);
    metric.initialize().unwrap();
    assert!(matches!(metric.derivative_path(), Some(DerivativePath::Grid(_))));
    assert_matches_finite_difference(&mut metric, &parameters);
}

#[test]
fn test_grid_and_generic_paths_agree() {
    let transform = bspline_transform();
    let parameters = bspline_parameters(transform.number_of_parameters());

    let mut grid = metric(transform.clone());
    let mut generic = metric(Opaque(transform));
    grid.initialize().unwrap();
    generic.initialize().unwrap();
    assert_eq!(generic.derivative_path(), Some(DerivativePath::Generic));

    let (grid_value, grid_gradient) = grid.value_and_derivative(&parameters).unwrap();
    let (generic_value, generic_gradient) = generic.value_and_derivative(&parameters).unwrap();
    assert!((grid_value - generic_value).abs() < 1e-12);
    for (a, b) in grid_gradient.iter().zip(&generic_gradient) {
        assert!((a - b).abs() < 1e-10, "{a} vs {b}");
    }
}

#[test]
fn test_grid_and_generic_paths_agree_on_partial_support() {
    // the grid covers only part of the fixed region
    let transform = BSplineTransform::<2>::new(Point::new([8.0, 8.0]), Vector::new([4.0, 4.0]), [4, 4], 1);
    let parameters: Vec<f64> = (0..transform.number_of_parameters())
        .map(|i| 0.3 * (i as f64 * 1.3).cos())
        .collect();

    let mut grid = metric(transform.clone());
    let mut generic = metric(Opaque(transform.clone()));
    grid.initialize().unwrap();
    generic.initialize().unwrap();

    let outside = grid
        .samples()
        .iter()
        .filter(|s| !transform.is_valid_point(&s.point))
        .count();
    assert!(outside > 0);

    let (grid_value, grid_gradient) = grid.value_and_derivative(&parameters).unwrap();
    let (generic_value, generic_gradient) = generic.value_and_derivative(&parameters).unwrap();
    assert!((grid_value - generic_value).abs() < 1e-12, "{grid_value} vs {generic_value}");
    for (a, b) in grid_gradient.iter().zip(&generic_gradient) {
        assert!((a - b).abs() < 1e-10, "{a} vs {b}");
    }
    assert_eq!(grid.value(&parameters), generic.value(&parameters));
}

#[test]
fn test_central_difference_fallback_tracks_analytic() {
    // linear interpolation has no analytic derivative
    let moving = image([1.5, -1.0]);
    let mut linear = MattesMutualInformation::new(MattesConfig::default().with_histogram_bins(32).with_exact_derivative(true))
        .with_fixed_image(image([0.0, 0.0]))
        .with_moving_image(moving.clone())
        .with_fixed_region(interior())
        .with_transform(TranslationTransform::<2>::identity())
        .with_interpolator(LinearInterpolator::new(moving));
    linear.initialize().unwrap();
    assert_eq!(linear.gradient_source(), Some(GradientSource::CentralDifference));

    let mut cubic = metric(TranslationTransform::<2>::identity());
    cubic.initialize().unwrap();

    let parameters = [0.5, 0.5];
    let (_, fallback) = linear.value_and_derivative(&parameters).unwrap();
    let (_, analytic) = cubic.value_and_derivative(&parameters).unwrap();
    let agreement: f64 = fallback.iter().zip(&analytic).map(|(f, a)| f * a).sum();
    assert!(agreement > 0.0, "{fallback:?} vs {analytic:?}");
}

#[test]
fn test_value_improves_along_negative_gradient() {
    let mut metric = metric(TranslationTransform::<2>::identity());
    metric.initialize().unwrap();
    let start = [0.0, 0.0];
    let (value, gradient) = metric.value_and_derivative(&start).unwrap();
    let direction = Vector::<2>::new([gradient[0], gradient[1]]);
    let step = 0.1 / direction.norm();
    let next = [start[0] - step * gradient[0], start[1] - step * gradient[1]];
    assert!(metric.value(&next).unwrap() < value);
}

#[test]
fn test_grid_transform_skips_points_outside_support() {
    let transform = BSplineTransform::<2>::new(Point::new([8.0, 8.0]), Vector::new([4.0, 4.0]), [4, 4], 1);
    let mut local = LocalSupport::default();
    assert!(transform.transform_point_local(&Point::new([0.0, 0.0]), &mut local).is_none());
    assert!(transform.transform_point_local(&Point::new([10.0, 10.0]), &mut local).is_some());

    // only the grid interior contributes, so the metric still evaluates
    let parameters = vec![0.0; transform.number_of_parameters()];
    let mut metric = metric(transform);
    metric.initialize().unwrap();
    assert!(metric.value(&parameters).is_ok());
}
