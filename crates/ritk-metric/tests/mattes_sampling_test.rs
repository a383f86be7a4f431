use std::sync::Arc;
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use proptest::prelude::*;
use ritk_core::image::{Image, ImageBuffer, ImageMetadata, ImageRegion};
use ritk_core::interpolation::{BSplineInterpolator, Interpolator, LinearInterpolator};
use ritk_core::mask::ImageMask;
use ritk_core::spatial::{Direction2, Point, Point2, Spacing2};
use ritk_core::transform::TranslationTransform;
use ritk_metric::metric::sampler::{full_region, Sample};
use ritk_metric::metric::Binning;
use ritk_metric::{HistogramKind, MattesConfig, MattesMutualInformation, Metric, MetricError};

type B = NdArray<f32>;

fn ramp_image(size: usize) -> Image<B, 2> {
    let device = Default::default();
    let mut data = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let r2 = (x as f32 - 12.0).powi(2) + (y as f32 - 9.0).powi(2);
            data.push(2.0 * x as f32 + y as f32 + 40.0 * (-r2 / 30.0).exp());
        }
    }
    let tensor = Tensor::<B, 2>::from_data(TensorData::new(data, [size, size]), &device);
    Image::new(tensor, Point2::origin(), Spacing2::uniform(1.0), Direction2::identity())
}

fn metric(config: MattesConfig) -> MattesMutualInformation<2> {
    let image = ramp_image(24);
    let moving = Arc::new(image.to_buffer());
    MattesMutualInformation::new(config)
        .with_images(&image, &image)
        .with_transform(TranslationTransform::<2>::identity())
        .with_interpolator(LinearInterpolator::new(moving))
}

fn outside(n: usize) -> Vec<Sample<2>> {
    (0..n)
        .map(|i| Sample {
            point: Point::new([1000.0 + i as f64, 5.0]),
            value: 10.0,
        })
        .collect()
}

#[test]
fn test_quarter_acceptance_rule() {
    let mut metric = metric(MattesConfig::default().with_spatial_samples(500));
    metric.initialize().unwrap();

    let mut samples: Vec<Sample<2>> = metric.samples()[..100].to_vec();
    samples.extend(outside(400));
    metric.set_samples(samples);
    assert_eq!(
        metric.value(&[0.0, 0.0]),
        Err(MetricError::Sampling { accepted: 100, total: 500 })
    );

    // 125 is exactly a quarter and passes
    let mut samples: Vec<Sample<2>> = metric.samples()[..100].to_vec();
    let inside = samples.clone();
    samples.extend(inside.into_iter().take(25));
    samples.extend(outside(375));
    metric.set_samples(samples);
    assert!(metric.value(&[0.0, 0.0]).is_ok());
}

#[test]
fn test_all_rejected_small_sample_count_is_degenerate() {
    let mut metric = metric(MattesConfig::default().with_spatial_samples(3));
    metric.initialize().unwrap();
    metric.set_samples(outside(3));
    assert_eq!(
        metric.value(&[0.0, 0.0]),
        Err(MetricError::DegenerateHistogram(HistogramKind::Joint))
    );
    assert!(metric.value(&[0.0, 0.0]).unwrap_err().is_evaluation_failure());
}

#[test]
fn test_histograms_normalized_after_evaluation() {
    let mut metric = metric(MattesConfig::default());
    metric.initialize().unwrap();
    metric.value_and_derivative(&[0.4, -0.6]).unwrap();
    let histograms = metric.histograms().unwrap();
    let bins = histograms.bins();

    let joint: f64 = histograms.joint_pdf().iter().sum();
    let fixed: f64 = histograms.fixed_marginal().iter().sum();
    assert!((joint - 1.0).abs() < 1e-9);
    assert!((fixed - 1.0).abs() < 1e-9);
    for m in 0..bins {
        let column: f64 = (0..bins).map(|f| histograms.joint(f, m)).sum();
        assert!((column - histograms.moving_marginal()[m]).abs() < 1e-12);
    }
    // padding bins of the fixed marginal stay empty
    assert_eq!(histograms.fixed_marginal()[0], 0.0);
    assert_eq!(histograms.fixed_marginal()[bins - 1], 0.0);
}

#[test]
fn test_sample_order_does_not_change_value() {
    let mut metric = metric(MattesConfig::default());
    metric.initialize().unwrap();
    let parameters = [0.3, 0.8];
    let (forward, forward_gradient) = metric.value_and_derivative(&parameters).unwrap();

    let mut samples = metric.samples().to_vec();
    samples.reverse();
    samples.rotate_left(17);
    metric.set_samples(samples);
    let (permuted, permuted_gradient) = metric.value_and_derivative(&parameters).unwrap();

    assert!((forward - permuted).abs() < 1e-12);
    for (a, b) in forward_gradient.iter().zip(&permuted_gradient) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_seed_determinism() {
    let config = MattesConfig::default().with_random_seed(99);
    let mut a = metric(config.clone());
    let mut b = metric(config);
    let mut c = metric(MattesConfig::default().with_random_seed(100));
    a.initialize().unwrap();
    b.initialize().unwrap();
    c.initialize().unwrap();
    assert_eq!(a.samples(), b.samples());
    assert_ne!(a.samples(), c.samples());
    assert_eq!(a.value(&[0.2, 0.1]), b.value(&[0.2, 0.1]));

    let first = a.samples().to_vec();
    a.sample_fixed_image_domain().unwrap();
    assert_ne!(a.samples(), first.as_slice());
    a.reseed(99);
    a.sample_fixed_image_domain().unwrap();
    assert_eq!(a.samples(), first.as_slice());
}

#[test]
fn test_fixed_mask_restricts_samples() {
    let mut metric = metric(MattesConfig::default()).with_fixed_mask(|p: &Point<2>| p[0] < 10.0);
    metric.initialize().unwrap();
    assert_eq!(metric.samples().len(), 500);
    assert!(metric.samples().iter().all(|s| s.point[0] < 10.0));
}

#[test]
fn test_fixed_region_restricts_samples() {
    let region = ImageRegion::new([4, 6], [5, 3]);
    let mut metric = metric(MattesConfig::default()).with_fixed_region(region);
    metric.initialize().unwrap();
    for sample in metric.samples() {
        let index = [sample.point[0] as usize, sample.point[1] as usize];
        assert!(region.contains(&index));
    }

    let mut bad = self::metric(MattesConfig::default()).with_fixed_region(ImageRegion::new([20, 20], [10, 1]));
    assert!(matches!(bad.initialize(), Err(MetricError::Configuration(_))));
}

#[test]
fn test_empty_moving_mask_rejects_everything() {
    let blank = Arc::new(ImageBuffer::from_fn([24, 24], ImageMetadata::default(), |_| 0.0));
    let mut metric = metric(MattesConfig::default()).with_moving_mask(ImageMask::new(blank));
    metric.initialize().unwrap();
    assert_eq!(
        metric.value(&[0.0, 0.0]),
        Err(MetricError::Sampling { accepted: 0, total: 500 })
    );
}

#[test]
fn test_constant_image_is_a_configuration_error() {
    let flat = Arc::new(ImageBuffer::from_fn([8, 8], ImageMetadata::default(), |_| 3.0));
    let mut metric = MattesMutualInformation::new(MattesConfig::default())
        .with_fixed_image(flat.clone())
        .with_moving_image(flat.clone())
        .with_transform(TranslationTransform::<2>::identity())
        .with_interpolator(LinearInterpolator::new(flat));
    assert!(matches!(metric.initialize(), Err(MetricError::Configuration(_))));
}

#[test]
fn test_exact_mode_matches_sampled_over_all_pixels() {
    let mut exact = metric(MattesConfig::default().with_exact_derivative(true));
    exact.initialize().unwrap();
    assert_eq!(exact.samples().len(), 24 * 24);

    let mut sampled = metric(MattesConfig::default());
    sampled.initialize().unwrap();
    let parameters = [0.45, -0.25];
    let (exact_value, exact_gradient) = sampled.exact_value_and_derivative(&parameters).unwrap();

    let buffer = ramp_image(24).to_buffer();
    sampled.set_samples(full_region(&buffer, &buffer.largest_region(), None));
    let (value, gradient) = sampled.value_and_derivative(&parameters).unwrap();
    assert!((exact_value - value).abs() < 1e-12);
    for (a, b) in exact_gradient.iter().zip(&gradient) {
        assert!((a - b).abs() < 1e-12);
    }

    let via_exact_config = exact.value(&parameters).unwrap();
    assert!((via_exact_config - value).abs() < 1e-12);
    assert!((sampled.exact_value(&parameters).unwrap() - value).abs() < 1e-12);
}

#[test]
fn test_overshooting_moving_values_are_rejected() {
    // cubic interpolation of a step rings past both plateaus between pixels
    let fixed = Arc::new(ImageBuffer::from_fn([32, 32], ImageMetadata::default(), |[x, y]| {
        3.0 * x as f64 + y as f64
    }));
    let moving = Arc::new(ImageBuffer::from_fn([32, 32], ImageMetadata::default(), |[x, _]| {
        if x < 16 { 0.0 } else { 100.0 }
    }));
    let region = ImageRegion::new([4, 4], [24, 24]);
    let mut metric = MattesMutualInformation::new(MattesConfig::default().with_exact_derivative(true))
        .with_fixed_image(fixed.clone())
        .with_moving_image(moving.clone())
        .with_fixed_region(region)
        .with_transform(TranslationTransform::<2>::identity())
        .with_interpolator(BSplineInterpolator::new(moving.clone()));
    metric.initialize().unwrap();
    let parameters = [0.5, 0.0];
    metric.value(&parameters).unwrap();

    let interpolator = BSplineInterpolator::new(moving);
    let binning = *metric.fixed_binning().unwrap();
    let bins = binning.bins();
    let mut in_range = vec![0.0; bins];
    let mut in_buffer = vec![0.0; bins];
    let mut rejected = 0;
    for sample in full_region(&fixed, &region, None) {
        let mapped = Point::new([sample.point[0] + 0.5, sample.point[1]]);
        let value = interpolator.evaluate(&mapped);
        let bin = binning.bin_index(sample.value);
        in_buffer[bin] += 1.0;
        if (0.0..=100.0).contains(&value) {
            in_range[bin] += 1.0;
        } else {
            rejected += 1;
        }
    }
    assert!(rejected > 0);

    let accepted: f64 = in_range.iter().sum();
    let total: f64 = in_buffer.iter().sum();
    assert_eq!(accepted as usize + rejected, 24 * 24);
    let marginal = metric.histograms().unwrap().fixed_marginal();
    let mut unchecked_differs = false;
    for bin in 0..bins {
        assert!((marginal[bin] - in_range[bin] / accepted).abs() < 1e-12);
        unchecked_differs |= (marginal[bin] - in_buffer[bin] / total).abs() > 1e-9;
    }
    assert!(unchecked_differs);
}

proptest! {
    #[test]
    fn prop_bin_index_stays_inside_padding(
        bins in 5usize..200,
        min in -1.0e4f64..1.0e4,
        range in 1.0e-3f64..1.0e4,
        t in 0.0f64..=1.0
    ) {
        let max = min + range;
        let binning = Binning::new(min, max, bins).unwrap();
        prop_assert!(binning.bin_size() > 0.0);
        let value = (min + t * range).min(max);
        let index = binning.bin_index(value);
        prop_assert!(index >= 2 && index <= bins - 3);
        prop_assert!(binning.contains(value));
    }
}
