//! Fixed-image domain sampling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ritk_core::image::{ImageBuffer, ImageRegion};
use ritk_core::mask::Mask;
use ritk_core::spatial::Point;

/// A fixed-domain location and the fixed intensity there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<const D: usize> {
    pub point: Point<D>,
    pub value: f64,
}

/// Seedable random sampler over an image region.
///
/// Indices are drawn uniformly with replacement. The same seed always
/// yields the same sequence.
#[derive(Debug, Clone)]
pub struct ImageSampler {
    seed: u64,
    rng: StdRng,
}

impl ImageSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the random sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    fn random_index<const D: usize>(&mut self, region: &ImageRegion<D>) -> [usize; D] {
        let start = region.index();
        let size = region.size();
        std::array::from_fn(|i| self.rng.random_range(start[i]..start[i] + size[i]))
    }

    /// Draw `count` samples from `region`.
    ///
    /// With a mask, draws are rejected until they land inside it. At most
    /// `count * oversampling_factor` draws are made; if that budget runs out
    /// fewer than `count` samples are returned.
    pub fn sample_region<const D: usize>(
        &mut self,
        image: &ImageBuffer<D>,
        region: &ImageRegion<D>,
        count: usize,
        mask: Option<&dyn Mask<D>>,
        oversampling_factor: usize,
    ) -> Vec<Sample<D>> {
        let mut samples = Vec::with_capacity(count);
        if region.is_empty() {
            return samples;
        }
        let Some(mask) = mask else {
            for _ in 0..count {
                let index = self.random_index(region);
                samples.push(Sample {
                    point: image.index_to_physical_point(&index),
                    value: image.value(&index),
                });
            }
            return samples;
        };

        let budget = count.saturating_mul(oversampling_factor);
        let mut draws = 0;
        while samples.len() < count && draws < budget {
            draws += 1;
            let index = self.random_index(region);
            let point = image.index_to_physical_point(&index);
            if mask.is_inside(&point) {
                samples.push(Sample {
                    point,
                    value: image.value(&index),
                });
            }
        }
        if samples.len() < count {
            tracing::warn!(
                "Fixed mask sampling exhausted {} draws with {} of {} samples",
                budget,
                samples.len(),
                count
            );
        }
        tracing::debug!("Drew {} samples in {} masked draws", samples.len(), draws);
        samples
    }
}

/// Every pixel of `region` inside the optional mask, in x-fastest order.
pub fn full_region<const D: usize>(
    image: &ImageBuffer<D>,
    region: &ImageRegion<D>,
    mask: Option<&dyn Mask<D>>,
) -> Vec<Sample<D>> {
    image
        .iter_region(region)
        .filter_map(|(index, value)| {
            let point = image.index_to_physical_point(&index);
            match mask {
                Some(mask) if !mask.is_inside(&point) => None,
                _ => Some(Sample { point, value }),
            }
        })
        .collect()
}
