//! Rectangular index regions.

/// A rectangular block of pixel indices: `index[i] .. index[i] + size[i]`.
///
/// Iteration order is x-fastest (index component 0 varies first), matching
/// the memory layout of [`super::ImageBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion<const D: usize> {
    index: [usize; D],
    size: [usize; D],
}

impl<const D: usize> ImageRegion<D> {
    pub fn new(index: [usize; D], size: [usize; D]) -> Self {
        Self { index, size }
    }

    /// Region starting at the zero index.
    pub fn from_size(size: [usize; D]) -> Self {
        Self { index: [0; D], size }
    }

    pub fn index(&self) -> [usize; D] {
        self.index
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn number_of_pixels(&self) -> usize {
        self.size.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_pixels() == 0
    }

    pub fn contains(&self, index: &[usize; D]) -> bool {
        (0..D).all(|i| index[i] >= self.index[i] && index[i] < self.index[i] + self.size[i])
    }

    /// Whether `other` lies completely inside this region.
    pub fn contains_region(&self, other: &Self) -> bool {
        (0..D).all(|i| {
            other.index[i] >= self.index[i]
                && other.index[i] + other.size[i] <= self.index[i] + self.size[i]
        })
    }

    /// The `n`-th index of the region in iteration order.
    pub fn nth_index(&self, mut n: usize) -> [usize; D] {
        let mut out = self.index;
        for i in 0..D {
            out[i] += n % self.size[i];
            n /= self.size[i];
        }
        out
    }

    /// Iterate all indices of the region, x-fastest.
    pub fn iter(&self) -> RegionIter<D> {
        RegionIter {
            region: *self,
            next: 0,
            total: self.number_of_pixels(),
        }
    }
}

/// Iterator over the indices of an [`ImageRegion`].
#[derive(Debug, Clone)]
pub struct RegionIter<const D: usize> {
    region: ImageRegion<D>,
    next: usize,
    total: usize,
}

impl<const D: usize> Iterator for RegionIter<D> {
    type Item = [usize; D];

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let index = self.region.nth_index(self.next);
        self.next += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl<const D: usize> ExactSizeIterator for RegionIter<D> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_iteration_order() {
        let region = ImageRegion::new([1, 2], [2, 2]);
        let indices: Vec<_> = region.iter().collect();
        assert_eq!(indices, vec![[1, 2], [2, 2], [1, 3], [2, 3]]);
    }

    #[test]
    fn test_region_contains() {
        let region = ImageRegion::new([1, 1], [3, 2]);
        assert!(region.contains(&[1, 1]));
        assert!(region.contains(&[3, 2]));
        assert!(!region.contains(&[4, 1]));
        assert!(!region.contains(&[0, 1]));
        assert!(ImageRegion::from_size([5, 5]).contains_region(&region));
        assert!(!region.contains_region(&ImageRegion::from_size([5, 5])));
    }

    #[test]
    fn test_empty_region() {
        let region = ImageRegion::from_size([0, 4]);
        assert!(region.is_empty());
        assert_eq!(region.iter().count(), 0);
    }
}
