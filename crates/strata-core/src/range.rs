use serde::{Deserialize, Serialize};

use crate::InvariantError;

/// # Range
///
/// One bounded, strided iteration domain: the coordinates `min, min + step, ...` below `max`.
///
/// The number of points is `(max - min) / step` with floor division; a range whose `max` does
/// not exceed its `min` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    min: usize,
    max: usize,
    step: usize,
}

impl Range {
    pub fn new(min: usize, max: usize, step: usize) -> Result<Self, InvariantError> {
        if step == 0 {
            return Err(InvariantError::InvalidStep);
        }
        Ok(Self { min, max, step })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn len(&self) -> usize {
        self.max.saturating_sub(self.min) / self.step
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinate of the `index`-th point. Does not check `index < len`.
    pub fn coordinate(&self, index: usize) -> usize {
        self.min + index * self.step
    }

    /// Narrows this range by `r`, which is expressed in this range's index space.
    ///
    /// Bounds of `r` past `len()` are truncated to this range instead of being rejected, so the
    /// result never covers a coordinate outside `self`.
    pub fn compose(&self, r: &Range) -> Range {
        self.compose_bounds(r.min, r.max, r.step)
    }

    /// [Range::compose] with the narrowing range given as loose bounds. `step` must be nonzero.
    pub(crate) fn compose_bounds(&self, min: usize, max: usize, step: usize) -> Range {
        debug_assert!(step > 0);
        let lo = min.min(self.len());
        let start = self.coordinate(lo);
        let requested = max
            .checked_mul(self.step)
            .and_then(|m| m.checked_add(self.min))
            .unwrap_or(usize::MAX);
        let end = requested.min(self.max).max(start);
        let composed = Range {
            min: start,
            max: end,
            step: self.step.saturating_mul(step),
        };
        if lo != min || end != requested {
            log::trace!(
                "Truncated {}:{}:{} to {} within {}",
                min,
                max,
                step,
                composed,
                self
            );
        }
        composed
    }

    /// Fixes this dimension at index `k`, saturating at the last point.
    ///
    /// Returns the clamped index. An empty range clamps to 0.
    pub fn clamp_index(&self, k: usize) -> usize {
        let clamped = k.min(self.len().saturating_sub(1));
        if clamped != k {
            log::trace!("Clamped index {} to {} within {}", k, clamped, self);
        }
        clamped
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self {
            min: r.start,
            max: r.end,
            step: 1,
        }
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.min, self.max, self.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_step_rejected() {
        assert_eq!(Range::new(0, 4, 0), Err(InvariantError::InvalidStep));
    }

    #[test]
    fn length_uses_floor_division() {
        assert_eq!(Range::new(0, 16, 1).unwrap().len(), 16);
        assert_eq!(Range::new(0, 5, 2).unwrap().len(), 2);
        assert_eq!(Range::new(3, 12, 3).unwrap().len(), 3);
        assert!(Range::new(7, 2, 1).unwrap().is_empty());
    }

    #[test]
    fn compose_within_bounds() {
        let base = Range::from(0..16);
        assert_eq!(base.compose(&Range::from(2..10)), Range::from(2..10));

        let strided = Range::new(4, 20, 2).unwrap();
        let r = Range::new(1, 5, 2).unwrap();
        assert_eq!(strided.compose(&r), Range::new(6, 14, 4).unwrap());
    }

    #[test]
    fn compose_truncates() {
        let base = Range::from(0..16);
        assert_eq!(base.compose(&Range::from(0..100)), base);
        assert_eq!(base.compose(&Range::from(20..100)), Range::from(16..16));

        let strided = Range::new(1, 10, 3).unwrap();
        let c = strided.compose(&Range::from(1..usize::MAX));
        assert_eq!(c, Range::new(4, 10, 3).unwrap());
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn clamp_index_saturates_at_last_point() {
        let r = Range::from(0..4);
        assert_eq!(r.clamp_index(2), 2);
        assert_eq!(r.clamp_index(9), 3);
        assert_eq!(Range::from(3..3).clamp_index(5), 0);
    }
}
