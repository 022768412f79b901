use serde::{Deserialize, Serialize};

use crate::{Enforcer, InvariantError, Operation, RVec, Range, View};

/// How one dimension of the base view is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indexing {
    /// Keeps the dimension, narrowed to a range of the base's indices.
    Range(Range),
    /// Fixes the dimension at one index and drops it.
    Scalar(usize),
}

impl Indexing {
    pub fn is_range(&self) -> bool {
        matches!(self, Indexing::Range(_))
    }
}

impl From<Range> for Indexing {
    fn from(r: Range) -> Self {
        Indexing::Range(r)
    }
}

impl From<std::ops::Range<usize>> for Indexing {
    fn from(r: std::ops::Range<usize>) -> Self {
        Indexing::Range(r.into())
    }
}

impl From<usize> for Indexing {
    fn from(k: usize) -> Self {
        Indexing::Scalar(k)
    }
}

/// # Slice
///
/// One [Indexing] per base dimension, in the base view's index space. Range indexings keep
/// their dimension, scalar indexings remove it, so the result rank is the number of ranges.
///
/// Bounds past the end of a dimension are truncated to it, and a scalar index past the last
/// point saturates at the last point. Slicing never fails on bounds.
#[derive(derive_new::new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slice {
    indexings: RVec<Indexing>,
}

impl Slice {
    pub fn indexings(&self) -> &[Indexing] {
        &self.indexings
    }

    /// The range indexings, in order. These become the dimensions of the result.
    pub fn ranges(&self) -> RVec<Range> {
        self.indexings
            .iter()
            .filter_map(|ix| match ix {
                Indexing::Range(r) => Some(*r),
                Indexing::Scalar(_) => None,
            })
            .collect()
    }

    pub fn result_rank(&self) -> usize {
        self.indexings.iter().filter(|ix| ix.is_range()).count()
    }
}

impl Operation for Slice {
    fn check_invariants(&self, src: &View) -> Result<(), InvariantError> {
        Enforcer::check_rank(self.indexings.len(), src.rank())
    }

    fn compute_view(&self, src: &View) -> View {
        let mut offset = src.offset();
        let mut dims = RVec::with_capacity(self.result_rank());
        let mut strides = src.strides().clone();
        let mut vacant = false;
        // Walk backwards so removing an axis leaves the earlier stride positions intact.
        for (axis, (ix, base)) in self.indexings.iter().zip(src.dims()).enumerate().rev() {
            match ix {
                Indexing::Range(r) => dims.push(base.compose(r)),
                Indexing::Scalar(k) => {
                    vacant |= base.is_empty();
                    let k = base.clamp_index(*k);
                    // Saturates only when the base has an empty dimension, so has no cells.
                    let step = base.coordinate(k).saturating_mul(strides.remove(axis));
                    offset = offset.saturating_add(step);
                }
            }
        }
        dims.reverse();
        src.derive(offset, dims, strides, vacant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rvec, Heap};
    use test_strategy::proptest;

    fn grid(heap: &Heap, rows: usize, cols: usize) -> View {
        let data = (0..rows * cols).map(|i| i as u32).collect::<Vec<_>>();
        heap.from_slice(&data)
            .unwrap()
            .view(rvec![Range::from(0..rows), Range::from(0..cols)])
            .unwrap()
    }

    #[test]
    fn row_of_a_matrix() {
        let heap = Heap::default();
        let v = grid(&heap, 4, 4);
        let row = v.slice(&[Indexing::Scalar(2), (0..4).into()]).unwrap();
        assert_eq!(row.rank(), 1);
        assert_eq!(row.dim(0), Ok(4));
        let cells = (0..4)
            .map(|j| heap.load::<u32>(&row, &[j]).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(cells, vec![8, 9, 10, 11]);
    }

    #[test]
    fn column_of_a_matrix() {
        let heap = Heap::default();
        let v = grid(&heap, 3, 5);
        let col = v.slice(&[(0..3).into(), 1.into()]).unwrap();
        assert_eq!(col.addresses().collect::<Vec<_>>(), vec![1, 6, 11]);
    }

    #[test]
    fn nested_slices_compose() {
        let heap = Heap::default();
        let v = grid(&heap, 8, 8);
        let every_other = v
            .slice(&[Range::new(0, 8, 2).unwrap().into(), (0..8).into()])
            .unwrap();
        let inner = every_other.slice(&[(1..3).into(), 5.into()]).unwrap();
        assert_eq!(inner.addresses().collect::<Vec<_>>(), vec![2 * 8 + 5, 4 * 8 + 5]);
    }

    #[test]
    fn truncates_and_saturates() {
        let heap = Heap::default();
        let v = grid(&heap, 4, 4);
        let s = v.slice(&[(2..100).into(), 99.into()]).unwrap();
        assert_eq!(s.shape(), crate::shape![2]);
        assert_eq!(s.addresses().collect::<Vec<_>>(), vec![11, 15]);
    }

    #[test]
    fn rank_mismatch() {
        let heap = Heap::default();
        let v = grid(&heap, 4, 4);
        assert!(matches!(
            v.slice(&[0.into()]),
            Err(InvariantError::RankMismatch { actual: 1, .. })
        ));
    }

    #[test]
    fn scalar_index_into_empty_dimension() {
        let heap = Heap::default();
        let v = grid(&heap, 4, 4);
        let empty = v.slice(&[(4..4).into(), (0..4).into()]).unwrap();
        assert_eq!(empty.dim(0), Ok(0));
        let fixed = empty.slice(&[0.into(), (0..4).into()]).unwrap();
        assert!(fixed.is_vacant());
        assert_eq!(fixed.dim(0), Ok(0));
        assert_eq!(fixed.numel(), 0);
        assert_eq!(fixed.addresses().count(), 0);
    }

    #[test]
    #[should_panic(expected = "has no cells")]
    fn vacant_view_access_traps() {
        let heap = Heap::default();
        let v = grid(&heap, 4, 4);
        let empty = v.slice(&[(4..4).into(), (0..4).into()]).unwrap();
        let fixed = empty.slice(&[0.into(), (0..4).into()]).unwrap();
        let _ = heap.load::<u32>(&fixed, &[0]);
    }

    #[test]
    fn scalars_past_huge_extents_of_an_empty_view() {
        let heap = Heap::default();
        let buffer = heap.from_slice::<f32>(&[]).unwrap();
        let huge = 1usize << 33;
        let v = buffer
            .view(rvec![Range::from(0..0), Range::from(0..huge), Range::from(0..huge)])
            .unwrap();
        let s = v
            .slice(&[(0..1).into(), (huge - 1).into(), (huge - 1).into()])
            .unwrap();
        assert_eq!(s.rank(), 1);
        assert_eq!(s.numel(), 0);
        assert_eq!(s.addresses().count(), 0);
        assert_eq!(v.transpose(&[1, 2, 0]).unwrap().numel(), 0);
    }

    #[test]
    fn aux_ranges_keep_order() {
        let op = Slice::new(rvec![
            Indexing::from(0..2),
            Indexing::Scalar(1),
            Indexing::from(Range::new(1, 9, 4).unwrap())
        ]);
        assert_eq!(op.result_rank(), 2);
        assert_eq!(
            op.ranges().to_vec(),
            vec![Range::from(0..2), Range::new(1, 9, 4).unwrap()]
        );
    }

    #[proptest(cases = 128)]
    fn result_rank_counts_ranges(
        #[strategy(proptest::collection::vec(proptest::bool::ANY, 0..5))] keep: Vec<bool>,
    ) {
        let heap = Heap::default();
        let rank = keep.len();
        let buffer = heap.from_slice(&vec![0f32; 3usize.pow(rank as u32)]).unwrap();
        let v = buffer.view(RVec::from_elem(Range::from(0..3), rank)).unwrap();
        let indexings = keep
            .iter()
            .map(|&k| if k { Indexing::from(0..2) } else { Indexing::Scalar(1) })
            .collect::<Vec<_>>();
        let s = v.slice(&indexings).unwrap();
        assert_eq!(s.rank(), keep.iter().filter(|&&k| k).count());
        assert_eq!(s.numel(), 2usize.pow(s.rank() as u32));
    }
}
