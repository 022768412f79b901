use crate::{Enforcer, InvariantError, Operation, PermutationMap, RVec, View};

/// # Transpose
///
/// Reorders the dimensions of a view: result dimension `i` is source dimension `dims[i]`.
/// Ranges and strides move together, so every cell keeps its buffer address.
#[derive(derive_new::new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transpose {
    dims: RVec<usize>,
}

impl Transpose {
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }
}

impl From<&PermutationMap> for Transpose {
    fn from(p: &PermutationMap) -> Self {
        Self::new(p.dims().into())
    }
}

impl Operation for Transpose {
    fn check_invariants(&self, src: &View) -> Result<(), InvariantError> {
        Enforcer::check_rank(self.dims.len(), src.rank())?;
        Enforcer::check_permutation(&self.dims)
    }

    fn compute_view(&self, src: &View) -> View {
        let p = PermutationMap::new_unchecked(self.dims.clone());
        src.derive(
            src.offset(),
            p.apply(src.dims()),
            src.strides().permute(&p),
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rvec, Heap, Range};
    use proptest::prelude::*;
    use test_strategy::proptest;

    #[test]
    fn swaps_axes() {
        let heap = Heap::default();
        let data = (0..6).collect::<Vec<u32>>();
        let v = heap
            .from_slice(&data)
            .unwrap()
            .view(rvec![Range::from(0..2), Range::from(0..3)])
            .unwrap();
        let t = v.transpose(&[1, 0]).unwrap();
        assert_eq!(t.shape(), crate::shape![3, 2]);
        assert_eq!(t.strides().to_vec(), vec![1, 3]);
        for i in 0..3 {
            for j in 0..2 {
                assert_eq!(
                    heap.load::<u32>(&t, &[i, j]).unwrap(),
                    heap.load::<u32>(&v, &[j, i]).unwrap()
                );
            }
        }
    }

    #[test]
    fn rejects_bad_permutations() {
        let heap = Heap::default();
        let v = heap
            .from_slice(&[0u32; 4])
            .unwrap()
            .view(rvec![Range::from(0..2), Range::from(0..2)])
            .unwrap();
        assert_eq!(
            v.transpose(&[0, 0]),
            Err(InvariantError::NotAPermutation { dims: vec![0, 0] })
        );
        assert!(matches!(
            v.transpose(&[0]),
            Err(InvariantError::RankMismatch { actual: 1, .. })
        ));
    }

    #[proptest(cases = 64)]
    fn inverse_restores_view(p: PermutationMap) {
        let heap = Heap::default();
        let rank = p.rank();
        let buffer = heap.from_slice(&vec![0f32; 2usize.pow(rank as u32) * 3]).unwrap();
        let ranges = (0..rank)
            .map(|i| Range::new(0, if i == 0 { 6 } else { 2 }, 1 + i % 2).unwrap())
            .collect();
        let v = buffer.view(ranges).unwrap();
        let t = Transpose::from(&p).apply(&v).unwrap();
        prop_assert_eq!(Transpose::from(&p.inverse()).apply(&t).unwrap(), v);
    }
}
