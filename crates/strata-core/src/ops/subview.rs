use crate::{Enforcer, InvariantError, Operation, RVec, View};

/// # SubView
///
/// Rank preserving [crate::Slice]: `bounds` holds a flattened `(min, max, step)` triple per
/// dimension, in the base view's index space, with the same truncation rules.
#[derive(derive_new::new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubView {
    bounds: RVec<usize>,
}

impl SubView {
    pub fn bounds(&self) -> &[usize] {
        &self.bounds
    }

    pub fn triples(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.bounds.chunks_exact(3).map(|b| (b[0], b[1], b[2]))
    }
}

impl Operation for SubView {
    fn check_invariants(&self, src: &View) -> Result<(), InvariantError> {
        Enforcer::check_arity(self.bounds.len(), 3 * src.rank())?;
        if self.triples().any(|(_, _, step)| step == 0) {
            return Err(InvariantError::InvalidStep);
        }
        Ok(())
    }

    fn compute_view(&self, src: &View) -> View {
        let dims = src
            .dims()
            .iter()
            .zip(self.triples())
            .map(|(base, (min, max, step))| base.compose_bounds(min, max, step))
            .collect();
        src.derive(src.offset(), dims, src.strides().clone(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rvec, Heap, Range};
    use proptest::prelude::*;
    use test_strategy::proptest;

    #[test]
    fn equivalent_to_range_slice() {
        let heap = Heap::default();
        let buffer = heap.from_slice(&[0i32; 36]).unwrap();
        let v = buffer
            .view(rvec![Range::from(0..6), Range::from(0..6)])
            .unwrap();
        let sub = v.subview(&[1, 5, 2, 0, 9, 3]).unwrap();
        let sliced = v
            .slice(&[
                Range::new(1, 5, 2).unwrap().into(),
                Range::new(0, 9, 3).unwrap().into(),
            ])
            .unwrap();
        assert_eq!(sub, sliced);
        assert_eq!(sub.shape(), crate::shape![2, 2]);
        assert_eq!(sub.addresses().collect::<Vec<_>>(), vec![6, 9, 18, 21]);
    }

    #[test]
    fn operand_count_is_three_per_dim() {
        let heap = Heap::default();
        let buffer = heap.from_slice(&[0i32; 16]).unwrap();
        let v = buffer
            .view(rvec![Range::from(0..4), Range::from(0..4)])
            .unwrap();
        assert_eq!(
            v.subview(&[0, 4, 1]),
            Err(InvariantError::ArityMismatch {
                accepted: 6..=6,
                actual: 3
            })
        );
        assert_eq!(
            v.subview(&[0, 4, 1, 0, 4, 0]),
            Err(InvariantError::InvalidStep)
        );
    }

    #[derive(Debug)]
    struct SubViewProblem {
        extents: Vec<(usize, usize)>,
        bounds: Vec<usize>,
    }

    impl Arbitrary for SubViewProblem {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            proptest::collection::vec((0usize..6, 1usize..4), 1..4)
                .prop_flat_map(|extents| {
                    let rank = extents.len();
                    let triple = (0usize..10, 0usize..10, 1usize..4);
                    proptest::collection::vec(triple, rank).prop_map(move |triples| {
                        SubViewProblem {
                            extents: extents.clone(),
                            bounds: triples
                                .into_iter()
                                .flat_map(|(a, b, c)| [a, b, c])
                                .collect(),
                        }
                    })
                })
                .boxed()
        }
    }

    #[proptest(cases = 256)]
    fn never_grows(prob: SubViewProblem) {
        let SubViewProblem { extents, bounds } = prob;
        let heap = Heap::default();
        let numel = extents.iter().map(|(e, _)| e).product::<usize>();
        let buffer = heap.from_slice(&vec![0u32; numel]).unwrap();
        let ranges = extents
            .iter()
            .map(|&(e, step)| Range::new(0, e, step).unwrap())
            .collect();
        let v = buffer.view(ranges).unwrap();
        let sub = v.subview(&bounds).unwrap();
        for axis in 0..v.rank() {
            prop_assert!(sub.dim(axis).unwrap() <= v.dim(axis).unwrap());
        }
        let cells = v.addresses().collect::<std::collections::HashSet<_>>();
        prop_assert!(sub.addresses().all(|a| cells.contains(&a)));
    }
}
