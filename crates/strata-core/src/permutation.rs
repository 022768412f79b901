use serde::{Deserialize, Serialize};

use crate::{Enforcer, InvariantError, RVec};

/// # PermutationMap
///
/// A bijection on `0..rank`. Applying it to a sequence `xs` yields `ys` with `ys[i] = xs[p[i]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermutationMap(RVec<usize>);

impl PermutationMap {
    pub fn new(dims: RVec<usize>) -> Result<Self, InvariantError> {
        Enforcer::check_permutation(&dims)?;
        Ok(Self(dims))
    }

    pub(crate) fn new_unchecked(dims: RVec<usize>) -> Self {
        Self(dims)
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &d)| i == d)
    }

    pub fn inverse(&self) -> Self {
        let mut inverse = RVec::from_elem(0, self.rank());
        for (i, &d) in self.0.iter().enumerate() {
            inverse[d] = i;
        }
        Self(inverse)
    }

    /// `self` then `other`: applying the result equals applying `self`, then `other`.
    pub fn then(&self, other: &PermutationMap) -> Self {
        Self(other.apply(&self.0))
    }

    pub fn apply<T: Clone>(&self, items: &[T]) -> RVec<T> {
        assert_eq!(items.len(), self.rank());
        self.0.iter().map(|&d| items[d].clone()).collect()
    }
}

impl TryFrom<&[usize]> for PermutationMap {
    type Error = InvariantError;

    fn try_from(dims: &[usize]) -> Result<Self, Self::Error> {
        Self::new(dims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rvec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    impl Arbitrary for PermutationMap {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            (0usize..6)
                .prop_flat_map(|rank| Just((0..rank).collect::<Vec<_>>()).prop_shuffle())
                .prop_map(|dims| PermutationMap(dims.into()))
                .boxed()
        }
    }

    #[test]
    fn inverse_of_rotation() {
        let p = PermutationMap::new(rvec![1, 2, 0]).unwrap();
        assert_eq!(p.inverse().dims(), &[2, 0, 1]);
        assert_eq!(p.apply(&['a', 'b', 'c']).to_vec(), vec!['b', 'c', 'a']);
        assert!(p.then(&p.inverse()).is_identity());
    }

    #[test]
    fn rejects_non_bijections() {
        assert!(PermutationMap::try_from(&[0usize, 0][..]).is_err());
        assert!(PermutationMap::try_from(&[1usize, 2][..]).is_err());
    }

    #[proptest(cases = 64)]
    fn inverse_round_trips(p: PermutationMap) {
        let items = (0..p.rank()).map(|i| i * 7 + 3).collect::<Vec<_>>();
        let permuted = p.apply(&items);
        prop_assert_eq!(p.inverse().apply(&permuted).to_vec(), items);
        prop_assert!(p.then(&p.inverse()).is_identity());
    }
}
