use crate::{rvec, PermutationMap, RVec, Shape};

/// Buffer elements skipped per unit step of a coordinate, one entry per dimension.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Strides(RVec<usize>);

impl Strides {
    pub fn new(strides: RVec<usize>) -> Self {
        Self(strides)
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.to_vec()
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.0.iter()
    }

    pub fn permute(&self, permutation: &PermutationMap) -> Self {
        Self(permutation.apply(&self.0))
    }

    pub(crate) fn remove(&mut self, axis: usize) -> usize {
        self.0.remove(axis)
    }
}

impl std::fmt::Debug for Strides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "strides{:?}", self.0.as_slice())
    }
}

impl std::ops::Index<usize> for Strides {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Row-major (C order) strides of a dense array with the given extents.
impl From<&Shape> for Strides {
    fn from(shape: &Shape) -> Self {
        let mut strides = rvec![];
        let mut stride = 1;
        for size in shape.inner().iter().rev() {
            strides.push(stride);
            stride = size.saturating_mul(stride);
        }
        strides.reverse();
        Self(strides)
    }
}
