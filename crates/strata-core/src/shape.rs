use crate::RVec;
use std::ops::RangeTo;

/// Per-dimension element counts of a view.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(RVec<usize>);

impl Shape {
    pub fn new(shape: RVec<usize>) -> Self {
        Self(shape)
    }

    pub fn inner(&self) -> &RVec<usize> {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&usize> {
        self.0.get(index)
    }

    /// Zero as soon as any dimension is empty, whatever the other extents are.
    pub fn numel(&self) -> usize {
        if self.0.contains(&0) {
            return 0;
        }
        self.0.iter().product()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rank(&self) -> usize {
        self.len()
    }

    pub fn push(&mut self, dim: usize) {
        self.0.push(dim);
    }

    /// Row-major multi-indices covering every element, last axis fastest.
    pub fn indices(&self) -> MultiIndexIter {
        MultiIndexIter {
            shape: self.clone(),
            next: (self.numel() > 0).then(|| RVec::from_elem(0, self.rank())),
        }
    }
}

/// Iterator returned by [Shape::indices].
#[derive(Debug, Clone)]
pub struct MultiIndexIter {
    shape: Shape,
    next: Option<RVec<usize>>,
}

impl Iterator for MultiIndexIter {
    type Item = RVec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        for axis in (0..advanced.len()).rev() {
            advanced[axis] += 1;
            if advanced[axis] < self.shape[axis] {
                self.next = Some(advanced);
                return Some(current);
            }
            advanced[axis] = 0;
        }
        Some(current)
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut shape = format!("[{}", self.0.first().unwrap_or(&0));
        for dim in self.0.iter().skip(1) {
            shape.push_str(&format!("x{}", dim));
        }
        write!(f, "{}]", shape)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::Index<RangeTo<usize>> for Shape {
    type Output = [usize];

    fn index(&self, index: RangeTo<usize>) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(shape: Vec<usize>) -> Self {
        Self(shape.into())
    }
}

impl From<&[usize]> for Shape {
    fn from(slice: &[usize]) -> Self {
        Shape(slice.into())
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Shape(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::shape;

    #[test]
    fn test_indices() {
        let shape = shape![2, 3];
        let all = shape.indices().map(|i| i.to_vec()).collect::<Vec<_>>();
        assert_eq!(
            all,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
    }

    #[test]
    fn test_indices_degenerate() {
        assert_eq!(shape![].indices().count(), 1);
        assert_eq!(shape![4, 0, 2].indices().count(), 0);
    }

    #[test]
    fn numel_of_empty_shape_ignores_huge_extents() {
        let huge = 1usize << 40;
        assert_eq!(shape![huge, huge, 0].numel(), 0);
        assert_eq!(shape![0, huge, huge].numel(), 0);
        assert_eq!(shape![2, 3, 4].numel(), 24);
    }
}
