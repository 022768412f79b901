use serde::{Deserialize, Serialize};

use crate::{
    Buffer, BufferId, ElementType, Enforcer, Indexing, InvariantError, Operation, Range, RVec,
    Shape, Slice, Strides, SubView, Transpose,
};

/// Static type of a view: what a host IR knows before any range is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct ViewType {
    elem: ElementType,
    rank: usize,
}

impl ViewType {
    pub fn elem(&self) -> ElementType {
        self.elem
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view<{}", self.elem)?;
        for _ in 0..self.rank {
            f.write_str("x?")?;
        }
        f.write_str(">")
    }
}

/// # View
///
/// A strided window onto a [Buffer]. Dimension `i` walks the coordinates of `dims[i]`, and the
/// cell at multi-index `idx` lives at
///
/// ```text
/// offset + Σ (dims[i].min + idx[i] * dims[i].step) * strides[i]
/// ```
///
/// A view does not own or retain its buffer. The buffer must outlive every use of the view;
/// the [crate::Heap] rejects accesses through views of released buffers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct View {
    buffer: BufferId,
    dt: ElementType,
    offset: usize,
    dims: RVec<Range>,
    strides: Strides,
    /// Set once a dimension with no points is fixed by a scalar index. A vacant view has no
    /// cells, whatever its remaining ranges say.
    vacant: bool,
}

impl View {
    /// Builds a view over `buffer` with one range per dimension.
    ///
    /// The buffer is addressed as a dense row-major array whose extent along dimension `i` is
    /// `ranges[i].max()`, so every in-range cell of this view and of anything derived from it
    /// lies inside the buffer.
    pub fn new(
        buffer: &Buffer,
        ranges: RVec<Range>,
        declared: Option<ViewType>,
    ) -> Result<Self, InvariantError> {
        let dt = match declared {
            Some(ty) => {
                Enforcer::check_rank(ranges.len(), ty.rank())?;
                Enforcer::check_reinterpret(buffer.elem(), ty.elem())?;
                ty.elem()
            }
            None => buffer.elem(),
        };
        let extents = ranges.iter().map(Range::max).collect::<Shape>();
        let footprint = match extents.iter().any(|&e| e == 0) {
            true => 0,
            false => extents
                .iter()
                .try_fold(1usize, |acc, &e| acc.checked_mul(e))
                .unwrap_or(usize::MAX),
        };
        if footprint > buffer.size() {
            return Err(InvariantError::ViewExceedsBuffer {
                footprint,
                capacity: buffer.size(),
            });
        }
        Ok(Self {
            buffer: buffer.id(),
            dt,
            offset: 0,
            strides: Strides::from(&extents),
            dims: ranges,
            vacant: false,
        })
    }

    /// A view over the same buffer and element type with a new layout.
    pub(crate) fn derive(
        &self,
        offset: usize,
        dims: RVec<Range>,
        strides: Strides,
        vacant: bool,
    ) -> Self {
        assert_eq!(dims.len(), strides.rank());
        Self {
            buffer: self.buffer,
            dt: self.dt,
            offset,
            dims,
            strides,
            vacant: self.vacant || vacant,
        }
    }

    pub fn buffer_id(&self) -> BufferId {
        self.buffer
    }

    pub fn dt(&self) -> ElementType {
        self.dt
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn dims(&self) -> &[Range] {
        &self.dims
    }

    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_vacant(&self) -> bool {
        self.vacant
    }

    pub fn view_type(&self) -> ViewType {
        ViewType::new(self.dt, self.rank())
    }

    /// Number of points along `axis`.
    pub fn dim(&self, axis: usize) -> Result<usize, InvariantError> {
        Enforcer::check_axis(axis, self.rank())?;
        Ok(self.shape()[axis])
    }

    pub fn shape(&self) -> Shape {
        match self.vacant {
            true => Shape::new(RVec::from_elem(0, self.rank())),
            false => self.dims.iter().map(Range::len).collect(),
        }
    }

    pub fn numel(&self) -> usize {
        match self.vacant {
            true => 0,
            false => self.shape().numel(),
        }
    }

    /// Buffer element index of the cell at `indices`.
    ///
    /// # Panics
    ///
    /// If any index is outside its dimension.
    pub fn address(&self, indices: &[usize]) -> Result<usize, InvariantError> {
        Enforcer::check_rank(indices.len(), self.rank())?;
        Ok(self.linearize(indices))
    }

    /// Buffer element indices of every cell, in row-major order of the view.
    pub fn addresses(&self) -> impl Iterator<Item = usize> + '_ {
        self.shape()
            .indices()
            .filter(move |_| !self.vacant)
            .map(move |idx| self.linearize(&idx))
    }

    fn linearize(&self, indices: &[usize]) -> usize {
        assert!(!self.vacant, "view {} has no cells", self);
        // Bounds first: strides of a view with an empty dimension may be saturated.
        for (axis, (range, &i)) in self.dims.iter().zip(indices).enumerate() {
            assert!(
                i < range.len(),
                "index {} is out of bounds for axis {} of size {}",
                i,
                axis,
                range.len()
            );
        }
        self.dims
            .iter()
            .zip(self.strides.iter())
            .zip(indices)
            .fold(self.offset, |address, ((range, stride), &i)| {
                address + range.coordinate(i) * stride
            })
    }

    pub fn slice(&self, indexings: &[Indexing]) -> Result<View, InvariantError> {
        Slice::new(indexings.into()).apply(self)
    }

    pub fn subview(&self, bounds: &[usize]) -> Result<View, InvariantError> {
        SubView::new(bounds.into()).apply(self)
    }

    pub fn transpose(&self, dims: &[usize]) -> Result<View, InvariantError> {
        Transpose::new(dims.into()).apply(self)
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view<{}>[", self.dt)?;
        for (i, range) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", range)?;
        }
        write!(f, "] @ {:?}+{}", self.buffer, self.offset)
    }
}
