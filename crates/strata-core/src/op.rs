use crate::{
    Buffer, BufferType, Element, ElementType, InvariantError, Range, RVec, StorageError, View,
    ViewType,
};

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    InvariantError(#[from] InvariantError),
    #[error(transparent)]
    StorageError(#[from] StorageError),
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Names the result of a region argument or of an earlier op.
///
/// A region with `n` arguments numbers them `0..n`; the op at position `i` defines `n + i`,
/// whether or not it produces a meaningful value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An index-typed operand: embedded in the node, or produced by another op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOperand {
    Static(usize),
    Dynamic(ValueId),
}

impl From<usize> for IndexOperand {
    fn from(n: usize) -> Self {
        IndexOperand::Static(n)
    }
}

impl From<ValueId> for IndexOperand {
    fn from(id: ValueId) -> Self {
        IndexOperand::Dynamic(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexingOperand {
    Range(ValueId),
    Scalar(IndexOperand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Unit,
    Index,
    Range,
    Buffer(BufferType),
    View(ViewType),
    Element(ElementType),
}

impl ValueType {
    pub fn kind(&self) -> &'static str {
        match self {
            ValueType::Unit => "unit",
            ValueType::Index => "index",
            ValueType::Range => "range",
            ValueType::Buffer(_) => "buffer",
            ValueType::View(_) => "view",
            ValueType::Element(_) => "element",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Buffer(ty) => write!(f, "{}", ty),
            ValueType::View(ty) => write!(f, "{}", ty),
            ValueType::Element(ty) => write!(f, "{}", ty),
            other => f.write_str(other.kind()),
        }
    }
}

/// A runtime value flowing between ops.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Index(usize),
    Range(Range),
    Buffer(Buffer),
    View(View),
    Element(Element),
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Unit => ValueType::Unit,
            Value::Index(_) => ValueType::Index,
            Value::Range(_) => ValueType::Range,
            Value::Buffer(b) => ValueType::Buffer(b.ty()),
            Value::View(v) => ValueType::View(v.view_type()),
            Value::Element(e) => ValueType::Element(e.ty()),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Index(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&View> {
        match self {
            Value::View(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Value::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Value::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Index(n)
    }
}

impl From<Buffer> for Value {
    fn from(b: Buffer) -> Self {
        Value::Buffer(b)
    }
}

impl From<View> for Value {
    fn from(v: View) -> Self {
        Value::View(v)
    }
}

impl From<Element> for Value {
    fn from(e: Element) -> Self {
        Value::Element(e)
    }
}

/// # Op
///
/// One node of a [crate::Region]. Operands refer to earlier values by [ValueId].
#[derive(Debug, Clone, PartialEq, strum_macros::IntoStaticStr)]
pub enum Op {
    /// Allocates a buffer. `size` is present exactly when `ty` has no static size.
    Alloc {
        ty: BufferType,
        size: Option<IndexOperand>,
        alignment: Option<usize>,
    },
    Dealloc {
        buffer: ValueId,
    },
    BufferSize {
        buffer: ValueId,
    },
    Range {
        min: IndexOperand,
        max: IndexOperand,
        step: IndexOperand,
    },
    /// A view over a whole buffer, one range value per dimension.
    View {
        buffer: ValueId,
        ranges: RVec<ValueId>,
        ty: Option<ViewType>,
    },
    Slice {
        base: ValueId,
        indexings: RVec<IndexingOperand>,
    },
    /// Flattened `(min, max, step)` triples, one per dimension of `base`.
    SubView {
        base: ValueId,
        bounds: RVec<IndexOperand>,
    },
    Transpose {
        view: ValueId,
        permutation: RVec<usize>,
    },
    Dim {
        view: ValueId,
        axis: usize,
    },
    Load {
        view: ValueId,
        indices: RVec<IndexOperand>,
    },
    Store {
        value: ValueId,
        view: ValueId,
        indices: RVec<IndexOperand>,
    },
    Constant(Element),
    /// Terminates a region and hands `values` to its owner.
    Yield {
        values: RVec<ValueId>,
    },
}

impl Op {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Yield { .. })
    }

    /// Every value this op reads, in operand order.
    pub fn operands(&self) -> RVec<ValueId> {
        fn dynamic(ops: &[IndexOperand]) -> impl Iterator<Item = ValueId> + '_ {
            ops.iter().filter_map(|op| match op {
                IndexOperand::Dynamic(id) => Some(*id),
                IndexOperand::Static(_) => None,
            })
        }
        match self {
            Op::Alloc { size, .. } => match size {
                Some(IndexOperand::Dynamic(id)) => crate::rvec![*id],
                _ => RVec::new(),
            },
            Op::Dealloc { buffer } | Op::BufferSize { buffer } => crate::rvec![*buffer],
            Op::Range { min, max, step } => dynamic(&[*min, *max, *step]).collect(),
            Op::View { buffer, ranges, .. } => {
                std::iter::once(*buffer).chain(ranges.iter().copied()).collect()
            }
            Op::Slice { base, indexings } => std::iter::once(*base)
                .chain(indexings.iter().filter_map(|ix| match ix {
                    IndexingOperand::Range(id) => Some(*id),
                    IndexingOperand::Scalar(IndexOperand::Dynamic(id)) => Some(*id),
                    IndexingOperand::Scalar(IndexOperand::Static(_)) => None,
                }))
                .collect(),
            Op::SubView { base, bounds } => {
                std::iter::once(*base).chain(dynamic(bounds)).collect()
            }
            Op::Transpose { view, .. } | Op::Dim { view, .. } => crate::rvec![*view],
            Op::Load { view, indices } => {
                std::iter::once(*view).chain(dynamic(indices)).collect()
            }
            Op::Store {
                value,
                view,
                indices,
            } => [*value, *view]
                .into_iter()
                .chain(dynamic(indices))
                .collect(),
            Op::Constant(_) => RVec::new(),
            Op::Yield { values } => values.clone(),
        }
    }
}
