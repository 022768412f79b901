use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    Buffer, BufferType, Element, ElementType, Enforcer, Heap, IndexOperand, Indexing,
    IndexingOperand, InvariantError, Op, Operation, OperationError, RVec, Range, Slice, SubView,
    Transpose, Value, ValueId, ValueType, View, ViewType,
};

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("{op} at position {position}: {source}")]
    Invalid {
        position: usize,
        op: &'static str,
        source: InvariantError,
    },
    #[error("{op} at position {position} reads {value}, which is not defined before it.")]
    UndefinedValue {
        position: usize,
        op: &'static str,
        value: ValueId,
    },
    #[error("{op} at position {position} expects a {expected} operand, found {found}.")]
    OperandType {
        position: usize,
        op: &'static str,
        expected: &'static str,
        found: ValueType,
    },
    #[error("{op} at position {position} uses buffer {buffer} after its release.")]
    UseAfterRelease {
        position: usize,
        op: &'static str,
        buffer: ValueId,
    },
    #[error("{op} at position {position} releases buffer {buffer} a second time.")]
    DoubleRelease {
        position: usize,
        op: &'static str,
        buffer: ValueId,
    },
    #[error("Region does not end with a Yield.")]
    MissingTerminator,
    #[error("Yield at position {position} is not the last operation.")]
    TerminatorNotLast { position: usize },
    #[error("Region takes {expected} argument(s), got {actual}.")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("Argument {index} must be {expected}, got {found}.")]
    ArgumentType {
        index: usize,
        expected: ValueType,
        found: ValueType,
    },
    #[error("{op} at position {position} failed: {source}")]
    Evaluation {
        position: usize,
        op: &'static str,
        source: OperationError,
    },
}

/// # Region
///
/// A straight-line sequence of [Op]s over typed arguments, terminated by exactly one
/// [Op::Yield] whose operands are the region's results.
///
/// Builder methods append an op and return the [ValueId] it defines. They do not validate;
/// [Region::verify] does, and [Interpreter::run] verifies before evaluating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    arguments: RVec<ValueType>,
    ops: Vec<Op>,
}

impl Region {
    pub fn new(arguments: RVec<ValueType>) -> Self {
        Self {
            arguments,
            ops: vec![],
        }
    }

    pub fn arguments(&self) -> &[ValueType] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> ValueId {
        assert!(index < self.arguments.len());
        ValueId(index)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn push(&mut self, op: Op) -> ValueId {
        self.ops.push(op);
        ValueId(self.arguments.len() + self.ops.len() - 1)
    }

    pub fn alloc(
        &mut self,
        ty: BufferType,
        size: Option<IndexOperand>,
        alignment: Option<usize>,
    ) -> ValueId {
        self.push(Op::Alloc {
            ty,
            size,
            alignment,
        })
    }

    pub fn dealloc(&mut self, buffer: ValueId) -> ValueId {
        self.push(Op::Dealloc { buffer })
    }

    pub fn buffer_size(&mut self, buffer: ValueId) -> ValueId {
        self.push(Op::BufferSize { buffer })
    }

    pub fn range(
        &mut self,
        min: impl Into<IndexOperand>,
        max: impl Into<IndexOperand>,
        step: impl Into<IndexOperand>,
    ) -> ValueId {
        self.push(Op::Range {
            min: min.into(),
            max: max.into(),
            step: step.into(),
        })
    }

    pub fn view(&mut self, buffer: ValueId, ranges: &[ValueId], ty: Option<ViewType>) -> ValueId {
        self.push(Op::View {
            buffer,
            ranges: ranges.into(),
            ty,
        })
    }

    pub fn slice(&mut self, base: ValueId, indexings: &[IndexingOperand]) -> ValueId {
        self.push(Op::Slice {
            base,
            indexings: indexings.into(),
        })
    }

    pub fn subview(&mut self, base: ValueId, bounds: &[IndexOperand]) -> ValueId {
        self.push(Op::SubView {
            base,
            bounds: bounds.into(),
        })
    }

    pub fn transpose(&mut self, view: ValueId, permutation: &[usize]) -> ValueId {
        self.push(Op::Transpose {
            view,
            permutation: permutation.into(),
        })
    }

    pub fn dim(&mut self, view: ValueId, axis: usize) -> ValueId {
        self.push(Op::Dim { view, axis })
    }

    pub fn load(&mut self, view: ValueId, indices: &[IndexOperand]) -> ValueId {
        self.push(Op::Load {
            view,
            indices: indices.into(),
        })
    }

    pub fn store(&mut self, value: ValueId, view: ValueId, indices: &[IndexOperand]) -> ValueId {
        self.push(Op::Store {
            value,
            view,
            indices: indices.into(),
        })
    }

    pub fn constant(&mut self, value: impl Into<Element>) -> ValueId {
        self.push(Op::Constant(value.into()))
    }

    pub fn yield_(&mut self, values: &[ValueId]) -> ValueId {
        self.push(Op::Yield {
            values: values.into(),
        })
    }

    /// Checks the region and returns the types of the yielded values.
    pub fn verify(&self) -> Result<RVec<ValueType>, RegionError> {
        match self.ops.iter().position(Op::is_terminator) {
            None => return Err(RegionError::MissingTerminator),
            Some(position) if position + 1 != self.ops.len() => {
                return Err(RegionError::TerminatorNotLast { position })
            }
            Some(_) => {}
        }
        let mut verifier = Verifier::new(&self.arguments);
        for (position, op) in self.ops.iter().enumerate() {
            verifier.position = position;
            verifier.op = op.name();
            let ty = verifier.verify_op(op)?;
            verifier.types.push(ty);
        }
        let results = match self.ops.last() {
            Some(Op::Yield { values }) => values
                .iter()
                .map(|&v| verifier.types[v.0])
                .collect::<RVec<_>>(),
            _ => return Err(RegionError::MissingTerminator),
        };
        log::debug!(
            "Verified region of {} ops yielding {:?}",
            self.ops.len(),
            results
        );
        Ok(results)
    }
}

/// Type inference and buffer liveness over one pass of a region.
///
/// Every buffer-derived value maps to the value that introduced its buffer (an `Alloc` or an
/// argument), so a release is visible through every view built on it.
struct Verifier {
    types: Vec<ValueType>,
    roots: FxHashMap<ValueId, ValueId>,
    released: FxHashSet<ValueId>,
    position: usize,
    op: &'static str,
}

impl Verifier {
    fn new(arguments: &[ValueType]) -> Self {
        let mut roots = FxHashMap::default();
        for (i, ty) in arguments.iter().enumerate() {
            if matches!(ty, ValueType::Buffer(_) | ValueType::View(_)) {
                roots.insert(ValueId(i), ValueId(i));
            }
        }
        Self {
            types: arguments.to_vec(),
            roots,
            released: FxHashSet::default(),
            position: 0,
            op: "",
        }
    }

    fn result(&self) -> ValueId {
        ValueId(self.types.len())
    }

    fn invalid(&self, source: InvariantError) -> RegionError {
        RegionError::Invalid {
            position: self.position,
            op: self.op,
            source,
        }
    }

    fn operand(&self, value: ValueId) -> Result<ValueType, RegionError> {
        self.types
            .get(value.0)
            .copied()
            .ok_or(RegionError::UndefinedValue {
                position: self.position,
                op: self.op,
                value,
            })
    }

    fn mismatch(&self, expected: &'static str, found: ValueType) -> RegionError {
        RegionError::OperandType {
            position: self.position,
            op: self.op,
            expected,
            found,
        }
    }

    fn index(&self, operand: &IndexOperand) -> Result<(), RegionError> {
        match operand {
            IndexOperand::Static(_) => Ok(()),
            IndexOperand::Dynamic(id) => match self.operand(*id)? {
                ValueType::Index => Ok(()),
                other => Err(self.mismatch("index", other)),
            },
        }
    }

    fn range(&self, value: ValueId) -> Result<(), RegionError> {
        match self.operand(value)? {
            ValueType::Range => Ok(()),
            other => Err(self.mismatch("range", other)),
        }
    }

    fn buffer(&self, value: ValueId) -> Result<BufferType, RegionError> {
        match self.operand(value)? {
            ValueType::Buffer(ty) => Ok(ty),
            other => Err(self.mismatch("buffer", other)),
        }
    }

    fn view(&self, value: ValueId) -> Result<ViewType, RegionError> {
        match self.operand(value)? {
            ValueType::View(ty) => Ok(ty),
            other => Err(self.mismatch("view", other)),
        }
    }

    fn element(&self, value: ValueId) -> Result<ElementType, RegionError> {
        match self.operand(value)? {
            ValueType::Element(ty) => Ok(ty),
            other => Err(self.mismatch("element", other)),
        }
    }

    fn root(&self, value: ValueId) -> ValueId {
        self.roots.get(&value).copied().unwrap_or(value)
    }

    fn ensure_live(&self, value: ValueId) -> Result<(), RegionError> {
        let buffer = self.root(value);
        if self.released.contains(&buffer) {
            return Err(RegionError::UseAfterRelease {
                position: self.position,
                op: self.op,
                buffer,
            });
        }
        Ok(())
    }

    /// The result shares the buffer of `source`.
    fn derive_from(&mut self, source: ValueId) {
        let root = self.root(source);
        self.roots.insert(self.result(), root);
    }

    fn verify_op(&mut self, op: &Op) -> Result<ValueType, RegionError> {
        match op {
            Op::Alloc {
                ty,
                size,
                alignment,
            } => self.verify_alloc(ty, size.as_ref(), *alignment),
            Op::Dealloc { buffer } => self.verify_dealloc(*buffer),
            Op::BufferSize { buffer } => {
                self.buffer(*buffer)?;
                Ok(ValueType::Index)
            }
            Op::Range { min, max, step } => self.verify_range(min, max, step),
            Op::View { buffer, ranges, ty } => self.verify_view(*buffer, ranges, *ty),
            Op::Slice { base, indexings } => self.verify_slice(*base, indexings),
            Op::SubView { base, bounds } => self.verify_subview(*base, bounds),
            Op::Transpose { view, permutation } => self.verify_transpose(*view, permutation),
            Op::Dim { view, axis } => {
                let ty = self.view(*view)?;
                Enforcer::check_axis(*axis, ty.rank()).map_err(|e| self.invalid(e))?;
                Ok(ValueType::Index)
            }
            Op::Load { view, indices } => self.verify_load(*view, indices),
            Op::Store {
                value,
                view,
                indices,
            } => self.verify_store(*value, *view, indices),
            Op::Constant(element) => Ok(ValueType::Element(element.ty())),
            Op::Yield { values } => {
                for &value in values {
                    self.operand(value)?;
                }
                Ok(ValueType::Unit)
            }
        }
    }

    fn verify_alloc(
        &mut self,
        ty: &BufferType,
        size: Option<&IndexOperand>,
        alignment: Option<usize>,
    ) -> Result<ValueType, RegionError> {
        Enforcer::check_size_operand(ty, size.is_some()).map_err(|e| self.invalid(e))?;
        if let Some(size) = size {
            self.index(size)?;
        }
        if let Some(alignment) = alignment {
            Enforcer::check_alignment(alignment).map_err(|e| self.invalid(e))?;
        }
        Ok(ValueType::Buffer(*ty))
    }

    fn verify_dealloc(&mut self, buffer: ValueId) -> Result<ValueType, RegionError> {
        self.buffer(buffer)?;
        let root = self.root(buffer);
        if !self.released.insert(root) {
            return Err(RegionError::DoubleRelease {
                position: self.position,
                op: self.op,
                buffer: root,
            });
        }
        Ok(ValueType::Unit)
    }

    fn verify_range(
        &mut self,
        min: &IndexOperand,
        max: &IndexOperand,
        step: &IndexOperand,
    ) -> Result<ValueType, RegionError> {
        self.index(min)?;
        self.index(max)?;
        self.index(step)?;
        if *step == IndexOperand::Static(0) {
            return Err(self.invalid(InvariantError::InvalidStep));
        }
        Ok(ValueType::Range)
    }

    fn verify_view(
        &mut self,
        buffer: ValueId,
        ranges: &[ValueId],
        declared: Option<ViewType>,
    ) -> Result<ValueType, RegionError> {
        let buffer_ty = self.buffer(buffer)?;
        self.ensure_live(buffer)?;
        for &range in ranges {
            self.range(range)?;
        }
        let ty = match declared {
            Some(ty) => {
                Enforcer::check_rank(ranges.len(), ty.rank()).map_err(|e| self.invalid(e))?;
                Enforcer::check_reinterpret(buffer_ty.elem(), ty.elem())
                    .map_err(|e| self.invalid(e))?;
                ty
            }
            None => ViewType::new(buffer_ty.elem(), ranges.len()),
        };
        self.derive_from(buffer);
        Ok(ValueType::View(ty))
    }

    fn verify_slice(
        &mut self,
        base: ValueId,
        indexings: &[IndexingOperand],
    ) -> Result<ValueType, RegionError> {
        let ty = self.view(base)?;
        Enforcer::check_rank(indexings.len(), ty.rank()).map_err(|e| self.invalid(e))?;
        let mut rank = 0;
        for indexing in indexings {
            match indexing {
                IndexingOperand::Range(range) => {
                    self.range(*range)?;
                    rank += 1;
                }
                IndexingOperand::Scalar(index) => self.index(index)?,
            }
        }
        self.derive_from(base);
        Ok(ValueType::View(ViewType::new(ty.elem(), rank)))
    }

    fn verify_subview(
        &mut self,
        base: ValueId,
        bounds: &[IndexOperand],
    ) -> Result<ValueType, RegionError> {
        let ty = self.view(base)?;
        Enforcer::check_arity(bounds.len(), 3 * ty.rank()).map_err(|e| self.invalid(e))?;
        for bound in bounds {
            self.index(bound)?;
        }
        if bounds
            .chunks_exact(3)
            .any(|b| b[2] == IndexOperand::Static(0))
        {
            return Err(self.invalid(InvariantError::InvalidStep));
        }
        self.derive_from(base);
        Ok(ValueType::View(ty))
    }

    fn verify_transpose(
        &mut self,
        view: ValueId,
        permutation: &[usize],
    ) -> Result<ValueType, RegionError> {
        let ty = self.view(view)?;
        Enforcer::check_rank(permutation.len(), ty.rank()).map_err(|e| self.invalid(e))?;
        Enforcer::check_permutation(permutation).map_err(|e| self.invalid(e))?;
        self.derive_from(view);
        Ok(ValueType::View(ty))
    }

    fn verify_load(
        &mut self,
        view: ValueId,
        indices: &[IndexOperand],
    ) -> Result<ValueType, RegionError> {
        let ty = self.view(view)?;
        Enforcer::check_rank(indices.len(), ty.rank()).map_err(|e| self.invalid(e))?;
        for index in indices {
            self.index(index)?;
        }
        self.ensure_live(view)?;
        Ok(ValueType::Element(ty.elem()))
    }

    fn verify_store(
        &mut self,
        value: ValueId,
        view: ValueId,
        indices: &[IndexOperand],
    ) -> Result<ValueType, RegionError> {
        let elem = self.element(value)?;
        let ty = self.view(view)?;
        Enforcer::check_dtype(ty.elem(), elem).map_err(|e| self.invalid(e))?;
        Enforcer::check_rank(indices.len(), ty.rank()).map_err(|e| self.invalid(e))?;
        for index in indices {
            self.index(index)?;
        }
        self.ensure_live(view)?;
        Ok(ValueType::Unit)
    }
}

/// # Interpreter
///
/// Evaluates regions against a [Heap]. Buffers allocated by a region and not released by it
/// stay live in the heap after the run.
#[derive(Debug, derive_new::new)]
pub struct Interpreter<'h> {
    heap: &'h Heap,
}

impl<'h> Interpreter<'h> {
    pub fn heap(&self) -> &'h Heap {
        self.heap
    }

    /// Verifies `region`, binds `args` to its arguments and evaluates it, returning the
    /// yielded values.
    pub fn run(&self, region: &Region, args: &[Value]) -> Result<RVec<Value>, RegionError> {
        region.verify()?;
        if args.len() != region.arguments().len() {
            return Err(RegionError::ArgumentCount {
                expected: region.arguments().len(),
                actual: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(region.arguments()).enumerate() {
            if !argument_matches(expected, &arg.ty()) {
                return Err(RegionError::ArgumentType {
                    index,
                    expected: *expected,
                    found: arg.ty(),
                });
            }
        }

        let mut frame = Frame {
            heap: self.heap,
            values: args.to_vec(),
        };
        for (position, op) in region.ops().iter().enumerate() {
            if let Op::Yield { values } = op {
                return Ok(values.iter().map(|v| frame.values[v.0].clone()).collect());
            }
            let value = frame.eval_op(op).map_err(|source| RegionError::Evaluation {
                position,
                op: op.name(),
                source,
            })?;
            frame.values.push(value);
        }
        Err(RegionError::MissingTerminator)
    }
}

/// A dynamically sized buffer argument accepts any buffer of the same element type.
fn argument_matches(expected: &ValueType, found: &ValueType) -> bool {
    match (expected, found) {
        (ValueType::Buffer(e), ValueType::Buffer(f)) => {
            e.elem() == f.elem() && (e.is_dynamic() || e.static_size() == f.static_size())
        }
        (e, f) => e == f,
    }
}

/// Values defined so far by one evaluation. The verifier has already checked every kind, so
/// the accessors only fail on a verifier bug.
struct Frame<'h> {
    heap: &'h Heap,
    values: Vec<Value>,
}

impl Frame<'_> {
    fn get(&self, id: ValueId) -> &Value {
        &self.values[id.0]
    }

    fn index(&self, operand: &IndexOperand) -> Result<usize, OperationError> {
        match operand {
            IndexOperand::Static(n) => Ok(*n),
            IndexOperand::Dynamic(id) => self
                .get(*id)
                .as_index()
                .ok_or_else(|| anyhow::anyhow!("{} is not an index", id).into()),
        }
    }

    fn indices(&self, operands: &[IndexOperand]) -> Result<RVec<usize>, OperationError> {
        operands.iter().map(|op| self.index(op)).collect()
    }

    fn range(&self, id: ValueId) -> Result<Range, OperationError> {
        match self.get(id) {
            Value::Range(r) => Ok(*r),
            _ => Err(anyhow::anyhow!("{} is not a range", id).into()),
        }
    }

    fn buffer(&self, id: ValueId) -> Result<Buffer, OperationError> {
        self.get(id)
            .as_buffer()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("{} is not a buffer", id).into())
    }

    fn view(&self, id: ValueId) -> Result<&View, OperationError> {
        self.get(id)
            .as_view()
            .ok_or_else(|| anyhow::anyhow!("{} is not a view", id).into())
    }

    fn eval_op(&self, op: &Op) -> Result<Value, OperationError> {
        match op {
            Op::Alloc {
                ty,
                size,
                alignment,
            } => {
                let size = size.as_ref().map(|s| self.index(s)).transpose()?;
                Ok(self.heap.alloc(*ty, size, *alignment)?.into())
            }
            Op::Dealloc { buffer } => {
                self.heap.dealloc(&self.buffer(*buffer)?)?;
                Ok(Value::Unit)
            }
            Op::BufferSize { buffer } => Ok(Value::Index(self.buffer(*buffer)?.size())),
            Op::Range { min, max, step } => Ok(Value::Range(Range::new(
                self.index(min)?,
                self.index(max)?,
                self.index(step)?,
            )?)),
            Op::View { buffer, ranges, ty } => {
                let ranges = ranges
                    .iter()
                    .map(|&r| self.range(r))
                    .collect::<Result<RVec<_>, _>>()?;
                Ok(self.heap.view(&self.buffer(*buffer)?, ranges, *ty)?.into())
            }
            Op::Slice { base, indexings } => {
                let indexings = indexings
                    .iter()
                    .map(|ix| match ix {
                        IndexingOperand::Range(r) => self.range(*r).map(Indexing::Range),
                        IndexingOperand::Scalar(k) => self.index(k).map(Indexing::Scalar),
                    })
                    .collect::<Result<RVec<_>, _>>()?;
                Ok(Slice::new(indexings).apply(self.view(*base)?)?.into())
            }
            Op::SubView { base, bounds } => {
                let bounds = self.indices(bounds)?;
                Ok(SubView::new(bounds).apply(self.view(*base)?)?.into())
            }
            Op::Transpose { view, permutation } => Ok(Transpose::new(permutation.clone())
                .apply(self.view(*view)?)?
                .into()),
            Op::Dim { view, axis } => Ok(Value::Index(self.view(*view)?.dim(*axis)?)),
            Op::Load { view, indices } => {
                let indices = self.indices(indices)?;
                Ok(self.heap.load_element(self.view(*view)?, &indices)?.into())
            }
            Op::Store {
                value,
                view,
                indices,
            } => {
                let element = self
                    .get(*value)
                    .as_element()
                    .ok_or_else(|| anyhow::anyhow!("{} is not an element", value))?;
                let indices = self.indices(indices)?;
                self.heap
                    .store_element(element, self.view(*view)?, &indices)?;
                Ok(Value::Unit)
            }
            Op::Constant(element) => Ok(element.clone().into()),
            Op::Yield { .. } => Ok(Value::Unit),
        }
    }
}
