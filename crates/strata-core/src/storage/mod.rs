mod cpu_buffer;

pub use cpu_buffer::*;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::{
    Align, Element, ElementType, Enforcer, HeapConfig, OperationError, Range, RVec, TensorDType, View,
    ViewType,
};

slotmap::new_key_type! { pub struct BufferId; }

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Buffer {0:?} used after release.")]
    UseAfterRelease(BufferId),
    #[error("Buffer {0:?} released twice.")]
    DoubleRelease(BufferId),
    #[error("Failed to allocate {size} bytes aligned to {align}.")]
    AllocationFailed { size: usize, align: usize },
}

/// Static description of a buffer: its element type, and its element count when that is fixed
/// by the type rather than supplied at allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct BufferType {
    elem: ElementType,
    size: Option<usize>,
}

impl BufferType {
    pub fn elem(&self) -> ElementType {
        self.elem
    }

    pub fn static_size(&self) -> Option<usize> {
        self.size
    }

    pub fn is_dynamic(&self) -> bool {
        self.size.is_none()
    }
}

impl std::fmt::Display for BufferType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.size {
            Some(n) => write!(f, "buffer<{}x{}>", n, self.elem),
            None => write!(f, "buffer<?x{}>", self.elem),
        }
    }
}

/// # Buffer
///
/// Handle to storage owned by a [Heap]. Copying the handle does not copy or retain the storage;
/// once released through [Heap::dealloc], every access through this handle (or any view built on
/// it) fails with [StorageError::UseAfterRelease].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Buffer {
    id: BufferId,
    ty: BufferType,
    len: usize,
    alignment: Option<usize>,
}

impl Buffer {
    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn ty(&self) -> BufferType {
        self.ty
    }

    pub fn elem(&self) -> ElementType {
        self.ty.elem()
    }

    /// Total element count.
    pub fn size(&self) -> usize {
        self.len
    }

    pub fn n_bytes(&self) -> usize {
        self.len * self.elem().size_of()
    }

    /// The alignment requested at allocation, if any.
    pub fn alignment(&self) -> Option<usize> {
        self.alignment
    }

    /// Shorthand for [View::new] without a declared view type.
    pub fn view(&self, ranges: RVec<Range>) -> Result<View, crate::InvariantError> {
        View::new(self, ranges, None)
    }
}

/// # Heap
///
/// Owns every buffer allocated through it. Buffers live in a generational arena, so a handle
/// outliving its storage is always detected instead of aliasing a newer allocation.
///
/// Loads share a read lock; stores, allocation and release take the write lock. Callers that
/// need concurrent writers partition a buffer into disjoint views.
#[derive(Debug, Default)]
pub struct Heap {
    config: HeapConfig,
    buffers: RwLock<SlotMap<BufferId, CPUBuffer>>,
}

impl Heap {
    pub fn new(config: HeapConfig) -> Self {
        Self {
            config,
            buffers: RwLock::new(SlotMap::with_key()),
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Allocates a buffer of type `ty`.
    ///
    /// `size` must be given exactly when `ty` has no static size. The base address is aligned
    /// to `alignment` when given, and always to the element's natural alignment and
    /// [HeapConfig::min_alignment].
    pub fn alloc(
        &self,
        ty: BufferType,
        size: Option<usize>,
        alignment: Option<usize>,
    ) -> Result<Buffer, OperationError> {
        Enforcer::check_size_operand(&ty, size.is_some())?;
        if let Some(alignment) = alignment {
            Enforcer::check_alignment(alignment)?;
        }
        let len = size.or(ty.static_size()).unwrap_or_default();
        let elem = ty.elem();
        let align = alignment
            .unwrap_or(1)
            .max(elem.align_of())
            .max(self.config.min_alignment);
        let n_bytes = len
            .checked_mul(elem.size_of())
            .ok_or(StorageError::AllocationFailed {
                size: usize::MAX,
                align,
            })?;
        let fill = if self.config.poison { 0xFF } else { 0 };
        let raw = RawCPUBuffer::filled(n_bytes, align, fill)?;
        debug_assert!(raw.base_address().is_aligned_to(align));
        let id = self.buffers.write().insert(CPUBuffer::from(raw));
        log::debug!(
            "Allocated {:?}: {} elements of {} aligned to {}",
            id,
            len,
            elem,
            align
        );
        Ok(Buffer {
            id,
            ty,
            len,
            alignment,
        })
    }

    /// Allocates a statically sized buffer holding a copy of `data`.
    pub fn from_slice<T: TensorDType>(&self, data: &[T]) -> Result<Buffer, OperationError> {
        let ty = BufferType::new(T::element_type(), Some(data.len()));
        let buffer = self.alloc(ty, None, None)?;
        self.buffers
            .write()
            .get_mut(buffer.id)
            .ok_or(StorageError::UseAfterRelease(buffer.id))?
            .write(0, bytemuck::cast_slice(data));
        Ok(buffer)
    }

    /// Releases the storage behind `buffer`.
    pub fn dealloc(&self, buffer: &Buffer) -> Result<(), StorageError> {
        match self.buffers.write().remove(buffer.id) {
            Some(_) => {
                log::debug!("Released {:?}", buffer.id);
                Ok(())
            }
            None => Err(StorageError::DoubleRelease(buffer.id)),
        }
    }

    pub fn is_live(&self, id: BufferId) -> bool {
        self.buffers.read().contains_key(id)
    }

    pub fn ensure_live(&self, id: BufferId) -> Result<(), StorageError> {
        if !self.is_live(id) {
            return Err(StorageError::UseAfterRelease(id));
        }
        Ok(())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.read().len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.buffers.read().values().map(CPUBuffer::n_bytes).sum()
    }

    pub fn base_address(&self, buffer: &Buffer) -> Result<usize, StorageError> {
        self.buffers
            .read()
            .get(buffer.id)
            .map(|b| b.inner().base_address())
            .ok_or(StorageError::UseAfterRelease(buffer.id))
    }

    /// Builds a view over a live buffer, see [View::new].
    pub fn view(
        &self,
        buffer: &Buffer,
        ranges: RVec<Range>,
        declared: Option<ViewType>,
    ) -> Result<View, OperationError> {
        self.ensure_live(buffer.id)?;
        Ok(View::new(buffer, ranges, declared)?)
    }

    /// Reads the cell at `indices`.
    ///
    /// # Panics
    ///
    /// If an index lies outside its dimension. Out-of-range access is a caller bug, not a
    /// recoverable condition.
    pub fn load_element(&self, view: &View, indices: &[usize]) -> Result<Element, OperationError> {
        let address = view.address(indices)?;
        let width = view.dt().size_of();
        let buffers = self.buffers.read();
        let buffer = buffers
            .get(view.buffer_id())
            .ok_or(StorageError::UseAfterRelease(view.buffer_id()))?;
        log::trace!("Load {:?}[{}]", view.buffer_id(), address);
        Ok(Element::from_bytes(
            view.dt(),
            buffer.read(address * width, width),
        ))
    }

    /// Writes `value` to the cell at `indices`. Panics like [Heap::load_element].
    pub fn store_element(
        &self,
        value: &Element,
        view: &View,
        indices: &[usize],
    ) -> Result<(), OperationError> {
        Enforcer::check_dtype(view.dt(), value.ty())?;
        let address = view.address(indices)?;
        let width = view.dt().size_of();
        let mut buffers = self.buffers.write();
        let buffer = buffers
            .get_mut(view.buffer_id())
            .ok_or(StorageError::UseAfterRelease(view.buffer_id()))?;
        log::trace!("Store {:?}[{}]", view.buffer_id(), address);
        buffer.write(address * width, value.as_bytes());
        Ok(())
    }

    pub fn load<T: TensorDType>(&self, view: &View, indices: &[usize]) -> Result<T, OperationError> {
        Enforcer::check_dtype(view.dt(), T::element_type())?;
        let element = self.load_element(view, indices)?;
        Ok(bytemuck::pod_read_unaligned(element.as_bytes()))
    }

    pub fn store<T: TensorDType>(
        &self,
        value: T,
        view: &View,
        indices: &[usize],
    ) -> Result<(), OperationError> {
        self.store_element(&Element::scalar(value), view, indices)
    }

    /// Copies out every cell of `view`, in the view's row-major order.
    pub fn gather<T: TensorDType>(&self, view: &View) -> Result<Vec<T>, OperationError> {
        Enforcer::check_dtype(view.dt(), T::element_type())?;
        let buffers = self.buffers.read();
        let buffer = buffers
            .get(view.buffer_id())
            .ok_or(StorageError::UseAfterRelease(view.buffer_id()))?;
        let width = view.dt().size_of();
        Ok(view
            .addresses()
            .map(|address| bytemuck::pod_read_unaligned(buffer.read(address * width, width)))
            .collect())
    }

    /// Copies out every element of `buffer`, in storage order.
    pub fn to_vec<T: TensorDType>(&self, buffer: &Buffer) -> anyhow::Result<Vec<T>> {
        Enforcer::check_dtype(T::element_type(), buffer.elem())?;
        let buffers = self.buffers.read();
        let storage = buffers
            .get(buffer.id)
            .ok_or(StorageError::UseAfterRelease(buffer.id))?;
        Ok(bytemuck::pod_collect_to_vec(storage.inner().as_bytes()))
    }
}
