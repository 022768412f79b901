use std::alloc::Layout;

use crate::StorageError;

/// Owned, aligned, untyped host allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct RawCPUBuffer(*mut u8, Layout);

impl RawCPUBuffer {
    pub fn n_bytes(&self) -> usize {
        self.1.size()
    }

    pub fn alignment(&self) -> usize {
        self.1.align()
    }

    pub fn base_address(&self) -> usize {
        self.0 as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.0, self.1.size()) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.0, self.1.size()) }
    }

    /// Allocates `size` bytes aligned to `alignment`, every byte set to `fill`.
    ///
    /// Zero sized buffers get a dangling pointer that still honours the alignment.
    pub fn filled(size: usize, alignment: usize, fill: u8) -> Result<Self, StorageError> {
        let layout = Layout::from_size_align(size, alignment).map_err(|_| {
            StorageError::AllocationFailed {
                size,
                align: alignment,
            }
        })?;
        let data = if size == 0 {
            layout.align() as *mut u8
        } else {
            let ptr = unsafe {
                if fill == 0 {
                    std::alloc::alloc_zeroed(layout)
                } else {
                    let ptr = std::alloc::alloc(layout);
                    if !ptr.is_null() {
                        ptr.write_bytes(fill, size);
                    }
                    ptr
                }
            };
            if ptr.is_null() {
                return Err(StorageError::AllocationFailed {
                    size,
                    align: alignment,
                });
            }
            ptr
        };
        Ok(Self(data, layout))
    }
}

impl Drop for RawCPUBuffer {
    fn drop(&mut self) {
        if self.1.size() > 0 {
            unsafe { std::alloc::dealloc(self.0, self.1) }
        }
    }
}

/// Managed CPU buffer
#[derive(Debug, derive_new::new)]
pub struct CPUBuffer {
    inner: RawCPUBuffer,
}

unsafe impl Send for CPUBuffer {}
unsafe impl Sync for CPUBuffer {}

impl CPUBuffer {
    pub fn inner(&self) -> &RawCPUBuffer {
        &self.inner
    }

    pub fn n_bytes(&self) -> usize {
        self.inner.n_bytes()
    }

    pub fn read(&self, byte_offset: usize, n_bytes: usize) -> &[u8] {
        &self.inner.as_bytes()[byte_offset..byte_offset + n_bytes]
    }

    pub fn write(&mut self, byte_offset: usize, bytes: &[u8]) {
        self.inner.as_bytes_mut()[byte_offset..byte_offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl From<RawCPUBuffer> for CPUBuffer {
    fn from(raw: RawCPUBuffer) -> Self {
        CPUBuffer { inner: raw }
    }
}
