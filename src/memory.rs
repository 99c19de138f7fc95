use std::{fmt, io, slice, sync::Arc};

use log::warn;

use crate::device::Handle;

/// Memory-mapped region
///
/// The backing memory belongs to the driver. It is mapped into the process so frames can be
/// copied out of it. The region is unmapped when the value is dropped, or explicitly through
/// [`Mapping::unmap`] when the caller wants to see the error.
pub struct Mapping {
    handle: Arc<dyn Handle>,
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the region is owned exclusively by the buffer pool that created it, and the handle it
// unmaps through is `Send + Sync`.
unsafe impl Send for Mapping {}

impl Mapping {
    /// Maps `len` bytes of the device at `offset`
    pub(crate) fn new(handle: Arc<dyn Handle>, len: usize, offset: u32) -> io::Result<Self> {
        let ptr = unsafe { handle.mmap(len, offset)? };
        Ok(Mapping { handle, ptr, len })
    }

    /// Size of the mapped region in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View of the mapped bytes
    ///
    /// Only meaningful while the driver is not writing into the region, i.e. while the owning
    /// buffer is dequeued.
    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Unmaps the region, reporting failures
    pub fn unmap(self) -> io::Result<()> {
        let ret = unsafe { self.handle.munmap(self.ptr, self.len) };
        // already released, keep Drop from unmapping a second time
        std::mem::forget(self);
        ret
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.handle.munmap(self.ptr, self.len) } {
            warn!("failed to unmap {} bytes: {}", self.len, e);
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
