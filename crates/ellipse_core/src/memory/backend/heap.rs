//! Page-aligned heap blocks for platforms without `mremap`.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use super::{VirtualMemory, REGION_ALIGN};
use crate::error::{MemoryError, MemoryResult};
use crate::memory::access::{AccessLevel, FixedProtection, ProtectionController};

/// Heap-backed regions. Always readable and writable.
#[derive(Debug, Default)]
pub struct HeapBackend {
    protection: FixedProtection,
}

impl HeapBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            protection: FixedProtection,
        }
    }

    fn layout(len: usize) -> MemoryResult<Layout> {
        Layout::from_size_align(len, REGION_ALIGN)
            .map_err(|_| MemoryError::OutOfMemory { requested: len })
    }
}

impl VirtualMemory for HeapBackend {
    fn name(&self) -> &'static str {
        "heap"
    }

    fn protection(&self) -> &dyn ProtectionController {
        &self.protection
    }

    fn map(&self, len: usize) -> MemoryResult<NonNull<u8>> {
        let layout = Self::layout(len)?;
        // SAFETY: callers never pass zero, so the layout has non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or(MemoryError::OutOfMemory { requested: len })
    }

    unsafe fn remap(
        &self,
        ptr: NonNull<u8>,
        old_len: usize,
        new_len: usize,
    ) -> MemoryResult<NonNull<u8>> {
        // Validates that new_len rounded to the alignment still fits isize.
        Self::layout(new_len)?;
        let old = Self::layout(old_len)?;
        let moved = alloc::realloc(ptr.as_ptr(), old, new_len);
        NonNull::new(moved).ok_or(MemoryError::OutOfMemory { requested: new_len })
    }

    unsafe fn unmap(&self, ptr: NonNull<u8>, len: usize) -> MemoryResult<()> {
        alloc::dealloc(ptr.as_ptr(), Self::layout(len)?);
        Ok(())
    }

    unsafe fn protect(
        &self,
        _ptr: NonNull<u8>,
        _len: usize,
        level: AccessLevel,
    ) -> MemoryResult<()> {
        self.protection.translate(level).map(|_| ())
    }
}
