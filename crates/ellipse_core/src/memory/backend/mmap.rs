//! Anonymous private mappings on Linux.

use std::ptr::{self, NonNull};

use tracing::trace;

use super::{last_os_error, VirtualMemory};
use crate::error::MemoryResult;
use crate::memory::access::{AccessLevel, PosixProtection, ProtectionController};

/// `mmap`-backed regions, resized in place or moved with `mremap`.
#[derive(Debug, Default)]
pub struct MmapBackend {
    protection: PosixProtection,
}

impl MmapBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            protection: PosixProtection,
        }
    }
}

impl VirtualMemory for MmapBackend {
    fn name(&self) -> &'static str {
        "mmap"
    }

    fn protection(&self) -> &dyn ProtectionController {
        &self.protection
    }

    fn map(&self, len: usize) -> MemoryResult<NonNull<u8>> {
        // SAFETY: anonymous mapping with a null hint; no existing memory is
        // touched.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(last_os_error("mmap", len));
        }
        trace!(len, addr = ?addr, "mmap");
        NonNull::new(addr.cast::<u8>()).ok_or_else(|| last_os_error("mmap", len))
    }

    unsafe fn remap(
        &self,
        ptr: NonNull<u8>,
        old_len: usize,
        new_len: usize,
    ) -> MemoryResult<NonNull<u8>> {
        let addr = libc::mremap(
            ptr.as_ptr().cast::<libc::c_void>(),
            old_len,
            new_len,
            libc::MREMAP_MAYMOVE,
        );
        if addr == libc::MAP_FAILED {
            return Err(last_os_error("mremap", new_len));
        }
        trace!(old_len, new_len, addr = ?addr, "mremap");
        NonNull::new(addr.cast::<u8>()).ok_or_else(|| last_os_error("mremap", new_len))
    }

    unsafe fn unmap(&self, ptr: NonNull<u8>, len: usize) -> MemoryResult<()> {
        if libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), len) == -1 {
            return Err(last_os_error("munmap", len));
        }
        trace!(len, "munmap");
        Ok(())
    }

    unsafe fn protect(
        &self,
        ptr: NonNull<u8>,
        len: usize,
        level: AccessLevel,
    ) -> MemoryResult<()> {
        let flags = self.protection.translate(level)?;
        if libc::mprotect(ptr.as_ptr().cast::<libc::c_void>(), len, flags) == -1 {
            return Err(last_os_error("mprotect", len));
        }
        Ok(())
    }
}
