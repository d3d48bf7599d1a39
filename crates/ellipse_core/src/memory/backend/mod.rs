//! # Virtual-Memory Backends
//!
//! One capability interface, one implementation per platform. The choice is
//! made here, when a [`Ledger`](crate::memory::Ledger) is composed, and
//! nowhere else.
//!
//! ```text
//! MemoryArena ──► Ledger ──► Arc<dyn VirtualMemory>
//!                               ├── MmapBackend  (Linux: mmap / mremap / mprotect)
//!                               └── HeapBackend  (portable: std::alloc)
//! ```

#![allow(unsafe_code)]

mod heap;
#[cfg(target_os = "linux")]
mod mmap;

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::config::BackendKind;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::access::{AccessLevel, ProtectionController};

pub use heap::HeapBackend;
#[cfg(target_os = "linux")]
pub use mmap::MmapBackend;

/// Platform virtual-memory operations.
///
/// Every region handed out by `map` or `remap` is readable, writable and at
/// least `len` bytes long. Fresh regions are zeroed; bytes gained by `remap`
/// are not guaranteed to be.
pub trait VirtualMemory: Send + Sync + fmt::Debug {
    /// Short backend name for logs and errors.
    fn name(&self) -> &'static str;

    /// The protection table this backend applies.
    fn protection(&self) -> &dyn ProtectionController;

    /// Maps a fresh zeroed region of `len > 0` bytes.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfMemory`] or [`MemoryError::Os`].
    fn map(&self, len: usize) -> MemoryResult<NonNull<u8>>;

    /// Resizes a region, preserving `min(old_len, new_len)` bytes. The region
    /// may move.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfMemory`] or [`MemoryError::Os`]. On error the
    /// original region is untouched.
    ///
    /// # Safety
    ///
    /// `ptr` and `old_len` must describe a live region returned by this
    /// backend, and `new_len` must be non-zero.
    unsafe fn remap(
        &self,
        ptr: NonNull<u8>,
        old_len: usize,
        new_len: usize,
    ) -> MemoryResult<NonNull<u8>>;

    /// Releases a region.
    ///
    /// # Errors
    ///
    /// [`MemoryError::Os`] if the OS refuses.
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must describe a live region returned by this backend.
    /// The region must not be used afterwards.
    unsafe fn unmap(&self, ptr: NonNull<u8>, len: usize) -> MemoryResult<()>;

    /// Applies an access level to a region.
    ///
    /// # Errors
    ///
    /// [`MemoryError::UnsupportedAccess`] if the level has no translation,
    /// [`MemoryError::Os`] (`mprotect`) if the OS refuses it.
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must describe a live region returned by this backend.
    unsafe fn protect(&self, ptr: NonNull<u8>, len: usize, level: AccessLevel)
        -> MemoryResult<()>;
}

/// Alignment of every region, matching the common page size.
pub const REGION_ALIGN: usize = 4096;

/// The platform default backend.
#[must_use]
pub fn default_backend() -> Arc<dyn VirtualMemory> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(MmapBackend::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(HeapBackend::new())
    }
}

/// Builds the backend named by a config value.
///
/// # Errors
///
/// [`MemoryError::InvalidConfig`] when `mmap` is requested on a platform
/// without it.
pub fn backend_for(kind: BackendKind) -> MemoryResult<Arc<dyn VirtualMemory>> {
    match kind {
        BackendKind::Auto => Ok(default_backend()),
        BackendKind::Heap => Ok(Arc::new(HeapBackend::new())),
        #[cfg(target_os = "linux")]
        BackendKind::Mmap => Ok(Arc::new(MmapBackend::new())),
        #[cfg(not(target_os = "linux"))]
        BackendKind::Mmap => Err(MemoryError::InvalidConfig(
            "mmap backend is only available on Linux".into(),
        )),
    }
}

/// Converts the last OS error into a [`MemoryError`].
///
/// `ENOMEM` on a map or remap becomes `OutOfMemory`.
#[cfg(target_os = "linux")]
fn last_os_error(op: &'static str, requested: usize) -> MemoryError {
    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    if errno == libc::ENOMEM && op != "munmap" && op != "mprotect" {
        MemoryError::OutOfMemory { requested }
    } else {
        MemoryError::Os { op, errno }
    }
}
