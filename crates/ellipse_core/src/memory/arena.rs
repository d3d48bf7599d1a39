//! # Memory Arena
//!
//! One contiguous OS-backed byte region with a capacity, a used count and an
//! access level.
//!
//! ## Invariants
//!
//! - `used <= capacity`, always.
//! - the region exists if and only if `capacity > 0`.
//! - every size change is reported to the owning [`Ledger`] before the arena
//!   lock is released.
//!
//! ## Concurrency
//!
//! Mutating operations take `&mut self`: one writer per arena. The state
//! sits behind a mutex only because the ledger may release it during a bulk
//! teardown.

// SAFETY: This module turns backend regions into slices. Every slice is
// bounded by the region length and lives no longer than the state lock.
#![allow(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, trace, warn};

use crate::error::{MemoryError, MemoryResult};
use crate::memory::access::AccessLevel;
use crate::memory::backend::VirtualMemory;
use crate::memory::copy::copy_bytes;
use crate::memory::ledger::{ArenaId, Ledger};

/// A live mapping: base pointer and length in bytes.
struct Region {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: a Region is owned by exactly one ArenaState and is only touched
// while that state's mutex is held.
unsafe impl Send for Region {}

/// Lock-protected arena state. The ledger holds weak references to it.
pub(crate) struct ArenaState {
    region: Option<Region>,
    used: usize,
    access: AccessLevel,
    backend: Arc<dyn VirtualMemory>,
}

impl ArenaState {
    fn empty(backend: Arc<dyn VirtualMemory>, access: AccessLevel) -> Self {
        Self {
            region: None,
            used: 0,
            access,
            backend,
        }
    }

    fn capacity(&self) -> usize {
        self.region.as_ref().map_or(0, |r| r.len)
    }

    /// `(capacity, used)` as the ledger records them.
    pub(crate) fn sizes(&self) -> (usize, usize) {
        (self.capacity(), self.used)
    }

    fn slice(&self) -> &[u8] {
        match &self.region {
            // SAFETY: the region is live and `len` bytes long.
            Some(r) => unsafe { std::slice::from_raw_parts(r.ptr.as_ptr(), r.len) },
            None => &[],
        }
    }

    fn slice_mut(&mut self) -> &mut [u8] {
        match &mut self.region {
            // SAFETY: the region is live, `len` bytes long, and borrowed
            // exclusively through `&mut self`.
            Some(r) => unsafe { std::slice::from_raw_parts_mut(r.ptr.as_ptr(), r.len) },
            None => &mut [],
        }
    }

    fn readable(&self) -> MemoryResult<&[u8]> {
        if self.region.is_some() && !self.access.readable() {
            return Err(MemoryError::AccessDenied {
                level: self.access.name(),
            });
        }
        Ok(self.slice())
    }

    fn writable(&mut self) -> MemoryResult<&mut [u8]> {
        if self.region.is_some() && !self.access.writable() {
            return Err(MemoryError::AccessDenied {
                level: self.access.name(),
            });
        }
        Ok(self.slice_mut())
    }

    fn check_range(&self, offset: usize, len: usize) -> MemoryResult<usize> {
        let capacity = self.capacity();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(end),
            _ => Err(MemoryError::OutOfBounds {
                offset,
                end: offset.saturating_add(len),
                capacity,
            }),
        }
    }

    /// Unmaps the region and resets every field.
    pub(crate) fn release(&mut self) -> MemoryResult<()> {
        let result = match self.region.take() {
            // SAFETY: the region came from this backend and is dropped here.
            Some(r) => unsafe { self.backend.unmap(r.ptr, r.len) },
            None => Ok(()),
        };
        self.used = 0;
        self.access = AccessLevel::None;
        result
    }

    /// Changes capacity to `new_len`, preserving `min(old, new)` bytes.
    ///
    /// Bytes gained are zeroed when the region is writable.
    fn resize(&mut self, new_len: usize) -> MemoryResult<()> {
        let old_len = self.capacity();
        if new_len == old_len {
            return Ok(());
        }
        if new_len == 0 {
            return self.release();
        }

        match self.region.take() {
            None => {
                let ptr = self.backend.map(new_len)?;
                self.region = Some(Region { ptr, len: new_len });
                self.access = AccessLevel::ReadWrite;
            }
            Some(r) => {
                // SAFETY: the region came from this backend; new_len > 0.
                match unsafe { self.backend.remap(r.ptr, r.len, new_len) } {
                    Ok(ptr) => self.region = Some(Region { ptr, len: new_len }),
                    Err(e) => {
                        self.region = Some(r);
                        return Err(e);
                    }
                }
                if new_len > old_len && self.access.writable() {
                    self.slice_mut()[old_len..].fill(0);
                }
            }
        }

        self.used = self.used.min(new_len);
        Ok(())
    }
}

/// `count * elem_size`, or a local overflow error.
pub(crate) fn byte_size(count: usize, elem_size: usize) -> MemoryResult<usize> {
    count
        .checked_mul(elem_size)
        .ok_or(MemoryError::SizeOverflow { count, elem_size })
}

/// An OS-backed byte region tracked by a [`Ledger`].
///
/// Dropping the arena releases the region.
///
/// # Example
///
/// ```rust,ignore
/// let ledger = Ledger::global();
/// let mut arena = MemoryArena::allocate(&ledger, 10, 8)?;
/// arena.mem_set(0xFF)?;
/// arena.set_access(AccessLevel::Read)?;
/// ```
pub struct MemoryArena {
    id: ArenaId,
    state: Arc<Mutex<ArenaState>>,
    ledger: Arc<Ledger>,
}

impl MemoryArena {
    /// Reserves `count * elem_size` zeroed bytes. `used` starts at 0, access
    /// at [`AccessLevel::ReadWrite`].
    ///
    /// A zero-byte request yields an empty arena without touching the OS.
    ///
    /// # Errors
    ///
    /// [`MemoryError::SizeOverflow`] if the size overflows. A mapping failure
    /// is fatal unless the ledger propagates it.
    pub fn allocate(ledger: &Arc<Ledger>, count: usize, elem_size: usize) -> MemoryResult<Self> {
        let size = byte_size(count, elem_size)?;
        let mut state = ArenaState::empty(Arc::clone(ledger.backend()), AccessLevel::ReadWrite);
        if size > 0 {
            let ptr = state.backend.map(size).map_err(|e| ledger.escalate(e))?;
            state.region = Some(Region { ptr, len: size });
        }

        let arena = Self {
            id: Ledger::next_id(),
            state: Arc::new(Mutex::new(state)),
            ledger: Arc::clone(ledger),
        };
        arena.ledger.record(arena.id, &arena.state, size, 0);
        debug!(arena = %arena.id, capacity = size, backend = ledger.backend().name(), "allocate");
        Ok(arena)
    }

    /// Runs a size-changing operation, reports the new sizes to the ledger,
    /// then applies the fatal-failure policy with the lock released.
    fn apply<R>(&self, op: impl FnOnce(&mut ArenaState) -> MemoryResult<R>) -> MemoryResult<R> {
        let result = {
            let mut state = self.state.lock();
            let result = op(&mut state);
            self.ledger.record(self.id, &self.state, state.capacity(), state.used);
            result
        };
        result.map_err(|e| self.ledger.escalate(e))
    }

    /// Identifier within the ledger.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ArenaId {
        self.id
    }

    /// The ledger this arena reports to.
    #[must_use]
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity()
    }

    /// Used bytes.
    #[must_use]
    pub fn used(&self) -> usize {
        self.state.lock().used
    }

    /// Current access level.
    #[must_use]
    pub fn access(&self) -> AccessLevel {
        self.state.lock().access
    }

    /// True while the arena owns a region (capacity > 0).
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.state.lock().region.is_some()
    }

    /// Resizes to `count * elem_size` bytes, preserving `min(old, new)` bytes.
    ///
    /// Shrinking below `used` keeps the first `new_capacity` bytes as they
    /// are and clamps `used` to the new capacity.
    ///
    /// # Errors
    ///
    /// [`MemoryError::SizeOverflow`]. Remap failure is fatal unless propagated.
    pub fn reallocate(&mut self, count: usize, elem_size: usize) -> MemoryResult<()> {
        let size = byte_size(count, elem_size)?;
        self.apply(|state| state.resize(size))?;
        debug!(arena = %self.id, capacity = size, "reallocate");
        Ok(())
    }

    /// Resizes to `count * elem_size` bytes even if that truncates used data.
    ///
    /// When the new capacity is below `used`, the bytes in
    /// `[new_capacity, used)` are zeroed first (if the region is writable) and
    /// `used` is clamped. No guarantee is made about the surviving bytes.
    ///
    /// # Errors
    ///
    /// [`MemoryError::SizeOverflow`]. Remap failure is fatal unless propagated.
    pub fn reallocate_force(&mut self, count: usize, elem_size: usize) -> MemoryResult<()> {
        let size = byte_size(count, elem_size)?;
        self.apply(|state| {
            if size < state.used {
                let used = state.used;
                if state.access.writable() {
                    state.slice_mut()[size..used].fill(0);
                }
                warn!(arena = %self.id, dropped = used - size, "forced resize truncates used bytes");
                state.used = size;
            }
            state.resize(size)
        })?;
        debug!(arena = %self.id, capacity = size, "reallocate_force");
        Ok(())
    }

    /// Shrinks capacity to exactly `used`. An arena with nothing used is
    /// released outright.
    ///
    /// # Errors
    ///
    /// Remap or unmap failure is fatal unless propagated.
    pub fn strip(&mut self) -> MemoryResult<()> {
        self.apply(|state| {
            if state.used == 0 {
                state.release()
            } else {
                let used = state.used;
                state.resize(used)
            }
        })?;
        debug!(arena = %self.id, capacity = self.capacity(), "strip");
        Ok(())
    }

    /// Releases the region and zeroes every field.
    ///
    /// The handle stays usable: a later [`reallocate`](Self::reallocate)
    /// maps a fresh region.
    ///
    /// # Errors
    ///
    /// Unmap failure is fatal unless propagated.
    pub fn free(&mut self) -> MemoryResult<()> {
        self.apply(ArenaState::release)?;
        debug!(arena = %self.id, "free");
        Ok(())
    }

    /// Changes the protection of the whole region.
    ///
    /// # Errors
    ///
    /// [`MemoryError::UnsupportedAccess`] or [`MemoryError::Os`] (`mprotect`)
    /// if the backend refuses. The previous level stays in force.
    pub fn set_access(&mut self, level: AccessLevel) -> MemoryResult<()> {
        let mut state = self.state.lock();
        let Some((ptr, len)) = state.region.as_ref().map(|r| (r.ptr, r.len)) else {
            state.access = level;
            return Ok(());
        };
        // SAFETY: the region came from this backend and is live under the lock.
        match unsafe { state.backend.protect(ptr, len, level) } {
            Ok(()) => {
                debug!(arena = %self.id, from = %state.access, to = %level, "set_access");
                state.access = level;
                Ok(())
            }
            Err(e) => {
                warn!(arena = %self.id, level = %level, error = %e, "protection change refused");
                Err(e)
            }
        }
    }

    /// Fills the whole capacity with `byte`. `used` is unchanged.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AccessDenied`] if the region is not writable.
    pub fn mem_set(&mut self, byte: u8) -> MemoryResult<()> {
        let mut state = self.state.lock();
        let bytes = state.writable()?;
        trace!(arena = %self.id, len = bytes.len(), byte, "mem_set");
        bytes.fill(byte);
        Ok(())
    }

    /// Copies `src`'s used bytes to the front of this arena. Afterwards
    /// `self.used == src.used`.
    ///
    /// # Errors
    ///
    /// [`MemoryError::DestinationTooSmall`] if `self.capacity < src.used`,
    /// [`MemoryError::AccessDenied`] if either side forbids the access.
    pub fn mem_copy(&mut self, src: &MemoryArena) -> MemoryResult<()> {
        let (mut dst_state, src_state) = lock_pair(self, src);
        let required = src_state.used;
        let capacity = dst_state.capacity();
        if capacity < required {
            return Err(MemoryError::DestinationTooSmall { capacity, required });
        }

        let from = &src_state.readable()?[..required];
        copy_bytes(dst_state.writable()?, from);
        dst_state.used = required;
        self.ledger.record(self.id, &self.state, capacity, required);
        trace!(dst = %self.id, src = %src.id, bytes = required, "mem_copy");
        Ok(())
    }

    /// Takes over `src`'s region and fields. This arena's previous region is
    /// released first; `src` is left empty, as if freed.
    ///
    /// # Errors
    ///
    /// Unmap failure of the old region is fatal unless propagated; in that
    /// case nothing is moved.
    pub fn mem_move(&mut self, src: &mut MemoryArena) -> MemoryResult<()> {
        let result = {
            let (mut dst_state, mut src_state) = lock_pair(self, src);
            let released = dst_state.release();
            if released.is_ok() {
                let emptied = ArenaState::empty(Arc::clone(&src_state.backend), AccessLevel::None);
                *dst_state = std::mem::replace(&mut *src_state, emptied);
            }
            self.ledger
                .record(self.id, &self.state, dst_state.capacity(), dst_state.used);
            src.ledger
                .record(src.id, &src.state, src_state.capacity(), src_state.used);
            released
        };
        debug!(dst = %self.id, src = %src.id, "mem_move");
        result.map_err(|e| self.ledger.escalate(e))
    }

    /// Compares used bytes lexicographically; on an equal prefix the shorter
    /// arena orders first.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AccessDenied`] if either side is not readable.
    pub fn mem_compare(&self, other: &MemoryArena) -> MemoryResult<Ordering> {
        if self.id == other.id {
            self.state.lock().readable()?;
            return Ok(Ordering::Equal);
        }
        let (a, b) = lock_pair(self, other);
        let ordering = a.readable()?[..a.used].cmp(&b.readable()?[..b.used]);
        trace!(a = %self.id, b = %other.id, ?ordering, "mem_compare");
        Ok(ordering)
    }

    /// Writes `bytes` at `offset`, extending `used` to cover them.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfBounds`] past the capacity,
    /// [`MemoryError::AccessDenied`] if not writable.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> MemoryResult<()> {
        self.apply(|state| {
            let end = state.check_range(offset, bytes.len())?;
            state.writable()?[offset..end].copy_from_slice(bytes);
            state.used = state.used.max(end);
            Ok(())
        })
    }

    /// Copies `len` bytes starting at `offset` out of the arena.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfBounds`] past the capacity,
    /// [`MemoryError::AccessDenied`] if not readable.
    pub fn read(&self, offset: usize, len: usize) -> MemoryResult<Vec<u8>> {
        let state = self.state.lock();
        let end = state.check_range(offset, len)?;
        Ok(state.readable()?[offset..end].to_vec())
    }

    /// Copies the used bytes out of the arena.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AccessDenied`] if not readable.
    pub fn to_vec(&self) -> MemoryResult<Vec<u8>> {
        let state = self.state.lock();
        Ok(state.readable()?[..state.used].to_vec())
    }

    /// Sets the used count directly.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfBounds`] if `used > capacity`.
    pub fn set_used(&mut self, used: usize) -> MemoryResult<()> {
        self.apply(|state| {
            state.check_range(0, used)?;
            state.used = used;
            Ok(())
        })
    }

    /// Runs `f` over the full capacity.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AccessDenied`] if not readable.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> MemoryResult<R> {
        let state = self.state.lock();
        Ok(f(state.readable()?))
    }

    /// Runs `f` over the full capacity, mutably. `used` is unchanged.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AccessDenied`] if not writable.
    pub fn with_bytes_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> MemoryResult<R> {
        let mut state = self.state.lock();
        Ok(f(state.writable()?))
    }
}

/// Locks two distinct arenas in id order.
fn lock_pair<'a>(
    first: &'a MemoryArena,
    second: &'a MemoryArena,
) -> (MutexGuard<'a, ArenaState>, MutexGuard<'a, ArenaState>) {
    if first.id < second.id {
        let a = first.state.lock();
        let b = second.state.lock();
        (a, b)
    } else {
        let b = second.state.lock();
        let a = first.state.lock();
        (a, b)
    }
}

impl Drop for MemoryArena {
    fn drop(&mut self) {
        let result = self.state.lock().release();
        self.ledger.forget(self.id);
        if let Err(e) = result {
            error!(arena = %self.id, error = %e, "release failed on drop");
        }
    }
}

impl fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryArena")
            .field("id", &self.id)
            .field("capacity", &state.capacity())
            .field("used", &state.used)
            .field("access", &state.access)
            .field("backend", &state.backend.name())
            .finish()
    }
}
