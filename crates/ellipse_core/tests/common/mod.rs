//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::process::{Command, Output};
use std::ptr::NonNull;
use std::sync::Arc;

use ellipse_core::memory::{HeapBackend, ProtectionController, VirtualMemory};
use ellipse_core::{AccessLevel, Ledger, MemoryError, MemoryResult, OomPolicy};

/// Env var that switches a test binary into its child role.
pub const CHILD_ENV: &str = "ELLIPSE_TEST_CHILD";

/// Line prefix [`LimitedBackend`] writes to stderr for every unmap.
pub const UNMAP_LINE: &str = "limited unmap";

/// Heap backend that refuses any region larger than `limit` bytes and
/// reports each unmap on stderr.
#[derive(Debug)]
pub struct LimitedBackend {
    inner: HeapBackend,
    limit: usize,
}

impl LimitedBackend {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HeapBackend::new(),
            limit,
        })
    }

    /// A propagating ledger over a backend capped at `limit` bytes.
    pub fn ledger(limit: usize) -> Arc<Ledger> {
        Ledger::new(Self::new(limit), OomPolicy::Propagate)
    }

    fn check(&self, len: usize) -> MemoryResult<()> {
        if len > self.limit {
            return Err(MemoryError::OutOfMemory { requested: len });
        }
        Ok(())
    }
}

impl VirtualMemory for LimitedBackend {
    fn name(&self) -> &'static str {
        "limited"
    }

    fn protection(&self) -> &dyn ProtectionController {
        self.inner.protection()
    }

    fn map(&self, len: usize) -> MemoryResult<NonNull<u8>> {
        self.check(len)?;
        self.inner.map(len)
    }

    unsafe fn remap(
        &self,
        ptr: NonNull<u8>,
        old_len: usize,
        new_len: usize,
    ) -> MemoryResult<NonNull<u8>> {
        self.check(new_len)?;
        self.inner.remap(ptr, old_len, new_len)
    }

    unsafe fn unmap(&self, ptr: NonNull<u8>, len: usize) -> MemoryResult<()> {
        eprintln!("{UNMAP_LINE} {len}");
        self.inner.unmap(ptr, len)
    }

    unsafe fn protect(
        &self,
        ptr: NonNull<u8>,
        len: usize,
        level: AccessLevel,
    ) -> MemoryResult<()> {
        self.inner.protect(ptr, len, level)
    }
}

/// The role this binary was started in, if it is a child.
pub fn child_role() -> Option<String> {
    std::env::var(CHILD_ENV).ok()
}

/// Re-runs this test binary on the single test `name`, in child role `role`.
pub fn run_child(name: &str, role: &str) -> Output {
    Command::new(std::env::current_exe().unwrap())
        .args([name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, role)
        .output()
        .unwrap()
}
