//! # Allocation Ledger
//!
//! The allocator context every arena is created against. It owns the
//! virtual-memory backend, decides what a fatal failure does, and keeps a
//! registry of every live arena so they can all be released at once.
//!
//! ## Thread Safety
//!
//! The registry sits behind a `parking_lot::Mutex`. Arena operations take
//! their own arena lock first and the ledger lock second; bulk teardown takes
//! the ledger lock only long enough to drain the registry, then visits each
//! arena and, still holding that arena's lock, records what is left of it.
//! An arena that reported its sizes between the drain and its release ends
//! up with the same entry it would have after a plain release. No path holds
//! the ledger lock while waiting on an arena.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::config::{MemoryConfig, OomPolicy};
use crate::error::{MemoryError, MemoryResult};
use crate::memory::arena::ArenaState;
use crate::memory::backend::{self, VirtualMemory};
use crate::process::{self, ExitCode};

/// Identifier of an arena within its ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u64);

impl ArenaId {
    /// Raw identifier value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena#{}", self.0)
    }
}

/// Registry entry: a non-owning reference plus the last reported sizes.
struct Entry {
    state: Weak<Mutex<ArenaState>>,
    capacity: usize,
    used: usize,
}

/// Ids are unique across every ledger in the process, so two arenas can
/// always be locked in id order.
static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

static GLOBAL: OnceLock<Arc<Ledger>> = OnceLock::new();

/// Tally of every live arena created against it.
pub struct Ledger {
    backend: Arc<dyn VirtualMemory>,
    policy: OomPolicy,
    fatal_exit: ExitCode,
    registry: Mutex<HashMap<ArenaId, Entry>>,
}

impl Ledger {
    /// Creates a ledger over `backend` with the given fatal-failure policy.
    /// A fatal failure under [`OomPolicy::Terminate`] exits with
    /// [`ExitCode::Failure`].
    #[must_use]
    pub fn new(backend: Arc<dyn VirtualMemory>, policy: OomPolicy) -> Arc<Self> {
        Self::with_fatal_exit(backend, policy, ExitCode::Failure)
    }

    /// Like [`new`](Self::new), terminating with `fatal_exit` instead.
    #[must_use]
    pub fn with_fatal_exit(
        backend: Arc<dyn VirtualMemory>,
        policy: OomPolicy,
        fatal_exit: ExitCode,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            policy,
            fatal_exit,
            registry: Mutex::new(HashMap::new()),
        })
    }

    /// Builds a ledger from configuration.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] if the config is invalid or names a
    /// backend this platform lacks.
    pub fn from_config(config: &MemoryConfig) -> MemoryResult<Arc<Self>> {
        config.validate()?;
        Ok(Self::with_fatal_exit(
            backend::backend_for(config.backend)?,
            config.oom_policy,
            ExitCode::from_raw(config.exit_code_on_fatal),
        ))
    }

    /// The process-wide ledger: default backend, fail-fast policy.
    ///
    /// Created on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Self::new(backend::default_backend(), OomPolicy::Terminate)))
    }

    /// The backend arenas of this ledger map their regions through.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn VirtualMemory> {
        &self.backend
    }

    /// Exit code used when a fatal failure terminates the process.
    #[inline]
    #[must_use]
    pub const fn fatal_exit(&self) -> ExitCode {
        self.fatal_exit
    }

    /// Fatal-failure policy.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> OomPolicy {
        self.policy
    }

    /// Sum of capacity over all tracked arenas, in bytes.
    #[must_use]
    pub fn all_resources_size(&self) -> usize {
        self.registry.lock().values().map(|e| e.capacity).sum()
    }

    /// Sum of used bytes over all tracked arenas.
    #[must_use]
    pub fn all_resources_used(&self) -> usize {
        self.registry.lock().values().map(|e| e.used).sum()
    }

    /// Number of arenas currently holding memory.
    #[must_use]
    pub fn live_arenas(&self) -> usize {
        self.registry.lock().len()
    }

    /// Releases every tracked arena and forgets them.
    ///
    /// Arena handles stay valid but become empty. A second call finds
    /// nothing to release.
    ///
    /// # Errors
    ///
    /// The first unmap failure. Every arena is still visited.
    pub fn all_resources_free(&self) -> MemoryResult<()> {
        let drained: Vec<(ArenaId, Entry)> = self.registry.lock().drain().collect();
        let mut first_error = None;
        let mut released = 0usize;

        for (id, entry) in drained {
            let Some(arena) = entry.state.upgrade() else {
                continue;
            };
            let mut state = arena.lock();
            match state.release() {
                Ok(()) => released += 1,
                Err(e) => {
                    error!(arena = %id, error = %e, "release failed during ledger teardown");
                    first_error.get_or_insert(e);
                }
            }
            let (capacity, used) = state.sizes();
            self.record(id, &arena, capacity, used);
        }

        debug!(released, "ledger freed all resources");
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn next_id() -> ArenaId {
        ArenaId(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Records the current sizes of an arena.
    ///
    /// Empty arenas are dropped from the registry; an arena that regains
    /// memory after a teardown is tracked again.
    pub(crate) fn record(
        &self,
        id: ArenaId,
        state: &Arc<Mutex<ArenaState>>,
        capacity: usize,
        used: usize,
    ) {
        let mut registry = self.registry.lock();
        if capacity == 0 {
            registry.remove(&id);
            return;
        }
        registry
            .entry(id)
            .and_modify(|e| {
                e.capacity = capacity;
                e.used = used;
            })
            .or_insert_with(|| Entry {
                state: Arc::downgrade(state),
                capacity,
                used,
            });
    }

    pub(crate) fn forget(&self, id: ArenaId) {
        self.registry.lock().remove(&id);
    }

    /// Applies the fatal-failure policy.
    ///
    /// Local errors pass through. Fatal ones either pass through
    /// ([`OomPolicy::Propagate`]) or tear the ledger down and end the process.
    /// Callers must not hold any arena lock.
    pub(crate) fn escalate(&self, err: MemoryError) -> MemoryError {
        if !err.is_fatal() || self.policy == OomPolicy::Propagate {
            return err;
        }
        error!(error = %err, code = %err.code(), "fatal memory failure, terminating");
        let _ = self.all_resources_free();
        process::abort(self.fatal_exit)
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .field("live_arenas", &self.live_arenas())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::backend::HeapBackend;
    use crate::memory::MemoryArena;

    fn heap_ledger() -> Arc<Ledger> {
        Ledger::new(Arc::new(HeapBackend::new()), OomPolicy::Propagate)
    }

    #[test]
    fn test_sums_track_arenas() {
        let ledger = heap_ledger();
        let mut a = MemoryArena::allocate(&ledger, 10, 8).unwrap();
        let b = MemoryArena::allocate(&ledger, 4, 4).unwrap();
        a.write(0, &[1, 2, 3]).unwrap();

        assert_eq!(ledger.all_resources_size(), 80 + 16);
        assert_eq!(ledger.all_resources_used(), 3);
        assert_eq!(ledger.live_arenas(), 2);

        drop(b);
        assert_eq!(ledger.all_resources_size(), 80);
        assert_eq!(ledger.live_arenas(), 1);
    }

    #[test]
    fn test_free_all_is_idempotent() {
        let ledger = heap_ledger();
        let a = MemoryArena::allocate(&ledger, 32, 1).unwrap();
        let b = MemoryArena::allocate(&ledger, 64, 1).unwrap();

        ledger.all_resources_free().unwrap();
        assert_eq!(ledger.all_resources_size(), 0);
        assert_eq!(ledger.all_resources_used(), 0);
        assert_eq!(a.capacity(), 0);
        assert_eq!(b.capacity(), 0);
        assert!(!a.has_data());

        ledger.all_resources_free().unwrap();
        assert_eq!(ledger.all_resources_size(), 0);
    }

    #[test]
    fn test_arena_reused_after_teardown_is_tracked_again() {
        let ledger = heap_ledger();
        let mut a = MemoryArena::allocate(&ledger, 8, 1).unwrap();
        ledger.all_resources_free().unwrap();
        a.reallocate(16, 1).unwrap();
        assert_eq!(ledger.all_resources_size(), 16);
        assert_eq!(ledger.live_arenas(), 1);
    }

    #[test]
    fn test_ledgers_are_independent() {
        let first = heap_ledger();
        let second = heap_ledger();
        let _a = MemoryArena::allocate(&first, 100, 1).unwrap();
        let _b = MemoryArena::allocate(&second, 7, 1).unwrap();
        first.all_resources_free().unwrap();
        assert_eq!(first.all_resources_size(), 0);
        assert_eq!(second.all_resources_size(), 7);
    }

    #[test]
    fn test_from_config() {
        let config = MemoryConfig::from_toml_str("backend = \"heap\"\noom_policy = \"propagate\"").unwrap();
        let ledger = Ledger::from_config(&config).unwrap();
        assert_eq!(ledger.backend().name(), "heap");
        assert_eq!(ledger.policy(), OomPolicy::Propagate);
        assert_eq!(ledger.fatal_exit(), ExitCode::Failure);

        let config = MemoryConfig::from_toml_str("exit_code_on_fatal = 42").unwrap();
        let ledger = Ledger::from_config(&config).unwrap();
        assert_eq!(ledger.policy(), OomPolicy::Terminate);
        assert_eq!(ledger.fatal_exit(), ExitCode::Code(42));
    }
}
