//! # Memory Module
//!
//! OS-backed arenas and the ledger that tracks them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Ledger                         │
//! │  backend ─ policy ─ registry{ArenaId -> sizes}       │
//! ├──────────────────────────────────────────────────────┤
//! │  MemoryArena   MemoryArena   MemoryArena   ...       │
//! │  [used|free]   [used|free]   [used|free]             │
//! ├──────────────────────────────────────────────────────┤
//! │  VirtualMemory: MmapBackend │ HeapBackend            │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every size change of an arena lands in its ledger before the operation
//! returns, so `all_resources_size` is always the sum of live capacities.

pub mod access;
pub mod arena;
pub mod backend;
mod copy;
pub mod ledger;

pub use access::{AccessLevel, FixedProtection, PosixProtection, ProtectionController};
pub use arena::MemoryArena;
#[cfg(target_os = "linux")]
pub use backend::MmapBackend;
pub use backend::{backend_for, default_backend, HeapBackend, VirtualMemory, REGION_ALIGN};
pub use ledger::{ArenaId, Ledger};
