//! # Ellipse Core
//!
//! Low-level memory subsystem:
//! - OS-backed arenas with explicit protection control
//! - An allocation ledger that tallies every live arena and can free them all
//! - A type-tagged growable stack built on one arena
//!
//! ## Architecture Rules
//!
//! 1. **Explicit context** - arenas are created against an `Arc<Ledger>`
//! 2. **One platform seam** - all OS calls go through [`memory::VirtualMemory`]
//! 3. **Fail-fast by default** - fatal OS failures tear the ledger down and exit,
//!    unless the ledger was built with [`OomPolicy::Propagate`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use ellipse_core::{Ledger, MemoryArena, TypedStack, TaggedValue};
//!
//! let ledger = Ledger::global();
//! let mut arena = MemoryArena::allocate(&ledger, 10, 8)?;
//! arena.mem_set(0xFF)?;
//!
//! let mut stack = TypedStack::create(&ledger)?;
//! stack.push(TaggedValue::I32(42))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;
pub mod process;
pub mod structures;
pub mod types;

pub use config::{BackendKind, MemoryConfig, OomPolicy};
pub use error::{ErrorCategory, ErrorCode, MemoryError, MemoryResult};
pub use memory::{AccessLevel, ArenaId, Ledger, MemoryArena, ProtectionController, VirtualMemory};
pub use process::ExitCode;
pub use structures::TypedStack;
pub use types::{TaggedElement, TaggedValue, TypeTag};
