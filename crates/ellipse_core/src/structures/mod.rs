//! # Structures
//!
//! Containers built on top of [`MemoryArena`](crate::memory::MemoryArena).

pub mod stack;

pub use stack::TypedStack;
