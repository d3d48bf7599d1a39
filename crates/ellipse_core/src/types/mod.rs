//! # Types
//!
//! Value types shared by the containers built on arenas.

pub mod tagged;

pub use tagged::{TaggedElement, TaggedValue, TypeTag};
