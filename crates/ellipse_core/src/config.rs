//! # Memory Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! oom_policy = "propagate"
//! backend = "mmap"
//! stack_initial_elements = 256
//! ```
//!
//! Every field has a default, so an empty document is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// What happens when the OS refuses a map, remap or unmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OomPolicy {
    /// Fail fast: free every tracked arena, then terminate the process.
    #[default]
    Terminate,
    /// Return the failure to the caller as a [`MemoryError`].
    Propagate,
}

/// Which virtual-memory backend a ledger is composed with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Platform default: `mmap` on Linux, heap elsewhere.
    #[default]
    Auto,
    /// Anonymous private mappings (Linux only).
    Mmap,
    /// Page-aligned heap blocks. Portable, `ReadWrite` protection only.
    Heap,
}

/// Configuration for the memory subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Policy for fatal OS failures.
    pub oom_policy: OomPolicy,
    /// Backend used by ledgers built from this config.
    pub backend: BackendKind,
    /// Element capacity of a freshly created stack.
    pub stack_initial_elements: usize,
    /// Process exit code used on the fail-fast path.
    pub exit_code_on_fatal: i32,
}

impl MemoryConfig {
    /// Default stack capacity in elements.
    pub const DEFAULT_STACK_ELEMENTS: usize = 128;

    /// Default exit code on fatal failure (`EXIT_FAILURE`).
    pub const DEFAULT_FATAL_EXIT_CODE: i32 = 1;

    /// Config for hosts where silent process death is unacceptable.
    ///
    /// Fatal OS failures come back as errors instead of terminating.
    #[must_use]
    pub fn recoverable() -> Self {
        Self {
            oom_policy: OomPolicy::Propagate,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> MemoryResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| MemoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            MemoryError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] if `stack_initial_elements` is zero.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.stack_initial_elements == 0 {
            return Err(MemoryError::InvalidConfig(
                "stack_initial_elements must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            oom_policy: OomPolicy::Terminate,
            backend: BackendKind::Auto,
            stack_initial_elements: Self::DEFAULT_STACK_ELEMENTS,
            exit_code_on_fatal: Self::DEFAULT_FATAL_EXIT_CODE,
        }
    }
}
