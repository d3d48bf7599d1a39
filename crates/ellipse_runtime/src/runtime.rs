//! # Runtime
//!
//! Composition root: one config, the ledger built from it, and the handler
//! table that errors are reported to.
//!
//! ```text
//! MemoryConfig ──► Ledger (backend, policy) ──► arenas / stacks
//!        │
//!        └──────► HandlerRegistry (fallback exits through the ledger)
//! ```

use std::path::Path;
use std::sync::Arc;

use ellipse_core::process::{self, ExitCode};
use ellipse_core::{Ledger, MemoryConfig, MemoryError, MemoryResult, TypedStack};
use tracing::info;

use crate::handlers::{Dispatched, HandlerRegistry, Report};
use crate::point::FilePoint;

/// Owns the ledger and handlers of one application.
#[derive(Debug)]
pub struct Runtime {
    config: MemoryConfig,
    ledger: Arc<Ledger>,
    handlers: HandlerRegistry,
}

impl Runtime {
    /// Builds a runtime from a validated config.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] if the config is rejected.
    pub fn new(config: MemoryConfig) -> MemoryResult<Self> {
        let ledger = Ledger::from_config(&config)?;
        let handlers = HandlerRegistry::with_exit_fallback(
            Arc::clone(&ledger),
            ExitCode::from_raw(config.exit_code_on_fatal),
        );
        info!(
            backend = ledger.backend().name(),
            policy = ?config.oom_policy,
            "runtime started"
        );
        Ok(Self {
            config,
            ledger,
            handlers,
        })
    }

    /// Builds a runtime from a TOML document.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] on parse or validation failure.
    pub fn from_toml_str(source: &str) -> MemoryResult<Self> {
        Self::new(MemoryConfig::from_toml_str(source)?)
    }

    /// Builds a runtime from a TOML file.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        Self::new(MemoryConfig::from_toml_file(path)?)
    }

    /// The ledger every arena of this runtime reports to.
    #[must_use]
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// The active config.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The handler table.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// A fresh stack sized by the config.
    ///
    /// # Errors
    ///
    /// Arena allocation failure.
    pub fn new_stack(&self) -> MemoryResult<TypedStack> {
        TypedStack::from_config(&self.ledger, &self.config)
    }

    /// Routes `err` to its handler.
    pub fn report(&self, err: &MemoryError, point: FilePoint) -> Dispatched {
        self.handlers.dispatch(&Report::from_error(err, point))
    }

    /// Reports a general error when `condition` is false. Returns `condition`.
    pub fn verify(&self, condition: bool, message: &str, point: FilePoint) -> bool {
        self.handlers.verify(condition, message, point)
    }

    /// Releases every arena, then terminates with `code`.
    pub fn exit(&self, code: ExitCode) -> ! {
        process::exit(&self.ledger, code)
    }

    /// Terminates with `code` without releasing anything.
    pub fn abort(&self, code: ExitCode) -> ! {
        process::abort(code)
    }
}
