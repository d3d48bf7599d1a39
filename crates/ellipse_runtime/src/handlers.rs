//! # Error Handlers
//!
//! At most one handler per [`ErrorCode`], plus a fallback for every code
//! without one. The default fallback prints the report and exits through the
//! ledger, so no arena outlives an unhandled error.
//!
//! Handlers run with the table unlocked and may re-enter the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ellipse_core::process::{self, ExitCode};
use ellipse_core::{ErrorCode, Ledger, MemoryError};
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::point::FilePoint;

/// Prefix of every printed report.
pub const REPORT_PREFIX: &str = "[ELLIPSE RUN-TIME]:";

/// A shared error handler.
pub type Handler = Arc<dyn Fn(&Report) + Send + Sync>;

/// An error occurrence: code, message and where it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    /// Status code, used to pick the handler.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Where the error was raised.
    pub point: FilePoint,
}

impl Report {
    /// Creates a report.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, point: FilePoint) -> Self {
        Self {
            code,
            message: message.into(),
            point,
        }
    }

    /// Wraps a memory error, keeping its code.
    #[must_use]
    pub fn from_error(err: &MemoryError, point: FilePoint) -> Self {
        Self::new(err.code(), err.to_string(), point)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{REPORT_PREFIX} {} {}", self.point, self.message)
    }
}

/// Which handler a dispatch ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// The handler registered for the report's code.
    Registered,
    /// The fallback.
    Fallback,
}

/// Handler table keyed by [`ErrorCode`].
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<ErrorCode, Handler>>,
    fallback: RwLock<Handler>,
}

impl HandlerRegistry {
    /// Creates an empty registry with the given fallback.
    #[must_use]
    pub fn new(fallback: Handler) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            fallback: RwLock::new(fallback),
        }
    }

    /// Creates an empty registry whose fallback logs the report and exits
    /// through `ledger` with `code`.
    #[must_use]
    pub fn with_exit_fallback(ledger: Arc<Ledger>, code: ExitCode) -> Self {
        let fallback: Handler = Arc::new(move |report: &Report| {
            error!(code = %report.code, "{report}");
            process::exit(&ledger, code);
        });
        Self::new(fallback)
    }

    /// Registers `handler` for `code`, returning the handler it replaced.
    pub fn set(&self, code: ErrorCode, handler: Handler) -> Option<Handler> {
        debug!(code = %code, "handler registered");
        self.handlers.write().insert(code, handler)
    }

    /// Removes the handler for `code`. Returns true if one was registered.
    pub fn remove(&self, code: ErrorCode) -> bool {
        self.handlers.write().remove(&code).is_some()
    }

    /// True if `code` has its own handler.
    #[must_use]
    pub fn is_registered(&self, code: ErrorCode) -> bool {
        self.handlers.read().contains_key(&code)
    }

    /// Number of registered handlers, fallback excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// True if no code has its own handler.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Replaces the fallback.
    pub fn set_fallback(&self, fallback: Handler) {
        *self.fallback.write() = fallback;
    }

    /// Runs the handler registered for `report.code`, or the fallback.
    pub fn dispatch(&self, report: &Report) -> Dispatched {
        let registered = self.handlers.read().get(&report.code).cloned();
        match registered {
            Some(handler) => {
                handler(report);
                Dispatched::Registered
            }
            None => {
                let fallback = Arc::clone(&self.fallback.read());
                fallback(report);
                Dispatched::Fallback
            }
        }
    }

    /// Dispatches a [`ErrorCode::General`] report when `condition` is false.
    /// Returns `condition`.
    pub fn verify(&self, condition: bool, message: &str, point: FilePoint) -> bool {
        if !condition {
            self.dispatch(&Report::new(ErrorCode::General, message, point));
        }
        condition
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<ErrorCode> = self.handlers.read().keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("registered", &codes)
            .finish_non_exhaustive()
    }
}
