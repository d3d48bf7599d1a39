//! # Process Termination
//!
//! The two ways out of the process:
//!
//! - [`exit`] flushes a ledger (every tracked arena is released), then exits.
//! - [`abort`] exits immediately. Nothing is flushed, not even stdio.

use std::fmt;

use tracing::info;

use crate::memory::Ledger;

/// Process exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExitCode {
    /// `EXIT_SUCCESS`.
    Success,
    /// `EXIT_FAILURE`.
    Failure,
    /// Any other raw status.
    Code(i32),
}

impl ExitCode {
    /// Raw status passed to the OS.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Code(code) => code,
        }
    }

    /// Builds a code from a raw status, folding 0 and 1 onto the named variants.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Success,
            1 => Self::Failure,
            other => Self::Code(other),
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}

/// Releases every arena tracked by `ledger`, then terminates.
pub fn exit(ledger: &Ledger, code: ExitCode) -> ! {
    // Release failures cannot be reported past this point.
    let _ = ledger.all_resources_free();
    info!(code = code.raw(), "exit");
    std::process::exit(code.raw())
}

/// Terminates immediately without touching any ledger.
///
/// On unix this is `_exit`: no atexit handlers run and buffered stdio is
/// not flushed.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn abort(code: ExitCode) -> ! {
    // SAFETY: `_exit` takes no pointers and never returns.
    unsafe { libc::_exit(code.raw()) }
}

/// Terminates immediately without touching any ledger.
#[cfg(not(unix))]
pub fn abort(code: ExitCode) -> ! {
    std::process::exit(code.raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_codes() {
        assert_eq!(ExitCode::Success.raw(), 0);
        assert_eq!(ExitCode::Failure.raw(), 1);
        assert_eq!(ExitCode::Code(42).raw(), 42);
        assert_eq!(ExitCode::from_raw(1), ExitCode::Failure);
        assert_eq!(ExitCode::from_raw(3), ExitCode::Code(3));
    }
}
