//! # Error Types
//!
//! Two vocabularies live here:
//!
//! - [`ErrorCode`] is the integer status taxonomy shared with the application
//!   layer. Handler registries key on it.
//! - [`MemoryError`] is what memory operations actually return. Every variant
//!   maps onto exactly one [`ErrorCode`].
//!
//! ## Fatal vs local
//!
//! OS-level map/remap/unmap failures are *fatal*: under the default
//! [`OomPolicy::Terminate`](crate::config::OomPolicy) they never reach the
//! caller. Everything else is *local* and comes back as an `Err`.

use std::fmt;

use thiserror::Error;

/// Broad grouping of error codes, following the numeric ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Codes below 100.
    General,
    /// 100..200.
    Memory,
    /// 400..500.
    Argument,
    /// 500..600.
    State,
    /// 700..800.
    Hardware,
    /// 1003..=1004.
    Config,
}

/// Integer status codes consumed by the application layer.
///
/// The numeric values are part of the contract: external handler tables are
/// indexed by them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum ErrorCode {
    /// Operation completed successfully.
    Ok = 0,
    /// General error.
    General = 1,

    /// General memory error.
    MemGeneral = 100,
    /// Out of memory.
    MemOutOfMemory = 101,
    /// Null pointer to data.
    MemNullPointer = 102,
    /// Memory leak detected.
    MemLeak = 103,
    /// Memory corruption detected.
    MemCorruption = 104,
    /// Invalid memory access.
    MemSegmentationFault = 105,

    /// Invalid function argument.
    ArgInvalid = 400,
    /// Index or range out of bounds.
    ArgOutOfBounds = 401,
    /// Invalid data format.
    ArgInvalidData = 402,
    /// Data overflow (buffer too small).
    ArgDataOverflow = 403,
    /// Data underflow (buffer already empty).
    ArgDataUnderflow = 404,
    /// Type mismatch.
    ArgTypeMismatch = 405,
    /// Encoding error.
    ArgEncoding = 406,

    /// Uninitialized state.
    StateUninitialized = 500,
    /// State mismatch.
    StateMismatch = 501,
    /// General logical failure.
    StateLogicFailure = 502,
    /// Functionality not implemented.
    StateNotImplemented = 503,
    /// Operation not supported.
    StateUnsupported = 504,
    /// Internal error.
    StateInternal = 505,

    /// General hardware error.
    HwGeneral = 700,
    /// Hardware device failure.
    HwDeviceFailure = 701,
    /// Hardware device busy.
    HwDeviceBusy = 702,
    /// Hardware device not found.
    HwDeviceNotFound = 703,
    /// Device not ready.
    HwDeviceNotReady = 704,
    /// Device operation timed out.
    HwDeviceTimeout = 705,
    /// Device or mode not supported.
    HwDeviceUnsupported = 706,

    /// Configuration error.
    ConfigGeneral = 1003,
    /// Invalid configuration.
    ConfigInvalid = 1004,
}

impl ErrorCode {
    /// Returns the raw numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the category this code belongs to.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self as u16 {
            0..=99 => ErrorCategory::General,
            100..=199 => ErrorCategory::Memory,
            400..=499 => ErrorCategory::Argument,
            500..=599 => ErrorCategory::State,
            700..=799 => ErrorCategory::Hardware,
            _ => ErrorCategory::Config,
        }
    }

    /// Returns true for [`ErrorCode::Ok`].
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.as_u16())
    }
}

/// Errors returned by memory operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The OS refused to provide (or grow) a mapping.
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory {
        /// Bytes requested from the backend.
        requested: usize,
    },

    /// `count * elem_size` does not fit in `usize`.
    #[error("size overflow: {count} elements of {elem_size} bytes")]
    SizeOverflow {
        /// Element count.
        count: usize,
        /// Size of one element.
        elem_size: usize,
    },

    /// Copy destination cannot hold the source's used bytes.
    #[error("destination too small: capacity {capacity}, need {required}")]
    DestinationTooSmall {
        /// Destination capacity in bytes.
        capacity: usize,
        /// Bytes that had to fit.
        required: usize,
    },

    /// Range lies outside the arena capacity.
    #[error("range {offset}..{end} out of bounds for capacity {capacity}")]
    OutOfBounds {
        /// Start of the range.
        offset: usize,
        /// End of the range (exclusive).
        end: usize,
        /// Arena capacity in bytes.
        capacity: usize,
    },

    /// Pop on an empty stack.
    #[error("stack underflow: pop on empty stack")]
    StackUnderflow,

    /// Stored discriminant does not name a known type.
    #[error("invalid type tag: {0}")]
    InvalidTag(u8),

    /// The backend cannot apply the requested protection level.
    #[error("access level {level} not supported by {backend}")]
    UnsupportedAccess {
        /// Requested level, as its display name.
        level: &'static str,
        /// Backend that refused.
        backend: &'static str,
    },

    /// The arena's current access level forbids the operation.
    #[error("access denied: arena is {level}")]
    AccessDenied {
        /// Current access level, as its display name.
        level: &'static str,
    },

    /// A virtual-memory syscall failed.
    #[error("{op} failed: os error {errno}")]
    Os {
        /// The failing operation (`mmap`, `mremap`, `munmap`, `mprotect`).
        op: &'static str,
        /// Raw OS error number.
        errno: i32,
    },

    /// Configuration could not be parsed or validated.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MemoryError {
    /// Maps this error onto the integer taxonomy.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::OutOfMemory { .. } => ErrorCode::MemOutOfMemory,
            Self::SizeOverflow { .. } | Self::DestinationTooSmall { .. } => {
                ErrorCode::ArgDataOverflow
            }
            Self::OutOfBounds { .. } => ErrorCode::ArgOutOfBounds,
            Self::StackUnderflow => ErrorCode::ArgDataUnderflow,
            Self::InvalidTag(_) => ErrorCode::ArgTypeMismatch,
            Self::UnsupportedAccess { .. } => ErrorCode::HwDeviceUnsupported,
            Self::AccessDenied { .. } => ErrorCode::MemSegmentationFault,
            Self::Os { op, .. } if *op == "mprotect" => ErrorCode::HwGeneral,
            Self::Os { .. } => ErrorCode::MemGeneral,
            Self::InvalidConfig(_) => ErrorCode::ConfigInvalid,
        }
    }

    /// True for failures that take the fail-fast path.
    ///
    /// A refused `mprotect` is a hardware error returned to the caller, not a
    /// fatal one.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::OutOfMemory { .. } => true,
            Self::Os { op, .. } => *op != "mprotect",
            _ => false,
        }
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_keep_numeric_values() {
        assert_eq!(ErrorCode::MemOutOfMemory.as_u16(), 101);
        assert_eq!(ErrorCode::ArgDataUnderflow.as_u16(), 404);
        assert_eq!(ErrorCode::HwDeviceUnsupported.as_u16(), 706);
        assert_eq!(ErrorCode::ConfigInvalid.as_u16(), 1004);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::Ok.category(), ErrorCategory::General);
        assert_eq!(ErrorCode::MemLeak.category(), ErrorCategory::Memory);
        assert_eq!(ErrorCode::ArgInvalid.category(), ErrorCategory::Argument);
        assert_eq!(ErrorCode::StateUnsupported.category(), ErrorCategory::State);
        assert_eq!(ErrorCode::HwGeneral.category(), ErrorCategory::Hardware);
        assert_eq!(ErrorCode::ConfigGeneral.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_fatal_split() {
        assert!(MemoryError::OutOfMemory { requested: 1 }.is_fatal());
        assert!(MemoryError::Os { op: "mremap", errno: 12 }.is_fatal());
        assert!(!MemoryError::Os { op: "mprotect", errno: 22 }.is_fatal());
        assert!(!MemoryError::StackUnderflow.is_fatal());
        assert_eq!(
            MemoryError::Os { op: "mprotect", errno: 22 }.code(),
            ErrorCode::HwGeneral
        );
    }

    #[test]
    fn test_display() {
        let err = MemoryError::DestinationTooSmall { capacity: 8, required: 16 };
        assert_eq!(err.to_string(), "destination too small: capacity 8, need 16");
        assert_eq!(ErrorCode::ArgOutOfBounds.to_string(), "ArgOutOfBounds(401)");
    }
}
