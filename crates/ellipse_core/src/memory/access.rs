//! # Access Protection
//!
//! Abstract access levels and their translation to platform protection flags.
//! Translation is a pure lookup; applying the flags is the backend's job.

use std::fmt;

use crate::error::{MemoryError, MemoryResult};

/// Access level of an arena region.
///
/// The discriminants are the bit patterns used by the application layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AccessLevel {
    /// No access. Touching the region faults.
    None = 0b0000,
    /// Write-only.
    Write = 0b0001,
    /// Read-only.
    Read = 0b0010,
    /// Read and write.
    ReadWrite = 0b0011,
    /// Guard-page style region that grows downward.
    GrowsDown = 0b0100,
    /// Guard-page style region that grows upward.
    GrowsUp = 0b1000,
}

impl AccessLevel {
    /// Every level, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Write,
        Self::Read,
        Self::ReadWrite,
        Self::GrowsDown,
        Self::GrowsUp,
    ];

    /// Stable lowercase name, used in errors and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Write => "write",
            Self::Read => "read",
            Self::ReadWrite => "read_write",
            Self::GrowsDown => "grows_down",
            Self::GrowsUp => "grows_up",
        }
    }

    /// True if the region can be read through safe accessors.
    #[inline]
    #[must_use]
    pub const fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// True if the region can be written through safe accessors.
    #[inline]
    #[must_use]
    pub const fn writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps access levels to backend protection flags.
pub trait ProtectionController: Send + Sync + fmt::Debug {
    /// Name reported in [`MemoryError::UnsupportedAccess`].
    fn name(&self) -> &'static str;

    /// Translates `level` into raw protection flags.
    ///
    /// # Errors
    ///
    /// [`MemoryError::UnsupportedAccess`] if the platform has no equivalent.
    fn translate(&self, level: AccessLevel) -> MemoryResult<i32>;
}

/// `mprotect` flag values (Linux ABI).
pub mod prot {
    /// `PROT_NONE`.
    pub const NONE: i32 = 0x0;
    /// `PROT_READ`.
    pub const READ: i32 = 0x1;
    /// `PROT_WRITE`.
    pub const WRITE: i32 = 0x2;
    /// `PROT_GROWSDOWN` (Linux).
    pub const GROWSDOWN: i32 = 0x0100_0000;
    /// `PROT_GROWSUP` (Linux).
    pub const GROWSUP: i32 = 0x0200_0000;
}

/// POSIX `mprotect` translation table.
#[derive(Clone, Copy, Debug, Default)]
pub struct PosixProtection;

impl ProtectionController for PosixProtection {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn translate(&self, level: AccessLevel) -> MemoryResult<i32> {
        Ok(match level {
            AccessLevel::None => prot::NONE,
            AccessLevel::Read => prot::READ,
            AccessLevel::Write => prot::WRITE,
            AccessLevel::ReadWrite => prot::READ | prot::WRITE,
            AccessLevel::GrowsDown => prot::GROWSDOWN,
            AccessLevel::GrowsUp => prot::GROWSUP,
        })
    }
}

/// Translation for backends without page protection.
///
/// Heap memory is always readable and writable, so `ReadWrite` is the only
/// level it can honour.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedProtection;

impl ProtectionController for FixedProtection {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn translate(&self, level: AccessLevel) -> MemoryResult<i32> {
        match level {
            AccessLevel::ReadWrite => Ok(prot::READ | prot::WRITE),
            other => Err(MemoryError::UnsupportedAccess {
                level: other.name(),
                backend: self.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_table() {
        let posix = PosixProtection;
        assert_eq!(posix.translate(AccessLevel::None).unwrap(), 0);
        assert_eq!(posix.translate(AccessLevel::Read).unwrap(), prot::READ);
        assert_eq!(posix.translate(AccessLevel::Write).unwrap(), prot::WRITE);
        assert_eq!(
            posix.translate(AccessLevel::ReadWrite).unwrap(),
            prot::READ | prot::WRITE
        );
        assert_eq!(posix.translate(AccessLevel::GrowsDown).unwrap(), prot::GROWSDOWN);
        assert_eq!(posix.translate(AccessLevel::GrowsUp).unwrap(), prot::GROWSUP);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_flags_match_libc() {
        assert_eq!(prot::NONE, libc::PROT_NONE);
        assert_eq!(prot::READ, libc::PROT_READ);
        assert_eq!(prot::WRITE, libc::PROT_WRITE);
    }

    #[test]
    fn test_fixed_only_read_write() {
        let fixed = FixedProtection;
        assert!(fixed.translate(AccessLevel::ReadWrite).is_ok());
        for level in AccessLevel::ALL {
            if level != AccessLevel::ReadWrite {
                assert_eq!(
                    fixed.translate(level),
                    Err(MemoryError::UnsupportedAccess {
                        level: level.name(),
                        backend: "fixed",
                    })
                );
            }
        }
    }

    #[test]
    fn test_bit_patterns() {
        assert_eq!(AccessLevel::ReadWrite as u8, AccessLevel::Read as u8 | AccessLevel::Write as u8);
        assert!(AccessLevel::ReadWrite.readable() && AccessLevel::ReadWrite.writable());
        assert!(!AccessLevel::Write.readable());
        assert!(!AccessLevel::None.writable());
    }
}
