//! Error types for the augur library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! variants covering the three failure classes of the shim: OS resource
//! failures while overriding process state, failures reported by the native
//! library itself, and requests rejected locally before any native call.

use std::io;
use std::os::unix::io::RawFd;
use thiserror::Error;

/// Result type alias for augur operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all augur operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to redirect the standard-error stream to the discard device
    #[error("failed to suppress error output: {source}")]
    Suppress {
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Failed to restore the standard-error stream after a native call
    #[error("failed to restore error output: {source}")]
    Restore {
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Failed to construct or install the fixed "C" locale
    #[error("failed to override locale: {source}")]
    LocaleOverride {
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Failed to reinstall the previously active locale
    #[error("failed to restore locale")]
    LocaleRestore,

    /// An override of the same kind is already installed in this process
    #[error("a {kind} override is already active")]
    OverrideActive {
        /// Which resource kind was being overridden
        kind: &'static str,
    },

    /// Release was called on a save-state that never installed an override
    #[error("no {kind} override installed to restore")]
    NotInstalled {
        /// Which resource kind the save-state belongs to
        kind: &'static str,
    },

    /// A descriptor handed to the shim does not refer to an open file
    #[error("bad file descriptor: {fd}")]
    BadDescriptor {
        /// The offending descriptor
        fd: RawFd,
    },

    /// Failed to duplicate a descriptor before handing it to the native library
    #[error("failed to duplicate descriptor {fd}: {source}")]
    DescriptorDup {
        /// The descriptor that could not be duplicated
        fd: RawFd,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A flags value outside the range recognized by the native library
    #[error("flags {flags:#x} outside the recognized range {min:#x}..={max:#x}")]
    FlagsOutOfRange {
        /// The rejected value
        flags: i32,
        /// Smallest recognized flag value
        min: i32,
        /// Largest recognized flag value
        max: i32,
    },

    /// The linked native library predates the requested entry point
    #[error("not implemented by the linked magic library")]
    NotImplemented,

    /// An argument could not be passed across the native boundary
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the native library
    #[error("magic library error: {message}")]
    Native {
        /// The native library's errno at the time of failure, if meaningful
        errno: Option<i32>,
        /// The native library's error message
        message: String,
    },
}

impl Error {
    /// Creates a suppression error from the last OS error
    pub(crate) fn suppress(source: io::Error) -> Self {
        Self::Suppress { source }
    }

    /// Creates a restore error from the last OS error
    pub(crate) fn restore(source: io::Error) -> Self {
        Self::Restore { source }
    }

    /// Creates a new native-library error
    pub fn native(errno: Option<i32>, message: impl Into<String>) -> Self {
        Self::Native {
            errno,
            message: message.into(),
        }
    }

    /// Creates a new invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns the originating OS or native error code, if any
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Suppress { source }
            | Self::Restore { source }
            | Self::LocaleOverride { source }
            | Self::DescriptorDup { source, .. } => source.raw_os_error(),
            Self::BadDescriptor { .. } => Some(libc::EBADF),
            Self::FlagsOutOfRange { .. } => Some(libc::EINVAL),
            Self::NotImplemented => Some(libc::ENOSYS),
            Self::Native { errno, .. } => *errno,
            _ => None,
        }
    }

    /// Returns true if the error was raised locally, before any native call
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Native { .. })
    }
}
