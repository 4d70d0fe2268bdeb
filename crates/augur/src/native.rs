//! The seam between the dispatcher and the native library.
//!
//! Every native entry point the shim mediates is expressed as a method on
//! [`NativeLibrary`]. The real backend (see the `ffi` module, cargo feature
//! `libmagic`) implements it against the system library; tests implement it
//! with instrumented stubs. The dispatcher never calls the native library
//! any other way.

use libc::c_int;
use std::ffi::CStr;
use std::os::unix::io::RawFd;

/// How the trailing flags argument reaches a native entry point.
///
/// Native releases differ: some accept a trailing flags argument on the
/// database and classification calls, some expose only the legacy arity
/// where the handle's own flag set applies. The dispatcher selects the
/// variant once per call from the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagsArg {
    /// Modern signature: flags passed as the final argument
    WithFlags(c_int),
    /// Legacy signature: no trailing argument
    WithoutFlags,
}

impl FlagsArg {
    /// Returns the carried flags value, if any
    pub fn value(self) -> Option<c_int> {
        match self {
            Self::WithFlags(flags) => Some(flags),
            Self::WithoutFlags => None,
        }
    }
}

/// The native content-identification library, viewed through the entry
/// points this shim mediates.
///
/// Return conventions follow the native API: integer entry points return a
/// negative value on failure, string entry points return `None`, and the
/// failure details are fetched afterwards through
/// [`last_error`](Self::last_error) and [`last_errno`](Self::last_errno).
///
/// Implementations are not required to be thread-safe; callers serialize
/// (see the crate-level concurrency notes).
pub trait NativeLibrary {
    /// Load rule databases from a colon-separated path list, or the default
    /// database when `database` is `None`
    fn load(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int;

    /// Compile rule databases
    fn compile(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int;

    /// Validate rule databases
    fn check(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int;

    /// Classify the file at `path`
    fn file(&self, path: &CStr, flags: FlagsArg) -> Option<String>;

    /// Classify an in-memory buffer
    fn buffer(&self, data: &[u8], flags: FlagsArg) -> Option<String>;

    /// Classify the open descriptor `fd`
    fn descriptor(&self, fd: RawFd, flags: FlagsArg) -> Option<String>;

    /// The default database search path
    fn database_path(&self) -> Option<String>;

    /// The library release number (`major * 100 + minor`)
    fn version(&self) -> c_int;

    /// Install a behavior-flag set on the native handle
    fn set_flags(&self, flags: c_int) -> c_int;

    /// The error text of the most recent failure, if any
    fn last_error(&self) -> Option<String>;

    /// The errno of the most recent failure, or 0
    fn last_errno(&self) -> c_int;
}
