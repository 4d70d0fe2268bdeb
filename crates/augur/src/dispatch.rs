//! Version-tolerant dispatch onto the native library.
//!
//! One normalized operation per native capability. Every operation follows
//! the same template: acquire the guard scopes the operation needs, invoke
//! the native entry point with a normalized argument list, release the
//! scopes on all paths, and return the native result, overridden only
//! where a known defect of the linked release demands it.
//!
//! The dispatcher holds no lock; callers serialize around it (see the
//! crate-level concurrency notes).

use libc::c_int;
use std::ffi::CStr;
use std::os::unix::io::RawFd;
use tracing::{debug, trace};

use crate::caps::VersionCapabilities;
use crate::error::{Error, Result};
use crate::fdio;
use crate::guard::{with_fixed_locale, with_output_suppressed};
use crate::native::{FlagsArg, NativeLibrary};

/// Normalized, guarded access to a native library backend.
#[derive(Debug)]
pub struct Dispatcher<N> {
    native: N,
    caps: VersionCapabilities,
}

impl<N: NativeLibrary> Dispatcher<N> {
    /// Creates a dispatcher over `native` with the given capability table.
    pub fn new(native: N, caps: VersionCapabilities) -> Self {
        Self { native, caps }
    }

    /// The capability table in effect for every dispatched call.
    pub fn capabilities(&self) -> &VersionCapabilities {
        &self.caps
    }

    /// The wrapped backend.
    pub fn native(&self) -> &N {
        &self.native
    }

    /// Consumes the dispatcher, returning the backend.
    pub fn into_inner(self) -> N {
        self.native
    }

    fn normalized(&self, flags: c_int) -> FlagsArg {
        if self.caps.flags_argument {
            FlagsArg::WithFlags(flags)
        } else {
            FlagsArg::WithoutFlags
        }
    }

    /// Runs a native call inside the fixed-locale and output-suppression
    /// scopes, releasing both whatever the call does.
    fn guarded<T>(&self, f: impl FnOnce(&N) -> T) -> T {
        with_fixed_locale(|| with_output_suppressed(&self.caps, || f(&self.native)))
    }

    fn native_err(&self) -> Error {
        let errno = self.native.last_errno();
        Error::native(
            (errno != 0).then_some(errno),
            self.native
                .last_error()
                .unwrap_or_else(|| "unknown error".to_string()),
        )
    }

    /// Loads rule databases from a colon-separated path list, or the
    /// default database when `database` is `None`.
    pub fn load(&self, database: Option<&CStr>, flags: c_int) -> Result<()> {
        trace!(?database, flags, "loading rule database");
        let rv = self.guarded(|n| n.load(database, self.normalized(flags)));
        if rv < 0 {
            return Err(self.native_err());
        }
        Ok(())
    }

    /// Compiles rule databases.
    pub fn compile(&self, database: Option<&CStr>, flags: c_int) -> Result<()> {
        trace!(?database, flags, "compiling rule database");
        let rv = self.guarded(|n| n.compile(database, self.normalized(flags)));
        if rv < 0 {
            return Err(self.native_err());
        }
        Ok(())
    }

    /// Validates rule databases.
    pub fn check(&self, database: Option<&CStr>, flags: c_int) -> Result<()> {
        trace!(?database, flags, "checking rule database");
        let rv = self.guarded(|n| n.check(database, self.normalized(flags)));
        if rv < 0 {
            return Err(self.native_err());
        }
        Ok(())
    }

    /// Classifies the file at `path`.
    pub fn file(&self, path: &CStr, flags: c_int) -> Result<String> {
        trace!(?path, flags, "classifying named file");
        self.guarded(|n| n.file(path, self.normalized(flags)))
            .ok_or_else(|| self.native_err())
    }

    /// Classifies an in-memory buffer.
    pub fn buffer(&self, data: &[u8], flags: c_int) -> Result<String> {
        trace!(len = data.len(), flags, "classifying buffer");
        self.guarded(|n| n.buffer(data, self.normalized(flags)))
            .ok_or_else(|| self.native_err())
    }

    /// Classifies the open descriptor `fd`.
    ///
    /// On library releases in the defective range the descriptor is
    /// duplicated first (those releases close or otherwise invalidate the
    /// descriptor they are handed) and the duplicate is closed afterwards
    /// only if it is still valid, so a descriptor the native call already
    /// closed is never closed twice.
    pub fn descriptor(&self, fd: RawFd, flags: c_int) -> Result<String> {
        trace!(fd, flags, "classifying descriptor");
        if !fdio::is_valid(fd, self.caps.fd_flags_query) {
            return Err(Error::BadDescriptor { fd });
        }

        if !self.caps.broken_descriptor {
            return self
                .guarded(|n| n.descriptor(fd, self.normalized(flags)))
                .ok_or_else(|| self.native_err());
        }

        debug!(fd, "defective release; classifying a duplicate descriptor");
        let dup = fdio::dup_cloexec(fd, self.caps.atomic_dup_cloexec)
            .map_err(|source| Error::DescriptorDup { fd, source })?;
        let result = self.guarded(|n| n.descriptor(dup, self.normalized(flags)));
        if fdio::is_valid(dup, self.caps.fd_flags_query) {
            let _ = fdio::close_quietly(dup);
        }
        result.ok_or_else(|| self.native_err())
    }

    /// Queries the default database search path. Does not invoke the
    /// classifier, so no guard scope is taken.
    pub fn database_path(&self) -> Result<String> {
        self.native
            .database_path()
            .ok_or_else(|| Error::native(None, "unknown or empty database path"))
    }

    /// Queries the library release number.
    ///
    /// When the linked release predates the version query there is nothing
    /// correct to call; the request is rejected locally.
    pub fn version(&self) -> Result<c_int> {
        if !self.caps.version_query {
            return Err(Error::NotImplemented);
        }
        Ok(self.native.version())
    }

    /// Installs a behavior-flag set on the native handle.
    ///
    /// Values outside the recognized range are rejected locally with an
    /// invalid-argument error rather than forwarded; out-of-range values
    /// corrupt native state in some releases.
    pub fn set_flags(&self, flags: c_int) -> Result<()> {
        if flags < self.caps.min_flags || flags > self.caps.max_flags {
            return Err(Error::FlagsOutOfRange {
                flags,
                min: self.caps.min_flags,
                max: self.caps.max_flags,
            });
        }
        let rv = self.native.set_flags(flags);
        if rv < 0 {
            return Err(self.native_err());
        }
        Ok(())
    }
}
