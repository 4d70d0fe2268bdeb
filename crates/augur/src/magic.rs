//! High-level handle over the dispatcher.
//!
//! [`Magic`] is the surface a managed caller works with: it owns a
//! [`Dispatcher`], tracks the flag set applied to subsequent operations,
//! caches the loaded database path list, and normalizes the result quirks
//! of older library releases so callers see one consistent contract.

use libc::c_int;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::caps::{FILE_ERROR_FIX_VERSION, VersionCapabilities};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::flags::Flags;
use crate::native::NativeLibrary;

/// A handle to the native content-identification library.
pub struct Magic<N> {
    dispatcher: Dispatcher<N>,
    flags: Flags,
    paths: Vec<String>,
}

impl<N: NativeLibrary> Magic<N> {
    /// Creates a handle over an already-opened backend.
    pub fn from_backend(native: N, caps: VersionCapabilities) -> Self {
        Self {
            dispatcher: Dispatcher::new(native, caps),
            flags: Flags::NONE,
            paths: Vec::new(),
        }
    }

    /// The dispatcher behind this handle.
    pub fn dispatcher(&self) -> &Dispatcher<N> {
        &self.dispatcher
    }

    /// The flag set applied to subsequent operations.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Installs a new flag set, keeping the local copy in sync with the
    /// native handle.
    pub fn set_flags(&mut self, flags: Flags) -> Result<()> {
        self.dispatcher.set_flags(flags.bits())?;
        self.flags = flags;
        Ok(())
    }

    /// Loads rule databases, or the default database when `databases` is
    /// empty. On success the loaded path list is remembered.
    pub fn load<S: AsRef<str>>(&mut self, databases: &[S]) -> Result<()> {
        let joined = join_databases(databases)?;
        self.dispatcher
            .load(joined.as_deref(), self.flags.bits())?;
        self.paths = match joined {
            Some(list) => split_path_list(&list.to_string_lossy()),
            None => self
                .dispatcher
                .database_path()
                .map(|raw| split_path_list(&raw))
                .unwrap_or_default(),
        };
        Ok(())
    }

    /// Compiles rule databases.
    pub fn compile<S: AsRef<str>>(&self, databases: &[S]) -> Result<()> {
        let joined = join_databases(databases)?;
        self.dispatcher.compile(joined.as_deref(), self.flags.bits())
    }

    /// Validates rule databases.
    pub fn check<S: AsRef<str>>(&self, databases: &[S]) -> Result<()> {
        let joined = join_databases(databases)?;
        self.dispatcher.check(joined.as_deref(), self.flags.bits())
    }

    /// The database search path, split on the list separator.
    ///
    /// The list remembered by [`load`](Self::load) is served from cache
    /// unless the `MAGIC` environment variable overrides the search path.
    pub fn database_path(&mut self) -> Result<&[String]> {
        if !self.paths.is_empty() && std::env::var_os("MAGIC").is_none() {
            return Ok(&self.paths);
        }
        let raw = self.dispatcher.database_path()?;
        self.paths = split_path_list(&raw);
        Ok(&self.paths)
    }

    /// Classifies the file at `path`.
    pub fn file(&self, path: impl AsRef<Path>) -> Result<String> {
        let cpath = cstring_from_path(path.as_ref())?;
        match self.dispatcher.file(&cpath, self.flags.bits()) {
            Ok(text) => normalize_result(text),
            Err(err) => self.recover_file_result(err),
        }
    }

    /// Classifies an in-memory buffer.
    pub fn buffer(&self, data: &[u8]) -> Result<String> {
        self.dispatcher.buffer(data, self.flags.bits())
    }

    /// Classifies the open descriptor `fd`.
    pub fn descriptor(&self, fd: std::os::unix::io::RawFd) -> Result<String> {
        self.dispatcher.descriptor(fd, self.flags.bits())
    }

    /// The library release number.
    pub fn version(&self) -> Result<c_int> {
        self.dispatcher.version()
    }

    /// The library release formatted as `major.minor`.
    pub fn version_string(&self) -> Result<String> {
        Ok(version_string(self.version()?))
    }

    // Releases before 5.15 report soft classify-by-name failures through
    // the error text channel instead of the result. When the caller did not
    // opt into strict error reporting, that text is the answer.
    fn recover_file_result(&self, err: Error) -> Result<String> {
        if self.flags.contains(Flags::ERROR) {
            return Err(err);
        }
        let version = self.dispatcher.version().unwrap_or(-1);
        if version >= FILE_ERROR_FIX_VERSION {
            return Err(err);
        }
        match err {
            Error::Native { message, .. } => normalize_result(message),
            other => Err(other),
        }
    }
}

impl<N> std::fmt::Debug for Magic<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Magic")
            .field("flags", &self.flags)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

/// Formats a release number in the native `major * 100 + minor` convention
/// as `major.minor`, e.g. `523` as `"5.23"`.
pub fn version_string(version: c_int) -> String {
    format!("{}.{:02}", version / 100, version % 100)
}

fn normalize_result(text: String) -> Result<String> {
    if text.is_empty() || text == "(null)" {
        return Err(Error::native(None, "unknown or invalid result"));
    }
    Ok(text)
}

fn join_databases<S: AsRef<str>>(databases: &[S]) -> Result<Option<CString>> {
    if databases.is_empty() {
        return Ok(None);
    }
    let parts: Vec<&str> = databases.iter().map(|s| s.as_ref()).collect();
    CString::new(parts.join(":"))
        .map(Some)
        .map_err(|_| Error::invalid_argument("database path contains an interior NUL byte"))
}

fn split_path_list(raw: &str) -> Vec<String> {
    raw.split(':').map(str::to_owned).collect()
}

fn cstring_from_path(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::invalid_argument("path contains an interior NUL byte"))
}

#[cfg(feature = "libmagic")]
mod convenience {
    use super::*;
    use crate::ffi::Libmagic;

    impl Magic<Libmagic> {
        /// Opens the system library and loads the given rule databases, or
        /// the default database when `databases` is empty.
        pub fn new<S: AsRef<str>>(databases: &[S]) -> Result<Self> {
            let native = Libmagic::open()?;
            let caps = VersionCapabilities::from_version(crate::ffi::library_version());
            let mut magic = Self::from_backend(native, caps);
            magic.load(databases)?;
            Ok(magic)
        }
    }

    fn classify<S: AsRef<str>>(
        flags: Flags,
        databases: &[S],
        run: impl FnOnce(&Magic<Libmagic>) -> Result<String>,
    ) -> Result<String> {
        let mut magic = Magic::new(databases)?;
        magic.set_flags(flags)?;
        run(&magic)
    }

    /// Classifies a file, returning its MIME type and encoding.
    pub fn file_mime<S: AsRef<str>>(path: impl AsRef<Path>, databases: &[S]) -> Result<String> {
        classify(Flags::MIME, databases, |m| m.file(path))
    }

    /// Classifies a file, returning its MIME type.
    pub fn file_type<S: AsRef<str>>(path: impl AsRef<Path>, databases: &[S]) -> Result<String> {
        classify(Flags::MIME_TYPE, databases, |m| m.file(path))
    }

    /// Classifies a file, returning its MIME encoding.
    pub fn file_encoding<S: AsRef<str>>(
        path: impl AsRef<Path>,
        databases: &[S],
    ) -> Result<String> {
        classify(Flags::MIME_ENCODING, databases, |m| m.file(path))
    }

    /// Classifies a buffer, returning its MIME type and encoding.
    pub fn buffer_mime<S: AsRef<str>>(data: &[u8], databases: &[S]) -> Result<String> {
        classify(Flags::MIME, databases, |m| m.buffer(data))
    }

    /// Classifies a buffer, returning its MIME type.
    pub fn buffer_type<S: AsRef<str>>(data: &[u8], databases: &[S]) -> Result<String> {
        classify(Flags::MIME_TYPE, databases, |m| m.buffer(data))
    }

    /// Classifies a buffer, returning its MIME encoding.
    pub fn buffer_encoding<S: AsRef<str>>(data: &[u8], databases: &[S]) -> Result<String> {
        classify(Flags::MIME_ENCODING, databases, |m| m.buffer(data))
    }
}

#[cfg(feature = "libmagic")]
pub use convenience::{
    buffer_encoding, buffer_mime, buffer_type, file_encoding, file_mime, file_type,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, StubNative};
    use pretty_assertions::assert_eq;

    fn magic(stub: StubNative) -> Magic<StubNative> {
        Magic::from_backend(stub, VersionCapabilities::detect())
    }

    #[test]
    fn test_set_flags_updates_cached_copy() {
        let mut m = magic(StubNative::default());
        m.set_flags(Flags::MIME_TYPE | Flags::SYMLINK).unwrap();
        assert_eq!(m.flags(), Flags::MIME_TYPE | Flags::SYMLINK);
    }

    #[test]
    fn test_set_flags_failure_leaves_cached_copy() {
        let stub = StubNative {
            setflags_result: -1,
            error_message: Some("flag rejected".into()),
            ..StubNative::default()
        };
        let mut m = magic(stub);
        assert!(m.set_flags(Flags::MIME_TYPE).is_err());
        assert_eq!(m.flags(), Flags::NONE);
    }

    #[test]
    fn test_load_joins_databases() {
        let _serial = testutil::serial();
        std::env::remove_var("MAGIC");
        let mut m = magic(StubNative::default());
        m.load(&["/tmp/custom.mgc", "/tmp/extra.mgc"]).unwrap();
        assert_eq!(
            m.dispatcher().native().last_database.borrow().as_deref(),
            Some("/tmp/custom.mgc:/tmp/extra.mgc")
        );
        assert_eq!(
            m.database_path().unwrap().to_vec(),
            vec!["/tmp/custom.mgc".to_string(), "/tmp/extra.mgc".to_string()]
        );
    }

    #[test]
    fn test_load_default_database_caches_search_path() {
        let _serial = testutil::serial();
        std::env::remove_var("MAGIC");
        let mut m = magic(StubNative::default());
        m.load::<&str>(&[]).unwrap();
        assert!(m.dispatcher().native().last_database.borrow().is_none());
        assert_eq!(
            m.database_path().unwrap().to_vec(),
            vec!["/usr/share/misc/magic".to_string(), "/etc/magic".to_string()]
        );
    }

    #[test]
    fn test_file_rejects_empty_result() {
        let _serial = testutil::serial();
        let stub = StubNative {
            file_result: Some(String::new()),
            ..StubNative::default()
        };
        let err = magic(stub).file("/tmp/sample").unwrap_err();
        assert!(err.to_string().contains("unknown or invalid result"));
    }

    #[test]
    fn test_file_rejects_null_placeholder() {
        let _serial = testutil::serial();
        let stub = StubNative {
            file_result: Some("(null)".into()),
            ..StubNative::default()
        };
        assert!(magic(stub).file("/tmp/sample").is_err());
    }

    #[test]
    fn test_file_recovers_error_text_on_old_release() {
        let _serial = testutil::serial();
        let stub = StubNative {
            file_result: None,
            error_message: Some("cannot open `/tmp/sample' (No such file)".into()),
            errno: libc::ENOENT,
            version: 514,
            ..StubNative::default()
        };
        let m = Magic::from_backend(stub, VersionCapabilities::from_version(514));
        let result = m.file("/tmp/sample").unwrap();
        assert_eq!(result, "cannot open `/tmp/sample' (No such file)");
    }

    #[test]
    fn test_file_propagates_error_on_fixed_release() {
        let _serial = testutil::serial();
        let stub = StubNative {
            file_result: None,
            error_message: Some("cannot open `/tmp/sample' (No such file)".into()),
            errno: libc::ENOENT,
            version: 515,
            ..StubNative::default()
        };
        let m = Magic::from_backend(stub, VersionCapabilities::from_version(515));
        assert!(m.file("/tmp/sample").is_err());
    }

    #[test]
    fn test_file_honors_strict_error_flag() {
        let _serial = testutil::serial();
        let stub = StubNative {
            file_result: None,
            error_message: Some("cannot open".into()),
            version: 514,
            ..StubNative::default()
        };
        let mut m = Magic::from_backend(stub, VersionCapabilities::from_version(514));
        m.set_flags(Flags::ERROR).unwrap();
        assert!(m.file("/tmp/sample").is_err());
    }

    #[test]
    fn test_file_rejects_interior_nul() {
        let err = magic(StubNative::default())
            .file("/tmp/sam\0ple")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_version_string_formatting() {
        assert_eq!(version_string(523), "5.23");
        assert_eq!(version_string(540), "5.40");
        assert_eq!(version_string(501), "5.01");
    }

    #[test]
    fn test_version_string_via_handle() {
        let stub = StubNative {
            version: 523,
            ..StubNative::default()
        };
        assert_eq!(magic(stub).version_string().unwrap(), "5.23");
    }
}
