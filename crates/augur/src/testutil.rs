//! Shared test support: an instrumented stub backend and a lock that
//! serializes tests touching process-global stderr/locale state.

use libc::c_int;
use std::cell::{Cell, RefCell};
use std::ffi::CStr;
use std::os::unix::io::RawFd;
use std::sync::{Mutex, MutexGuard};

use crate::native::{FlagsArg, NativeLibrary};

static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that override standard error or the locale.
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Instrumented in-memory stand-in for the native library.
///
/// Counts every native invocation, records the argument shapes it was
/// handed, and can simulate the defective behaviors the dispatcher works
/// around: closing a received descriptor and writing diagnostics to the
/// standard-error descriptor mid-call.
pub(crate) struct StubNative {
    pub(crate) calls: Cell<u32>,
    pub(crate) last_flags_arg: Cell<Option<FlagsArg>>,
    pub(crate) last_database: RefCell<Option<String>>,
    pub(crate) received_fd: Cell<Option<RawFd>>,

    /// Close the descriptor handed to `descriptor`, like defective releases
    pub(crate) close_received_fd: bool,
    /// Bytes written to descriptor 2 during every guarded entry point
    pub(crate) write_to_stderr: Option<&'static [u8]>,

    pub(crate) load_result: c_int,
    pub(crate) setflags_result: c_int,
    pub(crate) file_result: Option<String>,
    pub(crate) buffer_result: Option<String>,
    pub(crate) descriptor_result: Option<String>,
    pub(crate) path_result: Option<String>,
    pub(crate) version: c_int,
    pub(crate) error_message: Option<String>,
    pub(crate) errno: c_int,
}

impl Default for StubNative {
    fn default() -> Self {
        Self {
            calls: Cell::new(0),
            last_flags_arg: Cell::new(None),
            last_database: RefCell::new(None),
            received_fd: Cell::new(None),
            close_received_fd: false,
            write_to_stderr: None,
            load_result: 0,
            setflags_result: 0,
            file_result: Some("ASCII text".to_string()),
            buffer_result: Some("ASCII text".to_string()),
            descriptor_result: Some("ASCII text".to_string()),
            path_result: Some("/usr/share/misc/magic:/etc/magic".to_string()),
            version: 540,
            error_message: None,
            errno: 0,
        }
    }
}

impl StubNative {
    fn record(&self, database: Option<&CStr>, flags: FlagsArg) {
        self.calls.set(self.calls.get() + 1);
        self.last_flags_arg.set(Some(flags));
        *self.last_database.borrow_mut() =
            database.map(|db| db.to_string_lossy().into_owned());
        self.emit_diagnostics();
    }

    fn emit_diagnostics(&self) {
        if let Some(bytes) = self.write_to_stderr {
            unsafe {
                libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
            }
        }
    }
}

impl NativeLibrary for StubNative {
    fn load(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int {
        self.record(database, flags);
        self.load_result
    }

    fn compile(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int {
        self.record(database, flags);
        self.load_result
    }

    fn check(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int {
        self.record(database, flags);
        self.load_result
    }

    fn file(&self, path: &CStr, flags: FlagsArg) -> Option<String> {
        self.record(Some(path), flags);
        self.file_result.clone()
    }

    fn buffer(&self, _data: &[u8], flags: FlagsArg) -> Option<String> {
        self.record(None, flags);
        self.buffer_result.clone()
    }

    fn descriptor(&self, fd: RawFd, flags: FlagsArg) -> Option<String> {
        self.record(None, flags);
        self.received_fd.set(Some(fd));
        if self.close_received_fd {
            unsafe {
                libc::close(fd);
            }
        }
        self.descriptor_result.clone()
    }

    fn database_path(&self) -> Option<String> {
        self.calls.set(self.calls.get() + 1);
        self.path_result.clone()
    }

    fn version(&self) -> c_int {
        self.calls.set(self.calls.get() + 1);
        self.version
    }

    fn set_flags(&self, _flags: c_int) -> c_int {
        self.calls.set(self.calls.get() + 1);
        self.setflags_result
    }

    fn last_error(&self) -> Option<String> {
        self.error_message.clone()
    }

    fn last_errno(&self) -> c_int {
        self.errno
    }
}
