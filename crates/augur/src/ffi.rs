//! Bindings to the system libmagic (cargo feature `libmagic`).
//!
//! [`Libmagic`] owns a native handle for its whole lifetime and implements
//! the [`NativeLibrary`] seam over it. The linked library exposes one
//! compiled-in signature per entry point; the modern
//! [`FlagsArg::WithFlags`] variant is realized by applying the flag set to
//! the handle immediately before the legacy-arity call.

use libc::{c_char, c_int, c_void, size_t};
use std::ffi::CStr;
use std::os::unix::io::RawFd;
use std::ptr;

use crate::error::{Error, Result};
use crate::flags::Flags;
use crate::native::{FlagsArg, NativeLibrary};

#[repr(C)]
struct MagicSet {
    _private: [u8; 0],
}

#[allow(non_camel_case_types)]
type magic_t = *mut MagicSet;

#[link(name = "magic")]
extern "C" {
    fn magic_open(flags: c_int) -> magic_t;
    fn magic_close(cookie: magic_t);
    fn magic_error(cookie: magic_t) -> *const c_char;
    fn magic_errno(cookie: magic_t) -> c_int;
    fn magic_getpath(magicfile: *const c_char, action: c_int) -> *const c_char;
    fn magic_file(cookie: magic_t, filename: *const c_char) -> *const c_char;
    fn magic_buffer(cookie: magic_t, buffer: *const c_void, length: size_t) -> *const c_char;
    fn magic_descriptor(cookie: magic_t, fd: c_int) -> *const c_char;
    fn magic_load(cookie: magic_t, magicfile: *const c_char) -> c_int;
    fn magic_compile(cookie: magic_t, magicfile: *const c_char) -> c_int;
    fn magic_check(cookie: magic_t, magicfile: *const c_char) -> c_int;
    fn magic_setflags(cookie: magic_t, flags: c_int) -> c_int;
    fn magic_version() -> c_int;
}

/// The release number of the linked library (`major * 100 + minor`).
pub fn library_version() -> c_int {
    unsafe { magic_version() }
}

fn opt_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: the library hands back NUL-terminated strings it owns; the
    // contents are copied out before the next library call can invalidate
    // them.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn db_ptr(database: Option<&CStr>) -> *const c_char {
    database.map_or(ptr::null(), CStr::as_ptr)
}

/// An open handle to the system libmagic.
///
/// The handle is not thread-safe; callers serialize, as with every other
/// path through this crate.
pub struct Libmagic {
    cookie: magic_t,
}

impl Libmagic {
    /// Opens a native handle with no flags set.
    pub fn open() -> Result<Self> {
        let cookie = unsafe { magic_open(Flags::NONE.bits()) };
        if cookie.is_null() {
            return Err(Error::native(
                Some(libc::EPERM),
                "failed to initialize the magic library",
            ));
        }
        Ok(Self { cookie })
    }

    fn apply(&self, flags: FlagsArg) {
        if let Some(value) = flags.value() {
            unsafe {
                magic_setflags(self.cookie, value);
            }
        }
    }
}

impl Drop for Libmagic {
    fn drop(&mut self) {
        unsafe {
            magic_close(self.cookie);
        }
    }
}

impl NativeLibrary for Libmagic {
    fn load(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int {
        self.apply(flags);
        unsafe { magic_load(self.cookie, db_ptr(database)) }
    }

    fn compile(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int {
        self.apply(flags);
        unsafe { magic_compile(self.cookie, db_ptr(database)) }
    }

    fn check(&self, database: Option<&CStr>, flags: FlagsArg) -> c_int {
        self.apply(flags);
        unsafe { magic_check(self.cookie, db_ptr(database)) }
    }

    fn file(&self, path: &CStr, flags: FlagsArg) -> Option<String> {
        self.apply(flags);
        opt_string(unsafe { magic_file(self.cookie, path.as_ptr()) })
    }

    fn buffer(&self, data: &[u8], flags: FlagsArg) -> Option<String> {
        self.apply(flags);
        opt_string(unsafe { magic_buffer(self.cookie, data.as_ptr().cast(), data.len()) })
    }

    fn descriptor(&self, fd: RawFd, flags: FlagsArg) -> Option<String> {
        self.apply(flags);
        opt_string(unsafe { magic_descriptor(self.cookie, fd) })
    }

    fn database_path(&self) -> Option<String> {
        opt_string(unsafe { magic_getpath(ptr::null(), 0) })
    }

    fn version(&self) -> c_int {
        library_version()
    }

    fn set_flags(&self, flags: c_int) -> c_int {
        unsafe { magic_setflags(self.cookie, flags) }
    }

    fn last_error(&self) -> Option<String> {
        opt_string(unsafe { magic_error(self.cookie) })
    }

    fn last_errno(&self) -> c_int {
        unsafe { magic_errno(self.cookie) }
    }
}
