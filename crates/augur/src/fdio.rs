//! Low-level descriptor and stream primitives.
//!
//! Safe-duplicate, safe-close, and validity-check operations used by the
//! resource guards and by the descriptor-classification workaround, plus a
//! handful of helpers for the C library's standard-error stream (the native
//! detector writes its diagnostics through C stdio, not through Rust's
//! buffered handle).

use std::io;
use std::os::unix::io::RawFd;
use tracing::trace;

/// The standard-error descriptor
pub(crate) const STDERR_FD: RawFd = libc::STDERR_FILENO;

// The C library's stderr stream object. Glibc and musl export the FILE
// pointer as `stderr`; the BSD family names it `__stderrp`.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
extern "C" {
    #[link_name = "__stderrp"]
    static mut C_STDERR: *mut libc::FILE;
}

#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd")))]
extern "C" {
    #[link_name = "stderr"]
    static mut C_STDERR: *mut libc::FILE;
}

fn stderr_stream() -> *mut libc::FILE {
    // SAFETY: the C runtime initializes the stream pointer before main and
    // never moves it; only the pointer value is read here.
    unsafe { std::ptr::addr_of!(C_STDERR).read() }
}

/// Returns true if `fd` refers to an open descriptor.
///
/// A descriptor is treated as valid when it is non-negative and querying its
/// descriptor flags does not fail with EBADF. Any other query failure leaves
/// the descriptor classified as valid; the caller sees that error on its own
/// next operation.
///
/// When the platform cannot query descriptor flags (`queryable` is false),
/// only the sign check applies.
pub fn is_valid(fd: RawFd, queryable: bool) -> bool {
    if fd < 0 {
        return false;
    }
    if !queryable {
        return true;
    }
    let rv = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if rv < 0 {
        return io::Error::last_os_error().raw_os_error() != Some(libc::EBADF);
    }
    true
}

/// Marks `fd` close-on-exec as a separate step.
fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Duplicates `fd` to a slot above the standard-stream range with the
/// close-on-exec attribute set.
///
/// When `atomic` is true the duplicate-and-mark happens in one operation;
/// otherwise the descriptor is duplicated first and marked second. The
/// two-step form can leave the duplicate open if the mark step fails; that
/// failure is surfaced to the caller rather than swallowed.
pub fn dup_cloexec(fd: RawFd, atomic: bool) -> io::Result<RawFd> {
    let floor = STDERR_FD + 1;

    if atomic {
        let new_fd = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, floor) };
        if new_fd >= 0 {
            return Ok(new_fd);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINVAL) {
            return Err(err);
        }
        // EINVAL means the command itself is unrecognized here; fall through
        // to the portable two-step form.
    }

    let mut new_fd = unsafe { libc::fcntl(fd, libc::F_DUPFD, floor) };
    if new_fd < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINVAL) {
            return Err(err);
        }
        new_fd = unsafe { libc::dup(fd) };
        if new_fd < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    // The duplicate stays open if marking fails; callers treat the error as
    // fatal for the whole operation.
    set_cloexec(new_fd)?;
    Ok(new_fd)
}

/// Closes `fd`, normalizing the interrupted-close edge case.
///
/// An EINTR from close means the operation completes asynchronously on every
/// platform this crate targets; retrying would risk closing a descriptor
/// reused by another thread. It is therefore reported as success.
pub fn close_quietly(fd: RawFd) -> io::Result<()> {
    let rv = unsafe { libc::close(fd) };
    if rv < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            trace!(fd, "close interrupted; completes on its own");
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

/// Installs `src` as descriptor `dst`.
pub(crate) fn install(src: RawFd, dst: RawFd) -> io::Result<()> {
    if unsafe { libc::dup2(src, dst) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Opens the discard device for writing, close-on-exec.
pub(crate) fn open_discard() -> io::Result<RawFd> {
    let fd = unsafe {
        libc::open(
            c"/dev/null".as_ptr(),
            libc::O_WRONLY | libc::O_APPEND | libc::O_CLOEXEC,
            0o777,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Flushes the C library's standard-error stream.
pub(crate) fn flush_stderr() {
    unsafe {
        libc::fflush(stderr_stream());
    }
}

/// Records the byte offset of the standard-error stream, when seekable.
pub(crate) fn stderr_position() -> Option<libc::c_long> {
    let pos = unsafe { libc::ftell(stderr_stream()) };
    (pos >= 0).then_some(pos)
}

/// Resets the standard-error stream after its descriptor was swapped back:
/// clears the error flag, restores the recorded position, and forces the
/// stream unbuffered (redirection may have changed its buffering).
pub(crate) fn reset_stderr_stream(position: Option<libc::c_long>) -> io::Result<()> {
    let stream = stderr_stream();
    unsafe {
        libc::clearerr(stream);
        if let Some(pos) = position {
            libc::fseek(stream, pos, libc::SEEK_SET);
        }
        if libc::setvbuf(stream, std::ptr::null_mut(), libc::_IONBF, 0) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use std::os::unix::io::AsRawFd;

    fn cloexec_set(fd: RawFd) -> bool {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        assert!(flags >= 0);
        flags & libc::FD_CLOEXEC != 0
    }

    #[test]
    fn test_is_valid_open_fd() {
        let _serial = testutil::serial();
        let file = tempfile::tempfile().unwrap();
        assert!(is_valid(file.as_raw_fd(), true));
    }

    #[test]
    fn test_is_valid_negative_fd() {
        assert!(!is_valid(-1, true));
        assert!(!is_valid(-1, false));
    }

    #[test]
    fn test_is_valid_closed_fd() {
        let _serial = testutil::serial();
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        drop(file);
        assert!(!is_valid(fd, true));
    }

    #[test]
    fn test_is_valid_without_query() {
        let _serial = testutil::serial();
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        drop(file);
        // Only the sign check applies
        assert!(is_valid(fd, false));
    }

    #[test]
    fn test_dup_cloexec_atomic() {
        let _serial = testutil::serial();
        let file = tempfile::tempfile().unwrap();
        let dup = dup_cloexec(file.as_raw_fd(), true).unwrap();
        assert!(dup > STDERR_FD);
        assert!(cloexec_set(dup));
        close_quietly(dup).unwrap();
    }

    #[test]
    fn test_dup_cloexec_two_step() {
        let _serial = testutil::serial();
        let file = tempfile::tempfile().unwrap();
        let dup = dup_cloexec(file.as_raw_fd(), false).unwrap();
        assert!(dup > STDERR_FD);
        assert!(cloexec_set(dup));
        close_quietly(dup).unwrap();
    }

    #[test]
    fn test_dup_cloexec_bad_fd() {
        let err = dup_cloexec(-1, true).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_close_quietly_bad_fd() {
        let _serial = testutil::serial();
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        drop(file);
        let err = close_quietly(fd).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_open_discard() {
        let _serial = testutil::serial();
        let fd = open_discard().unwrap();
        assert!(is_valid(fd, true));
        assert!(cloexec_set(fd));
        let written = unsafe { libc::write(fd, b"gone\n".as_ptr().cast(), 5) };
        assert_eq!(written, 5);
        close_quietly(fd).unwrap();
    }
}
