//! Standard-error suppression.

use std::os::unix::io::RawFd;
use std::sync::atomic::Ordering;
use tracing::{trace, warn};

use super::{GuardStatus, OUTPUT_ACTIVE};
use crate::caps::VersionCapabilities;
use crate::error::{Error, Result};
use crate::fdio;

/// Save-state for the standard-error destination.
///
/// Created immediately before a native call that may emit diagnostics and
/// destroyed by [`release`](Self::release) regardless of how that call went.
/// While installed, writes to standard error land in the discard device;
/// the original destination is held as a duplicated descriptor and
/// reinstated on release.
#[derive(Debug)]
pub struct SavedOutput {
    /// Duplicate of the original standard-error descriptor, owned
    /// exclusively until restored
    previous: Option<RawFd>,
    /// Descriptor of the discard destination, owned exclusively and closed
    /// once installed
    redirect: Option<RawFd>,
    /// Byte offset of the original stream, when it was seekable
    position: Option<libc::c_long>,
    status: GuardStatus,
}

impl SavedOutput {
    /// Redirects standard error to the discard device.
    ///
    /// Fails without side effects when an output override is already
    /// installed in this process. On any step failure after the original
    /// descriptor was duplicated, the duplicate is reinstalled and all
    /// temporaries closed before the error is returned; standard error is
    /// never left redirected by a failed acquire.
    pub fn acquire(caps: &VersionCapabilities) -> Result<Self> {
        if OUTPUT_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::OverrideActive {
                kind: "standard-error",
            });
        }

        match Self::install(caps) {
            Ok(state) => Ok(state),
            Err(err) => {
                OUTPUT_ACTIVE.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    fn install(caps: &VersionCapabilities) -> Result<Self> {
        let mut state = Self {
            previous: None,
            redirect: None,
            position: None,
            status: GuardStatus::Uninitialized,
        };

        fdio::flush_stderr();
        state.position = fdio::stderr_position();

        let previous = match fdio::dup_cloexec(fdio::STDERR_FD, caps.atomic_dup_cloexec) {
            Ok(fd) => fd,
            Err(err) => {
                state.status = GuardStatus::Failed(err.raw_os_error().unwrap_or(0));
                return Err(Error::suppress(err));
            }
        };
        state.previous = Some(previous);

        let redirect = match fdio::open_discard() {
            Ok(fd) => fd,
            Err(err) => {
                let _ = fdio::install(previous, fdio::STDERR_FD);
                let _ = fdio::close_quietly(previous);
                state.previous = None;
                state.status = GuardStatus::Failed(err.raw_os_error().unwrap_or(0));
                return Err(Error::suppress(err));
            }
        };
        state.redirect = Some(redirect);

        if let Err(err) = fdio::install(redirect, fdio::STDERR_FD) {
            let _ = fdio::close_quietly(redirect);
            let _ = fdio::install(previous, fdio::STDERR_FD);
            let _ = fdio::close_quietly(previous);
            state.previous = None;
            state.redirect = None;
            state.status = GuardStatus::Failed(err.raw_os_error().unwrap_or(0));
            return Err(Error::suppress(err));
        }

        // The discard device is reachable through descriptor 2 now; the
        // extra handle has served its purpose.
        let _ = fdio::close_quietly(redirect);
        state.redirect = None;
        state.status = GuardStatus::Installed;

        trace!(position = ?state.position, "standard-error output suppressed");
        Ok(state)
    }

    /// Reinstates the original standard-error destination.
    ///
    /// Reinstalls the duplicated descriptor, closes it, clears the stream
    /// error flag, restores the recorded position, and forces the stream
    /// unbuffered. Calling release on a record whose acquire failed is a
    /// no-op that reports the failure without side effects.
    pub fn release(mut self) -> Result<()> {
        self.restore()
    }

    /// Outcome of the acquire attempt this record belongs to.
    pub fn status(&self) -> GuardStatus {
        self.status
    }

    fn restore(&mut self) -> Result<()> {
        if self.status != GuardStatus::Installed {
            return Err(Error::NotInstalled {
                kind: "standard-error",
            });
        }
        let Some(previous) = self.previous.take() else {
            return Err(Error::NotInstalled {
                kind: "standard-error",
            });
        };

        // The scope ends here even if restoration stumbles below; keeping
        // the process-wide flag set would lock every later caller out.
        self.status = GuardStatus::Uninitialized;
        OUTPUT_ACTIVE.store(false, Ordering::Release);

        fdio::flush_stderr();
        fdio::install(previous, fdio::STDERR_FD).map_err(Error::restore)?;
        let _ = fdio::close_quietly(previous);
        fdio::reset_stderr_stream(self.position).map_err(Error::restore)?;

        trace!("standard-error output restored");
        Ok(())
    }
}

impl Drop for SavedOutput {
    fn drop(&mut self) {
        if self.status == GuardStatus::Installed {
            warn!("standard-error override dropped without release; restoring");
            if let Err(err) = self.restore() {
                warn!("failed to restore standard error: {err}");
            }
        }
    }
}
