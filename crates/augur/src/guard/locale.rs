//! Fixed-locale override.
//!
//! The native library's numeric and date formatting in generated
//! descriptions follows the active locale. Pinning the portable "C" locale
//! for the duration of a call makes classification strings reproducible
//! regardless of the caller's environment.

use std::ptr;
use std::sync::atomic::Ordering;
use tracing::{trace, warn};

use super::{GuardStatus, LOCALE_ACTIVE};
use crate::error::{Error, Result};

/// Save-state for the active locale.
///
/// `previous` is a loan from the locale subsystem and is never freed here;
/// `installed` is the "C" locale object this record created, freed exactly
/// once, only after it has been made inactive again.
#[derive(Debug)]
pub struct SavedLocale {
    previous: libc::locale_t,
    installed: libc::locale_t,
    status: GuardStatus,
}

impl SavedLocale {
    /// Installs the portable "C" locale, retaining the previous one.
    ///
    /// Fails without side effects when a locale override is already
    /// installed, or when the locale object cannot be constructed or
    /// installed; no locale change is left in effect on any failure path.
    pub fn acquire() -> Result<Self> {
        if LOCALE_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::OverrideActive { kind: "locale" });
        }

        let installed =
            unsafe { libc::newlocale(libc::LC_ALL_MASK, c"C".as_ptr(), ptr::null_mut()) };
        if installed.is_null() {
            let source = std::io::Error::last_os_error();
            LOCALE_ACTIVE.store(false, Ordering::Release);
            return Err(Error::LocaleOverride { source });
        }

        let previous = unsafe { libc::uselocale(installed) };
        if previous.is_null() {
            let source = std::io::Error::last_os_error();
            unsafe { libc::freelocale(installed) };
            LOCALE_ACTIVE.store(false, Ordering::Release);
            return Err(Error::LocaleOverride { source });
        }

        trace!("fixed \"C\" locale installed");
        Ok(Self {
            previous,
            installed,
            status: GuardStatus::Installed,
        })
    }

    /// Reinstates the previously active locale, then frees the "C" locale
    /// object created at acquire time.
    ///
    /// Calling release on a record whose acquire never succeeded is a safe
    /// no-op returning failure.
    pub fn release(mut self) -> Result<()> {
        self.restore()
    }

    /// Outcome of the acquire attempt this record belongs to.
    pub fn status(&self) -> GuardStatus {
        self.status
    }

    fn restore(&mut self) -> Result<()> {
        if self.status != GuardStatus::Installed {
            return Err(Error::NotInstalled { kind: "locale" });
        }

        self.status = GuardStatus::Uninitialized;
        LOCALE_ACTIVE.store(false, Ordering::Release);

        if unsafe { libc::uselocale(self.previous) }.is_null() {
            // The created locale is still active; freeing it would pull the
            // locale out from under the thread.
            self.previous = ptr::null_mut();
            self.installed = ptr::null_mut();
            return Err(Error::LocaleRestore);
        }

        unsafe { libc::freelocale(self.installed) };
        self.previous = ptr::null_mut();
        self.installed = ptr::null_mut();

        trace!("previous locale restored");
        Ok(())
    }
}

impl Drop for SavedLocale {
    fn drop(&mut self) {
        if self.status == GuardStatus::Installed {
            warn!("locale override dropped without release; restoring");
            if let Err(err) = self.restore() {
                warn!("failed to restore locale: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn current_locale() -> libc::locale_t {
        unsafe { libc::uselocale(ptr::null_mut()) }
    }

    #[test]
    fn test_round_trip_restores_locale() {
        let _serial = testutil::serial();

        let before = current_locale();
        let guard = SavedLocale::acquire().unwrap();
        assert_eq!(guard.status(), GuardStatus::Installed);
        guard.release().unwrap();
        assert_eq!(current_locale(), before);
    }

    #[test]
    fn test_second_acquire_fails() {
        let _serial = testutil::serial();

        let guard = SavedLocale::acquire().unwrap();
        let err = SavedLocale::acquire().unwrap_err();
        assert!(matches!(err, Error::OverrideActive { kind: "locale" }));
        guard.release().unwrap();
    }

    #[test]
    fn test_release_after_failed_acquire_is_noop() {
        let _serial = testutil::serial();

        let before = current_locale();
        let state = SavedLocale {
            previous: ptr::null_mut(),
            installed: ptr::null_mut(),
            status: GuardStatus::Failed(libc::EINVAL),
        };
        let err = state.release().unwrap_err();
        assert!(matches!(err, Error::NotInstalled { kind: "locale" }));
        assert_eq!(current_locale(), before);
    }

    #[test]
    fn test_drop_restores_locale() {
        let _serial = testutil::serial();

        let before = current_locale();
        let guard = SavedLocale::acquire().unwrap();
        drop(guard);
        assert_eq!(current_locale(), before);
    }
}
