//! Scoped overrides for process-wide resources.
//!
//! The native library prints spurious diagnostics (malformed-rule-file
//! warnings and the like) straight to the process's standard-error stream,
//! and its generated descriptions depend on the active locale. Both are
//! process-wide mutable state, so every native call that might touch them is
//! bracketed: acquire a save-state record, make the call, release the
//! record. Release runs on every path, including when the native call
//! fails, so neither override outlives the call it was taken for.
//!
//! Overrides do not nest. Acquiring a second override of the same kind
//! while one is installed fails without disturbing the installed one. The
//! shim holds no lock; concurrent callers serialize externally.
//!
//! ## Usage
//!
//! The acquire/release pairs are exposed directly on [`SavedOutput`] and
//! [`SavedLocale`]. Integrators adding further native calls should prefer
//! the scoped forms, which also encode the availability rule (a failed
//! acquire never refuses service; the call runs with diagnostics leaking):
//!
//! ```no_run
//! use augur::{with_output_suppressed, VersionCapabilities};
//!
//! let caps = VersionCapabilities::detect();
//! let rv = with_output_suppressed(&caps, || {
//!     // invoke the native library here
//!     0
//! });
//! ```

mod locale;
mod output;

use std::sync::atomic::AtomicBool;
use tracing::debug;

use crate::caps::VersionCapabilities;

pub use locale::SavedLocale;
pub use output::SavedOutput;

/// Outcome of an acquire attempt, carried by each save-state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStatus {
    /// No override has been attempted, or it has been released
    Uninitialized,
    /// The override is installed and must be restored
    Installed,
    /// Acquisition failed with the given OS error code
    Failed(i32),
}

// One installed override of each kind per process, never more.
pub(crate) static OUTPUT_ACTIVE: AtomicBool = AtomicBool::new(false);
pub(crate) static LOCALE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Runs `f` with standard-error output discarded.
///
/// If the override cannot be installed, `f` still runs and its diagnostics
/// leak; availability wins over clean output. A failure while restoring is
/// reported through the log and never discards the value `f` produced.
pub fn with_output_suppressed<T>(caps: &VersionCapabilities, f: impl FnOnce() -> T) -> T {
    match SavedOutput::acquire(caps) {
        Ok(guard) => {
            let value = f();
            if let Err(err) = guard.release() {
                debug!("error-output restore failed: {err}");
            }
            value
        }
        Err(err) => {
            debug!("error-output suppression unavailable: {err}");
            f()
        }
    }
}

/// Runs `f` with the portable "C" locale active.
///
/// Mirrors [`with_output_suppressed`]: an uninstallable override never
/// refuses service, and restore failures are reported without unwinding
/// the result of `f`.
pub fn with_fixed_locale<T>(f: impl FnOnce() -> T) -> T {
    match SavedLocale::acquire() {
        Ok(guard) => {
            let value = f();
            if let Err(err) = guard.release() {
                debug!("locale restore failed: {err}");
            }
            value
        }
        Err(err) => {
            debug!("locale override unavailable: {err}");
            f()
        }
    }
}
