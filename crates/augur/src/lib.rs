//! # augur
//!
//! A compatibility and safety shim for a native content-identification
//! library (libmagic and compatibles).
//!
//! The native C API has three sharp edges this crate files down:
//!
//! - it prints diagnostics straight to the process's standard-error stream,
//! - its generated descriptions depend on the active locale, and
//! - its signatures, flag constants, and behavioral guarantees vary across
//!   releases, including releases that invalidate a descriptor handed to
//!   them.
//!
//! ## Architecture
//!
//! The library is organized into several modules, bottom-up:
//!
//! - [`fdio`]: descriptor and stream primitives (safe duplicate, safe
//!   close, validity checks)
//! - [`guard`]: scoped overrides for standard error and the locale, with
//!   guaranteed restoration on every exit path
//! - [`caps`]: the process-wide capability table for the linked release
//! - [`native`]: the seam trait the dispatcher calls through
//! - [`dispatch`]: the version-tolerant dispatcher, one normalized
//!   operation per native capability
//! - [`magic`]: a high-level handle mirroring the managed caller's surface
//! - `ffi` (cargo feature `libmagic`): bindings to the system library
//!
//! ## Example
//!
//! Guard scopes are usable on their own around any native call:
//!
//! ```no_run
//! use augur::{with_fixed_locale, with_output_suppressed, VersionCapabilities};
//!
//! let caps = VersionCapabilities::detect();
//! let rv = with_fixed_locale(|| {
//!     with_output_suppressed(&caps, || {
//!         // call into the native library here
//!         0
//!     })
//! });
//! assert_eq!(rv, 0);
//! ```
//!
//! With the `libmagic` feature enabled, the high-level handle drives the
//! system library directly:
//!
//! ```ignore
//! use augur::{Flags, Magic};
//!
//! let mut magic = Magic::new(&["/tmp/custom.mgc"])?;
//! magic.set_flags(Flags::MIME_TYPE)?;
//! println!("{}", magic.file("/bin/sh")?);
//! # Ok::<(), augur::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! Standard error and the active locale are process-wide mutable state, and
//! overrides do not nest: at most one operation may hold a guard scope at a
//! time. The shim holds no internal lock; concurrent callers must
//! serialize externally (a `Mutex<Magic<_>>` is sufficient) or accept
//! interleaved corruption of diagnostic output and locale state. All calls
//! are synchronous and blocking; a hung native call blocks its thread, as
//! the native library offers no interruption primitive.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod caps;
pub mod dispatch;
pub mod error;
pub mod fdio;
#[cfg(feature = "libmagic")]
pub mod ffi;
pub mod flags;
pub mod guard;
pub mod magic;
pub mod native;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export primary types for convenience
pub use caps::VersionCapabilities;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
#[cfg(feature = "libmagic")]
pub use ffi::Libmagic;
pub use flags::Flags;
pub use guard::{with_fixed_locale, with_output_suppressed, GuardStatus, SavedLocale, SavedOutput};
#[cfg(feature = "libmagic")]
pub use magic::{buffer_encoding, buffer_mime, buffer_type, file_encoding, file_mime, file_type};
pub use magic::{version_string, Magic};
pub use native::{FlagsArg, NativeLibrary};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
