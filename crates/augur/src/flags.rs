//! Behavior-flag constants understood by the native library.
//!
//! The numeric values mirror the native header so that a flag set built here
//! can be forwarded across the boundary unchanged. Out-of-range values are
//! rejected locally by the dispatcher (see
//! [`Dispatcher::set_flags`](crate::Dispatcher::set_flags)) because some
//! library releases corrupt internal state when handed unknown values.

use bitflags::bitflags;
use libc::c_int;

bitflags! {
    /// Behavior flags accepted by the native library.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: c_int {
        /// No special handling
        const NONE = 0x000_0000;
        /// Turn on native debugging output
        const DEBUG = 0x000_0001;
        /// Follow symlinks
        const SYMLINK = 0x000_0002;
        /// Look inside compressed files
        const COMPRESS = 0x000_0004;
        /// Look at the contents of devices
        const DEVICES = 0x000_0008;
        /// Return the MIME type
        const MIME_TYPE = 0x000_0010;
        /// Return all matches
        const CONTINUE = 0x000_0020;
        /// Print warnings to the error stream while consulting the database
        const CHECK = 0x000_0040;
        /// Restore access time on exit
        const PRESERVE_ATIME = 0x000_0080;
        /// Do not convert unprintable characters
        const RAW = 0x000_0100;
        /// Report errors through the result channel instead of the text
        const ERROR = 0x000_0200;
        /// Return the MIME encoding
        const MIME_ENCODING = 0x000_0400;
        /// Return both MIME type and encoding
        const MIME = Self::MIME_TYPE.bits() | Self::MIME_ENCODING.bits();
        /// Return the Apple creator and type
        const APPLE = 0x000_0800;

        /// Do not check for compressed files
        const NO_CHECK_COMPRESS = 0x000_1000;
        /// Do not check for tar archives
        const NO_CHECK_TAR = 0x000_2000;
        /// Do not consult the rule database
        const NO_CHECK_SOFT = 0x000_4000;
        /// Do not check application types
        const NO_CHECK_APPTYPE = 0x000_8000;
        /// Do not check for ELF details
        const NO_CHECK_ELF = 0x001_0000;
        /// Do not check for text files
        const NO_CHECK_TEXT = 0x002_0000;
        /// Do not check for CDF documents
        const NO_CHECK_CDF = 0x004_0000;
        /// Do not check for CSV files
        const NO_CHECK_CSV = 0x008_0000;
        /// Do not look for known tokens inside text files
        const NO_CHECK_TOKENS = 0x010_0000;
        /// Do not check text encodings
        const NO_CHECK_ENCODING = 0x020_0000;
        /// Do not check for JSON files
        const NO_CHECK_JSON = 0x040_0000;

        /// Disable every built-in test that can be disabled
        const NO_CHECK_BUILTIN = Self::NO_CHECK_COMPRESS.bits()
            | Self::NO_CHECK_TAR.bits()
            | Self::NO_CHECK_APPTYPE.bits()
            | Self::NO_CHECK_ELF.bits()
            | Self::NO_CHECK_TEXT.bits()
            | Self::NO_CHECK_CDF.bits()
            | Self::NO_CHECK_CSV.bits()
            | Self::NO_CHECK_TOKENS.bits()
            | Self::NO_CHECK_ENCODING.bits()
            | Self::NO_CHECK_JSON.bits();
    }
}

/// Smallest flag value recognized by the native library
pub const MIN_FLAGS: c_int = Flags::NONE.bits();

/// Largest flag value recognized by the native library
pub const MAX_FLAGS: c_int = Flags::NO_CHECK_BUILTIN.bits();
