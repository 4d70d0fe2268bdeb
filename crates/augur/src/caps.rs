//! Version capability table.
//!
//! The native library's signatures, entry points, and defects vary across
//! releases, and the platform's descriptor primitives vary across systems.
//! Both sets of facts are determined once, up front, and threaded explicitly
//! into every dispatched call; there is no compile-time branching and no
//! hidden global, which keeps each workaround independently testable.

use libc::c_int;

/// First release exposing a version query entry point (5.13).
pub const VERSION_QUERY_MIN: c_int = 513;

/// First release whose classify-by-descriptor leaves the caller's
/// descriptor alone (5.18). Earlier releases may close or otherwise
/// invalidate it as a side effect.
pub const DESCRIPTOR_FIX_VERSION: c_int = 518;

/// First release whose classify-by-name reports failures through the
/// result channel instead of the error text (5.15).
pub const FILE_ERROR_FIX_VERSION: c_int = 515;

/// Process-wide facts about the linked native library and the platform.
///
/// Read-only after construction. Build one with [`detect`](Self::detect) for
/// the running platform, [`from_version`](Self::from_version) for a known
/// library release, or a struct literal in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCapabilities {
    /// The normalized entry points accept a trailing flags argument.
    pub flags_argument: bool,
    /// The library release invalidates caller descriptors during
    /// classify-by-descriptor.
    pub broken_descriptor: bool,
    /// Duplicate-and-mark-close-on-exec is available as one atomic
    /// operation.
    pub atomic_dup_cloexec: bool,
    /// Descriptor validity can be queried through descriptor flags.
    pub fd_flags_query: bool,
    /// The library exposes a version query.
    pub version_query: bool,
    /// Smallest behavior-flag value the library recognizes.
    pub min_flags: c_int,
    /// Largest behavior-flag value the library recognizes.
    pub max_flags: c_int,
}

impl VersionCapabilities {
    /// Capabilities of a current library release on the running platform.
    pub fn detect() -> Self {
        Self {
            flags_argument: true,
            broken_descriptor: false,
            atomic_dup_cloexec: cfg!(any(
                target_os = "linux",
                target_os = "android",
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd"
            )),
            fd_flags_query: true,
            version_query: true,
            min_flags: crate::flags::MIN_FLAGS,
            max_flags: crate::flags::MAX_FLAGS,
        }
    }

    /// Capabilities derived from a library release number in the native
    /// `major * 100 + minor` convention (e.g. `523` for 5.23).
    pub fn from_version(version: c_int) -> Self {
        Self {
            version_query: version >= VERSION_QUERY_MIN,
            broken_descriptor: version > 0 && version < DESCRIPTOR_FIX_VERSION,
            ..Self::detect()
        }
    }
}

impl Default for VersionCapabilities {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_version_old_library() {
        let caps = VersionCapabilities::from_version(512);
        assert!(!caps.version_query);
        assert!(caps.broken_descriptor);
    }

    #[test]
    fn test_from_version_transitional_library() {
        let caps = VersionCapabilities::from_version(513);
        assert!(caps.version_query);
        assert!(caps.broken_descriptor);
    }

    #[test]
    fn test_from_version_fixed_library() {
        let caps = VersionCapabilities::from_version(518);
        assert!(caps.version_query);
        assert!(!caps.broken_descriptor);
    }

    #[test]
    fn test_detect_flag_range() {
        let caps = VersionCapabilities::detect();
        assert_eq!(caps.min_flags, 0);
        assert!(caps.max_flags > caps.min_flags);
    }
}
