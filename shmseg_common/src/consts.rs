//! Segment constants.
//!
//! These constants are the single source of truth for naming and sizing
//! limits - the segment crate and its platform backends import from here.

/// Maximum length of a segment name in bytes, excluding the leading `/`
/// added for POSIX shared-memory objects.
///
/// Matches `NAME_MAX` on Linux, the limit `shm_open` enforces on the
/// `/dev/shm` entry it creates.
pub const SEGMENT_NAME_MAX: usize = 255;

/// Page size assumed when choosing default segment sizes.
pub const SHM_PAGE_SIZE: u64 = 4096;

/// Default maximum size of a segment created from configuration.
pub const DEFAULT_SEGMENT_SIZE: u64 = SHM_PAGE_SIZE;

/// Permission bits for shared-memory objects created by this process.
///
/// Owner read/write only.
pub const SHM_CREATE_MODE: u32 = 0o600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_size_is_one_page() {
        assert_eq!(DEFAULT_SEGMENT_SIZE, SHM_PAGE_SIZE);
        assert_eq!(SHM_PAGE_SIZE, 4096);
    }

    #[test]
    fn test_create_mode_is_owner_only() {
        assert_eq!(SHM_CREATE_MODE & 0o077, 0);
    }
}
