//! Segment sizing, access and origin types.
//!
//! These are the values two cooperating processes must agree on: the
//! maximum size of the region (only meaningful to its creator) and the
//! access mode each side maps it with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum size of a segment, held as two 32-bit words.
///
/// The split form is what the native mapping APIs take (`dwMaximumSizeHigh`
/// and `dwMaximumSizeLow` on Windows). The composed value is always
/// `(high << 32) | low`.
///
/// In TOML the size is written as a single integer:
///
/// ```toml
/// size = 65536
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct SegmentSize {
    high: u32,
    low: u32,
}

impl SegmentSize {
    /// Build a size from its high and low words.
    #[inline]
    pub const fn from_parts(high: u32, low: u32) -> Self {
        Self { high, low }
    }

    /// Split a 64-bit size into words.
    #[inline]
    pub const fn from_u64(size: u64) -> Self {
        Self {
            high: (size >> 32) as u32,
            low: size as u32,
        }
    }

    /// High 32 bits.
    #[inline]
    pub const fn high(self) -> u32 {
        self.high
    }

    /// Low 32 bits.
    #[inline]
    pub const fn low(self) -> u32 {
        self.low
    }

    /// Composed 64-bit size.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }

    /// True if both words are zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.high == 0 && self.low == 0
    }
}

impl From<u64> for SegmentSize {
    fn from(size: u64) -> Self {
        Self::from_u64(size)
    }
}

impl From<SegmentSize> for u64 {
    fn from(size: SegmentSize) -> Self {
        size.as_u64()
    }
}

impl fmt::Display for SegmentSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.as_u64())
    }
}

/// Protection a segment view is mapped with.
///
/// A read-only opener of a region created read-write is valid; the reverse
/// is not. Only [`AccessMode::ReadWrite`] may create a new named object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Map for reading only.
    #[default]
    ReadOnly,
    /// Map for reading and writing; writes are visible to every process
    /// mapping the same object.
    ReadWrite,
    /// Private copy-on-write view: writes stay local to this mapping and
    /// never reach the shared object.
    CopyOnWrite,
}

impl AccessMode {
    /// Whether the mapped view accepts writes.
    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite | Self::CopyOnWrite)
    }

    /// Whether this mode may create the named object when it is missing.
    #[inline]
    pub const fn can_create(self) -> bool {
        matches!(self, Self::ReadWrite)
    }

    /// Lowercase name, as written in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
            Self::CopyOnWrite => "copy_on_write",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the OS object behind a segment was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// This process created the object and sized it.
    Created,
    /// The object already existed; its creator's size applies.
    Opened,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn size_composes_high_and_low(high: u32, low: u32) {
            let size = SegmentSize::from_parts(high, low);
            prop_assert_eq!(size.as_u64(), ((high as u64) << 32) | low as u64);
            prop_assert_eq!(size.high(), high);
            prop_assert_eq!(size.low(), low);
        }

        #[test]
        fn size_splits_u64(value: u64) {
            let size = SegmentSize::from_u64(value);
            prop_assert_eq!(SegmentSize::from_parts(size.high(), size.low()), size);
            prop_assert_eq!(u64::from(size), value);
        }
    }

    #[test]
    fn test_size_word_boundaries() {
        assert_eq!(SegmentSize::from_parts(0, 4096).as_u64(), 4096);
        assert_eq!(SegmentSize::from_parts(1, 0).as_u64(), 1 << 32);
        assert_eq!(SegmentSize::from_parts(u32::MAX, u32::MAX).as_u64(), u64::MAX);
        assert!(SegmentSize::default().is_zero());
        assert!(!SegmentSize::from_parts(0, 1).is_zero());
    }

    #[test]
    fn test_size_toml_is_plain_integer() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Wrapper {
            size: SegmentSize,
        }

        let parsed: Wrapper = toml::from_str("size = 8589934592").unwrap();
        assert_eq!(parsed.size, SegmentSize::from_parts(2, 0));

        let text = toml::to_string(&Wrapper {
            size: SegmentSize::from_u64(4096),
        })
        .unwrap();
        assert!(text.contains("size = 4096"));
    }

    #[test]
    fn test_access_mode_capabilities() {
        assert!(!AccessMode::ReadOnly.is_writable());
        assert!(AccessMode::ReadWrite.is_writable());
        assert!(AccessMode::CopyOnWrite.is_writable());

        assert!(AccessMode::ReadWrite.can_create());
        assert!(!AccessMode::ReadOnly.can_create());
        assert!(!AccessMode::CopyOnWrite.can_create());
    }

    #[test]
    fn test_access_mode_default_is_read_only() {
        assert_eq!(AccessMode::default(), AccessMode::ReadOnly);
    }

    #[test]
    fn test_access_mode_deserialization() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            access: AccessMode,
        }

        for mode in [
            AccessMode::ReadOnly,
            AccessMode::ReadWrite,
            AccessMode::CopyOnWrite,
        ] {
            let text = format!("access = \"{}\"", mode.as_str());
            assert_eq!(toml::from_str::<Wrapper>(&text).unwrap().access, mode);
        }
        assert!(toml::from_str::<Wrapper>("access = \"write_only\"").is_err());
    }
}
