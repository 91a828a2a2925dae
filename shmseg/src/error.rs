//! Error types for shared memory operations

use common::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during shared memory operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// The OS could not create or open the named object
    #[error("Failed to create or open segment '{name}': {source}")]
    MappingCreation {
        /// Segment name
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The object was obtained but could not be mapped; its handle has
    /// already been released
    #[error("Failed to map view of segment '{name}': {source}")]
    ViewMapping {
        /// Segment name
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Unmapping the view failed during close; the handle was still closed
    #[error("Failed to unmap view of segment '{name}': {source}")]
    Unmap {
        /// Segment name
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Removing a segment name failed
    #[error("Failed to remove segment '{name}': {source}")]
    Unlink {
        /// Segment name
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// `open()` called on a segment that is already mapped
    #[error("Segment already open: {name}")]
    AlreadyOpen {
        /// Segment name
        name: String,
    },

    /// Data access on a segment that is not mapped
    #[error("Segment not open: {name}")]
    NotOpen {
        /// Segment name
        name: String,
    },

    /// Write attempted through a read-only view
    #[error("Segment mapped read-only: {name}")]
    NotWritable {
        /// Segment name
        name: String,
    },

    /// Access range falls outside the mapped view
    #[error("Range {offset}..{offset}+{len} outside segment of {size} bytes")]
    OutOfBounds {
        /// Start of the requested range
        offset: usize,
        /// Length of the requested range
        len: usize,
        /// Mapped size
        size: usize,
    },

    /// The configured backing file could not be opened
    #[error("Backing file {path:?} unusable: {source}")]
    BackingFile {
        /// File path
        path: PathBuf,
        /// Source IO error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {source}")]
    Config {
        /// Source configuration error
        #[from]
        source: ConfigError,
    },
}

impl ShmError {
    /// Raw OS error code behind this error, if any.
    ///
    /// `errno` on Unix, `GetLastError()` on Windows.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::MappingCreation { source, .. }
            | Self::ViewMapping { source, .. }
            | Self::Unmap { source, .. }
            | Self::Unlink { source, .. }
            | Self::BackingFile { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
