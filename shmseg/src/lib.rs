//! # Named Shared-Memory Segments
//!
//! A segment is one named OS shared-memory object plus this process's
//! mapping of it. Cooperating processes rendezvous on the name: the first
//! read-write opener creates and sizes the object, later openers map the
//! existing one.
//!
//! ## Lifecycle
//!
//! ```text
//! [Unopened] --open() ok------> [Mapped]
//! [Unopened] --open() error---> [Unopened]   nothing held
//! [Mapped]   --close()--------> [Unopened]   errors reported, state reset
//! [Mapped]   --drop-----------> [Unopened]   errors logged
//! ```
//!
//! The segment owns its handle and view and releases them exactly once.
//! `open()` on a mapped segment is an error; `close()` on a closed one is a
//! no-op.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shmseg::{AccessMode, SegmentOptions, SharedSegment};
//!
//! # fn main() -> shmseg::ShmResult<()> {
//! // Producer: creates the object if the name is free
//! let mut writer = SharedSegment::create_or_open("sensor_data", 4096u64, AccessMode::ReadWrite)?;
//! writer.write_at(0, &[0x7])?;
//!
//! // Consumer: two-step construction, read-only view of the same bytes
//! let mut reader = SharedSegment::new("sensor_data", 0u64);
//! reader.open()?;
//! assert_eq!(reader.as_slice().unwrap()[0], 0x7);
//!
//! // Release explicitly to observe teardown errors
//! reader.close()?;
//! writer.close()?;
//! shmseg::remove("sensor_data")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use shmseg::{SharedSegment, ShmError};
//!
//! let mut segment = SharedSegment::new("missing_segment", 0u64);
//! match segment.open() {
//!     Ok(()) => { /* use segment */ }
//!     Err(err @ ShmError::MappingCreation { .. }) => {
//!         eprintln!("no such segment (os error {:?}) - is the producer running?", err.os_code());
//!     }
//!     Err(e) => eprintln!("Unexpected error: {}", e),
//! }
//! ```
//!
//! ## Access Modes
//!
//! - `ReadOnly`: shared view, writes rejected; cannot create the object
//! - `ReadWrite`: shared view; the only mode that creates missing objects
//! - `CopyOnWrite`: private view; writes never reach other processes
//!
//! ## Thread Safety
//!
//! No synchronization is provided over the mapped bytes. Coordinate
//! concurrent writers with an external mechanism.
//!
//! ## Platform Support
//!
//! - Unix: POSIX `shm_open` objects, optionally file backed
//! - Windows: named file mappings on the paging file or a backing file

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod platform;
pub mod segment;

pub use common::{AccessMode, LogLevel, Origin, SegmentConfig, SegmentSize};
pub use error::{ShmError, ShmResult};
pub use platform::{MappingBackend, NativeBackend};
pub use segment::{SegmentOptions, SharedSegment, remove};

/// Install a `tracing` subscriber at `level`.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Does nothing if a
/// global subscriber is already installed.
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
