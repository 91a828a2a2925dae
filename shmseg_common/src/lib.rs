//! Shared types, constants and configuration for named shared-memory
//! segments.
//!
//! # Module Structure
//!
//! - [`types`] - Segment size encoding, access modes and origins
//! - [`consts`] - Naming and sizing limits
//! - [`config`] - Configuration loading traits and types
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! common = { package = "shmseg_common", path = "../shmseg_common" }
//! ```

pub mod config;
pub mod consts;
pub mod types;

pub use config::{ConfigError, ConfigLoader, LogLevel, SegmentConfig, SharedConfig};
pub use types::{AccessMode, Origin, SegmentSize};
