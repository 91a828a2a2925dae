//! Configuration loading traits and types.
//!
//! Processes that rendezvous on a segment usually read its parameters from
//! the same TOML file, so both sides agree on name, size and access mode.
//!
//! # Usage
//!
//! ```rust,no_run
//! use shmseg_common::config::{ConfigError, ConfigLoader, SegmentConfig, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     segment: SegmentConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("config.toml"))?;
//!     config.segment.validate()?;
//!     println!("Segment: {}", config.segment.name);
//!     Ok(())
//! }
//! ```

use crate::consts::{DEFAULT_SEGMENT_SIZE, SEGMENT_NAME_MAX};
use crate::types::{AccessMode, SegmentSize};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared by every process using segments.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sensor-writer-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of one named segment.
///
/// # TOML Example
///
/// ```toml
/// [segment]
/// name = "sensor_data"
/// size = 65536
/// access = "read_write"
/// backing_file = "/var/lib/sensors/data.bin"
/// auto_open = true
/// unlink_on_close = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Rendezvous name shared by all cooperating processes.
    pub name: String,

    /// Maximum size; used only when this process creates the segment.
    #[serde(default = "default_size")]
    pub size: SegmentSize,

    /// Access mode of this process's view.
    #[serde(default)]
    pub access: AccessMode,

    /// Optional file whose contents back the region.
    #[serde(default)]
    pub backing_file: Option<PathBuf>,

    /// Open the segment as soon as it is constructed.
    #[serde(default = "default_true")]
    pub auto_open: bool,

    /// Remove the name when a creating process closes the segment.
    #[serde(default)]
    pub unlink_on_close: bool,
}

fn default_size() -> SegmentSize {
    SegmentSize::from_u64(DEFAULT_SEGMENT_SIZE)
}

fn default_true() -> bool {
    true
}

impl SegmentConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `name` is empty, longer than [`SEGMENT_NAME_MAX`] or contains `/`
    ///   past an optional leading one
    /// - `size` is zero while `access` could create the segment
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bare = self.name.strip_prefix('/').unwrap_or(&self.name);
        if bare.is_empty() {
            return Err(ConfigError::ValidationError(
                "segment name cannot be empty".to_string(),
            ));
        }
        if bare.len() > SEGMENT_NAME_MAX {
            return Err(ConfigError::ValidationError(format!(
                "segment name exceeds {} bytes",
                SEGMENT_NAME_MAX
            )));
        }
        if bare.contains('/') || bare.contains('\0') {
            return Err(ConfigError::ValidationError(format!(
                "segment name '{}' contains '/' or NUL",
                self.name
            )));
        }
        if self.access.can_create() && self.size.is_zero() && self.backing_file.is_none() {
            return Err(ConfigError::ValidationError(
                "size must be non-zero for a read_write segment".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn segment(name: &str, size: u64, access: AccessMode) -> SegmentConfig {
        SegmentConfig {
            name: name.to_string(),
            size: SegmentSize::from_u64(size),
            access,
            backing_file: None,
            auto_open: true,
            unlink_on_close: false,
        }
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            let text = format!("level = \"{}\"", level.as_filter());
            assert_eq!(toml::from_str::<TestWrapper>(&text).unwrap().level, level);
        }
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_segment_validation_success() {
        assert!(segment("seg_test", 4096, AccessMode::ReadWrite).validate().is_ok());
        assert!(segment("/seg_test", 4096, AccessMode::ReadWrite).validate().is_ok());
        // Openers never size the object.
        assert!(segment("seg_test", 0, AccessMode::ReadOnly).validate().is_ok());
    }

    #[test]
    fn test_segment_validation_bad_names() {
        assert!(segment("", 4096, AccessMode::ReadWrite).validate().is_err());
        assert!(segment("/", 4096, AccessMode::ReadWrite).validate().is_err());
        assert!(segment("a/b", 4096, AccessMode::ReadWrite).validate().is_err());

        let long = "x".repeat(SEGMENT_NAME_MAX + 1);
        assert!(segment(&long, 4096, AccessMode::ReadWrite).validate().is_err());
    }

    #[test]
    fn test_segment_validation_zero_size_creator() {
        let result = segment("seg_test", 0, AccessMode::ReadWrite).validate();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = SegmentConfig::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = SegmentConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_loader_success() {
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            shared: SharedConfig,
            segment: SegmentConfig,
        }

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[shared]
log_level = "debug"
service_name = "test-service"

[segment]
name = "seg_test"
size = 65536
access = "read_write"
unlink_on_close = true
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.segment.name, "seg_test");
        assert_eq!(config.segment.size.as_u64(), 65536);
        assert_eq!(config.segment.access, AccessMode::ReadWrite);
        assert!(config.segment.auto_open);
        assert!(config.segment.unlink_on_close);
        assert!(config.segment.backing_file.is_none());
    }

    #[test]
    fn test_segment_config_defaults() {
        let config: SegmentConfig = toml::from_str("name = \"reader\"").unwrap();
        assert_eq!(config.size.as_u64(), DEFAULT_SEGMENT_SIZE);
        assert_eq!(config.access, AccessMode::ReadOnly);
        assert!(config.auto_open);
        assert!(!config.unlink_on_close);
    }
}
