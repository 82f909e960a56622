// crates/labeldb-config/src/lib.rs
// ============================================================================
// Module: Recorder Configuration
// Description: Scrape-target configuration loading and validation.
// Purpose: Provide strict, fail-closed config parsing for the recorder.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! The recorder's configuration names the CloudWatch regions and namespaces
//! a scraper should cover. Parsing is fail-closed: oversized files, unknown
//! keys, empty namespace lists, and unresolvable regions are all hard
//! errors. A target without an explicit region falls back to the
//! `AWS_REGION` environment variable.
//!
//! ```toml
//! [[targets]]
//! region = "us-east-1"
//! namespaces = ["AWS/EC2", "AWS/S3"]
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
/// Environment variable consulted when a target omits its region.
pub const REGION_ENV_VAR: &str = "AWS_REGION";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// Config file exceeds the size limit.
    #[error("config file too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        actual_bytes: u64,
    },
    /// Config file failed to parse.
    #[error("config parse failure: {0}")]
    Parse(#[from] toml::de::Error),
    /// No targets were configured.
    #[error("config declares no targets")]
    NoTargets,
    /// A target declares no namespaces.
    #[error("target {index} declares no namespaces")]
    EmptyNamespaces {
        /// Zero-based target index.
        index: usize,
    },
    /// A target omits its region and no default is available.
    #[error("target {index} has no region and {REGION_ENV_VAR} is unset")]
    MissingRegion {
        /// Zero-based target index.
        index: usize,
    },
    /// A target declares an empty namespace string.
    #[error("target {index} declares an empty namespace")]
    EmptyNamespace {
        /// Zero-based target index.
        index: usize,
    },
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// One scrape target: a region and the namespaces to cover there.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// AWS region; empty means "use the environment default".
    #[serde(default)]
    pub region: String,
    /// CloudWatch namespaces to index, e.g. `AWS/EC2`.
    pub namespaces: Vec<String>,
}

/// Recorder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Scrape targets, one per region.
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Config {
    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on I/O failure, parse failure, or any
    /// validation failure; nothing is partially applied.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                max_bytes: MAX_CONFIG_FILE_SIZE,
                actual_bytes: size,
            });
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw)?;
        config.resolve_and_validate()?;
        Ok(config)
    }

    /// Fills region defaults from the environment and validates targets.
    fn resolve_and_validate(&mut self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for (index, target) in self.targets.iter_mut().enumerate() {
            if target.namespaces.is_empty() {
                return Err(ConfigError::EmptyNamespaces { index });
            }
            if target.namespaces.iter().any(String::is_empty) {
                return Err(ConfigError::EmptyNamespace { index });
            }
            if target.region.is_empty() {
                match std::env::var(REGION_ENV_VAR) {
                    Ok(region) if !region.is_empty() => target.region = region,
                    _ => return Err(ConfigError::MissingRegion { index }),
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
