//! Natlog Config - Configuration Structures
//!
//! Configuration types for the natlog store. Supports loading from TOML
//! files and programmatic construction, with defaults suitable for an
//! in-memory development instance.
//!
//! Key Features:
//! - Storage configuration (backend kind, data directory, sync policy)
//! - Query limits and continuous query buffering
//! - Logging defaults for the binary
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{NatlogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Storage Configuration
// =============================================================================

/// Which storage engine backs the point store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    File,
}

/// Configuration for the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub data_directory: PathBuf,
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            data_directory: PathBuf::from("./data"),
            sync_writes: false,
        }
    }
}

// =============================================================================
// Query Configuration
// =============================================================================

/// Configuration for the query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_points: usize,
    pub stream_buffer: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_points: 100_000,
            stream_buffer: 16,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Top-level Configuration
// =============================================================================

/// Top-level natlog configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NatlogConfig {
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

impl NatlogConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| NatlogError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with development defaults (in-memory store).
    pub fn development() -> Self {
        Self::default()
    }

    /// Create configuration for a file-backed store rooted at `data_directory`.
    pub fn persistent(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                backend: BackendKind::File,
                data_directory: data_directory.into(),
                sync_writes: true,
            },
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.query.max_points < 2 {
            return Err(NatlogError::Configuration(
                "query.max_points must be at least 2".to_string(),
            ));
        }
        if self.query.stream_buffer == 0 {
            return Err(NatlogError::Configuration(
                "query.stream_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NatlogConfig::development();
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.query.max_points, 100_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_toml() {
        let config = NatlogConfig::from_toml(
            r#"
            [storage]
            backend = "file"
            data_directory = "/var/lib/natlog"

            [query]
            stream_buffer = 4
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.storage.backend, BackendKind::File);
        assert_eq!(config.storage.data_directory, PathBuf::from("/var/lib/natlog"));
        assert!(!config.storage.sync_writes);
        assert_eq!(config.query.stream_buffer, 4);
        assert_eq!(config.query.max_points, 100_000);
    }

    #[test]
    fn test_invalid_toml() {
        let err = NatlogConfig::from_toml("[storage]\nbackend = \"sql\"\n")
            .expect_err("unknown backend should fail");
        assert!(matches!(err, NatlogError::Configuration(_)));

        let err = NatlogConfig::from_toml("[query]\nmax_points = 1\n")
            .expect_err("max_points below 2 should fail");
        assert!(matches!(err, NatlogError::Configuration(_)));
    }
}
