//! Natlog Common - Shared Types and Utilities
//!
//! Foundational types, error handling, and configuration used across the
//! natlog storage collaborator, time series core, and command line tool.
//!
//! Key Features:
//! - Unified error type with user vs infrastructure classification
//! - Sequence number identifiers
//! - TOML configuration for storage, queries, and logging
//! - Checksum and timestamp helpers for the on-disk format
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::{BackendKind, LoggingConfig, NatlogConfig, QueryConfig, StorageConfig};
pub use error::{NatlogError, Result};
pub use types::*;
