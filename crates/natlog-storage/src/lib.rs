//! Natlog Storage - Partitioned Point Logs
//!
//! Storage collaborator for the natlog point store: a durable, key-ordered
//! append log per physical value category (integer, float, array, blob),
//! keyed by (series, sequence) with a timestamp index.
//!
//! Key Features:
//! - Pluggable partition backends (memory, file)
//! - One shared record shape across all value partitions
//! - Checksummed record framing with crash recovery
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod backend;
pub mod file;
pub mod record;

pub use backend::{MemoryBackend, PartitionBackend, StorageStats};
pub use file::{FileBackend, RecoveryResult};
pub use record::{Category, PointHeader, PointRecord};
