//! Natlog Backend - Partition Storage Abstraction
//!
//! Defines the storage collaborator the point store is written against: a
//! key-ordered append log per value category, keyed by (series, sequence)
//! and searchable by timestamp. Provides the in-memory implementation that
//! the file backend also uses as its index.
//!
//! Key Features:
//! - One independently locked partition per value category
//! - Sequence lookups by position, time lookups by binary search
//! - Whole-record visibility: a record is published under one write lock
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::record::{Category, PointRecord};
use chrono::{DateTime, Utc};
use natlog_common::{NatlogError, Result, Sequence};
use parking_lot::RwLock;
use std::collections::HashMap;

// =============================================================================
// Partition Backend Trait
// =============================================================================

/// Pluggable storage for per-category point logs.
///
/// Within one (category, series) log, records are held in sequence order.
/// Callers only ever append in non-decreasing timestamp order, so sequence
/// order is also timestamp order and time scans may binary search.
pub trait PartitionBackend: Send + Sync {
    /// Append a record. Its sequence must be exactly the log's current length.
    fn append(&self, category: Category, record: PointRecord) -> Result<()>;

    /// Most recently appended record of a series.
    fn last(&self, category: Category, series: &str) -> Result<Option<PointRecord>>;

    /// Record with the given sequence number.
    fn get(&self, category: Category, series: &str, sequence: Sequence) -> Result<Option<PointRecord>>;

    /// Records starting at `start` in sequence order, at most `limit` of them.
    fn scan_sequence(
        &self,
        category: Category,
        series: &str,
        start: Sequence,
        limit: Option<usize>,
    ) -> Result<Vec<PointRecord>>;

    /// Records with `lower <= timestamp < upper`, in timestamp order.
    fn scan_time(
        &self,
        category: Category,
        series: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Result<Vec<PointRecord>>;

    /// Make all appended records durable.
    fn sync(&self) -> Result<()>;

    /// Get storage statistics.
    fn stats(&self) -> StorageStats;
}

// =============================================================================
// Storage Statistics
// =============================================================================

/// Statistics about storage usage and operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub total_records: u64,
    pub total_bytes: u64,
    pub append_ops: u64,
    pub scan_ops: u64,
}

// =============================================================================
// Memory Backend
// =============================================================================

type Partition = HashMap<String, Vec<PointRecord>>;

/// In-memory partition storage for tests, development, and as the index of
/// the file backend.
pub struct MemoryBackend {
    partitions: [RwLock<Partition>; 4],
    stats: RwLock<StorageStats>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            partitions: Default::default(),
            stats: RwLock::new(StorageStats::default()),
        }
    }

    fn partition(&self, category: Category) -> &RwLock<Partition> {
        &self.partitions[category.index()]
    }

    /// Number of records stored for a series.
    pub fn len(&self, category: Category, series: &str) -> usize {
        self.partition(category)
            .read()
            .get(series)
            .map_or(0, |log| log.len())
    }

    /// Check that `record` would be accepted by [`PartitionBackend::append`]
    /// without storing it.
    pub fn check_append(&self, category: Category, record: &PointRecord) -> Result<()> {
        let partition = self.partition(category).read();
        let log = partition
            .get(&record.header.series)
            .map_or(&[][..], |log| log.as_slice());
        validate_append(log, category, record)
    }

    fn record_scan(&self) {
        self.stats.write().scan_ops += 1;
    }
}

fn validate_append(log: &[PointRecord], category: Category, record: &PointRecord) -> Result<()> {
    let expected = Sequence(log.len() as u64);
    if record.sequence() != expected {
        return Err(NatlogError::Storage(format!(
            "{} partition of series {} expected sequence {}, got {}",
            category,
            record.header.series,
            expected,
            record.sequence()
        )));
    }
    if let Some(last) = log.last() {
        if record.timestamp() < last.timestamp() {
            return Err(NatlogError::Storage(format!(
                "{} partition of series {} is append-only in time",
                category, record.header.series
            )));
        }
    }
    Ok(())
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionBackend for MemoryBackend {
    fn append(&self, category: Category, record: PointRecord) -> Result<()> {
        let size = record.encoded_len() as u64;

        {
            let mut partition = self.partition(category).write();
            let log = partition.entry(record.header.series.clone()).or_default();

            validate_append(log, category, &record)?;
            log.push(record);
        }

        let mut stats = self.stats.write();
        stats.append_ops += 1;
        stats.total_records += 1;
        stats.total_bytes += size;

        Ok(())
    }

    fn last(&self, category: Category, series: &str) -> Result<Option<PointRecord>> {
        let partition = self.partition(category).read();
        Ok(partition.get(series).and_then(|log| log.last().cloned()))
    }

    fn get(&self, category: Category, series: &str, sequence: Sequence) -> Result<Option<PointRecord>> {
        let partition = self.partition(category).read();
        let index = usize::try_from(sequence.0).ok();
        Ok(partition
            .get(series)
            .and_then(|log| index.and_then(|i| log.get(i)))
            .cloned())
    }

    fn scan_sequence(
        &self,
        category: Category,
        series: &str,
        start: Sequence,
        limit: Option<usize>,
    ) -> Result<Vec<PointRecord>> {
        let records = {
            let partition = self.partition(category).read();
            match partition.get(series) {
                Some(log) => {
                    let start = usize::try_from(start.0).unwrap_or(usize::MAX).min(log.len());
                    let end = match limit {
                        Some(limit) => start.saturating_add(limit).min(log.len()),
                        None => log.len(),
                    };
                    log[start..end].to_vec()
                }
                None => Vec::new(),
            }
        };

        self.record_scan();
        Ok(records)
    }

    fn scan_time(
        &self,
        category: Category,
        series: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Result<Vec<PointRecord>> {
        let records = {
            let partition = self.partition(category).read();
            match partition.get(series) {
                Some(log) if lower < upper => {
                    let start = log.partition_point(|r| r.timestamp() < lower);
                    let end = log.partition_point(|r| r.timestamp() < upper);
                    log[start..end].to_vec()
                }
                _ => Vec::new(),
            }
        };

        self.record_scan();
        Ok(records)
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> StorageStats {
        self.stats.read().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
