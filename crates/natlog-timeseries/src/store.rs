//! Natlog Point Store
//!
//! The append-only, per-series point log. Every write goes through
//! [`PointStore::append`], which coerces the value, enforces time order,
//! and assigns the next dense sequence number while holding the series'
//! append lock.
//!
//! Key Features:
//! - Partition routing by datatype category
//! - Sequence paging with resume offsets
//! - Binned time range reads for the query engine
//! - Lazy blob handles that fetch bytes on demand
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::codec;
use crate::datatype::Datatype;
use crate::registry::SeriesRegistry;
use crate::value::{RawValue, Value};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use natlog_common::utils::{from_micros, to_micros};
use natlog_common::{NatlogError, Result, Sequence};
use natlog_storage::{Category, PartitionBackend, PointRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Raw points of one bin, in timestamp order.
pub type PointGroup = Vec<(DateTime<Utc>, Value)>;

// =============================================================================
// Blob Handle
// =============================================================================

/// Reference to a stored blob whose bytes are fetched only on request.
#[derive(Clone)]
pub struct BlobHandle {
    series: String,
    sequence: Sequence,
    mimetype: String,
    backend: Weak<dyn PartitionBackend>,
}

impl BlobHandle {
    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Load the blob's bytes. Fails with `StoreClosed` once the store is gone.
    pub fn fetch_bytes(&self) -> Result<Bytes> {
        let backend = self.backend.upgrade().ok_or(NatlogError::StoreClosed)?;
        let record = backend
            .get(Category::Blob, &self.series, self.sequence)?
            .ok_or_else(|| {
                NatlogError::Storage(format!(
                    "blob {} of series {} is missing",
                    self.sequence, self.series
                ))
            })?;
        Ok(record.payload)
    }
}

impl fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobHandle")
            .field("series", &self.series)
            .field("sequence", &self.sequence)
            .field("mimetype", &self.mimetype)
            .finish()
    }
}

impl PartialEq for BlobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.series == other.series
            && self.sequence == other.sequence
            && self.mimetype == other.mimetype
    }
}

// =============================================================================
// Point Value
// =============================================================================

/// A value as returned by sequence reads.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    Inline(Value),
    Blob(BlobHandle),
}

impl PointValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PointValue::Inline(v) => Some(v),
            PointValue::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&BlobHandle> {
        match self {
            PointValue::Blob(h) => Some(h),
            PointValue::Inline(_) => None,
        }
    }

    /// Transport form; blob bytes are fetched.
    pub fn to_transport(&self) -> Result<RawValue> {
        match self {
            PointValue::Inline(v) => Ok(v.to_raw()),
            PointValue::Blob(h) => h.fetch_bytes().map(RawValue::Bytes),
        }
    }
}

/// One page of a sequence read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResult {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<PointValue>,
    /// Sequence to resume from, if the page stopped before the end.
    pub next: Option<Sequence>,
}

impl ReadResult {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

// =============================================================================
// Point Store
// =============================================================================

/// Per-series point logs on top of a partition backend.
pub struct PointStore {
    backend: Arc<dyn PartitionBackend>,
    registry: Arc<SeriesRegistry>,
    append_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PointStore {
    pub fn new(backend: Arc<dyn PartitionBackend>, registry: Arc<SeriesRegistry>) -> Self {
        Self {
            backend,
            registry,
            append_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn PartitionBackend> {
        &self.backend
    }

    fn datatype(&self, series: &str) -> Result<Datatype> {
        self.registry
            .get(series)
            .ok_or_else(|| NatlogError::SeriesNotFound(series.to_string()))?
            .parsed_datatype()
    }

    fn append_lock(&self, series: &str) -> Arc<Mutex<()>> {
        self.append_locks
            .lock()
            .entry(series.to_string())
            .or_default()
            .clone()
    }

    /// Append a point and return its sequence number.
    pub fn append(&self, series: &str, timestamp: DateTime<Utc>, value: &RawValue) -> Result<Sequence> {
        let datatype = self.datatype(series)?;
        let value = datatype.coerce(value)?;
        let payload = codec::encode(&value)?;
        let category = datatype.category();
        let timestamp = from_micros(to_micros(timestamp))
            .ok_or_else(|| NatlogError::Type(format!("timestamp {} out of range", timestamp)))?;

        let lock = self.append_lock(series);
        let _guard = lock.lock();

        let sequence = match self.backend.last(category, series)? {
            Some(last) if timestamp < last.timestamp() => {
                tracing::warn!(
                    "Rejected out-of-order point for {}: {} precedes {}",
                    series,
                    timestamp,
                    last.timestamp()
                );
                return Err(NatlogError::SeriesTimeOrder(format!(
                    "{} precedes the last point of {} at {}",
                    timestamp,
                    series,
                    last.timestamp()
                )));
            }
            Some(last) => last.sequence().next(),
            None => Sequence::FIRST,
        };

        self.backend
            .append(category, PointRecord::new(series, sequence, timestamp, payload))?;

        tracing::debug!("Appended point {} to {} at {}", sequence, series, timestamp);
        Ok(sequence)
    }

    /// Read points by sequence.
    ///
    /// Without an offset only the most recent point is returned. With an
    /// offset, up to `limit` points from that sequence on are returned and
    /// `next` is set when more remain.
    pub fn read(&self, series: &str, offset: Option<Sequence>, limit: Option<usize>) -> Result<ReadResult> {
        let datatype = self.datatype(series)?;
        let category = datatype.category();

        let (records, next) = match offset {
            None => (
                self.backend.last(category, series)?.into_iter().collect(),
                None,
            ),
            Some(start) => {
                let mut records = self.backend.scan_sequence(
                    category,
                    series,
                    start,
                    limit.map(|l| l.saturating_add(1)),
                )?;
                let next = match limit {
                    Some(limit) if records.len() > limit => {
                        let next = records[limit].sequence();
                        records.truncate(limit);
                        Some(next)
                    }
                    _ => None,
                };
                (records, next)
            }
        };

        let mut result = ReadResult {
            next,
            ..Default::default()
        };
        for record in records {
            result.timestamps.push(record.timestamp());
            result.values.push(self.point_value(&datatype, record)?);
        }
        Ok(result)
    }

    fn point_value(&self, datatype: &Datatype, record: PointRecord) -> Result<PointValue> {
        match datatype.mimetype() {
            Some(mimetype) => Ok(PointValue::Blob(BlobHandle {
                series: record.header.series,
                sequence: record.header.sequence,
                mimetype: mimetype.to_string(),
                backend: Arc::downgrade(&self.backend),
            })),
            None => codec::decode(datatype, &record.payload).map(PointValue::Inline),
        }
    }

    /// Group a series' points into half-open `[lower, upper)` bins.
    ///
    /// Bounds must be ascending and non-overlapping; one group is returned
    /// per bin.
    pub fn read_range(
        &self,
        series: &str,
        datatype: &Datatype,
        lowers: &[DateTime<Utc>],
        uppers: &[DateTime<Utc>],
    ) -> Result<Vec<PointGroup>> {
        if lowers.len() != uppers.len() {
            return Err(NatlogError::InvalidQuery(format!(
                "{} lower bounds but {} upper bounds",
                lowers.len(),
                uppers.len()
            )));
        }
        let (Some(&start), Some(&end)) = (lowers.first(), uppers.last()) else {
            return Ok(Vec::new());
        };

        let records = self
            .backend
            .scan_time(datatype.category(), series, start, end)?;

        lowers
            .iter()
            .zip(uppers)
            .map(|(&lower, &upper)| {
                let from = records.partition_point(|r| r.timestamp() < lower);
                let to = records.partition_point(|r| r.timestamp() < upper);
                records[from..to.max(from)]
                    .iter()
                    .map(|r| Ok((r.timestamp(), codec::decode(datatype, &r.payload)?)))
                    .collect::<Result<PointGroup>>()
            })
            .collect()
    }

    /// Flush the backend to durable storage.
    pub fn sync(&self) -> Result<()> {
        self.backend.sync()
    }
}

// =============================================================================
// Tests
// =============================================================================
