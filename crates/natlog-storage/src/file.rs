//! Natlog File Backend - Durable Partition Logs
//!
//! File-backed partition storage. Each value category is an append-only log
//! file in the data directory; on open every log is replayed into an
//! in-memory index that serves all reads.
//!
//! Key Features:
//! - Write-then-publish: a record is on disk before readers can see it
//! - All-or-nothing frame writes: a failed append is cut back off the log
//! - Optional fsync on every append
//! - Crash recovery that truncates a torn or corrupt tail
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::backend::{MemoryBackend, PartitionBackend, StorageStats};
use crate::record::{Category, PointRecord};
use chrono::{DateTime, Utc};
use natlog_common::{NatlogError, Result, Sequence};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

// =============================================================================
// Recovery Result
// =============================================================================

/// Outcome of replaying the partition logs on open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Records replayed into the index
    pub records_recovered: usize,
    /// Bytes discarded from torn or corrupt log tails
    pub bytes_truncated: u64,
    /// Number of partition logs scanned
    pub partitions_scanned: usize,
}

// =============================================================================
// Partition Log
// =============================================================================

/// Append target of one partition log.
trait LogFile: Write {
    fn log_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync_log(&self) -> io::Result<()>;
}

impl LogFile for File {
    fn log_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync_log(&self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writer of one partition log. Poisoned once a failed frame could not be
/// cut back off, since anything appended after it would be lost on replay.
struct PartitionWriter<L: LogFile = File> {
    log: L,
    poisoned: bool,
}

impl<L: LogFile> PartitionWriter<L> {
    fn new(log: L) -> Self {
        Self { log, poisoned: false }
    }

    /// Write a whole frame or leave the log as it was.
    fn append_frame(&mut self, category: Category, frame: &[u8], sync: bool) -> Result<()> {
        if self.poisoned {
            return Err(NatlogError::Storage(format!(
                "{} log is unwritable after a failed append",
                category
            )));
        }

        let len = self.log.log_len()?;
        let written = self
            .log
            .write_all(frame)
            .and_then(|_| self.log.flush())
            .and_then(|_| if sync { self.log.sync_log() } else { Ok(()) });

        if let Err(e) = written {
            if let Err(rollback) = self.log.truncate_to(len) {
                self.poisoned = true;
                tracing::error!(
                    "Could not remove partial {} record at offset {}: {}",
                    category,
                    len,
                    rollback
                );
            } else {
                tracing::warn!("Removed partial {} record at offset {} after: {}", category, len, e);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

// =============================================================================
// File Backend
// =============================================================================

/// Durable partition storage backed by one append-only file per category.
pub struct FileBackend {
    data_dir: PathBuf,
    index: MemoryBackend,
    writers: [Mutex<PartitionWriter>; 4],
    sync_writes: bool,
}

impl FileBackend {
    /// Open (or create) the partition logs in `data_dir`, replaying existing records.
    pub fn open(data_dir: impl Into<PathBuf>, sync_writes: bool) -> Result<(Self, RecoveryResult)> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        let index = MemoryBackend::new();
        let mut recovery = RecoveryResult::default();

        for category in Category::ALL {
            let path = data_dir.join(category.file_name());
            Self::replay(&path, category, &index, &mut recovery)?;
        }

        let writers = [
            Self::open_writer(&data_dir, Category::Int)?,
            Self::open_writer(&data_dir, Category::Float)?,
            Self::open_writer(&data_dir, Category::Array)?,
            Self::open_writer(&data_dir, Category::Blob)?,
        ];

        tracing::info!(
            "Partition recovery: {} records replayed from {} logs, {} bytes truncated",
            recovery.records_recovered,
            recovery.partitions_scanned,
            recovery.bytes_truncated
        );

        Ok((
            Self {
                data_dir,
                index,
                writers,
                sync_writes,
            },
            recovery,
        ))
    }

    /// Directory holding the partition logs.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn open_writer(data_dir: &Path, category: Category) -> Result<Mutex<PartitionWriter>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join(category.file_name()))?;
        Ok(Mutex::new(PartitionWriter::new(file)))
    }

    /// Replay one partition log into the index, truncating any bad tail.
    fn replay(
        path: &Path,
        category: Category,
        index: &MemoryBackend,
        recovery: &mut RecoveryResult,
    ) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        recovery.partitions_scanned += 1;

        let mut buffer = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut buffer)?;

        let mut offset = 0;
        while offset < buffer.len() {
            let Some(frame_len) = PointRecord::frame_len(&buffer[offset..]) else {
                break;
            };
            if offset + frame_len > buffer.len() {
                break;
            }

            match PointRecord::from_bytes(&buffer[offset..offset + frame_len]) {
                Ok(record) => {
                    index.append(category, record).map_err(|e| {
                        NatlogError::Corruption(format!(
                            "{} log at offset {}: {}",
                            category, offset, e
                        ))
                    })?;
                    recovery.records_recovered += 1;
                    offset += frame_len;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {} record at offset {}: {}", category, offset, e);
                    break;
                }
            }
        }

        if offset < buffer.len() {
            let discarded = (buffer.len() - offset) as u64;
            tracing::warn!(
                "Truncating {} bytes from the tail of {}",
                discarded,
                path.display()
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(offset as u64)?;
            file.sync_all()?;
            recovery.bytes_truncated += discarded;
        }

        Ok(())
    }
}

impl PartitionBackend for FileBackend {
    fn append(&self, category: Category, record: PointRecord) -> Result<()> {
        let frame = record.to_bytes()?;

        // The writer lock also orders publication into the index, so file
        // order and index order agree.
        let mut writer = self.writers[category.index()].lock();
        self.index.check_append(category, &record)?;
        writer.append_frame(category, &frame, self.sync_writes)?;

        self.index.append(category, record)
    }

    fn last(&self, category: Category, series: &str) -> Result<Option<PointRecord>> {
        self.index.last(category, series)
    }

    fn get(&self, category: Category, series: &str, sequence: Sequence) -> Result<Option<PointRecord>> {
        self.index.get(category, series, sequence)
    }

    fn scan_sequence(
        &self,
        category: Category,
        series: &str,
        start: Sequence,
        limit: Option<usize>,
    ) -> Result<Vec<PointRecord>> {
        self.index.scan_sequence(category, series, start, limit)
    }

    fn scan_time(
        &self,
        category: Category,
        series: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Result<Vec<PointRecord>> {
        self.index.scan_time(category, series, lower, upper)
    }

    fn sync(&self) -> Result<()> {
        for writer in &self.writers {
            writer.lock().log.sync_all()?;
        }
        Ok(())
    }

    fn stats(&self) -> StorageStats {
        self.index.stats()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{Duration, TimeZone};

    fn record(series: &str, seq: u64) -> PointRecord {
        PointRecord::new(
            series,
            Sequence(seq),
            Utc.with_ymd_and_hms(2013, 8, 26, 0, 0, 0).unwrap() + Duration::seconds(seq as i64),
            Bytes::from(format!("value-{}", seq)),
        )
    }

    #[test]
    fn test_file_backend_reopen() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");

        {
            let (backend, recovery) =
                FileBackend::open(temp_dir.path(), true).expect("failed to open backend");
            assert_eq!(recovery.records_recovered, 0);

            for i in 0..5 {
                backend.append(Category::Int, record("ints", i)).expect("append int");
            }
            backend.append(Category::Blob, record("blobs", 0)).expect("append blob");
        }

        let (backend, recovery) =
            FileBackend::open(temp_dir.path(), true).expect("failed to reopen backend");
        assert_eq!(recovery.records_recovered, 6);
        assert_eq!(recovery.bytes_truncated, 0);

        let last = backend.last(Category::Int, "ints").expect("last").expect("record");
        assert_eq!(last, record("ints", 4));

        let blob = backend
            .get(Category::Blob, "blobs", Sequence(0))
            .expect("get")
            .expect("record");
        assert_eq!(blob.payload, Bytes::from("value-0"));

        backend.append(Category::Int, record("ints", 5)).expect("append after reopen");
    }

    /// Log that accepts `capacity` bytes and then fails every write.
    struct ShortLog {
        data: Vec<u8>,
        capacity: usize,
    }

    impl Write for ShortLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogFile for ShortLog {
        fn log_len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }

        fn sync_log(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_append_leaves_no_partial_frame() {
        let first = record("f", 0).to_bytes().expect("encode");
        let second = record("f", 1).to_bytes().expect("encode");

        let mut writer = PartitionWriter::new(ShortLog {
            data: Vec::new(),
            capacity: first.len() + second.len() / 2,
        });
        writer
            .append_frame(Category::Float, &first, false)
            .expect("first frame fits");
        let err = writer
            .append_frame(Category::Float, &second, false)
            .expect_err("second frame does not fit");
        assert!(matches!(err, NatlogError::Io(_)));
        assert_eq!(writer.log.data, first.to_vec());
        assert!(!writer.poisoned);

        // Once space is available the next frame follows the last good one.
        writer.log.capacity = usize::MAX;
        writer
            .append_frame(Category::Float, &second, false)
            .expect("retry succeeds");
        assert_eq!(PointRecord::frame_len(&writer.log.data), Some(first.len()));
        let replayed = PointRecord::from_bytes(&writer.log.data[first.len()..]).expect("decode");
        assert_eq!(replayed, record("f", 1));
    }

    #[test]
    fn test_file_backend_truncates_torn_tail() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");

        {
            let (backend, _) = FileBackend::open(temp_dir.path(), false).expect("open");
            backend.append(Category::Float, record("f", 0)).expect("append 0");
            backend.append(Category::Float, record("f", 1)).expect("append 1");
            backend.sync().expect("sync");
        }

        // Simulate a crash halfway through a third record.
        let path = temp_dir.path().join(Category::Float.file_name());
        let partial = record("f", 2).to_bytes().expect("encode");
        let mut file = OpenOptions::new().append(true).open(&path).expect("open log");
        file.write_all(&partial[..partial.len() / 2]).expect("write partial");
        drop(file);

        let (backend, recovery) = FileBackend::open(temp_dir.path(), false).expect("reopen");
        assert_eq!(recovery.records_recovered, 2);
        assert_eq!(recovery.bytes_truncated, (partial.len() / 2) as u64);

        backend.append(Category::Float, record("f", 2)).expect("append replaces torn record");
        drop(backend);

        let (_backend, recovery) = FileBackend::open(temp_dir.path(), false).expect("reopen again");
        assert_eq!(recovery.records_recovered, 3);
        assert_eq!(recovery.bytes_truncated, 0);
    }
}
