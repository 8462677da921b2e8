//! Natlog Database
//!
//! The facade tying the series registry, point store, and query engine
//! together. A `Database` is constructed once and handed to whatever needs
//! it; every operation the transport layer can call is a method here.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::continuous::ContinuousQuery;
use crate::query::{QueryEngine, QueryResult};
use crate::registry::{ConfigUpdate, SeriesConfig, SeriesRegistry};
use crate::store::{BlobHandle, PointStore, ReadResult};
use crate::value::RawValue;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use natlog_common::{BackendKind, NatlogConfig, QueryConfig, Result, Sequence};
use natlog_storage::{FileBackend, MemoryBackend, PartitionBackend, StorageStats};
use std::sync::Arc;

/// Registry file kept next to the partition logs.
pub const REGISTRY_FILE: &str = "series.json";

// =============================================================================
// Database
// =============================================================================

/// A natlog time series database.
pub struct Database {
    registry: Arc<SeriesRegistry>,
    store: Arc<PointStore>,
    engine: QueryEngine,
    query_config: QueryConfig,
}

impl Database {
    /// Open the database described by `config`.
    pub fn open(config: &NatlogConfig) -> Result<Self> {
        match config.storage.backend {
            BackendKind::Memory => {
                tracing::info!("Opening in-memory store");
                Ok(Self::with_backend(
                    Arc::new(MemoryBackend::new()),
                    SeriesRegistry::in_memory(),
                    config.query.clone(),
                ))
            }
            BackendKind::File => {
                let dir = &config.storage.data_directory;
                tracing::info!("Opening file store in {}", dir.display());

                let (backend, recovery) = FileBackend::open(dir, config.storage.sync_writes)?;
                if recovery.bytes_truncated > 0 {
                    tracing::warn!(
                        "Discarded {} bytes of incomplete records during recovery",
                        recovery.bytes_truncated
                    );
                }
                let registry = SeriesRegistry::open(dir.join(REGISTRY_FILE))?;

                Ok(Self::with_backend(Arc::new(backend), registry, config.query.clone()))
            }
        }
    }

    /// A fresh in-memory database with default limits.
    pub fn in_memory() -> Self {
        Self::with_backend(
            Arc::new(MemoryBackend::new()),
            SeriesRegistry::in_memory(),
            QueryConfig::default(),
        )
    }

    /// Assemble a database from its parts.
    pub fn with_backend(
        backend: Arc<dyn PartitionBackend>,
        registry: SeriesRegistry,
        query_config: QueryConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        let store = Arc::new(PointStore::new(backend, registry.clone()));
        let engine = QueryEngine::new(store.clone(), registry.clone(), query_config.max_points);
        Self {
            registry,
            store,
            engine,
            query_config,
        }
    }

    // -------------------------------------------------------------------------
    // Series
    // -------------------------------------------------------------------------

    /// Names of all series.
    pub fn list_series(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn create_series(&self, config: SeriesConfig) -> Result<()> {
        self.registry.create(config)
    }

    pub fn get_series_config(&self, name: &str) -> Option<SeriesConfig> {
        self.registry.get(name)
    }

    pub fn update_series_config(&self, name: &str, update: ConfigUpdate) -> Result<SeriesConfig> {
        self.registry.update(name, update)
    }

    // -------------------------------------------------------------------------
    // Points
    // -------------------------------------------------------------------------

    /// Append a point, returning its sequence number.
    pub fn append_point(
        &self,
        name: &str,
        time: DateTime<Utc>,
        value: impl Into<RawValue>,
    ) -> Result<Sequence> {
        self.store.append(name, time, &value.into())
    }

    /// Read points by sequence; see [`PointStore::read`].
    pub fn read_points(
        &self,
        name: &str,
        offset: Option<Sequence>,
        limit: Option<usize>,
    ) -> Result<ReadResult> {
        self.store.read(name, offset, limit)
    }

    pub fn fetch_blob_bytes(&self, handle: &BlobHandle) -> Result<Bytes> {
        handle.fetch_bytes()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn query<S: AsRef<str>>(
        &self,
        selectors: &[S],
        first: DateTime<Utc>,
        last: DateTime<Utc>,
        npoints: usize,
    ) -> Result<QueryResult> {
        self.engine.query(selectors, first, last, npoints)
    }

    /// Start a continuous query; see [`QueryEngine::query_continuous`].
    pub async fn query_continuous<S: AsRef<str>>(
        &self,
        selectors: &[S],
        first: DateTime<Utc>,
        npoints: usize,
    ) -> Result<(QueryResult, ContinuousQuery)> {
        self.engine
            .query_continuous(selectors, first, npoints, self.query_config.stream_buffer)
            .await
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Flush appended points to durable storage.
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    pub fn stats(&self) -> StorageStats {
        self.store.backend().stats()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use chrono::{Duration, TimeZone};
    use natlog_common::NatlogError;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 8, 26, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_series_lifecycle() {
        let db = Database::in_memory();
        assert!(db.list_series().is_empty());

        db.create_series(SeriesConfig::new("temp", "float32", "mean", "linear").with_unit("C"))
            .expect("create");
        assert_eq!(db.list_series(), vec!["temp".to_string()]);

        let config = db
            .update_series_config(
                "temp",
                ConfigUpdate {
                    description: Some("rack inlet".to_string()),
                    ..Default::default()
                },
            )
            .expect("update");
        assert_eq!(config.unit, "C");
        assert_eq!(db.get_series_config("temp"), Some(config));
    }

    #[test]
    fn test_append_read_query() {
        let db = Database::in_memory();
        db.create_series(SeriesConfig::new("count", "int64", "sum", "zero"))
            .expect("create");

        for i in 0..4 {
            let seq = db
                .append_point("count", base_time() + Duration::minutes(i), i)
                .expect("append");
            assert_eq!(seq, Sequence(i as u64));
        }

        let points = db.read_points("count", Some(Sequence(0)), None).expect("read");
        assert_eq!(points.len(), 4);

        let result = db
            .query(&["count"], base_time(), base_time() + Duration::minutes(3), 2)
            .expect("query");
        assert_eq!(result.columns[0], vec![Some(Value::Int(1)), Some(Value::Int(5))]);
        assert_eq!(db.stats().total_records, 4);
    }

    #[test]
    fn test_blob_fetch() {
        let db = Database::in_memory();
        db.create_series(SeriesConfig::new("frames", "blob:image/jpeg", "closest", "previous"))
            .expect("create");
        db.append_point("frames", base_time(), RawValue::bytes(&b"jpeg"[..]))
            .expect("append");

        let last = db.read_points("frames", None, None).expect("read");
        let handle = last.values[0].as_blob().expect("blob handle");
        assert_eq!(db.fetch_blob_bytes(handle).expect("fetch"), Bytes::from_static(b"jpeg"));
    }

    #[test]
    fn test_open_file_backend() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        let config = NatlogConfig::persistent(temp_dir.path());

        {
            let db = Database::open(&config).expect("open");
            db.create_series(SeriesConfig::new("foo", "int8[2]", "max", "none"))
                .expect("create");
            db.append_point("foo", base_time(), vec![1, 2]).expect("append");
        }

        let db = Database::open(&config).expect("reopen");
        assert_eq!(db.list_series(), vec!["foo".to_string()]);
        let last = db.read_points("foo", None, None).expect("read");
        assert_eq!(
            last.values[0].to_transport().expect("transport"),
            RawValue::from(vec![1, 2])
        );

        let err = db
            .append_point("foo", base_time() - Duration::seconds(1), vec![3, 4])
            .expect_err("out of order after reopen");
        assert!(matches!(err, NatlogError::SeriesTimeOrder(_)));
    }
}
