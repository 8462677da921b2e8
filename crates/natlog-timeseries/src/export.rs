//! Natlog Export
//!
//! Whole-database snapshots as JSON, built only from the public read API.
//! Times are RFC 3339 strings; blob values are base64 encoded.
//!
//! ```json
//! {"version": "0.1.0",
//!  "series": [{"config": {...}, "points": [["2013-08-26T01:00:00+00:00", 1]]}]}
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::engine::Database;
use crate::registry::SeriesConfig;
use crate::value::RawValue;
use chrono::{DateTime, Utc};
use data_encoding::BASE64;
use natlog_common::{NatlogError, Result, Sequence};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

// =============================================================================
// Snapshot
// =============================================================================

/// Every series with its configuration and all of its points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub series: Vec<SeriesSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub config: SeriesConfig,
    pub points: Vec<(String, serde_json::Value)>,
}

/// Capture the full contents of `db`, series sorted by name.
pub fn snapshot(db: &Database) -> Result<Snapshot> {
    let mut names = db.list_series();
    names.sort();

    let mut series = Vec::with_capacity(names.len());
    for name in names {
        let Some(config) = db.get_series_config(&name) else {
            continue;
        };
        let blob = config.parsed_datatype()?.is_blob();

        let page = db.read_points(&name, Some(Sequence::FIRST), None)?;
        let points = page
            .timestamps
            .iter()
            .zip(&page.values)
            .map(|(time, value)| -> Result<(String, serde_json::Value)> {
                let value = match value.to_transport()? {
                    RawValue::Bytes(bytes) if blob => serde_json::Value::String(BASE64.encode(&bytes)),
                    other => serde_json::to_value(other)?,
                };
                Ok((time.to_rfc3339(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        series.push(SeriesSnapshot { config, points });
    }

    Ok(Snapshot {
        version: env!("CARGO_PKG_VERSION").to_string(),
        series,
    })
}

/// Serialize a snapshot of `db` to `output`.
pub fn write_json(db: &Database, output: impl Write) -> Result<()> {
    let snapshot = snapshot(db)?;
    serde_json::to_writer(output, &snapshot)?;
    tracing::info!("Exported {} series", snapshot.series.len());
    Ok(())
}

// =============================================================================
// Restore
// =============================================================================

/// Create every series of `snapshot` in `db` and append its points.
pub fn restore(db: &Database, snapshot: Snapshot) -> Result<usize> {
    let mut appended = 0;
    for series in snapshot.series {
        let blob = series.config.parsed_datatype()?.is_blob();
        let name = series.config.name.clone();
        db.create_series(series.config)?;

        for (time, value) in series.points {
            let time = DateTime::parse_from_rfc3339(&time)
                .map_err(|e| NatlogError::Serialization(format!("{:?}: {}", time, e)))?
                .with_timezone(&Utc);
            let value = match value {
                serde_json::Value::String(encoded) if blob => BASE64
                    .decode(encoded.as_bytes())
                    .map(RawValue::bytes)
                    .map_err(|e| NatlogError::Serialization(e.to_string()))?,
                other => RawValue::try_from(other)?,
            };
            db.append_point(&name, time, value)?;
            appended += 1;
        }
    }
    Ok(appended)
}

/// Read a JSON snapshot from `input` into `db`.
pub fn read_json(db: &Database, input: impl Read) -> Result<usize> {
    let snapshot: Snapshot = serde_json::from_reader(input)?;
    let appended = restore(db, snapshot)?;
    tracing::info!("Imported {} points", appended);
    Ok(appended)
}

// =============================================================================
// Tests
// =============================================================================
