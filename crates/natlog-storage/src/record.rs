//! Natlog Record - Point Records and Framing
//!
//! The record shape shared by every value partition and its on-disk framing.
//! Each partition stores the same header columns (series name, sequence,
//! timestamp); only the payload encoding differs per category.
//!
//! Frame layout (little endian):
//! body_len(4) | series_len(2) | series | sequence(8) | timestamp_us(8) | payload | crc32(4)
//!
//! The checksum covers everything before it, including the length prefix.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use natlog_common::utils::{crc32, from_micros, to_micros, verify_crc32};
use natlog_common::{NatlogError, Result, Sequence};
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Length prefix in front of every record body.
pub const RECORD_LEN_SIZE: usize = 4;
/// Trailing checksum after every record body.
pub const RECORD_CRC_SIZE: usize = 4;
/// series_len(2) + sequence(8) + timestamp(8)
const BODY_FIXED_SIZE: usize = 18;

// =============================================================================
// Category
// =============================================================================

/// Physical value partition a series' points are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    Int = 0,
    Float = 1,
    Array = 2,
    Blob = 3,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Int, Category::Float, Category::Array, Category::Blob];

    /// Position of this category in per-partition arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Log file holding this partition in a file-backed store.
    pub fn file_name(self) -> &'static str {
        match self {
            Category::Int => "int.log",
            Category::Float => "float.log",
            Category::Array => "array.log",
            Category::Blob => "blob.log",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Int => "int",
            Category::Float => "float",
            Category::Array => "array",
            Category::Blob => "blob",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Point Record
// =============================================================================

/// Columns common to every partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointHeader {
    pub series: String,
    pub sequence: Sequence,
    pub timestamp: DateTime<Utc>,
}

/// One stored point: shared header plus category-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointRecord {
    pub header: PointHeader,
    pub payload: Bytes,
}

impl PointRecord {
    pub fn new(
        series: impl Into<String>,
        sequence: Sequence,
        timestamp: DateTime<Utc>,
        payload: Bytes,
    ) -> Self {
        Self {
            header: PointHeader {
                series: series.into(),
                sequence,
                timestamp,
            },
            payload,
        }
    }

    pub fn sequence(&self) -> Sequence {
        self.header.sequence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp
    }

    /// Size of this record once framed.
    pub fn encoded_len(&self) -> usize {
        RECORD_LEN_SIZE + self.body_len() + RECORD_CRC_SIZE
    }

    fn body_len(&self) -> usize {
        BODY_FIXED_SIZE + self.header.series.len() + self.payload.len()
    }

    /// Serialize the record to a checksummed frame.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let series_len = u16::try_from(self.header.series.len()).map_err(|_| {
            NatlogError::Storage(format!(
                "series name of {} bytes exceeds record limit",
                self.header.series.len()
            ))
        })?;
        let body_len = u32::try_from(self.body_len())
            .map_err(|_| NatlogError::Storage("record payload too large".to_string()))?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32_le(body_len);
        buf.put_u16_le(series_len);
        buf.put_slice(self.header.series.as_bytes());
        buf.put_u64_le(self.header.sequence.0);
        buf.put_i64_le(to_micros(self.header.timestamp));
        buf.put_slice(&self.payload);

        let checksum = crc32(&buf);
        buf.put_u32_le(checksum);

        Ok(buf.freeze())
    }

    /// Total frame length announced by the prefix at the start of `data`,
    /// or `None` if the prefix itself is incomplete.
    pub fn frame_len(data: &[u8]) -> Option<usize> {
        if data.len() < RECORD_LEN_SIZE {
            return None;
        }
        let body_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        Some(RECORD_LEN_SIZE + body_len + RECORD_CRC_SIZE)
    }

    /// Deserialize one complete frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let frame_len = Self::frame_len(data)
            .ok_or_else(|| NatlogError::Corruption("record too small".to_string()))?;
        if data.len() != frame_len || frame_len < RECORD_LEN_SIZE + BODY_FIXED_SIZE + RECORD_CRC_SIZE
        {
            return Err(NatlogError::Corruption("record length mismatch".to_string()));
        }

        let (framed, mut trailer) = data.split_at(frame_len - RECORD_CRC_SIZE);
        let stored_checksum = trailer.get_u32_le();
        if !verify_crc32(framed, stored_checksum) {
            return Err(NatlogError::Corruption("record checksum mismatch".to_string()));
        }

        let mut buf = &framed[RECORD_LEN_SIZE..];
        let series_len = buf.get_u16_le() as usize;
        if buf.remaining() < series_len + 16 {
            return Err(NatlogError::Corruption("record header truncated".to_string()));
        }
        let series = std::str::from_utf8(&buf[..series_len])
            .map_err(|e| NatlogError::Corruption(format!("series name not UTF-8: {}", e)))?
            .to_string();
        buf.advance(series_len);

        let sequence = Sequence(buf.get_u64_le());
        let micros = buf.get_i64_le();
        let timestamp = from_micros(micros)
            .ok_or_else(|| NatlogError::Corruption(format!("timestamp out of range: {}", micros)))?;
        let payload = Bytes::copy_from_slice(buf);

        Ok(Self {
            header: PointHeader {
                series,
                sequence,
                timestamp,
            },
            payload,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
