//! Natlog Utils - Utility Functions
//!
//! Checksums for log record integrity, timestamp conversion for the
//! on-disk record format, and size formatting for operator output.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use chrono::{DateTime, Utc};

// =============================================================================
// Checksum Functions
// =============================================================================

/// Compute CRC32 checksum for data integrity verification.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Verify data against expected CRC32 checksum.
#[inline]
pub fn verify_crc32(data: &[u8], expected: u32) -> bool {
    crc32(data) == expected
}

// =============================================================================
// Timestamp Conversion
// =============================================================================

/// Microseconds since the Unix epoch; the resolution points are stored at.
#[inline]
pub fn to_micros(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

/// Inverse of [`to_micros`]. Returns `None` outside chrono's representable range.
#[inline]
pub fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

// =============================================================================
// Size Formatting
// =============================================================================

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte size as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, SIZE_UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, SIZE_UNITS[unit_index])
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_crc32() {
        let data = b"hello world";
        let checksum = crc32(data);
        assert!(verify_crc32(data, checksum));
        assert!(!verify_crc32(b"hello worlD", checksum));
    }

    #[test]
    fn test_micros_conversion() {
        let t = Utc.with_ymd_and_hms(2013, 8, 26, 2, 29, 59).unwrap();
        let micros = to_micros(t);
        assert_eq!(from_micros(micros), Some(t));
        assert_eq!(from_micros(0), Some(DateTime::UNIX_EPOCH));
    }
}
