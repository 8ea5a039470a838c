/// Utility functions for formatting readings
use time::{format_description, OffsetDateTime};

use crate::models::Reading;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Serial number form of an address: separators removed, uppercase.
pub fn serial_number(address: &str) -> String {
    address.replace(':', "").to_uppercase()
}

/// One-line summary of a reading for logs
pub fn format_reading(reading: &Reading) -> String {
    let kind = reading.kind();
    format!(
        "[{}] {}: {} {} (rssi {}, seen {})",
        reading.device.address,
        kind.as_str(),
        reading.measurement,
        kind.unit(),
        reading.device.rssi,
        format_datetime(&reading.device.seen_at)
    )
}
