//! SOA serial numbers derived from wall-clock time.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Offset that keeps serials in the upper half of the u32 range.
const SERIAL_OFFSET: u64 = 0x8000_0000;

/// Serial for the 15-second bucket containing `now`.
///
/// Years count from 1900; months are zero-based.
pub fn serial_at(now: DateTime<Utc>) -> u32 {
    let mut serial = u64::from(now.year().saturating_sub(1900).max(0) as u32);
    serial = serial * 12 + u64::from(now.month0());
    serial = serial * 31 + u64::from(now.day());
    serial = serial * 24 + u64::from(now.hour());
    serial = serial * 60 + u64::from(now.minute());
    serial = serial * 4 + u64::from(now.second() / 15);
    (serial + SERIAL_OFFSET) as u32
}

/// Serial for a zone whose content just changed.
///
/// Never moves backwards relative to `previous`, so two changes inside one
/// bucket still produce distinct serials.
pub fn next_serial(previous: Option<u32>, now: DateTime<Utc>) -> u32 {
    let fresh = serial_at(now);
    match previous {
        Some(prev) if prev >= fresh => prev.wrapping_add(1),
        _ => fresh,
    }
}
