use chrono::prelude::*;

/// Get the time since the UNIX epoch in microseconds
///
/// Span timestamps and annotation timestamps are recorded at this
/// resolution, matching what the collector expects.
pub fn us_since_epoch() -> u64 {
    let now = Utc::now();
    (now.timestamp() as u64) * 1_000_000 + (now.timestamp_subsec_micros() as u64)
}
