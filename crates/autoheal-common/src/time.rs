//! ---
//! ah_section: "01-core-functionality"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Shared primitives and utilities for the healing pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};

/// Lower bound applied to elapsed time before it is used as a divisor.
pub const MIN_ELAPSED: Duration = Duration::from_millis(1);

/// Timestamp for log records: RFC 3339, UTC, millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Seconds elapsed since `start`, never below [`MIN_ELAPSED`].
pub fn elapsed_secs(start: Instant) -> f64 {
    start.elapsed().max(MIN_ELAPSED).as_secs_f64()
}

/// Round a latency to two decimals for tabular logs.
pub fn round_ms(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
