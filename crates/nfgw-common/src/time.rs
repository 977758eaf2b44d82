//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Shared primitives and utilities for the gateway runtime."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Closed time range `[from, to]` used by windowed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Range covering the trailing `window` that ends at `now`.
    ///
    /// Windows too large to represent saturate at the earliest representable instant.
    pub fn trailing(now: DateTime<Utc>, window: Duration) -> Self {
        let from = TimeDelta::from_std(window)
            .ok()
            .and_then(|delta| now.checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { from, to: now }
    }

    /// Length of the range.
    pub fn span(&self) -> Duration {
        (self.to - self.from).to_std().unwrap_or_default()
    }
}

/// Split a timestamp into whole seconds and nanoseconds, the layout used by
/// protobuf `Timestamp`.
pub fn to_seconds_nanos(ts: DateTime<Utc>) -> (i64, i32) {
    (ts.timestamp(), ts.timestamp_subsec_nanos() as i32)
}

/// Inverse of [`to_seconds_nanos`]; out-of-range values yield `None`.
pub fn from_seconds_nanos(seconds: i64, nanos: i32) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(nanos).ok()?;
    DateTime::from_timestamp(seconds, nanos)
}
