//! Timestamp helpers used by every entity's `createdAt`/`updatedAt` fields.

use chrono::{DateTime, Timelike, Utc};

/// The current wall-clock time, truncated to second precision so repeated saves within the
/// same second don't create noisy diffs in the registry's JSON files.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}
