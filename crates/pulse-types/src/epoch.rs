//! Reset epochs.
//!
//! An [`Epoch`] is a millisecond timestamp that only ever moves forward.
//! Every vote record, counter document and stream event carries the epoch
//! that was current when it was written, so readers can discard anything
//! left over from before a reset by comparing epochs rather than wall-clock
//! timestamps, which may be skewed between writer and reader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Monotonically increasing marker separating votes before and after a
/// poll reset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Epoch(pub u64);

impl Epoch {
    /// The epoch assigned to a freshly created poll, derived from its
    /// creation time.
    pub fn starting_at(created_at: DateTime<Utc>) -> Self {
        Self(u64::try_from(created_at.timestamp_millis()).unwrap_or(0))
    }

    /// Compute the epoch that follows `self` given the current wall clock.
    ///
    /// The result is the current time in milliseconds, or `self + 1` when
    /// the clock has not moved past `self` (same millisecond, or a clock
    /// that went backwards). The result is always strictly greater than
    /// `self` unless `self` is already `u64::MAX`.
    pub fn advance(self, now: DateTime<Utc>) -> Self {
        let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let bumped = self.0.saturating_add(1);
        Self(now_ms.max(bumped))
    }

    /// Return the raw millisecond value.
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for Epoch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
