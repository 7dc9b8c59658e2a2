//! Timestamps and time ranges for the ordering index.
//!
//! Index scores are integer nanoseconds since the Unix epoch. A `TimeRange`
//! is inclusive on both ends; a missing bound is open (`-inf` / `+inf` on the
//! wire).

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wire form of an open lower bound.
const NEG_INF: &str = "-inf";
/// Wire form of an open upper bound.
const POS_INF: &str = "+inf";

/// A point in time with nanosecond resolution.
///
/// # Invariants
///
/// - The value is nanoseconds since the Unix epoch and may be negative for
///   instants before 1970.
/// - Conversions from `SystemTime` saturate at the `i64` limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from raw nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// The current wall clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a `SystemTime`, saturating instead of overflowing.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(i64::try_from(after.as_nanos()).unwrap_or(i64::MAX)),
            Err(before) => Self(
                i64::try_from(before.duration().as_nanos()).map_or(i64::MIN, |nanos| -nanos),
            ),
        }
    }

    /// This timestamp moved forward by `duration`, saturating.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    /// This timestamp moved backward by `duration`, saturating.
    #[must_use]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(nanos))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive range of index scores.
///
/// `None` on either side means the range is unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    /// Lower bound, inclusive.
    pub from: Option<Timestamp>,
    /// Upper bound, inclusive.
    pub to: Option<Timestamp>,
}

impl TimeRange {
    /// Create a range from optional bounds.
    #[must_use]
    pub const fn new(from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        Self { from, to }
    }

    /// A range with both bounds set.
    #[must_use]
    pub const fn between(from: Timestamp, to: Timestamp) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// The unbounded range.
    #[must_use]
    pub const fn all() -> Self {
        Self { from: None, to: None }
    }

    /// Whether `score` falls inside the range.
    #[must_use]
    pub fn contains(&self, score: i64) -> bool {
        self.from.is_none_or(|from| score >= from.as_nanos())
            && self.to.is_none_or(|to| score <= to.as_nanos())
    }

    /// Lower bound as a store argument (`-inf` when open).
    #[must_use]
    pub fn min_arg(&self) -> String {
        self.from
            .map_or_else(|| NEG_INF.to_string(), |from| from.as_nanos().to_string())
    }

    /// Upper bound as a store argument (`+inf` when open).
    #[must_use]
    pub fn max_arg(&self) -> String {
        self.to
            .map_or_else(|| POS_INF.to_string(), |to| to.as_nanos().to_string())
    }

    /// Parse the argument pair produced by `min_arg` / `max_arg`.
    ///
    /// Returns `None` if either bound is neither an integer nor the matching
    /// infinity marker.
    #[must_use]
    pub fn from_args(min: &str, max: &str) -> Option<Self> {
        let from = match min {
            NEG_INF => None,
            other => Some(Timestamp(other.parse().ok()?)),
        };
        let to = match max {
            POS_INF => None,
            other => Some(Timestamp(other.parse().ok()?)),
        };
        Some(Self { from, to })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min_arg(), self.max_arg())
    }
}
