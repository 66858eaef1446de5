//! Sync windows and their partitioning into per-request sub-windows.
//!
//! A [`SyncWindow`] is the half-open `[start, end)` range one run is
//! responsible for. The upstream caps how much range a single request may
//! cover, so retrieval walks an explicit worklist of [`SubWindow`]s produced
//! by [`SyncWindow::sub_windows`].

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("invalid sync window: start {start} is not before end {end}")]
    InvalidBounds {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// The unit of one retrieval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    #[must_use]
    pub fn step(self) -> Duration {
        match self {
            Granularity::Hour => Duration::hours(1),
            Granularity::Day => Duration::days(1),
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            other => Err(format!("unknown granularity '{other}' (expected hour|day)")),
        }
    }
}

/// The half-open `[start, end)` range a run fetches. Immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidBounds`] unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(WindowError::InvalidBounds { start, end })
        }
    }

    /// Partitions the window into consecutive sub-windows of one `granularity`
    /// step each. The union of the returned sub-windows covers `[start, end)`
    /// exactly: no gaps, no overlaps, and the final sub-window is clamped to
    /// `end` when the window is not a whole multiple of the step.
    #[must_use]
    pub fn sub_windows(&self, granularity: Granularity) -> Vec<SubWindow> {
        let step = granularity.step();
        let mut out = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = (cursor + step).min(self.end);
            out.push(SubWindow {
                start: cursor,
                end: next,
            });
            cursor = next;
        }
        out
    }
}

/// One bounded slice of a [`SyncWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
