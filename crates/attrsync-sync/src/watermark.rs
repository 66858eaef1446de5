//! Sync-window resolution: explicit bounds, durable-table watermark, or the
//! default look-back for a cold start.

use attrsync_core::SyncWindow;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::SyncError;

/// Caller-supplied window bounds; either side may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowBounds {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl WindowBounds {
    /// Parses optional `YYYY-MM-DD` bound strings as supplied on the CLI or
    /// in a dispatch request.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidBound`] if a supplied value does not parse.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, SyncError> {
        Ok(Self {
            start: start.map(|s| parse_bound("start", s)).transpose()?,
            end: end.map(|s| parse_bound("end", s)).transpose()?,
        })
    }
}

fn parse_bound(which: &'static str, value: &str) -> Result<NaiveDate, SyncError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| SyncError::InvalidBound {
        which,
        value: value.to_string(),
    })
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Resolves the run's `[start, end)` window.
///
/// Explicit bounds win verbatim. Otherwise `start` backs off from the durable
/// table's watermark by `overlap_days` to re-fetch late-arriving data, and
/// falls back to `lookback_days` before `end` when the table is empty. `end`
/// defaults to `now` truncated to the start of day.
///
/// # Errors
///
/// Returns [`SyncError::Window`] if the resolved bounds are not `start < end`.
pub fn resolve_window(
    bounds: WindowBounds,
    watermark: Option<DateTime<Utc>>,
    overlap_days: i64,
    lookback_days: i64,
    now: DateTime<Utc>,
) -> Result<SyncWindow, SyncError> {
    let end = bounds
        .end
        .map_or_else(|| midnight(now.date_naive()), midnight);

    let start = match (bounds.start, watermark) {
        (Some(date), _) => midnight(date),
        (None, Some(mark)) => mark - Duration::days(overlap_days),
        (None, None) => end - Duration::days(lookback_days),
    };

    Ok(SyncWindow::new(start, end)?)
}
