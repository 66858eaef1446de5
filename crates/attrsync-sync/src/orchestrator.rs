//! The sync state machine: resolve window → resolve ids → retrieve →
//! normalize → load → merge.
//!
//! Any step's failure is terminal for the run; retries belong to whoever
//! scheduled it.

use std::future::Future;
use std::pin::Pin;

use attrsync_core::{EntityId, IdSource, Row, SyncWindow, TableSpec};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::store::SyncStore;
use crate::watermark::{resolve_window, WindowBounds};
use crate::SyncError;

/// Outcome of one sync run. `num_processed` counts the normalized records
/// handed to the loader; `output_rows` is the appended-row count the
/// warehouse acknowledged for this run's batch, present only when the run
/// staged anything. On any successful run the two agree; the durable table's
/// post-merge total covers all staged history and is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub table: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub num_processed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_rows: Option<u64>,
}

impl SyncSummary {
    fn empty(table: &TableSpec, window: SyncWindow) -> Self {
        Self {
            table: table.durable(),
            start: window.start,
            end: window.end,
            num_processed: 0,
            output_rows: None,
        }
    }
}

/// Knobs the watermark resolver needs, lifted out of `AppConfig` so the
/// engine does not depend on the full configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    pub overlap_days: i64,
    pub lookback_days: i64,
}

/// Runs one sync end to end and returns its summary.
///
/// `fetch` retrieves raw upstream rows for the resolved window and id set;
/// `normalize` turns them into schema-ordered warehouse rows stamped with the
/// run's `batched_at`. An empty id set or an empty retrieval short-circuits
/// without touching staging or the durable table.
///
/// # Errors
///
/// Propagates the first failing step's error; nothing is retried.
pub async fn run_sync<S, R, F, N>(
    store: &S,
    table: &TableSpec,
    ids: &IdSource,
    bounds: WindowBounds,
    policy: WindowPolicy,
    now: DateTime<Utc>,
    fetch: F,
    normalize: N,
) -> Result<SyncSummary, SyncError>
where
    S: SyncStore,
    F: FnOnce(
        SyncWindow,
        Vec<EntityId>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<R>, SyncError>> + Send>>,
    N: FnOnce(Vec<R>, DateTime<Utc>) -> Result<Vec<Row>, SyncError>,
{
    let watermark = if bounds.start.is_some() {
        None
    } else {
        store.max_time_bucket(table).await?
    };
    let window = resolve_window(bounds, watermark, policy.overlap_days, policy.lookback_days, now)?;
    info!(
        table = %table.durable(),
        start = %window.start,
        end = %window.end,
        "resolved sync window"
    );

    let ids = match ids {
        IdSource::Query(query) => store.resolve_ids(query).await?,
        IdSource::Static(ids) => ids.clone(),
    };
    if ids.is_empty() {
        info!(table = %table.durable(), "no entities to sync");
        return Ok(SyncSummary::empty(table, window));
    }

    let raw = fetch(window, ids).await?;
    if raw.is_empty() {
        info!(table = %table.durable(), "upstream returned no rows");
        return Ok(SyncSummary::empty(table, window));
    }

    let rows = normalize(raw, now)?;
    if rows.is_empty() {
        return Ok(SyncSummary::empty(table, window));
    }

    let num_processed = rows.len() as u64;
    let output_rows = store.append_rows(table, &rows).await?;
    let durable_rows = store.merge(table).await?;
    info!(
        table = %table.durable(),
        num_processed,
        output_rows,
        durable_rows,
        "sync complete"
    );

    Ok(SyncSummary {
        table: table.durable(),
        start: window.start,
        end: window.end,
        num_processed,
        output_rows: Some(output_rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrsync_core::{FieldValue, FACEBOOK_ADSET_TABLE};
    use chrono::TimeZone;
    use std::sync::Mutex;

    const POLICY: WindowPolicy = WindowPolicy {
        overlap_days: 2,
        lookback_days: 30,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 8, 30, 0).unwrap()
    }

    /// Records every store call; `resolve_ids` serves a canned id list.
    /// Staging accumulates across runs and `merge` reports the deduplicated
    /// history count, like the real warehouse.
    #[derive(Default)]
    struct FakeStore {
        calls: Mutex<Vec<String>>,
        ids: Vec<EntityId>,
        watermark: Option<DateTime<Utc>>,
        staging: Mutex<Vec<Row>>,
    }

    impl FakeStore {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl SyncStore for FakeStore {
        async fn max_time_bucket(
            &self,
            _table: &TableSpec,
        ) -> Result<Option<DateTime<Utc>>, SyncError> {
            self.record("max_time_bucket");
            Ok(self.watermark)
        }

        async fn resolve_ids(&self, _id_query: &str) -> Result<Vec<EntityId>, SyncError> {
            self.record("resolve_ids");
            Ok(self.ids.clone())
        }

        async fn append_rows(&self, _table: &TableSpec, rows: &[Row]) -> Result<u64, SyncError> {
            self.record("append_rows");
            self.staging.lock().unwrap().extend(rows.iter().cloned());
            Ok(rows.len() as u64)
        }

        async fn merge(&self, _table: &TableSpec) -> Result<u64, SyncError> {
            self.record("merge");
            let staging = self.staging.lock().unwrap();
            let mut distinct: Vec<&Row> = Vec::new();
            for row in staging.iter() {
                if !distinct.contains(&row) {
                    distinct.push(row);
                }
            }
            Ok(distinct.len() as u64)
        }
    }

    fn one_cell_rows(raw: Vec<&'static str>, _batched_at: DateTime<Utc>) -> Result<Vec<Row>, SyncError> {
        Ok(raw
            .into_iter()
            .map(|r| vec![FieldValue::Text(Some(r.to_string()))])
            .collect())
    }

    #[tokio::test]
    async fn empty_id_set_short_circuits_without_store_writes() {
        let store = FakeStore::default();

        let summary = run_sync(
            &store,
            &FACEBOOK_ADSET_TABLE,
            &IdSource::Static(vec![]),
            WindowBounds::default(),
            POLICY,
            now(),
            |_window, _ids| Box::pin(async { Ok(vec!["unreachable"]) }),
            one_cell_rows,
        )
        .await
        .expect("run should succeed");

        assert_eq!(summary.num_processed, 0);
        assert_eq!(summary.output_rows, None);
        assert_eq!(store.calls(), vec!["max_time_bucket"]);
    }

    #[tokio::test]
    async fn empty_retrieval_skips_load_and_merge() {
        let store = FakeStore {
            ids: vec![EntityId::from("a")],
            ..FakeStore::default()
        };

        let summary = run_sync(
            &store,
            &FACEBOOK_ADSET_TABLE,
            &IdSource::Query("SELECT id"),
            WindowBounds::default(),
            POLICY,
            now(),
            |_window, _ids| Box::pin(async { Ok(Vec::<&'static str>::new()) }),
            one_cell_rows,
        )
        .await
        .expect("run should succeed");

        assert_eq!(summary.num_processed, 0);
        assert_eq!(summary.output_rows, None);
        assert_eq!(store.calls(), vec!["max_time_bucket", "resolve_ids"]);
    }

    #[tokio::test]
    async fn successful_run_reports_consistent_counts() {
        let store = FakeStore {
            ids: vec![EntityId::from("a"), EntityId::from("b")],
            watermark: Some(Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap()),
            ..FakeStore::default()
        };

        let summary = run_sync(
            &store,
            &FACEBOOK_ADSET_TABLE,
            &IdSource::Query("SELECT id"),
            WindowBounds::default(),
            POLICY,
            now(),
            |_window, _ids| Box::pin(async { Ok(vec!["r1", "r2", "r3"]) }),
            one_cell_rows,
        )
        .await
        .expect("run should succeed");

        assert_eq!(summary.num_processed, 3);
        assert_eq!(summary.output_rows, Some(3));
        assert_eq!(summary.num_processed, summary.output_rows.unwrap());
        assert_eq!(
            store.calls(),
            vec!["max_time_bucket", "resolve_ids", "append_rows", "merge"]
        );
        // Watermark minus the 2-day overlap.
        assert_eq!(
            summary.start,
            Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn output_rows_counts_this_runs_batch_not_staging_history() {
        let store = FakeStore {
            ids: vec![EntityId::from("a")],
            watermark: Some(Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap()),
            ..FakeStore::default()
        };

        let first = run_sync(
            &store,
            &FACEBOOK_ADSET_TABLE,
            &IdSource::Query("SELECT id"),
            WindowBounds::default(),
            POLICY,
            now(),
            |_window, _ids| Box::pin(async { Ok(vec!["r1", "r2"]) }),
            one_cell_rows,
        )
        .await
        .expect("first run should succeed");
        assert_eq!(first.num_processed, 2);
        assert_eq!(first.output_rows, Some(2));

        // The second batch overlaps the first, so the deduplicated staging
        // history holds 4 rows while this run appended 3.
        let second = run_sync(
            &store,
            &FACEBOOK_ADSET_TABLE,
            &IdSource::Query("SELECT id"),
            WindowBounds::default(),
            POLICY,
            now(),
            |_window, _ids| Box::pin(async { Ok(vec!["r2", "r3", "r4"]) }),
            one_cell_rows,
        )
        .await
        .expect("second run should succeed");

        assert_eq!(second.num_processed, 3);
        assert_eq!(second.output_rows, Some(3));
        assert_eq!(second.num_processed, second.output_rows.unwrap());
        assert_eq!(store.staging.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn explicit_start_skips_the_watermark_query() {
        let store = FakeStore {
            ids: vec![EntityId::from("a")],
            ..FakeStore::default()
        };

        let summary = run_sync(
            &store,
            &FACEBOOK_ADSET_TABLE,
            &IdSource::Query("SELECT id"),
            WindowBounds::parse(Some("2024-05-01"), Some("2024-05-03")).unwrap(),
            POLICY,
            now(),
            |_window, _ids| Box::pin(async { Ok(vec!["r1"]) }),
            one_cell_rows,
        )
        .await
        .expect("run should succeed");

        assert!(!store.calls().contains(&"max_time_bucket".to_string()));
        assert_eq!(
            summary.start,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_terminal() {
        let store = FakeStore {
            ids: vec![EntityId::from("a")],
            ..FakeStore::default()
        };

        let result = run_sync(
            &store,
            &FACEBOOK_ADSET_TABLE,
            &IdSource::Query("SELECT id"),
            WindowBounds::default(),
            POLICY,
            now(),
            |_window, _ids| {
                Box::pin(async {
                    Err::<Vec<&'static str>, _>(SyncError::UnknownTable("boom".to_string()))
                })
            },
            one_cell_rows,
        )
        .await;

        assert!(matches!(result, Err(SyncError::UnknownTable(_))));
        assert!(!store.calls().contains(&"append_rows".to_string()));
        assert!(!store.calls().contains(&"merge".to_string()));
    }
}
