//! Warehouse seam for the orchestrator.
//!
//! The engine only needs four operations; the trait keeps it testable with an
//! in-memory fake while [`Warehouse`] provides the Postgres implementation.

use std::future::Future;

use attrsync_core::{EntityId, Row, TableSpec};
use attrsync_warehouse::Warehouse;
use chrono::{DateTime, Utc};

use crate::SyncError;

pub trait SyncStore {
    /// Maximum time bucket in the durable table, `None` when empty.
    fn max_time_bucket(
        &self,
        table: &TableSpec,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, SyncError>> + Send;

    /// Runs an identifier-resolver query, deduplicated.
    fn resolve_ids(
        &self,
        id_query: &str,
    ) -> impl Future<Output = Result<Vec<EntityId>, SyncError>> + Send;

    /// Appends rows to the staging table; returns rows written.
    fn append_rows(
        &self,
        table: &TableSpec,
        rows: &[Row],
    ) -> impl Future<Output = Result<u64, SyncError>> + Send;

    /// Rebuilds the durable table from staged history; returns its row count.
    fn merge(&self, table: &TableSpec) -> impl Future<Output = Result<u64, SyncError>> + Send;
}

impl SyncStore for Warehouse {
    async fn max_time_bucket(
        &self,
        table: &TableSpec,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        Ok(Warehouse::max_time_bucket(self, table).await?)
    }

    async fn resolve_ids(&self, id_query: &str) -> Result<Vec<EntityId>, SyncError> {
        Ok(Warehouse::resolve_ids(self, id_query).await?)
    }

    async fn append_rows(&self, table: &TableSpec, rows: &[Row]) -> Result<u64, SyncError> {
        Ok(Warehouse::append_rows(self, table, rows).await?)
    }

    async fn merge(&self, table: &TableSpec) -> Result<u64, SyncError> {
        Ok(Warehouse::merge(self, table).await?)
    }
}
