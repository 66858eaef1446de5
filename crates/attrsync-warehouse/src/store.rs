//! Warehouse operations over the attribution tables.
//!
//! All statements interpolate identifiers from the static [`TableSpec`]
//! descriptors, never from caller input; values always go through binds.

use attrsync_core::{EntityId, FieldValue, Row, TableSpec};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::WarehouseError;

// Postgres caps binds per statement at 65535; stay well under it for the
// widest (26-column) table.
const APPEND_CHUNK_ROWS: usize = 1000;

/// Postgres-backed store for staged and durable attribution rows.
#[derive(Debug, Clone)]
pub struct Warehouse {
    pool: PgPool,
}

impl Warehouse {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Maximum time bucket currently present in the durable table, or `None`
    /// when the table is empty. `DATE` time keys widen to midnight UTC.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlx`] if the query fails.
    pub async fn max_time_bucket(
        &self,
        table: &TableSpec,
    ) -> Result<Option<DateTime<Utc>>, WarehouseError> {
        let sql = format!(
            "SELECT MAX({key})::timestamptz FROM {table}",
            key = table.time_key,
            table = table.durable(),
        );
        let max: Option<DateTime<Utc>> = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(max)
    }

    /// Runs a job's identifier query and returns distinct ids in first-seen
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlx`] if the query fails.
    pub async fn resolve_ids(&self, id_query: &str) -> Result<Vec<EntityId>, WarehouseError> {
        let raw: Vec<String> = sqlx::query_scalar(id_query).fetch_all(&self.pool).await?;

        let mut seen = std::collections::HashSet::new();
        let ids: Vec<EntityId> = raw
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .map(EntityId)
            .collect();
        debug!(count = ids.len(), "resolved entity ids");
        Ok(ids)
    }

    /// Appends normalized rows to the staging table in bounded-size batches.
    /// Staging is append-only batch history; the merge rebuilds the durable
    /// table from it.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::ArityMismatch`] if any row's width differs
    /// from the table schema, or [`WarehouseError::Sqlx`] on insert failure.
    pub async fn append_rows(
        &self,
        table: &TableSpec,
        rows: &[Row],
    ) -> Result<u64, WarehouseError> {
        let expected = table.columns.len();
        for row in rows {
            if row.len() != expected {
                return Err(WarehouseError::ArityMismatch {
                    table: table.durable(),
                    expected,
                    got: row.len(),
                });
            }
        }

        let mut inserted = 0u64;
        for chunk in rows.chunks(APPEND_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                table.staging(),
                table.column_names().join(", "),
            ));
            builder.push_values(chunk, |mut b, row| {
                for value in row {
                    match value {
                        FieldValue::Text(v) => b.push_bind(v.clone()),
                        FieldValue::Numeric(v) => b.push_bind(*v),
                        FieldValue::Timestamp(v) => b.push_bind(*v),
                        FieldValue::Date(v) => b.push_bind(*v),
                    };
                }
            });
            let result = builder.build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }

        debug!(table = %table.staging(), rows = inserted, "staged rows");
        Ok(inserted)
    }

    /// Rebuilds the durable table from staging, keeping one row per composite
    /// key: the latest batch wins, with the full column list as a
    /// deterministic secondary order. Runs in a single transaction so readers
    /// never observe a partially-merged table.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlx`] if either statement fails.
    pub async fn merge(&self, table: &TableSpec) -> Result<u64, WarehouseError> {
        let columns = table.column_names().join(", ");
        let partition = table.partition_keys.join(", ");

        let insert = format!(
            "INSERT INTO {durable} ({columns}) \
             SELECT {columns} FROM ( \
                 SELECT {columns}, ROW_NUMBER() OVER ( \
                     PARTITION BY {partition} \
                     ORDER BY {incre} DESC, {columns} \
                 ) AS row_num \
                 FROM {staging} \
             ) ranked \
             WHERE row_num = 1",
            durable = table.durable(),
            staging = table.staging(),
            incre = table.incre_key,
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {}", table.durable()))
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(&insert).execute(&mut *tx).await?;
        tx.commit().await?;

        let durable_rows = result.rows_affected();
        debug!(table = %table.durable(), rows = durable_rows, "merged staging into durable");
        Ok(durable_rows)
    }
}
