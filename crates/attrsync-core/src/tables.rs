//! Table descriptors for the attribution warehouse.
//!
//! Each table family is described by a plain data record ([`TableSpec`]) plus
//! a per-job entry ([`JobSpec`]) carrying the upstream `level` and the
//! identifier-resolver query. Jobs are dispatched through [`api_job`] rather
//! than a type per table.

/// Opaque upstream entity identifier (ad-set, campaign, customer account).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId(pub String);

impl EntityId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Warehouse column type. The schema per table family is fixed ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Numeric,
    Timestamp,
    Date,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

/// Static description of one durable table and its staging counterpart.
#[derive(Debug)]
pub struct TableSpec {
    /// Postgres schema holding both the durable and staging tables.
    pub dataset: &'static str,
    pub name: &'static str,
    pub columns: &'static [Column],
    /// Composite key defining row uniqueness in the durable table.
    pub partition_keys: &'static [&'static str],
    /// Batch ordering column; the merge keeps the max per composite key.
    pub incre_key: &'static str,
    /// Time-bucket column the watermark resolver reads.
    pub time_key: &'static str,
}

impl TableSpec {
    /// Fully-qualified durable table name, `<dataset>.<name>`.
    #[must_use]
    pub fn durable(&self) -> String {
        format!("{}.{}", self.dataset, self.name)
    }

    /// Fully-qualified staging table name, `<dataset>._stage_<name>`.
    #[must_use]
    pub fn staging(&self) -> String {
        format!("{}._stage_{}", self.dataset, self.name)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

/// Where the run's entity-id set comes from.
#[derive(Debug, Clone)]
pub enum IdSource {
    /// Templated warehouse query returning one `id` column.
    Query(&'static str),
    /// Static per-client account list from the client registry.
    Static(Vec<EntityId>),
}

/// One configured sync job: a table family plus the upstream `level` and the
/// identifier query that scopes it.
#[derive(Debug)]
pub struct JobSpec {
    /// Dispatch key accepted by the server/CLI (`table` directive).
    pub key: &'static str,
    pub table: &'static TableSpec,
    /// Upstream attribution level passed to the direct API.
    pub level: &'static str,
    pub id_query: &'static str,
}

const DATASET: &str = "hyros";

const API_COLUMNS: &[Column] = &[
    col("id", ColumnType::Text),
    col("sales", ColumnType::Numeric),
    col("calls", ColumnType::Numeric),
    col("unique_sales", ColumnType::Numeric),
    col("refund", ColumnType::Numeric),
    col("revenue", ColumnType::Numeric),
    col("recurring_revenue", ColumnType::Numeric),
    col("total_revenue", ColumnType::Numeric),
    col("start_time", ColumnType::Timestamp),
    col("end_time", ColumnType::Timestamp),
    col("_batched_at", ColumnType::Timestamp),
];

const API_PARTITION_KEYS: &[&str] = &["id", "start_time", "end_time"];

pub static FACEBOOK_ADSET_TABLE: TableSpec = TableSpec {
    dataset: DATASET,
    name: "ad_attribution_facebook_adset",
    columns: API_COLUMNS,
    partition_keys: API_PARTITION_KEYS,
    incre_key: "_batched_at",
    time_key: "start_time",
};

pub static GOOGLE_CAMPAIGN_TABLE: TableSpec = TableSpec {
    dataset: DATASET,
    name: "ad_attribution_google_campaign",
    columns: API_COLUMNS,
    partition_keys: API_PARTITION_KEYS,
    incre_key: "_batched_at",
    time_key: "start_time",
};

pub static SCRAPE_TABLE: TableSpec = TableSpec {
    dataset: DATASET,
    name: "ad_attribution_scrape",
    columns: &[
        col("source", ColumnType::Date),
        col("clicks", ColumnType::Numeric),
        col("cost", ColumnType::Numeric),
        col("total_revenue", ColumnType::Numeric),
        col("revenue", ColumnType::Numeric),
        col("recurring_revenue", ColumnType::Numeric),
        col("profit", ColumnType::Numeric),
        col("reported", ColumnType::Numeric),
        col("reported_vs_revenue", ColumnType::Numeric),
        col("sales", ColumnType::Numeric),
        col("roi", ColumnType::Numeric),
        col("roas", ColumnType::Numeric),
        col("calls", ColumnType::Numeric),
        col("refund", ColumnType::Numeric),
        col("cost_per_sale", ColumnType::Numeric),
        col("cost_per_call", ColumnType::Numeric),
        col("leads", ColumnType::Numeric),
        col("new_leads", ColumnType::Numeric),
        col("cost_per_lead", ColumnType::Numeric),
        col("cost_per_new_lead", ColumnType::Numeric),
        col("cost_per_unique_sale", ColumnType::Numeric),
        col("unique_sales", ColumnType::Numeric),
        col("average_order_value", ColumnType::Numeric),
        col("account", ColumnType::Text),
        col("client", ColumnType::Text),
        col("_batched_at", ColumnType::Timestamp),
    ],
    partition_keys: &["source", "account"],
    incre_key: "_batched_at",
    time_key: "source",
};

// Entities qualify for attribution queries only while they carry tracked
// spend; the trailing lookback here is independent of the sync window.
const FACEBOOK_ADSET_ID_QUERY: &str = "\
    SELECT DISTINCT ad_group_id AS id \
    FROM ads.facebook_ads \
    WHERE creative_url_tags = 'fbc_id={{adset.id}}&h_ad_id={{ad.id}}' \
      AND date >= CURRENT_DATE - INTERVAL '30 days' \
      AND cost > 0 \
      AND impressions > 0";

const GOOGLE_CAMPAIGN_ID_QUERY: &str = "\
    SELECT DISTINCT s.campaign_id AS id \
    FROM ads.google_adgroups s \
    INNER JOIN ads.google_adgroup_stats d \
      ON s.campaign_id = d.campaign_id AND s.ad_group_id = d.ad_group_id \
    WHERE s.tracking_url_template = '{lpurl}?gc_id={campaignid}&h_ad_id={creative}' \
      AND d.date >= CURRENT_DATE - INTERVAL '2 days' \
      AND d.cost > 0 \
      AND d.clicks > 0";

/// All direct-API sync jobs, dispatched by `key`.
pub static API_JOBS: &[JobSpec] = &[
    JobSpec {
        key: "facebook_adset",
        table: &FACEBOOK_ADSET_TABLE,
        level: "facebook_adset",
        id_query: FACEBOOK_ADSET_ID_QUERY,
    },
    JobSpec {
        key: "google_campaign",
        table: &GOOGLE_CAMPAIGN_TABLE,
        level: "google_campaign",
        id_query: GOOGLE_CAMPAIGN_ID_QUERY,
    },
];

/// Looks up a direct-API job by its dispatch key.
#[must_use]
pub fn api_job(key: &str) -> Option<&'static JobSpec> {
    API_JOBS.iter().find(|job| job.key == key)
}
