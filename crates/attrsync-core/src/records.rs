//! Canonical attribution records and their warehouse row representation.
//!
//! Retrieval produces raw upstream rows; normalization turns them into the
//! typed records here. [`FieldValue`] is the loader's wire format: one value
//! per schema column, in schema order, so the warehouse can bind them without
//! knowing the record type.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// A single warehouse cell. Numeric fields are either a finite rounded value
/// or explicitly absent, never a sentinel string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Numeric(Option<Decimal>),
    Timestamp(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
}

/// One staged row: values aligned with the table's schema columns.
pub type Row = Vec<FieldValue>;

/// Attribution metrics for one entity over one sub-window, from the direct
/// API. Composite key: `(id, start_time, end_time)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiAttributionRecord {
    pub id: String,
    pub sales: Option<Decimal>,
    pub calls: Option<Decimal>,
    pub unique_sales: Option<Decimal>,
    pub refund: Option<Decimal>,
    pub revenue: Option<Decimal>,
    pub recurring_revenue: Option<Decimal>,
    pub total_revenue: Option<Decimal>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub batched_at: DateTime<Utc>,
}

impl ApiAttributionRecord {
    /// Values in `tables::API_COLUMNS` order.
    #[must_use]
    pub fn into_row(self) -> Row {
        vec![
            FieldValue::Text(Some(self.id)),
            FieldValue::Numeric(self.sales),
            FieldValue::Numeric(self.calls),
            FieldValue::Numeric(self.unique_sales),
            FieldValue::Numeric(self.refund),
            FieldValue::Numeric(self.revenue),
            FieldValue::Numeric(self.recurring_revenue),
            FieldValue::Numeric(self.total_revenue),
            FieldValue::Timestamp(Some(self.start_time)),
            FieldValue::Timestamp(Some(self.end_time)),
            FieldValue::Timestamp(Some(self.batched_at)),
        ]
    }
}

/// One day-bucketed metrics row for one account, from the report export.
/// Composite key: `(source, account)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAttributionRecord {
    pub source: NaiveDate,
    pub clicks: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub total_revenue: Option<Decimal>,
    pub revenue: Option<Decimal>,
    pub recurring_revenue: Option<Decimal>,
    pub profit: Option<Decimal>,
    pub reported: Option<Decimal>,
    pub reported_vs_revenue: Option<Decimal>,
    pub sales: Option<Decimal>,
    /// Normalized to fractional form (upstream reports percentages).
    pub roi: Option<Decimal>,
    /// Normalized to fractional form (upstream reports percentages).
    pub roas: Option<Decimal>,
    pub calls: Option<Decimal>,
    pub refund: Option<Decimal>,
    pub cost_per_sale: Option<Decimal>,
    pub cost_per_call: Option<Decimal>,
    pub leads: Option<Decimal>,
    pub new_leads: Option<Decimal>,
    pub cost_per_lead: Option<Decimal>,
    pub cost_per_new_lead: Option<Decimal>,
    pub cost_per_unique_sale: Option<Decimal>,
    pub unique_sales: Option<Decimal>,
    pub average_order_value: Option<Decimal>,
    pub account: String,
    pub client: String,
    pub batched_at: DateTime<Utc>,
}

impl ReportAttributionRecord {
    /// Values in `tables::SCRAPE_TABLE` column order.
    #[must_use]
    pub fn into_row(self) -> Row {
        vec![
            FieldValue::Date(Some(self.source)),
            FieldValue::Numeric(self.clicks),
            FieldValue::Numeric(self.cost),
            FieldValue::Numeric(self.total_revenue),
            FieldValue::Numeric(self.revenue),
            FieldValue::Numeric(self.recurring_revenue),
            FieldValue::Numeric(self.profit),
            FieldValue::Numeric(self.reported),
            FieldValue::Numeric(self.reported_vs_revenue),
            FieldValue::Numeric(self.sales),
            FieldValue::Numeric(self.roi),
            FieldValue::Numeric(self.roas),
            FieldValue::Numeric(self.calls),
            FieldValue::Numeric(self.refund),
            FieldValue::Numeric(self.cost_per_sale),
            FieldValue::Numeric(self.cost_per_call),
            FieldValue::Numeric(self.leads),
            FieldValue::Numeric(self.new_leads),
            FieldValue::Numeric(self.cost_per_lead),
            FieldValue::Numeric(self.cost_per_new_lead),
            FieldValue::Numeric(self.cost_per_unique_sale),
            FieldValue::Numeric(self.unique_sales),
            FieldValue::Numeric(self.average_order_value),
            FieldValue::Text(Some(self.account)),
            FieldValue::Text(Some(self.client)),
            FieldValue::Timestamp(Some(self.batched_at)),
        ]
    }
}
