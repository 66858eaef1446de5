//! Hyros API payload types.
//!
//! Only the documented field manifest is deserialized; extra upstream fields
//! are dropped at the serde boundary.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Envelope of the direct `GET /attribution` endpoint.
#[derive(Debug, Deserialize)]
pub struct AttributionResponse {
    #[serde(default)]
    pub result: Vec<ApiResultRow>,
}

/// One entity's metrics inside an [`AttributionResponse`].
///
/// Metrics arrive as JSON numbers; they stay `f64` here and become rounded
/// decimals during normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResultRow {
    pub id: serde_json::Value,
    #[serde(default)]
    pub sales: Option<f64>,
    #[serde(default)]
    pub calls: Option<f64>,
    #[serde(default)]
    pub unique_sales: Option<f64>,
    #[serde(default)]
    pub refund: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub recurring_revenue: Option<f64>,
    #[serde(default)]
    pub total_revenue: Option<f64>,
}

impl ApiResultRow {
    /// Entity ids may arrive as strings or integers; both render the same.
    #[must_use]
    pub fn id_text(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A raw direct-API row tagged with the sub-window it was fetched for.
#[derive(Debug, Clone)]
pub struct WindowedApiRow {
    pub row: ApiResultRow,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Response to the report submit request.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub key: String,
}

/// Response to one poll of the report status endpoint.
#[derive(Debug, Deserialize)]
pub struct PollResponse {
    #[serde(rename = "reportReady")]
    pub report_ready: bool,
}
