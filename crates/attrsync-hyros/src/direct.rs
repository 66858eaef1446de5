//! Client for the direct key-authenticated attribution API.
//!
//! The sync window is split into fixed-size sub-windows and one request is
//! issued per sub-window, with bounded concurrency. Each response row is
//! tagged with its sub-window bounds; ordering across sub-windows is not
//! guaranteed and nothing downstream relies on it.

use std::time::Duration;

use attrsync_core::{EntityId, Granularity, SubWindow, SyncWindow};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, Url};

use crate::error::HyrosError;
use crate::types::{AttributionResponse, WindowedApiRow};

const DEFAULT_BASE_URL: &str = "https://api.hyros.com/v1/api/v1.0";

/// Metric fields requested from the attribution endpoint.
const FIELD_MANIFEST: &[&str] = &[
    "sales",
    "revenue",
    "calls",
    "total_revenue",
    "recurring_revenue",
    "refund",
    "unique_sales",
];

/// Timestamps are sent without a zone suffix; the API treats them as UTC.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Client for the direct attribution API.
///
/// Use [`DirectClient::new`] for production or
/// [`DirectClient::with_base_url`] to point at a mock server in tests.
pub struct DirectClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl DirectClient {
    /// Creates a new client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`HyrosError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, HyrosError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with
    /// wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`HyrosError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`HyrosError::Api`] if `base_url` is not a
    /// valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, HyrosError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("attrsync/0.1 (attribution-sync)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| HyrosError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Fetches attribution metrics for `ids` over `window`, one request per
    /// sub-window, at most `max_in_flight` requests concurrently.
    ///
    /// A single sub-window failure aborts the whole retrieval; retries, if
    /// any, belong to the caller.
    ///
    /// # Errors
    ///
    /// - [`HyrosError::Http`] on network failure or non-2xx HTTP status.
    /// - [`HyrosError::Deserialize`] if a response does not match the
    ///   expected shape.
    pub async fn fetch_attribution(
        &self,
        ids: &[EntityId],
        window: SyncWindow,
        level: &str,
        granularity: Granularity,
        max_in_flight: usize,
    ) -> Result<Vec<WindowedApiRow>, HyrosError> {
        let ids_param = ids
            .iter()
            .map(EntityId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let sub_windows = window.sub_windows(granularity);
        tracing::debug!(
            level,
            ids = ids.len(),
            sub_windows = sub_windows.len(),
            "fetching attribution"
        );

        let per_window: Vec<Vec<WindowedApiRow>> = stream::iter(sub_windows)
            .map(|sub| self.fetch_sub_window(sub, level, &ids_param))
            .buffer_unordered(max_in_flight.max(1))
            .try_collect()
            .await?;

        Ok(per_window.into_iter().flatten().collect())
    }

    async fn fetch_sub_window(
        &self,
        sub: SubWindow,
        level: &str,
        ids_param: &str,
    ) -> Result<Vec<WindowedApiRow>, HyrosError> {
        let url = self.attribution_url(sub, level, ids_param);
        let response = self
            .client
            .get(url.clone())
            .header("API-key", &self.api_key)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;

        let parsed: AttributionResponse =
            serde_json::from_str(&body).map_err(|e| HyrosError::Deserialize {
                context: format!("attribution({}..{})", sub.start, sub.end),
                source: e,
            })?;

        Ok(parsed
            .result
            .into_iter()
            .map(|row| WindowedApiRow {
                row,
                start_time: sub.start,
                end_time: sub.end,
            })
            .collect())
    }

    fn attribution_url(&self, sub: SubWindow, level: &str, ids_param: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("attribution");
        }
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("attributionModel", "last_click");
            pairs.append_pair("startDate", &sub.start.format(TIME_FORMAT).to_string());
            pairs.append_pair("endDate", &sub.end.format(TIME_FORMAT).to_string());
            pairs.append_pair("level", level);
            pairs.append_pair("fields", &FIELD_MANIFEST.join(","));
            pairs.append_pair("ids", ids_param);
            pairs.append_pair("currency", "usd");
            pairs.append_pair("dayOfAttribution", "false");
        }
        url
    }
}
