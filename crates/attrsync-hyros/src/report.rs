//! The asynchronous report workflow: submit, poll, export.
//!
//! The dashboard has no synchronous API; retrieval replays an intercepted
//! report request (captured out-of-band from a browser session) with a
//! mutated date range and account filter. The workflow is an explicit state
//! machine — `Submitted → Polling → Ready → Exported` — so the attempt budget
//! and pacing live at a single choke point instead of being buried in
//! recursive control flow.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use attrsync_core::{EntityId, SyncWindow};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::HyrosError;
use crate::export::{parse_export, ExportRow};
use crate::types::{PollResponse, SubmitResponse};

/// Columns requested from the export endpoint, in the upstream's manifest
/// order.
pub const EXPORT_COLUMNS: &[&str] = &[
    "AOV",
    "AD_ID",
    "BUDGET",
    "CALLS",
    "CLICKS",
    "COST",
    "COST_PER_CALL",
    "COST_PER_SALE",
    "COST_PER_LEAD",
    "COST_PER_NEW_LEAD",
    "COST_PER_UNIQUE_SALE",
    "LEADS",
    "NEW_LEADS",
    "PROFIT",
    "RECURRING_REVENUE",
    "REFUND",
    "REPORTED",
    "REPORTED_VS_REVENUE",
    "REVENUE",
    "ROI",
    "ROAS",
    "SALES",
    "STATUS",
    "TOTAL_REVENUE",
    "UNIQUE_SALES",
];

/// Date format the report endpoints expect for range bounds.
const RANGE_FORMAT: &str = "%d-%m-%Y";

/// Headers that must not be replayed from the intercepted request.
const SKIPPED_HEADERS: &[&str] = &["host", "content-length", "accept-encoding"];

/// An intercepted report request template: URL, session headers, and the
/// opaque upstream payload. Captured out of scope and loaded from a JSON
/// file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportTemplate {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl ReportTemplate {
    /// Loads a template from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`HyrosError::TemplateIo`] if the file cannot be read, or
    /// [`HyrosError::TemplateInvalid`] if it does not parse or the URL does
    /// not contain the expected `stats` segment.
    pub fn from_file(path: &Path) -> Result<Self, HyrosError> {
        let content = std::fs::read_to_string(path).map_err(|e| HyrosError::TemplateIo {
            path: path.display().to_string(),
            source: e,
        })?;
        let template: Self = serde_json::from_str(&content)
            .map_err(|e| HyrosError::TemplateInvalid(e.to_string()))?;
        template.validate()?;
        Ok(template)
    }

    fn validate(&self) -> Result<(), HyrosError> {
        if !self.url.contains("stats") {
            return Err(HyrosError::TemplateInvalid(format!(
                "template URL has no 'stats' segment: {}",
                self.url
            )));
        }
        if !self.body.is_object() {
            return Err(HyrosError::TemplateInvalid(
                "template body is not a JSON object".to_string(),
            ));
        }
        Ok(())
    }

    fn poll_url(&self) -> String {
        self.url.replace("stats", "poll-current-step")
    }

    fn export_url(&self, key: &str) -> String {
        format!("{}/{key}", self.url.replace("stats", "export-report"))
    }
}

/// Pacing and budget for the poll loop.
#[derive(Debug, Clone, Copy)]
pub struct ReportClientConfig {
    pub max_poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for ReportClientConfig {
    fn default() -> Self {
        Self {
            max_poll_attempts: 100,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Where the report workflow currently stands for one account.
#[derive(Debug)]
enum ReportPhase {
    Submitted { key: String },
    Ready { key: String },
}

/// Client replaying an intercepted report request through the
/// submit/poll/export workflow.
pub struct ReportClient {
    client: Client,
    template: ReportTemplate,
    headers: HeaderMap,
    config: ReportClientConfig,
}

impl ReportClient {
    /// # Errors
    ///
    /// Returns [`HyrosError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`HyrosError::TemplateInvalid`] if the
    /// template fails validation.
    pub fn new(
        template: ReportTemplate,
        timeout_secs: u64,
        config: ReportClientConfig,
    ) -> Result<Self, HyrosError> {
        template.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let headers = replay_headers(&template.headers);
        Ok(Self {
            client,
            template,
            headers,
            config,
        })
    }

    /// Runs the full workflow for one account over one window and returns
    /// the raw export rows.
    ///
    /// # Errors
    ///
    /// - [`HyrosError::Http`] on network failure or non-2xx HTTP status.
    /// - [`HyrosError::PollExhausted`] if the report never becomes ready
    ///   within the attempt budget.
    /// - [`HyrosError::MalformedExport`] if the export payload is not the
    ///   expected CSV shape.
    pub async fn fetch_account(
        &self,
        account: &EntityId,
        window: SyncWindow,
    ) -> Result<Vec<ExportRow>, HyrosError> {
        let phase = self.submit(account, window).await?;
        let phase = self.poll_until_ready(phase).await?;
        self.export(&phase).await
    }

    async fn submit(
        &self,
        account: &EntityId,
        window: SyncWindow,
    ) -> Result<ReportPhase, HyrosError> {
        let body = submit_body(&self.template.body, account, window);
        let response = self
            .client
            .post(&self.template.url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        let parsed: SubmitResponse =
            serde_json::from_str(&text).map_err(|e| HyrosError::Deserialize {
                context: format!("submit(account={account})"),
                source: e,
            })?;
        tracing::debug!(account = %account, key = %parsed.key, "report submitted");
        Ok(ReportPhase::Submitted { key: parsed.key })
    }

    /// The single choke point for the attempt budget: polls at a fixed pace
    /// and fails with the attempt count once the budget is spent.
    async fn poll_until_ready(&self, phase: ReportPhase) -> Result<ReportPhase, HyrosError> {
        let ReportPhase::Submitted { key } = phase else {
            return Ok(phase);
        };
        let url = self.template.poll_url();
        for attempt in 1..=self.config.max_poll_attempts {
            let response = self
                .client
                .get(&url)
                .headers(self.headers.clone())
                .query(&[("key", key.as_str())])
                .send()
                .await?
                .error_for_status()?;
            let text = response.text().await?;
            let parsed: PollResponse =
                serde_json::from_str(&text).map_err(|e| HyrosError::Deserialize {
                    context: format!("poll(attempt={attempt})"),
                    source: e,
                })?;
            if parsed.report_ready {
                tracing::debug!(key = %key, attempt, "report ready");
                return Ok(ReportPhase::Ready { key });
            }
            if attempt < self.config.max_poll_attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        Err(HyrosError::PollExhausted {
            attempts: self.config.max_poll_attempts,
        })
    }

    async fn export(&self, phase: &ReportPhase) -> Result<Vec<ExportRow>, HyrosError> {
        let (ReportPhase::Ready { key } | ReportPhase::Submitted { key }) = phase;
        let response = self
            .client
            .post(self.template.export_url(key))
            .headers(self.headers.clone())
            .json(&json!({
                "columns": EXPORT_COLUMNS,
                "excludeInactive": true,
                "groupOption": "SOURCE_LINK",
                "reportType": "DURING",
            }))
            .send()
            .await?
            .error_for_status()?;
        let payload = response.text().await?;
        parse_export(&payload)
    }
}

/// Builds the submit payload: the intercepted body with the date range and
/// account filter swapped in. The template itself is never mutated.
fn submit_body(template_body: &Value, account: &EntityId, window: SyncWindow) -> Value {
    let start = window.start.format(RANGE_FORMAT).to_string();
    let end = window.end.format(RANGE_FORMAT).to_string();

    let mut body = template_body.clone();
    if let Some(map) = body.as_object_mut() {
        map.insert("start".to_string(), json!(start));
        map.insert("end".to_string(), json!(end));
        map.insert("customerIds".to_string(), json!([account.as_str()]));
        map.insert("timeGroupingOption".to_string(), json!("DAY"));
        for group in ["groupAConfiguration", "groupBConfiguration"] {
            let retagged = match map.get(group).and_then(Value::as_object) {
                Some(config) if !config.is_empty() => {
                    let mut config = config.clone();
                    config.insert("start".to_string(), json!(start));
                    config.insert("end".to_string(), json!(end));
                    Value::Object(config)
                }
                _ => json!({}),
            };
            map.insert(group.to_string(), retagged);
        }
    }
    body
}

/// Converts intercepted header strings into a replayable header map, dropping
/// connection-scoped headers and anything that fails header validation.
fn replay_headers(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        if SKIPPED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        let Ok(name) = HeaderName::try_from(name.as_str()) else {
            tracing::warn!(header = %name, "skipping invalid intercepted header name");
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            tracing::warn!(header = %name, "skipping invalid intercepted header value");
            continue;
        };
        map.insert(name, value);
    }
    map
}
