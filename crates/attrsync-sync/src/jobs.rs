//! Wiring between configured jobs and the orchestrator: builds the upstream
//! clients and hands `run_sync` the right fetch/normalize pair.

use std::time::Duration;

use attrsync_core::{
    api_job, AppConfig, ApiAttributionRecord, ClientConfig, ClientCredentials, ClientsFile,
    EntityId, IdSource, ReportAttributionRecord, API_JOBS, SCRAPE_TABLE,
};
use attrsync_hyros::{
    normalize_api_rows, normalize_report_rows, DirectClient, ExportRow, ReportClient,
    ReportClientConfig, ReportTemplate,
};
use attrsync_warehouse::Warehouse;
use chrono::Utc;

use crate::orchestrator::{run_sync, SyncSummary, WindowPolicy};
use crate::watermark::WindowBounds;
use crate::SyncError;

/// One dispatchable unit of work, as named by the server and CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDirective {
    /// Direct-API sync for one table family.
    Table(String),
    /// Report-export sync for one registered client.
    Client(String),
}

impl std::fmt::Display for JobDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobDirective::Table(key) => write!(f, "table:{key}"),
            JobDirective::Client(name) => write!(f, "client:{name}"),
        }
    }
}

/// Runs configured sync jobs against the shared warehouse.
#[derive(Clone)]
pub struct JobRunner {
    config: AppConfig,
    clients: ClientsFile,
    store: Warehouse,
}

impl JobRunner {
    #[must_use]
    pub fn new(config: AppConfig, clients: ClientsFile, store: Warehouse) -> Self {
        Self {
            config,
            clients,
            store,
        }
    }

    /// Every configured job: all direct-API tables plus one report-export run
    /// per registered client.
    #[must_use]
    pub fn all_jobs(&self) -> Vec<JobDirective> {
        API_JOBS
            .iter()
            .map(|job| JobDirective::Table(job.key.to_string()))
            .chain(
                self.clients
                    .clients
                    .iter()
                    .map(|c| JobDirective::Client(c.name.clone())),
            )
            .collect()
    }

    /// Dispatches one directive.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownTable`] / [`SyncError::UnknownClient`] for
    /// an unconfigured directive, or the failing step's error.
    pub async fn run(
        &self,
        directive: &JobDirective,
        bounds: WindowBounds,
    ) -> Result<SyncSummary, SyncError> {
        match directive {
            JobDirective::Table(key) => self.run_api_job(key, bounds).await,
            JobDirective::Client(name) => self.run_scrape_job(name, bounds).await,
        }
    }

    fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            overlap_days: self.config.watermark_overlap_days,
            lookback_days: self.config.default_lookback_days,
        }
    }

    /// Syncs one direct-API table family.
    pub async fn run_api_job(
        &self,
        key: &str,
        bounds: WindowBounds,
    ) -> Result<SyncSummary, SyncError> {
        let job = api_job(key).ok_or_else(|| SyncError::UnknownTable(key.to_string()))?;
        let api_key = self
            .config
            .hyros_api_key
            .as_deref()
            .ok_or(SyncError::MissingApiKey)?;
        let client = DirectClient::with_base_url(
            api_key,
            self.config.request_timeout_secs,
            &self.config.hyros_base_url,
        )?;

        let granularity = self.config.granularity;
        let max_in_flight = self.config.max_in_flight;
        run_sync(
            &self.store,
            job.table,
            &IdSource::Query(job.id_query),
            bounds,
            self.window_policy(),
            Utc::now(),
            move |window, ids| {
                Box::pin(async move {
                    client
                        .fetch_attribution(&ids, window, job.level, granularity, max_in_flight)
                        .await
                        .map_err(SyncError::from)
                })
            },
            |raw, batched_at| {
                Ok(normalize_api_rows(raw, batched_at)
                    .into_iter()
                    .map(ApiAttributionRecord::into_row)
                    .collect())
            },
        )
        .await
    }

    /// Syncs the report-export table for one registered client's accounts.
    ///
    /// Fails fast if the client's dashboard secrets are missing from the
    /// environment: the session template the run depends on is captured with
    /// those credentials, so their absence means the capture tooling cannot
    /// refresh an expired session either.
    pub async fn run_scrape_job(
        &self,
        client_name: &str,
        bounds: WindowBounds,
    ) -> Result<SyncSummary, SyncError> {
        let registered = self
            .clients
            .client(client_name)
            .ok_or_else(|| SyncError::UnknownClient(client_name.to_string()))?;
        resolve_scrape_credentials(registered)?;

        let template = ReportTemplate::from_file(&self.config.report_template_path)?;
        let report_client = ReportClient::new(
            template,
            self.config.request_timeout_secs,
            ReportClientConfig {
                max_poll_attempts: self.config.poll_max_attempts,
                poll_interval: Duration::from_millis(self.config.poll_interval_ms),
            },
        )?;

        let accounts = IdSource::Static(registered.account_ids());
        let client_label = registered.name.clone();
        run_sync(
            &self.store,
            &SCRAPE_TABLE,
            &accounts,
            bounds,
            self.window_policy(),
            Utc::now(),
            move |window, ids| {
                Box::pin(async move {
                    // Accounts run sequentially; each export's rows keep their
                    // account tag for normalization.
                    let mut tagged: Vec<(EntityId, ExportRow)> = Vec::new();
                    for account in &ids {
                        let rows = report_client.fetch_account(account, window).await?;
                        tagged.extend(rows.into_iter().map(|row| (account.clone(), row)));
                    }
                    Ok(tagged)
                })
            },
            move |raw, batched_at| {
                let today = batched_at.date_naive();
                let mut out = Vec::new();
                // Rows arrive grouped by account already; collect consecutive
                // runs and normalize each account's batch in one call.
                let mut current: Option<(EntityId, Vec<ExportRow>)> = None;
                for (account, row) in raw {
                    match &mut current {
                        Some((acct, batch)) if *acct == account => batch.push(row),
                        _ => {
                            if let Some((acct, batch)) = current.take() {
                                let records = normalize_report_rows(
                                    &batch,
                                    &acct,
                                    &client_label,
                                    batched_at,
                                    today,
                                )?;
                                out.extend(
                                    records.into_iter().map(ReportAttributionRecord::into_row),
                                );
                            }
                            current = Some((account, vec![row]));
                        }
                    }
                }
                if let Some((acct, batch)) = current {
                    let records =
                        normalize_report_rows(&batch, &acct, &client_label, batched_at, today)?;
                    out.extend(records.into_iter().map(ReportAttributionRecord::into_row));
                }
                Ok(out)
            },
        )
        .await
    }
}

fn resolve_scrape_credentials(client: &ClientConfig) -> Result<ClientCredentials, SyncError> {
    Ok(client.resolve_credentials(|var| std::env::var(var).ok())?)
}
