//! The dispatch boundary: one sync endpoint plus a health probe.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use attrsync_sync::{JobDirective, JobRunner, SyncError, SyncSummary, WindowBounds};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub runner: JobRunner,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    fn from_sync_error(error: &SyncError) -> Self {
        match error {
            SyncError::UnknownTable(_)
            | SyncError::UnknownClient(_)
            | SyncError::InvalidBound { .. } => Self::new("bad_request", error.to_string()),
            other => {
                tracing::error!(error = %other, "sync run failed");
                Self::new("internal_error", "sync run failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code.as_str() {
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Body of `POST /api/v1/sync`: either the fan-out directive or a single
/// table/client target, with optional explicit window bounds.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub tasks: bool,
    pub table: Option<String>,
    pub client: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
struct TasksResponse {
    tasks: usize,
}

#[derive(Debug, Serialize)]
struct ResultsResponse {
    results: Vec<SyncSummary>,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/sync", post(dispatch_sync))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch_sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<axum::response::Response, ApiError> {
    let bounds = WindowBounds::parse(request.start.as_deref(), request.end.as_deref())
        .map_err(|e| ApiError::from_sync_error(&e))?;

    if request.tasks {
        let jobs = state.runner.all_jobs();
        let count = jobs.len();
        for directive in jobs {
            let runner = state.runner.clone();
            tokio::spawn(async move {
                match runner.run(&directive, bounds).await {
                    Ok(summary) => tracing::info!(
                        job = %directive,
                        num_processed = summary.num_processed,
                        "background sync finished"
                    ),
                    Err(error) => tracing::error!(
                        job = %directive,
                        error = %error,
                        "background sync failed"
                    ),
                }
            });
        }
        return Ok(Json(TasksResponse { tasks: count }).into_response());
    }

    let directive = match (request.table, request.client) {
        (Some(table), None) => JobDirective::Table(table),
        (None, Some(client)) => JobDirective::Client(client),
        _ => {
            return Err(ApiError::new(
                "bad_request",
                "expected exactly one of \"tasks\", \"table\", or \"client\"",
            ))
        }
    };

    let summary = state
        .runner
        .run(&directive, bounds)
        .await
        .map_err(|e| ApiError::from_sync_error(&e))?;
    Ok(Json(ResultsResponse {
        results: vec![summary],
    })
    .into_response())
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match attrsync_warehouse::ping(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthData {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthData {
                    status: "degraded",
                    database: "unavailable",
                }),
            )
        }
    }
}
