//! Upstream HTTP collaborator for the Hyros attribution provider.
//!
//! Two retrieval styles share one output shape — unordered raw rows tagged
//! with their sub-window bounds:
//!
//! - [`DirectClient`]: the key-authenticated JSON attribution API, one
//!   request per sub-window with bounded concurrency.
//! - [`ReportClient`]: the dashboard's asynchronous submit/poll/export
//!   report workflow, replayed from an intercepted request template.

pub mod direct;
pub mod error;
pub mod export;
pub mod normalize;
pub mod report;
pub mod types;

pub use direct::DirectClient;
pub use error::HyrosError;
pub use export::{parse_export, ExportRow};
pub use normalize::{normalize_api_rows, normalize_report_rows, parse_source_date};
pub use report::{ReportClient, ReportClientConfig, ReportTemplate, EXPORT_COLUMNS};
pub use types::{ApiResultRow, AttributionResponse, WindowedApiRow};
