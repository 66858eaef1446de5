//! The synchronization engine: watermark resolution, identifier resolution,
//! and the fetch → normalize → load → merge orchestrator.
//!
//! Retrieval and normalization are injected as closures so the engine runs
//! identically against the real Hyros clients and against in-memory fakes.

pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod store;
pub mod watermark;

pub use error::SyncError;
pub use jobs::{JobDirective, JobRunner};
pub use orchestrator::{run_sync, SyncSummary, WindowPolicy};
pub use store::SyncStore;
pub use watermark::{resolve_window, WindowBounds};
