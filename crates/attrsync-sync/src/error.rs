use attrsync_core::{ConfigError, WindowError};
use attrsync_hyros::HyrosError;
use attrsync_warehouse::WarehouseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown sync table: {0}")]
    UnknownTable(String),

    #[error("unknown client: {0}")]
    UnknownClient(String),

    #[error("invalid {which} bound {value:?}: expected YYYY-MM-DD")]
    InvalidBound { which: &'static str, value: String },

    #[error("HYROS_API_KEY is not set")]
    MissingApiKey,

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hyros(#[from] HyrosError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}
