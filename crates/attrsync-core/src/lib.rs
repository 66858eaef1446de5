use thiserror::Error;

pub mod clients;
pub mod config;
pub mod records;
pub mod tables;
pub mod window;

pub use clients::{load_clients, AccountConfig, ClientConfig, ClientCredentials, ClientsFile};
pub use config::{load_app_config, load_app_config_from_env, AppConfig};
pub use records::{ApiAttributionRecord, FieldValue, ReportAttributionRecord, Row};
pub use tables::{
    api_job, Column, ColumnType, EntityId, IdSource, JobSpec, TableSpec, API_JOBS,
    FACEBOOK_ADSET_TABLE, GOOGLE_CAMPAIGN_TABLE, SCRAPE_TABLE,
};
pub use window::{Granularity, SubWindow, SyncWindow, WindowError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read clients file at {path}: {source}")]
    ClientsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse clients file: {0}")]
    ClientsFileParse(#[from] serde_yaml::Error),

    #[error("invalid clients file: {0}")]
    InvalidClients(String),

    #[error("missing secret for client {client}: env var {var} is not set")]
    MissingSecret { client: String, var: String },
}
