use thiserror::Error;

/// Errors returned by the Hyros retrieval clients.
#[derive(Debug, Error)]
pub enum HyrosError {
    /// Network or TLS failure, or a non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered 2xx but the payload signals an application error.
    #[error("Hyros API error: {0}")]
    Api(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The report never became ready within the attempt budget. Distinct from
    /// a transport error: the upstream kept answering, just never with a
    /// ready flag.
    #[error("report poll budget exhausted after {attempts} attempts")]
    PollExhausted { attempts: u32 },

    /// The exported payload is missing the expected header, columns, or has
    /// unparseable field values.
    #[error("malformed export payload: {0}")]
    MalformedExport(String),

    /// The intercepted report-request template could not be read.
    #[error("failed to read report template at {path}: {source}")]
    TemplateIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The intercepted report-request template is not valid JSON or is
    /// missing required fields.
    #[error("invalid report template: {0}")]
    TemplateInvalid(String),
}
