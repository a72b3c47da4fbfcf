use thiserror::Error;

use crate::enrichment::status::EnrichmentStatus;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error: {status} - {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Illegal status transition for {record_id}: {from} -> {to}")]
    IllegalTransition {
        record_id: String,
        from: EnrichmentStatus,
        to: EnrichmentStatus,
    },

    #[error("Record not eligible: {0}")]
    NotEligible(String),

    #[error("{service} lookup gave up after {pages} pages with {resolved} of {wanted} records found")]
    LookupIncomplete {
        service: &'static str,
        pages: usize,
        resolved: usize,
        wanted: usize,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// True when the remote service refused the request itself, as opposed to
    /// a transport failure or a transient server-side condition.
    pub fn is_rejection(&self) -> bool {
        match self {
            PipelineError::Api { status, .. } => (400..500).contains(status) && *status != 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
