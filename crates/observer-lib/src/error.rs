//! Error taxonomy for the observer
//!
//! Errors are contained to the smallest enclosing unit: a failed metric
//! query degrades one category, a failed inference call degrades one stage,
//! a failed report write degrades one cycle. Nothing escapes the scheduler
//! loop.

use thiserror::Error;

/// Startup configuration failure. Fatal: the loop must not start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failure to execute one metric query. The affected category degrades to
/// an empty sample list; the snapshot as a whole survives.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to metric source failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("metric source returned {status} for {category}")]
    Status {
        category: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected response shape for {category}: {reason}")]
    Decode { category: String, reason: String },

    #[error("unknown metric category: {0}")]
    UnknownCategory(String),

    #[error("could not read credential from {path}: {source}")]
    Credential {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of one inference round trip. The affected stage degrades to
/// `Skipped`; the remaining stages still run.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("inference call timed out after {0}s")]
    Timeout(u64),

    #[error("inference response had no text content")]
    EmptyResponse,
}

/// Failure to write the report artifact. Logged loudly; the loop continues.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
