//! Error types for configuration loading and the dispatch core.
//!
//! Only [`ConfigError`] is allowed to escape the core (at startup, before the
//! bridge starts running). Every runtime fault is absorbed by retry, backoff,
//! or task respawn and is represented here only so it can be logged.

use thiserror::Error;

/// Fatal at startup: the bridge refuses to run with a bad configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("empty or missing 'resources_api_server'")]
    MissingApiServer,

    #[error("invalid 'resources_api_server' url: {0}")]
    InvalidApiServerUrl(#[from] url::ParseError),

    #[error("invalid 'retrievers_params.up_wait_sleep': value must be greater than or equal to 30")]
    UpWaitSleepTooLow,

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Non-fatal faults the dispatch core absorbs internally (retry/backoff/respawn).
/// Kept around chiefly so log statements have a typed shape; never surfaced to
/// a caller of [`crate::Bridge::run`].
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("transient request failure: {0}")]
    Transient(String),

    #[error("permanent request failure (status {status}): {message}")]
    Permanent { status: u16, message: String },
}

/// Raised internally by [`crate::client::ApiClientPool::create`] on each failed
/// attempt; the pool logs it and retries forever with exponential backoff, so
/// it never reaches a caller.
#[derive(Debug, Error)]
pub enum ClientConstructionError {
    #[error("request failed with status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

