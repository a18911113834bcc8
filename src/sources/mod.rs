//! Provider fetchers built on a shared trait and error taxonomy.
//!
//! Each provider implements [`Fetcher`]. A fetcher never fails as a whole:
//! it always returns a [`FetchResult`] carrying whatever was collected plus
//! the errors met along the way, so callers can use partial results.
//!
//! Providers:
//!
//! - [`scholar`]: HTML search surface with CAPTCHA challenges, paginated and
//!   enriched with per-result BibTeX files
//! - [`scopus_batch`]: cookie/JWT-authenticated batch export
//! - [`scopus_api`]: API-key REST search
//!
//! [`FetcherRegistry`] runs several fetchers concurrently as independent tasks.

pub mod registry;
pub mod scholar;
pub mod scopus_api;
pub mod scopus_batch;

pub use registry::FetcherRegistry;
pub use scholar::ScholarFetcher;
pub use scopus_api::ScopusApiFetcher;
pub use scopus_batch::ScopusBatchFetcher;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::{FetchRequest, FetchResult};
use crate::orchestrator::CancelSignal;

/// A provider pipeline that turns a [`FetchRequest`] into a [`FetchResult`]
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    /// Module tag written into results (e.g. "scholar")
    fn id(&self) -> &str;

    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Run the fetch to completion, cancellation, or the first terminal error
    async fn fetch(&self, request: &FetchRequest, cancel: CancelSignal) -> FetchResult;
}

/// Errors that can occur when talking to a provider
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Anti-automation defenses were triggered (CAPTCHA form or 403)
    #[error("Challenge: {0}")]
    Challenge(String),

    /// Authenticated session expired and could not be refreshed
    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    /// API key or credentials rejected
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Export header does not match the expected columns
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// No more proxies to rotate to
    #[error("Proxy pool exhausted: {0}")]
    PoolExhausted(String),

    /// Parsing error (HTML, JSON, CSV, BibTeX)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unexpected response from the provider
    #[error("API error: {0}")]
    Api(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller asked the fetch to stop
    #[error("Cancelled")]
    Cancelled,
}

impl SourceError {
    /// Whether rotating to another proxy and retrying the step can help
    pub fn is_rotatable(&self) -> bool {
        matches!(self, SourceError::Network(_) | SourceError::Challenge(_))
    }

    /// Errors that end a fetch leg and must surface to the caller
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::AuthExpired(_)
                | SourceError::InvalidCredentials(_)
                | SourceError::SchemaMismatch(_)
                | SourceError::PoolExhausted(_)
        )
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// Server-side and throttling statuses are transient; 401 means bad
    /// credentials; anything else is an unexpected provider answer.
    pub fn from_status(status: StatusCode, context: &str, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            SourceError::Network(format!("{} returned status {}", context, status))
        } else if status == StatusCode::UNAUTHORIZED {
            SourceError::InvalidCredentials(format!("{} rejected access ({})", context, status))
        } else {
            SourceError::Api(format!("{} returned status {}: {}", context, status, snippet))
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Network(format!("timed out: {}", err))
        } else if err.is_builder() {
            SourceError::InvalidRequest(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        SourceError::Parse(format!("CSV: {}", err))
    }
}

impl From<url::ParseError> for SourceError {
    fn from(err: url::ParseError) -> Self {
        SourceError::InvalidRequest(format!("URL: {}", err))
    }
}
