//! Fetch request and result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AuthMaterial, ExportPublication, MergedEntry, SearchEntry};

/// Parameters of one fetch invocation
///
/// Immutable for the duration of a fetch. Every provider receives the same
/// request; each one decides which proxies it is allowed to use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Free-text search query
    pub query: String,

    /// Whether upstream TLS certificates are verified
    pub verify_ssl: bool,

    /// Ordered egress proxy list used for rotation
    pub proxies: Vec<String>,

    /// Single override proxy, used for every request when set
    pub debug_proxy: Option<String>,
}

impl FetchRequest {
    /// Create a new request with TLS verification on and no proxies
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            verify_ssl: true,
            proxies: Vec::new(),
            debug_proxy: None,
        }
    }

    /// Toggle TLS certificate verification
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Set the rotation proxy list
    pub fn proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Set the override proxy
    pub fn debug_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.debug_proxy = Some(proxy.into());
        self
    }

    /// Proxies for unauthenticated providers.
    ///
    /// The debug proxy replaces the rotation list entirely when present.
    pub fn rotation_proxies(&self) -> Vec<String> {
        match &self.debug_proxy {
            Some(proxy) => vec![proxy.clone()],
            None => self.proxies.clone(),
        }
    }

    /// Proxies for IP-authenticated providers: only the debug proxy, never the pool.
    pub fn authenticated_proxies(&self) -> Vec<String> {
        self.debug_proxy.iter().cloned().collect()
    }
}

/// Entities produced by a fetch, tagged by provider
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum FetchPayload {
    /// Merged Google Scholar entries
    Scholar(Vec<MergedEntry>),

    /// Raw export text plus the rows parsed out of it
    ScopusExport {
        raw: String,
        publications: Vec<ExportPublication>,
    },

    /// Structured REST search entries
    ScopusSearch(Vec<SearchEntry>),

    /// Nothing was produced (the task failed before it could start)
    Empty,
}

impl FetchPayload {
    /// Number of entities carried by the payload
    pub fn len(&self) -> usize {
        match self {
            FetchPayload::Scholar(entries) => entries.len(),
            FetchPayload::ScopusExport { publications, .. } => publications.len(),
            FetchPayload::ScopusSearch(entries) => entries.len(),
            FetchPayload::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one fetch: partial results are always usable, even with errors present
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    /// Originating module tag
    pub module: String,

    /// Produced entities
    pub payload: FetchPayload,

    /// Accumulated human-readable non-fatal and terminal errors
    pub errors: Vec<String>,

    /// Credentials that were refreshed during the fetch and should be persisted
    #[serde(skip)]
    pub updated_credentials: Option<AuthMaterial>,

    /// When the fetch started
    pub started_at: DateTime<Utc>,

    /// When the fetch finished
    pub finished_at: DateTime<Utc>,
}

impl FetchResult {
    /// Create a new result for a module
    pub fn new(module: impl Into<String>, payload: FetchPayload) -> Self {
        let now = Utc::now();
        Self {
            module: module.into(),
            payload,
            errors: Vec::new(),
            updated_credentials: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Result for a task that produced nothing
    pub fn failed(module: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(module, FetchPayload::Empty);
        result.errors.push(error.into());
        result
    }

    /// Set the start time
    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Append errors
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors.extend(errors);
        self
    }

    /// Stamp the finish time
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_proxy_replaces_rotation_list() {
        let request = FetchRequest::new("graphene")
            .proxies(vec!["http://a:1".to_string(), "http://b:2".to_string()])
            .debug_proxy("http://debug:8080");

        assert_eq!(request.rotation_proxies(), vec!["http://debug:8080"]);
        assert_eq!(request.authenticated_proxies(), vec!["http://debug:8080"]);
    }

    #[test]
    fn test_authenticated_proxies_never_use_pool() {
        let request =
            FetchRequest::new("graphene").proxies(vec!["http://a:1".to_string()]);

        assert_eq!(request.rotation_proxies().len(), 1);
        assert!(request.authenticated_proxies().is_empty());
    }

    #[test]
    fn test_failed_result_keeps_error() {
        let result = FetchResult::failed("scholar", "task panicked");
        assert!(result.has_errors());
        assert!(result.payload.is_empty());
        assert_eq!(result.module, "scholar");
    }
}
