//! Google Scholar fetcher.
//!
//! Scholar has no API. The fetcher scrapes result pages and enriches each
//! result with its BibTeX citation file:
//!
//! 1. A session is bound to a proxy, primed with baseline cookies, and the
//!    citation-link preference is saved so every result carries a BibTeX link.
//! 2. [`Paginator`] walks result pages ten at a time until an empty page.
//! 3. Each result's BibTeX file is fetched and merged into the listing entry.
//!
//! CAPTCHA pages and 403s are challenges: the orchestrator rotates to the
//! next proxy and the failed step is retried on a fresh session.

mod bibtex;
mod merge;
mod paginator;
mod parse;
mod session;

pub use bibtex::{parse_first_entry, BibEntry};
pub use merge::merge_entries;
pub use paginator::{Paginator, DEFAULT_PAGE_SIZE};
pub use parse::{classify, parse_listing, parse_settings_form, SettingsForm, Verdict};
pub use session::{HttpScholarSession, ScholarSession, SessionSettings};

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use crate::config::{HttpSettings, ScholarSettings};
use crate::models::{FetchPayload, FetchRequest, FetchResult};
use crate::orchestrator::{CancelSignal, FetchOrchestrator};
use crate::sources::Fetcher;

/// Default Scholar host
pub const SCHOLAR_BASE_URI: &str = "https://scholar.google.com";

/// Browser user agent sent by default
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Google Scholar fetcher
#[derive(Debug, Clone)]
pub struct ScholarFetcher {
    base_uri: String,
    user_agent: String,
    timeout: Duration,
    page_size: usize,
}

impl ScholarFetcher {
    pub fn new() -> Self {
        Self {
            base_uri: SCHOLAR_BASE_URI.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn from_config(settings: &ScholarSettings, http: &HttpSettings) -> Self {
        Self::new()
            .base_uri(&settings.base_uri)
            .user_agent(&settings.user_agent)
            .page_size(settings.page_size)
            .timeout(Duration::from_secs(http.timeout_secs))
    }

    /// Override the Scholar host (used against local stubs)
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for ScholarFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ScholarFetcher {
    fn id(&self) -> &str {
        "scholar"
    }

    fn name(&self) -> &str {
        "Google Scholar"
    }

    async fn fetch(&self, request: &FetchRequest, cancel: CancelSignal) -> FetchResult {
        let started_at = Utc::now();

        if request.query.trim().is_empty() {
            return FetchResult::failed(self.id(), "Invalid request: empty search query");
        }
        let base_uri = match Url::parse(&self.base_uri) {
            Ok(url) => url,
            Err(e) => {
                return FetchResult::failed(
                    self.id(),
                    format!("Invalid request: base URI {:?}: {}", self.base_uri, e),
                )
            }
        };

        let session = HttpScholarSession::new(SessionSettings {
            base_uri,
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
            verify_ssl: request.verify_ssl,
        });
        let mut orchestrator = FetchOrchestrator::new(self.id(), request.rotation_proxies());

        tracing::info!(query = %request.query, "searching Google Scholar");
        let entries = Paginator::new(session, self.page_size)
            .run(&request.query, &mut orchestrator, &cancel)
            .await;
        tracing::info!(
            entries = entries.len(),
            rotations = orchestrator.rotations(),
            "Google Scholar fetch done"
        );

        FetchResult::new(self.id(), FetchPayload::Scholar(entries))
            .started_at(started_at)
            .with_errors(orchestrator.into_errors())
            .finish()
    }
}
