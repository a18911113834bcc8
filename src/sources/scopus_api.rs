//! Scopus Search API fetcher.
//!
//! Uses the official REST search endpoint with an API key. Results come
//! back as JSON in pages of at most 25 entries, addressed by `start` and
//! `count`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use url::Url;

use crate::config::{HttpSettings, ScopusApiSettings};
use crate::models::{FetchPayload, FetchRequest, FetchResult, SearchEntry, SearchResults};
use crate::orchestrator::{CancelSignal, FetchOrchestrator, RetryDecision};
use crate::sources::{Fetcher, SourceError};
use crate::utils::HttpClient;

/// Default API host
pub const SCOPUS_API_BASE_URI: &str = "https://api.elsevier.com";

/// Search endpoint path
pub const SEARCH_PATH: &str = "/content/search/scopus";

/// Largest page the API serves with the COMPLETE view
pub const MAX_PAGE_SIZE: usize = 25;

const API_KEY_HEADER: &str = "x-els-apikey";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.10 Safari/605.1.1";

/// Scopus Search API fetcher
#[derive(Debug, Clone)]
pub struct ScopusApiFetcher {
    base_uri: String,
    api_key: Option<String>,
    page_size: usize,
    timeout: Duration,
}

impl ScopusApiFetcher {
    pub fn new() -> Self {
        Self {
            base_uri: SCOPUS_API_BASE_URI.to_string(),
            api_key: None,
            page_size: MAX_PAGE_SIZE,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(settings: &ScopusApiSettings, http: &HttpSettings) -> Self {
        let mut fetcher = Self::new()
            .base_uri(&settings.base_uri)
            .timeout(Duration::from_secs(http.timeout_secs));
        fetcher.api_key = settings.api_key.clone();
        fetcher
    }

    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Entries requested per page; more than 25 is rejected at fetch time
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_client(
        &self,
        api_key: &str,
        proxy: Option<String>,
        verify_ssl: bool,
    ) -> Result<HttpClient, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| SourceError::InvalidRequest(format!("API key: {}", e)))?;
        headers.insert(API_KEY_HEADER, key);

        HttpClient::builder(USER_AGENT)
            .timeout(self.timeout)
            .verify_ssl(verify_ssl)
            .proxy(proxy)
            .default_headers(headers)
            .build()
    }

    /// Fetch one page of search results
    pub async fn search_page(
        &self,
        client: &HttpClient,
        base_uri: &Url,
        query: &str,
        start: usize,
        count: usize,
    ) -> Result<SearchResults, SourceError> {
        if count > MAX_PAGE_SIZE {
            return Err(SourceError::InvalidRequest(format!(
                "count {} exceeds the maximum of {}",
                count, MAX_PAGE_SIZE
            )));
        }

        let url = base_uri.join(SEARCH_PATH)?;
        let query = format!("TITLE-ABS-KEY({})", query);
        let start_param = start.to_string();
        let count_param = count.to_string();

        tracing::debug!(start, count, "requesting search page");
        let response = client
            .client()
            .get(url)
            .query(&[
                ("query", query.as_str()),
                ("view", "COMPLETE"),
                ("start", start_param.as_str()),
                ("count", count_param.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(SourceError::InvalidCredentials(
                "API key was rejected".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(SourceError::from_status(status, "search", &body));
        }

        SearchResults::from_json(&body).map_err(SourceError::Parse)
    }

    async fn collect(
        &self,
        request: &FetchRequest,
        api_key: &str,
        base_uri: &Url,
        orchestrator: &mut FetchOrchestrator,
        cancel: &CancelSignal,
    ) -> Vec<SearchEntry> {
        let mut entries = Vec::new();
        let mut client =
            match self.build_client(api_key, orchestrator.current_proxy(), request.verify_ssl) {
                Ok(client) => client,
                Err(e) => {
                    orchestrator.record(format!("client setup: {}", e));
                    return entries;
                }
            };

        let mut start = 0;
        let mut total: Option<usize> = None;
        loop {
            let count = match total {
                Some(total) if start >= total => break,
                Some(total) => self.page_size.min(total - start),
                None => self.page_size,
            };

            let step = format!("page at start {}", start);
            let page = loop {
                let fetched = cancel
                    .run(self.search_page(&client, base_uri, &request.query, start, count))
                    .await;
                match fetched {
                    Ok(page) => {
                        orchestrator.on_success();
                        break Some(page);
                    }
                    Err(SourceError::Cancelled) => {
                        orchestrator.record(format!("{}: {}", step, SourceError::Cancelled));
                        break None;
                    }
                    Err(err) => match orchestrator.on_failure(&step, &err) {
                        RetryDecision::Rotate(proxy) => {
                            match self.build_client(api_key, proxy, request.verify_ssl) {
                                Ok(rebuilt) => client = rebuilt,
                                Err(e) => {
                                    orchestrator.record(format!("client setup: {}", e));
                                    break None;
                                }
                            }
                        }
                        RetryDecision::Abort => break None,
                    },
                }
            };

            let Some(page) = page else { break };
            total = Some(page.total_results);
            if page.entries.is_empty() {
                break;
            }

            let advanced = if page.items_per_page > 0 {
                page.items_per_page
            } else {
                page.entries.len()
            };
            tracing::info!(
                start,
                count = page.entries.len(),
                total = page.total_results,
                "fetched search page"
            );
            entries.extend(page.entries);
            start += advanced;
        }

        entries
    }
}

impl Default for ScopusApiFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ScopusApiFetcher {
    fn id(&self) -> &str {
        "scopus_api"
    }

    fn name(&self) -> &str {
        "Scopus Search API"
    }

    async fn fetch(&self, request: &FetchRequest, cancel: CancelSignal) -> FetchResult {
        let started_at = Utc::now();

        if request.query.trim().is_empty() {
            return FetchResult::failed(self.id(), "Invalid request: empty search query");
        }
        if self.page_size > MAX_PAGE_SIZE {
            return FetchResult::failed(
                self.id(),
                SourceError::InvalidRequest(format!(
                    "count {} exceeds the maximum of {}",
                    self.page_size, MAX_PAGE_SIZE
                ))
                .to_string(),
            );
        }
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => return FetchResult::failed(self.id(), "Invalid credentials: no API key configured"),
        };
        let base_uri = match Url::parse(&self.base_uri) {
            Ok(url) => url,
            Err(e) => {
                return FetchResult::failed(
                    self.id(),
                    format!("Invalid request: base URI {:?}: {}", self.base_uri, e),
                )
            }
        };

        let mut orchestrator = FetchOrchestrator::new(self.id(), request.authenticated_proxies());
        tracing::info!(query = %request.query, "searching Scopus API");
        let entries = self
            .collect(request, api_key, &base_uri, &mut orchestrator, &cancel)
            .await;

        FetchResult::new(self.id(), FetchPayload::ScopusSearch(entries))
            .started_at(started_at)
            .with_errors(orchestrator.into_errors())
            .finish()
    }
}
