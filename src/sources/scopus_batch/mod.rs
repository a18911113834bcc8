//! Scopus batch export fetcher.
//!
//! Uses the web interface's own export endpoints with session cookies taken
//! from a manual browser login:
//!
//! - [`AuthLifecycle`] owns the cookies and refreshes the JWT once per
//!   request when the server answers 403
//! - [`BatchExportEngine`] enumerates matching document ids (2000 per page)
//!   and exports them 100 at a time as CSV
//! - [`parse_export`] turns the CSV into [`ExportPublication`] rows
//!
//! Refreshed credentials are written back to the cookie file.
//!
//! [`ExportPublication`]: crate::models::ExportPublication

mod auth;
mod batch;
mod cookies;
mod engine;
mod parser;

pub use auth::{AuthLifecycle, ClientSettings, REFRESH_PATH};
pub use batch::{
    batch_id, batch_id_prefix, block_indices, MAX_EIDS_PER_EXPORT, MAX_EIDS_PER_SEARCH,
};
pub use cookies::{
    cookie_string, load_cookie_file, material_from_cookies, parse_cookie_string,
    save_cookie_file, CookieFileError,
};
pub use engine::{BatchExportEngine, ExportOutcome, DEFAULT_MAX_ITERATIONS, EXPORT_PATH, SEARCH_PATH};
pub use parser::parse_export;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use crate::config::ScopusBatchSettings;
use crate::models::{AuthMaterial, FetchPayload, FetchRequest, FetchResult};
use crate::orchestrator::{CancelSignal, FetchOrchestrator};
use crate::sources::Fetcher;
use crate::utils::{read_dump, write_dump};

/// Default Scopus web host
pub const SCOPUS_BATCH_BASE_URI: &str = "https://www.scopus.com";

/// Scopus batch export fetcher
#[derive(Debug, Clone)]
pub struct ScopusBatchFetcher {
    base_uri: String,
    cookie_file: Option<PathBuf>,
    cookie_domain: String,
    user_agent: Option<String>,
    credentials: Option<AuthMaterial>,
    timeout: Duration,
    max_iterations: usize,
    batch_prefix: Option<String>,
    input_file: Option<PathBuf>,
    raw_output: Option<PathBuf>,
}

impl ScopusBatchFetcher {
    pub fn new() -> Self {
        Self {
            base_uri: SCOPUS_BATCH_BASE_URI.to_string(),
            cookie_file: None,
            cookie_domain: AuthMaterial::DEFAULT_COOKIE_DOMAIN.to_string(),
            user_agent: None,
            credentials: None,
            timeout: Duration::from_secs(60),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            batch_prefix: None,
            input_file: None,
            raw_output: None,
        }
    }

    /// Transport flags come from the request; only the batch section applies here
    pub fn from_config(settings: &ScopusBatchSettings) -> Self {
        let mut fetcher = Self::new()
            .base_uri(&settings.base_uri)
            .cookie_domain(&settings.cookie_domain)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .max_iterations(settings.max_iterations);
        fetcher.cookie_file = settings.cookie_file.clone();
        fetcher.user_agent = settings.user_agent.clone();
        fetcher
    }

    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Read credentials from this cookie file and write refreshed ones back
    pub fn cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }

    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = domain.into();
        self
    }

    /// Must match the browser used for the login
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Use these credentials instead of a cookie file
    pub fn credentials(mut self, credentials: AuthMaterial) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Fix the batch id prefix instead of drawing a random one
    pub fn batch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.batch_prefix = Some(prefix.into());
        self
    }

    /// Parse a local export dump instead of exporting
    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_file = Some(path.into());
        self
    }

    /// Write the raw export text here
    pub fn raw_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw_output = Some(path.into());
        self
    }

    fn credentials_for_run(&self) -> Result<AuthMaterial, String> {
        if let Some(credentials) = &self.credentials {
            return Ok(credentials.clone());
        }
        let path = self
            .cookie_file
            .as_ref()
            .ok_or("no cookie file configured for batch export")?;
        let user_agent = self.user_agent.as_deref().ok_or(
            "a user agent is required (must match the browser used to log in)",
        )?;
        load_cookie_file(path, user_agent, &self.cookie_domain).map_err(|e| e.to_string())
    }

    /// Export over the network; returns raw text and refreshed credentials
    async fn export(
        &self,
        request: &FetchRequest,
        orchestrator: &mut FetchOrchestrator,
        cancel: &CancelSignal,
    ) -> Result<(String, Option<AuthMaterial>), String> {
        if request.query.trim().is_empty() {
            return Err("Invalid request: empty search query".to_string());
        }
        let credentials = self.credentials_for_run()?;
        let base_uri = Url::parse(&self.base_uri)
            .map_err(|e| format!("Invalid request: base URI {:?}: {}", self.base_uri, e))?;

        let auth = AuthLifecycle::new(
            base_uri,
            credentials,
            ClientSettings {
                timeout: self.timeout,
                verify_ssl: request.verify_ssl,
            },
            orchestrator.current_proxy(),
        )
        .map_err(|e| e.to_string())?;

        let mut engine = BatchExportEngine::new(auth).max_iterations(self.max_iterations);
        if let Some(prefix) = &self.batch_prefix {
            engine = engine.with_prefix(prefix.clone());
        }

        tracing::info!(query = %request.query, "exporting from Scopus");
        let outcome = engine.export_all(&request.query, orchestrator, cancel).await;
        let updated = engine.auth().updated_credentials().await;
        Ok((outcome.raw, updated))
    }
}

impl Default for ScopusBatchFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ScopusBatchFetcher {
    fn id(&self) -> &str {
        "scopus_batch"
    }

    fn name(&self) -> &str {
        "Scopus batch export"
    }

    async fn fetch(&self, request: &FetchRequest, cancel: CancelSignal) -> FetchResult {
        let started_at = Utc::now();
        let mut orchestrator = FetchOrchestrator::new(self.id(), request.authenticated_proxies());
        let mut updated_credentials = None;

        let raw = match &self.input_file {
            Some(path) => match read_dump(path) {
                Ok(raw) => raw,
                Err(e) => {
                    orchestrator.record(format!("failed to read {}: {}", path.display(), e));
                    String::new()
                }
            },
            None => match self.export(request, &mut orchestrator, &cancel).await {
                Ok((raw, updated)) => {
                    updated_credentials = updated;
                    raw
                }
                Err(e) => {
                    orchestrator.record(e);
                    String::new()
                }
            },
        };

        if let (Some(credentials), Some(path)) = (&updated_credentials, &self.cookie_file) {
            if let Err(e) = save_cookie_file(path, credentials) {
                orchestrator.record(format!("failed to update cookie file: {}", e));
            }
        }

        if let Some(path) = &self.raw_output {
            if self.input_file.is_none() {
                if let Err(e) = write_dump(path, &raw, self.id()) {
                    orchestrator.record(format!("failed to write {}: {}", path.display(), e));
                }
            }
        }

        let publications = match parse_export(&raw) {
            Ok(publications) => publications,
            Err(e) => {
                orchestrator.record(e.to_string());
                Vec::new()
            }
        };

        let mut result = FetchResult::new(self.id(), FetchPayload::ScopusExport { raw, publications })
            .started_at(started_at)
            .with_errors(orchestrator.into_errors())
            .finish();
        result.updated_credentials = updated_credentials;
        result
    }
}
