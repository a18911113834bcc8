//! Credential ownership and single-shot refresh for the export provider.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::Mutex;
use url::Url;

use crate::models::AuthMaterial;
use crate::sources::SourceError;
use crate::utils::HttpClient;

/// Endpoint that re-issues the JWT cookie for a live session
pub const REFRESH_PATH: &str = "/api/auth/refresh-scopus-jwt";

/// Transport settings for clients built by [`AuthLifecycle`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub verify_ssl: bool,
}

#[derive(Debug)]
struct AuthState {
    client: HttpClient,
    material: AuthMaterial,
    refreshed: bool,
}

/// Owns the credentials and the client that sends them.
///
/// Every POST goes through [`AuthLifecycle::guarded_post`] under one lock, so
/// concurrent callers sharing the session never run overlapping refreshes.
#[derive(Debug)]
pub struct AuthLifecycle {
    base_uri: Url,
    settings: ClientSettings,
    state: Mutex<AuthState>,
}

impl AuthLifecycle {
    pub fn new(
        base_uri: Url,
        material: AuthMaterial,
        settings: ClientSettings,
        proxy: Option<String>,
    ) -> Result<Self, SourceError> {
        let client = build_client(&material, &settings, proxy)?;
        Ok(Self {
            base_uri,
            settings,
            state: Mutex::new(AuthState {
                client,
                material,
                refreshed: false,
            }),
        })
    }

    /// Replace the client with one bound to `proxy`; credentials are kept
    pub async fn rebind(&self, proxy: Option<String>) -> Result<(), SourceError> {
        let mut state = self.state.lock().await;
        state.client = build_client(&state.material, &self.settings, proxy)?;
        Ok(())
    }

    /// Session id used in export payloads
    pub async fn session_id(&self) -> String {
        self.state.lock().await.material.session_id().to_string()
    }

    /// Current credentials, only when a refresh replaced them
    pub async fn updated_credentials(&self) -> Option<AuthMaterial> {
        let state = self.state.lock().await;
        state.refreshed.then(|| state.material.clone())
    }

    /// POST JSON, refreshing the credentials at most once on HTTP 403.
    ///
    /// A failed refresh, or a second 403 after a successful one, is
    /// [`SourceError::AuthExpired`].
    pub async fn guarded_post<B>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<String, SourceError>
    where
        B: Serialize + Sync,
    {
        let url = self.base_uri.join(path)?;
        let mut state = self.state.lock().await;

        let (status, text) = state.post(&url, query, body).await?;
        if status != StatusCode::FORBIDDEN {
            return checked(status, text, path);
        }

        tracing::warn!(path, "forbidden, refreshing credentials");
        state.refresh(&self.base_uri).await?;

        let (status, text) = state.post(&url, query, body).await?;
        if status == StatusCode::FORBIDDEN {
            return Err(SourceError::AuthExpired(format!(
                "{} still forbidden after refreshing credentials",
                path
            )));
        }
        checked(status, text, path)
    }
}

impl AuthState {
    async fn post<B>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<(StatusCode, String), SourceError>
    where
        B: Serialize + Sync,
    {
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .client()
            .post(url.clone())
            .query(query)
            .header(COOKIE, self.material.cookie_header())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    async fn refresh(&mut self, base_uri: &Url) -> Result<(), SourceError> {
        let url = base_uri.join(REFRESH_PATH)?;
        let response = self
            .client
            .client()
            .get(url)
            .header(COOKIE, self.material.cookie_header())
            .send()
            .await
            .map_err(|e| SourceError::AuthExpired(format!("refresh request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "credential refresh rejected: {}", body);
            return Err(SourceError::AuthExpired(format!(
                "credential refresh returned status {}",
                status
            )));
        }

        let mut updated = Vec::new();
        for cookie in response.cookies() {
            if let Some(domain) = cookie.domain() {
                if !self.material.covers_domain(domain) {
                    tracing::debug!(name = cookie.name(), domain, "ignoring cookie for another domain");
                    continue;
                }
            }
            if self.material.apply_cookie(cookie.name(), cookie.value()) {
                updated.push(cookie.name().to_string());
            }
        }
        tracing::info!(cookies = ?updated, "credentials refreshed");
        self.refreshed = true;
        Ok(())
    }
}

fn checked(status: StatusCode, text: String, path: &str) -> Result<String, SourceError> {
    if status.is_success() {
        Ok(text)
    } else {
        Err(SourceError::from_status(status, path, &text))
    }
}

fn build_client(
    material: &AuthMaterial,
    settings: &ClientSettings,
    proxy: Option<String>,
) -> Result<HttpClient, SourceError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    HttpClient::builder(material.user_agent())
        .timeout(settings.timeout)
        .verify_ssl(settings.verify_ssl)
        .proxy(proxy)
        .default_headers(headers)
        .build()
}
