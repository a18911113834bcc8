//! Scrape session bound to one egress proxy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Response, StatusCode};
use url::Url;

use super::bibtex::parse_first_entry;
use super::parse::{classify, parse_listing, parse_settings_form, Verdict};
use crate::models::{DetailEntry, ListingEntry};
use crate::sources::SourceError;
use crate::utils::HttpClient;

/// Operations the paginator needs from a session
#[async_trait]
pub trait ScholarSession: Send {
    /// Bind to `proxy` (`None` = direct), prime cookies and apply preferences.
    ///
    /// Any previously bound client is torn down first.
    async fn init(&mut self, proxy: Option<String>) -> Result<(), SourceError>;

    /// Release the client
    fn close(&mut self);

    /// Fetch one result page; past the last page this yields no entries
    async fn fetch_page(
        &mut self,
        query: &str,
        offset: usize,
    ) -> Result<Vec<ListingEntry>, SourceError>;

    /// Fetch and parse the detail resource of one entry
    async fn fetch_detail(
        &mut self,
        entry: &ListingEntry,
    ) -> Result<Option<DetailEntry>, SourceError>;
}

/// Settings shared by every client the session builds
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub base_uri: Url,
    pub user_agent: String,
    pub timeout: Duration,
    pub verify_ssl: bool,
}

#[derive(Debug)]
enum SessionState {
    Uninitialized,
    Bound { client: HttpClient },
    Closed,
}

/// [`ScholarSession`] over HTTP
#[derive(Debug)]
pub struct HttpScholarSession {
    settings: SessionSettings,
    state: SessionState,
}

impl HttpScholarSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            state: SessionState::Uninitialized,
        }
    }

    /// Proxy of the bound client, if bound
    pub fn proxy(&self) -> Option<&str> {
        match &self.state {
            SessionState::Bound { client } => client.proxy(),
            _ => None,
        }
    }

    fn client(&self) -> Result<&HttpClient, SourceError> {
        match &self.state {
            SessionState::Bound { client } => Ok(client),
            SessionState::Uninitialized => Err(SourceError::InvalidRequest(
                "session used before init".to_string(),
            )),
            SessionState::Closed => {
                Err(SourceError::InvalidRequest("session is closed".to_string()))
            }
        }
    }

    fn build_client(&self, proxy: Option<String>) -> Result<HttpClient, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );

        HttpClient::builder(self.settings.user_agent.clone())
            .timeout(self.settings.timeout)
            .verify_ssl(self.settings.verify_ssl)
            .proxy(proxy)
            .cookie_store(true)
            .default_headers(headers)
            .build()
    }

    async fn get_checked(
        client: &HttpClient,
        url: Url,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<String, SourceError> {
        tracing::debug!(%url, "{}", context);
        let response = client.client().get(url).query(query).send().await?;
        let (status, body) = read(response).await?;
        check(status, &body, context)?;
        Ok(body)
    }

    async fn prime(&self, client: &HttpClient) -> Result<(), SourceError> {
        let base = &self.settings.base_uri;
        Self::get_checked(client, base.join("/")?, &[], "priming cookies").await?;

        let settings_page = Self::get_checked(
            client,
            base.join("/scholar_settings")?,
            &[("hl", "en"), ("as_sdt", "0,5")],
            "settings page",
        )
        .await?;
        let form = parse_settings_form(&settings_page)?;
        tracing::debug!(scisig = %form.scisig, "submitting preferences");

        Self::get_checked(
            client,
            base.join("/scholar_setprefs")?,
            &[
                ("scisig", form.scisig.as_str()),
                ("xsrf", ""),
                ("as_sdt", "0,5"),
                ("scis", "yes"),
                ("scisf", "4"),
                ("hl", "en"),
                ("lang", "all"),
                ("instq", ""),
                ("inst", form.inst.as_str()),
                ("boi_access", "1"),
                ("has_boo_access", "1"),
                ("has_casa_opt_in", "1"),
                ("save", ""),
            ],
            "saving preferences",
        )
        .await?;
        Ok(())
    }
}

async fn read(response: Response) -> Result<(StatusCode, String), SourceError> {
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

fn check(status: StatusCode, body: &str, context: &str) -> Result<(), SourceError> {
    if let Verdict::Challenged(reason) = classify(status, body) {
        return Err(SourceError::Challenge(format!("{}: {}", context, reason)));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::Challenge(format!("{}: rate limited", context)));
    }
    if !status.is_success() {
        return Err(SourceError::from_status(status, context, body));
    }
    Ok(())
}

#[async_trait]
impl ScholarSession for HttpScholarSession {
    async fn init(&mut self, proxy: Option<String>) -> Result<(), SourceError> {
        if matches!(self.state, SessionState::Closed) {
            return Err(SourceError::InvalidRequest("session is closed".to_string()));
        }
        self.state = SessionState::Uninitialized;

        tracing::info!(proxy = ?proxy, "initializing Scholar session");
        let client = self.build_client(proxy)?;
        self.prime(&client).await?;

        self.state = SessionState::Bound { client };
        Ok(())
    }

    fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    async fn fetch_page(
        &mut self,
        query: &str,
        offset: usize,
    ) -> Result<Vec<ListingEntry>, SourceError> {
        let client = self.client()?;
        let url = self.settings.base_uri.join("/scholar")?;
        let start = offset.to_string();

        tracing::debug!(offset, "fetching result page");
        let response = client
            .client()
            .get(url)
            .query(&[
                ("start", start.as_str()),
                ("q", query),
                ("hl", "en"),
                ("as_sdt", "0,5"),
            ])
            .send()
            .await?;

        let (status, body) = read(response).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        check(status, &body, &format!("page at offset {}", offset))?;

        parse_listing(&body, &self.settings.base_uri)
    }

    async fn fetch_detail(
        &mut self,
        entry: &ListingEntry,
    ) -> Result<Option<DetailEntry>, SourceError> {
        let client = self.client()?;

        tracing::debug!(id = %entry.id, "fetching BibTeX");
        let response = client.client().get(&entry.detail_uri).send().await?;
        let (status, body) = read(response).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check(status, &body, &format!("detail {}", entry.id))?;

        Ok(parse_first_entry(&body).map(|bib| bib.into_detail(&entry.id)))
    }
}
