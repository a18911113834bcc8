//! HTTP client utilities.

use reqwest::header::HeaderMap;
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to at most one egress proxy
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    proxy: Option<String>,
}

impl HttpClient {
    /// Start building a client with the given user agent
    pub fn builder(user_agent: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder {
            user_agent: user_agent.into(),
            timeout: DEFAULT_TIMEOUT,
            verify_ssl: true,
            proxy: None,
            cookie_store: false,
            headers: HeaderMap::new(),
        }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Proxy this client is bound to, `None` for a direct connection
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

/// Builder for [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    user_agent: String,
    timeout: Duration,
    verify_ssl: bool,
    proxy: Option<String>,
    cookie_store: bool,
    headers: HeaderMap,
}

impl HttpClientBuilder {
    /// Per-request timeout; a timeout surfaces as a transport failure
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Toggle TLS certificate verification
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Route every request through this proxy (`None` = direct)
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Keep cookies set by responses for later requests of this client
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Headers sent with every request
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn build(self) -> Result<HttpClient, SourceError> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(!self.verify_ssl)
            .cookie_store(self.cookie_store)
            .default_headers(self.headers);

        match &self.proxy {
            Some(proxy) => {
                let proxy = Proxy::all(proxy.as_str()).map_err(|e| {
                    SourceError::InvalidRequest(format!("invalid proxy {:?}: {}", proxy, e))
                })?;
                builder = builder.proxy(proxy);
            }
            // A direct session must not pick up proxies from the environment
            None => builder = builder.no_proxy(),
        }

        let client = builder
            .build()
            .map_err(|e| SourceError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpClient {
            client: Arc::new(client),
            proxy: self.proxy,
        })
    }
}
