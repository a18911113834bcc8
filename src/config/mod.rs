//! Configuration management.
//!
//! Settings are layered: serde defaults, then an optional TOML file, then
//! `BIBLIOFETCH_` environment variables (`__` separates section and key,
//! e.g. `BIBLIOFETCH_SCOPUS_API__API_KEY`).

mod file_config;

pub use file_config::{default_config_path, find_config_file, ConfigFile, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{AuthMaterial, FetchRequest};
use crate::sources::scholar::{DEFAULT_PAGE_SIZE, DEFAULT_USER_AGENT, SCHOLAR_BASE_URI};
use crate::sources::scopus_api::SCOPUS_API_BASE_URI;
use crate::sources::scopus_batch::{DEFAULT_MAX_ITERATIONS, SCOPUS_BATCH_BASE_URI};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BIBLIOFETCH";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Transport settings shared by every provider
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub scholar: ScholarSettings,

    #[serde(default)]
    pub scopus_batch: ScopusBatchSettings,

    #[serde(default)]
    pub scopus_api: ScopusApiSettings,
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Skip TLS certificate verification
    #[serde(default)]
    pub ssl_insecure: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Egress proxies, rotated in order
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Single proxy that replaces `proxies` when set
    #[serde(default)]
    pub debug_proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            ssl_insecure: false,
            timeout_secs: default_timeout_secs(),
            proxies: Vec::new(),
            debug_proxy: None,
        }
    }
}

impl HttpSettings {
    /// Build a fetch request for `query` from these settings
    pub fn request(&self, query: impl Into<String>) -> FetchRequest {
        let mut request = FetchRequest::new(query)
            .verify_ssl(!self.ssl_insecure)
            .proxies(self.proxies.clone());
        if let Some(proxy) = self.debug_proxy.as_ref().filter(|p| !p.trim().is_empty()) {
            request = request.debug_proxy(proxy.clone());
        }
        request
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Google Scholar settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarSettings {
    #[serde(default = "default_scholar_base_uri")]
    pub base_uri: String,

    #[serde(default = "default_scholar_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ScholarSettings {
    fn default() -> Self {
        Self {
            base_uri: default_scholar_base_uri(),
            user_agent: default_scholar_user_agent(),
            page_size: default_page_size(),
        }
    }
}

fn default_scholar_base_uri() -> String {
    SCHOLAR_BASE_URI.to_string()
}

fn default_scholar_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Scopus batch export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopusBatchSettings {
    #[serde(default = "default_batch_base_uri")]
    pub base_uri: String,

    /// Cookie file captured from a browser login
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    #[serde(default = "default_cookie_domain")]
    pub cookie_domain: String,

    /// User agent of the browser the cookies came from
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Export requests are slow; this is longer than the shared timeout
    #[serde(default = "default_batch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScopusBatchSettings {
    fn default() -> Self {
        Self {
            base_uri: default_batch_base_uri(),
            cookie_file: None,
            cookie_domain: default_cookie_domain(),
            user_agent: None,
            max_iterations: default_max_iterations(),
            timeout_secs: default_batch_timeout_secs(),
        }
    }
}

fn default_batch_base_uri() -> String {
    SCOPUS_BATCH_BASE_URI.to_string()
}

fn default_cookie_domain() -> String {
    AuthMaterial::DEFAULT_COOKIE_DOMAIN.to_string()
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_batch_timeout_secs() -> u64 {
    60
}

/// Scopus Search API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopusApiSettings {
    #[serde(default = "default_api_base_uri")]
    pub base_uri: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ScopusApiSettings {
    fn default() -> Self {
        Self {
            base_uri: default_api_base_uri(),
            api_key: None,
        }
    }
}

fn default_api_base_uri() -> String {
    SCOPUS_API_BASE_URI.to_string()
}

/// Load configuration, optionally from a file, with environment overrides.
///
/// An explicitly given file must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("http.proxies")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 30);
        assert!(!config.http.ssl_insecure);
        assert_eq!(config.scholar.page_size, 10);
        assert_eq!(config.scopus_batch.cookie_domain, ".scopus.com");
        assert_eq!(config.scopus_batch.max_iterations, 1000);
        assert_eq!(config.scopus_api.base_uri, "https://api.elsevier.com");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[http]
ssl_insecure = true
proxies = ["http://p1:8080", "socks5://p2:1080"]

[scholar]
page_size = 20

[scopus_batch]
cookie_file = "/tmp/cookies.txt"
user_agent = "Mozilla/5.0 test"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(config.http.ssl_insecure);
        assert_eq!(config.http.proxies.len(), 2);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.scholar.page_size, 20);
        assert_eq!(config.scholar.base_uri, SCHOLAR_BASE_URI);
        assert_eq!(
            config.scopus_batch.cookie_file,
            Some(PathBuf::from("/tmp/cookies.txt"))
        );
        assert_eq!(config.scopus_batch.cookie_domain, ".scopus.com");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_debug_proxy_replaces_list() {
        let mut http = HttpSettings {
            proxies: vec!["http://p1:8080".to_string(), "http://p2:8080".to_string()],
            ..HttpSettings::default()
        };
        assert_eq!(http.request("graphene").rotation_proxies().len(), 2);

        http.debug_proxy = Some("http://127.0.0.1:8888".to_string());
        let request = http.request("graphene");
        assert_eq!(request.rotation_proxies(), vec!["http://127.0.0.1:8888"]);
        assert!(request.verify_ssl);
    }
}
