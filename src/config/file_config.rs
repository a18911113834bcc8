//! Configuration file support for bibliofetch.
//!
//! # Configuration File Format
//!
//! ```toml
//! [http]
//! ssl_insecure = false
//! timeout_secs = 30
//! proxies = ["http://proxy-1:8080", "socks5://proxy-2:1080"]
//! # debug_proxy = "http://127.0.0.1:8888"
//!
//! [scholar]
//! page_size = 10
//!
//! [scopus_batch]
//! cookie_file = "~/.config/bibliofetch/scopus-cookies.txt"
//! user_agent = "Mozilla/5.0 (X11; Linux x86_64) ..."
//! max_iterations = 1000
//!
//! [scopus_api]
//! api_key = "your-api-key"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

const FILE_NAME: &str = "config.toml";
const LOCAL_FILE_NAME: &str = "bibliofetch.toml";

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Plain TOML access to a configuration file, without environment overrides
pub struct ConfigFile;

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Config, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// `<config dir>/bibliofetch/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bibliofetch").join(FILE_NAME))
}

/// First existing config file: `./bibliofetch.toml`, then the default path
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.scopus_api.api_key = Some("saved-key".to_string());
        config.http.proxies = vec!["http://p1:8080".to_string()];

        ConfigFile::save(&config, &path).unwrap();
        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scopus_api]\napi_key = \"k\"\n").unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.scopus_api.api_key.as_deref(), Some("k"));
        assert_eq!(loaded.http.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "invalid = toml = content").unwrap();

        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigFileError::Parse(_))
        ));
    }

    #[test]
    fn test_nonexistent() {
        assert!(matches!(
            ConfigFile::load(Path::new("/nonexistent/config.toml")),
            Err(ConfigFileError::Io(_))
        ));
    }
}
