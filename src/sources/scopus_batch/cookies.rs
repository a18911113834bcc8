//! Cookie file persistence for export credentials.
//!
//! The file holds one `name=value; name=value` line with the four session
//! cookies captured after a manual browser login.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::AuthMaterial;

/// Cookie file errors
#[derive(Debug, thiserror::Error)]
pub enum CookieFileError {
    #[error("cookie file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required cookies: {}", .0.join(", "))]
    Missing(Vec<String>),
}

const REQUIRED: [&str; 4] = [
    AuthMaterial::COOKIE_JWT,
    AuthMaterial::COOKIE_AWSELB,
    AuthMaterial::COOKIE_SESSION_UUID,
    AuthMaterial::COOKIE_SESSION_ID,
];

/// Parse `name=value` pairs separated by `;`
pub fn parse_cookie_string(text: &str) -> HashMap<String, String> {
    text.split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| {
            (
                name.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            )
        })
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .collect()
}

/// Build credentials from cookie text, listing every missing cookie
pub fn material_from_cookies(
    text: &str,
    user_agent: &str,
    cookie_domain: &str,
) -> Result<AuthMaterial, CookieFileError> {
    let cookies = parse_cookie_string(text);

    let missing: Vec<String> = REQUIRED
        .iter()
        .filter(|name| !cookies.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CookieFileError::Missing(missing));
    }

    let get = |name: &str| cookies.get(name).cloned().unwrap_or_default();
    Ok(AuthMaterial::new(
        user_agent,
        get(AuthMaterial::COOKIE_JWT),
        get(AuthMaterial::COOKIE_SESSION_ID),
        get(AuthMaterial::COOKIE_AWSELB),
        get(AuthMaterial::COOKIE_SESSION_UUID),
    )
    .cookie_domain(cookie_domain))
}

/// Load credentials from a cookie file
pub fn load_cookie_file(
    path: &Path,
    user_agent: &str,
    cookie_domain: &str,
) -> Result<AuthMaterial, CookieFileError> {
    if !path.is_file() {
        return Err(CookieFileError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let material = material_from_cookies(&text, user_agent, cookie_domain)?;
    tracing::info!("all required export cookies found in {}", path.display());
    Ok(material)
}

/// Render credentials in cookie file form
pub fn cookie_string(material: &AuthMaterial) -> String {
    format!(
        "{}={}; {}={}; {}={}; {}={}",
        AuthMaterial::COOKIE_JWT,
        material.jwt(),
        AuthMaterial::COOKIE_AWSELB,
        material.awselb(),
        AuthMaterial::COOKIE_SESSION_ID,
        material.session_id(),
        AuthMaterial::COOKIE_SESSION_UUID,
        material.session_uuid()
    )
}

/// Write credentials back so the next run starts with fresh values
pub fn save_cookie_file(path: &Path, material: &AuthMaterial) -> Result<(), CookieFileError> {
    std::fs::write(path, cookie_string(material))?;
    tracing::info!("updated cookie file {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const COOKIES: &str =
        "SCOPUS_JWT=eyJhbGc; AWSELB=\"elb value\"; SCSessionID=sid; scopusSessionUUID=uuid; other=1";

    #[test]
    fn test_parse_cookie_string() {
        let cookies = parse_cookie_string(COOKIES);
        assert_eq!(cookies["SCOPUS_JWT"], "eyJhbGc");
        assert_eq!(cookies["AWSELB"], "elb value");
        assert_eq!(cookies.len(), 5);
    }

    #[test]
    fn test_missing_cookies_are_named() {
        let err = material_from_cookies("SCOPUS_JWT=x; SCSessionID=y", "ua", ".scopus.com")
            .unwrap_err();
        match err {
            CookieFileError::Missing(names) => {
                assert_eq!(names, vec!["AWSELB", "scopusSessionUUID"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, COOKIES).unwrap();

        let mut material = load_cookie_file(&path, "agent/1.0", ".scopus.com").unwrap();
        assert_eq!(material.jwt(), "eyJhbGc");
        assert_eq!(material.user_agent(), "agent/1.0");

        material.apply_cookie("SCOPUS_JWT", "refreshed");
        save_cookie_file(&path, &material).unwrap();

        let reloaded = load_cookie_file(&path, "agent/1.0", ".scopus.com").unwrap();
        assert_eq!(reloaded.jwt(), "refreshed");
        assert_eq!(reloaded.awselb(), "elb value");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_cookie_file(&dir.path().join("nope"), "ua", ".scopus.com").unwrap_err();
        assert!(matches!(err, CookieFileError::NotFound(_)));
    }
}
