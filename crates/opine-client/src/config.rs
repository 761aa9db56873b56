use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_CREDENTIAL_PATH: &str = ".opine/credential";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPINE_API_URL must be an http(s) URL, got '{0}'")]
    InvalidApiUrl(String),

    #[error("OPINE_REQUEST_TIMEOUT_SECS must be a positive integer, got '{0}'")]
    InvalidTimeout(String),
}

/// Client settings, normally read from the environment (a `.env` file is
/// loaded by the binary before this runs).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API server, without a trailing slash.
    pub api_url: String,
    /// File that keeps the bearer token between runs.
    pub credential_path: PathBuf,
    /// Per-request timeout. `None` leaves requests unbounded; an expired
    /// request surfaces as a network failure.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: normalize_api_url(api_url)?,
            credential_path: PathBuf::from(DEFAULT_CREDENTIAL_PATH),
            request_timeout: None,
        })
    }

    /// Reads `OPINE_API_URL`, `OPINE_CREDENTIAL_PATH` and
    /// `OPINE_REQUEST_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = std::env::var("OPINE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let credential_path: PathBuf = std::env::var("OPINE_CREDENTIAL_PATH")
            .unwrap_or_else(|_| DEFAULT_CREDENTIAL_PATH.into())
            .into();
        let request_timeout = match std::env::var("OPINE_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Some(parse_timeout(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            api_url: normalize_api_url(&api_url)?,
            credential_path,
            request_timeout,
        })
    }

    pub fn with_credential_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidApiUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped() {
        let config = ClientConfig::new("https://api.example.com/").unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            ClientConfig::new("ftp://example.com"),
            Err(ConfigError::InvalidApiUrl(_))
        ));
    }

    #[test]
    fn timeout_must_be_positive() {
        assert_eq!(parse_timeout("15").unwrap(), Duration::from_secs(15));
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("soon").is_err());
    }
}
