//! Client configuration resolved from the environment.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AppError, AppResult};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const ENV_API_BASE: &str = "UNITEAM_API_BASE";
pub const ENV_SESSION_FILE: &str = "UNITEAM_SESSION_FILE";
pub const ENV_TIMEOUT_MS: &str = "UNITEAM_TIMEOUT_MS";

/// Login route every forced logout lands on.
pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin; API paths such as `/api/projects/` are joined onto it.
    pub base_url: Url,
    /// Where the file backend keeps the persisted session.
    pub session_file: PathBuf,
    /// Per-request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base: &str) -> AppResult<Self> {
        Ok(Self {
            base_url: parse_base(base)?,
            session_file: default_session_file(),
            timeout: None,
        })
    }

    /// Resolve from `UNITEAM_*` environment variables, falling back to defaults.
    pub fn from_env() -> AppResult<Self> {
        let base = std::env::var(ENV_API_BASE).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let session_file = std::env::var(ENV_SESSION_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_file());
        let timeout = match std::env::var(ENV_TIMEOUT_MS) {
            Ok(s) => {
                let ms = s.trim().parse::<u64>().map_err(|_| AppError::Config {
                    code: "bad_timeout".into(),
                    message: format!("{} must be a whole number of milliseconds, got '{}'", ENV_TIMEOUT_MS, s),
                })?;
                Some(Duration::from_millis(ms))
            }
            Err(_) => None,
        };
        Ok(Self { base_url: parse_base(&base)?, session_file, timeout })
    }

    pub fn with_session_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.session_file = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Absolute URL for an API path.
    pub fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url.join(path).map_err(|e| AppError::Config {
            code: "bad_path".into(),
            message: format!("cannot join '{}' onto {}: {}", path, self.base_url, e),
        })
    }
}

fn parse_base(base: &str) -> AppResult<Url> {
    let url = Url::parse(base.trim()).map_err(|e| AppError::Config {
        code: "bad_base_url".into(),
        message: format!("invalid base URL '{}': {}", base, e),
    })?;
    if url.cannot_be_a_base() {
        return Err(AppError::config("bad_base_url", "base URL cannot carry paths"));
    }
    Ok(url)
}

fn default_session_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".uniteam")
        .join("session.json")
}
