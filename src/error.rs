//! Unified client error model.
//! Every failure surfaced by the session store, the API gateway and the renewal protocol
//! is one of these variants, each carrying a stable `code` and a human `message`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// No valid session. Callers turn this into a redirect, never a dialog.
    Unauthenticated { code: String, message: String },
    /// Authenticated but the role does not match.
    Forbidden { code: String, message: String },
    /// 401 from a protected endpoint. Normally recovered by renewal and never seen by callers.
    ExpiredCredential { code: String, message: String },
    /// Renewal failed or no refresh credential exists. The session is already cleared.
    SessionExpired { code: String, message: String },
    /// Any other network or backend failure; `status` is set when the backend answered.
    Transport { code: String, message: String, status: Option<u16> },
    Decode { code: String, message: String },
    Storage { code: String, message: String },
    Config { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Unauthenticated { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::ExpiredCredential { code, .. }
            | AppError::SessionExpired { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Decode { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Config { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Unauthenticated { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::ExpiredCredential { message, .. }
            | AppError::SessionExpired { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Decode { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Config { message, .. } => message.as_str(),
        }
    }

    pub fn unauthenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn expired_credential<S: Into<String>>(code: S, msg: S) -> Self { AppError::ExpiredCredential { code: code.into(), message: msg.into() } }
    pub fn session_expired<S: Into<String>>(code: S, msg: S) -> Self { AppError::SessionExpired { code: code.into(), message: msg.into() } }
    pub fn transport<S: Into<String>>(code: S, msg: S, status: Option<u16>) -> Self { AppError::Transport { code: code.into(), message: msg.into(), status } }
    pub fn decode<S: Into<String>>(code: S, msg: S) -> Self { AppError::Decode { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }

    /// Refresh credential missing when renewal was requested.
    pub fn no_refresh_token() -> Self {
        AppError::session_expired("no_refresh_token", "no refresh credential stored")
    }

    /// True for the failures that end the session and must land the user on the login route.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, AppError::SessionExpired { .. })
    }

    /// HTTP status the backend answered with, when there was one.
    pub fn backend_status(&self) -> Option<u16> {
        match self {
            AppError::Transport { status, .. } => *status,
            AppError::ExpiredCredential { .. } => Some(401),
            _ => None,
        }
    }

    /// Map to the HTTP status a caller would report for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Unauthenticated { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::ExpiredCredential { .. } => 401,
            AppError::SessionExpired { .. } => 401,
            AppError::Transport { status, .. } => status.unwrap_or(503),
            AppError::Decode { .. } => 502,
            AppError::Storage { .. } => 500,
            AppError::Config { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Transport { status: Some(s), .. } => write!(f, "{} ({}): {}", self.code_str(), s, self.message()),
            _ => write!(f, "{}: {}", self.code_str(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::Decode { code: "invalid_body".into(), message: err.to_string() };
        }
        let status = err.status().map(|s| s.as_u16());
        AppError::Transport { code: "transport_error".into(), message: err.to_string(), status }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode { code: "invalid_json".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage { code: "io_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
