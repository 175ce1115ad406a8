use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::LOGIN_ROUTE;
use crate::error::{AppError, AppResult};
use crate::identity::{SessionUpdate, UserProfile};

use super::gateway::ApiGateway;

pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const ME_PATH: &str = "/api/auth/me/";

#[derive(Debug, Deserialize)]
struct IssuedSession {
    access: String,
    refresh: String,
    user: UserProfile,
}

/// Login, registration, profile bootstrap and logout on top of the gateway.
#[derive(Clone)]
pub struct AuthService {
    gateway: Arc<ApiGateway>,
}

impl AuthService {
    pub fn new(gateway: Arc<ApiGateway>) -> Self { Self { gateway } }

    pub fn gateway(&self) -> &Arc<ApiGateway> { &self.gateway }

    /// Exchange username (or email) and password for a session.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<UserProfile> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::unauthenticated("missing_credentials", "username and password are required"));
        }
        let body = self
            .gateway
            .send_public(Method::POST, LOGIN_PATH, Some(json!({ "username": username, "password": password })))
            .await
            .map_err(|e| match e.backend_status() {
                Some(401) => AppError::Unauthenticated { code: "invalid_credentials".into(), message: e.message().to_string() },
                _ => e,
            })?;
        let issued: IssuedSession = serde_json::from_value(body)?;
        self.install(issued)
    }

    /// Create an account. When the backend answers with tokens the new user is logged in.
    pub async fn register(&self, form: Value) -> AppResult<Value> {
        let body = self.gateway.send_public(Method::POST, REGISTER_PATH, Some(form)).await?;
        if let Ok(issued) = serde_json::from_value::<IssuedSession>(body.clone()) {
            self.install(issued)?;
        }
        Ok(body)
    }

    /// Fetch `/api/auth/me/` and replace the stored user wholesale.
    pub async fn fetch_current_user(&self) -> AppResult<UserProfile> {
        let body = self.gateway.get(ME_PATH).await?;
        let user: UserProfile = serde_json::from_value(body)?;
        self.gateway.store().set_session(SessionUpdate::default().user(user.clone()))?;
        Ok(user)
    }

    /// Re-validate a restored session. No persisted credential means anonymous. A failed
    /// profile fetch clears the session; an expired session is reported as anonymous.
    pub async fn bootstrap(&self) -> AppResult<Option<UserProfile>> {
        if self.gateway.store().access_token().is_none() {
            return Ok(None);
        }
        match self.fetch_current_user().await {
            Ok(user) => {
                info!(target: "uniteam::session", "session restored for {} ({})", user.username, user.role);
                Ok(Some(user))
            }
            Err(e) if e.is_session_expired() => Ok(None),
            Err(e) => {
                warn!(target: "uniteam::session", "profile fetch failed, clearing session: {}", e);
                self.gateway.store().clear_session()?;
                Err(e)
            }
        }
    }

    pub fn logout(&self) -> AppResult<()> {
        self.gateway.store().clear_session()?;
        self.gateway.navigator().navigate(LOGIN_ROUTE);
        Ok(())
    }

    fn install(&self, issued: IssuedSession) -> AppResult<UserProfile> {
        self.gateway.store().set_session(
            SessionUpdate::default()
                .access(issued.access)
                .refresh(issued.refresh)
                .user(issued.user.clone()),
        )?;
        info!(target: "uniteam::session", "logged in as {} ({})", issued.user.username, issued.user.role);
        Ok(issued.user)
    }
}
