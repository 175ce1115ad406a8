//!
//! uniteam API gateway
//! -------------------
//! The one HTTP client every API call goes through. It resolves paths against the
//! configured backend origin, runs the middleware pipeline (JSON headers, bearer
//! credential, tracing), and owns the 401 contract:
//!
//! - a 401 on a first attempt triggers credential renewal, then exactly one resend
//!   carrying the renewed credential;
//! - a 401 on the resend, or a failed renewal, ends the session: the store is cleared
//!   and the navigator is sent to the login route;
//! - a renewal that settles after logout fails the request without reviving the session;
//! - every other failure is returned to the caller untouched.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, LOGIN_ROUTE};
use crate::error::{AppError, AppResult};
use crate::identity::{Navigator, Session, SessionStore};

use super::pending::PendingRequest;
use super::pipeline::{Outgoing, Pipeline, RequestContext};
use super::renewal::{TokenRenewal, REFRESH_PATH};

pub struct ApiGateway {
    config: ClientConfig,
    client: reqwest::Client,
    store: Arc<SessionStore>,
    renewal: TokenRenewal,
    navigator: Arc<dyn Navigator>,
    pipeline: Pipeline,
    public_pipeline: Pipeline,
}

impl ApiGateway {
    pub fn new(config: ClientConfig, store: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = config.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| AppError::Config { code: "http_client".into(), message: e.to_string() })?;
        let renewal = TokenRenewal::new(client.clone(), config.endpoint(REFRESH_PATH)?, store.clone());
        Ok(Self {
            config,
            client,
            store,
            renewal,
            navigator,
            pipeline: Pipeline::standard(),
            public_pipeline: Pipeline::public(),
        })
    }

    /// Replace the layers used for authenticated calls. The public pipeline is unaffected.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &ClientConfig { &self.config }
    pub fn store(&self) -> &Arc<SessionStore> { &self.store }
    pub fn navigator(&self) -> &Arc<dyn Navigator> { &self.navigator }
    pub fn renewal(&self) -> &TokenRenewal { &self.renewal }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> AppResult<Value> {
        self.execute(PendingRequest::new(method, path).with_body(body)).await
    }

    pub async fn get(&self, path: &str) -> AppResult<Value> { self.request(Method::GET, path, None).await }
    pub async fn post(&self, path: &str, body: Option<Value>) -> AppResult<Value> { self.request(Method::POST, path, body).await }
    pub async fn put(&self, path: &str, body: Value) -> AppResult<Value> { self.request(Method::PUT, path, Some(body)).await }
    pub async fn delete(&self, path: &str) -> AppResult<Value> { self.request(Method::DELETE, path, None).await }

    /// Authenticated call with renewal-and-retry on 401.
    pub async fn execute(&self, pending: PendingRequest) -> AppResult<Value> {
        let mut pending = pending;
        loop {
            let session = self.store.get_session();
            let sent_with = pending.credential().map(str::to_string).or_else(|| session.access_token.clone());
            let resp = self.dispatch(&self.pipeline, &pending, &session).await?;
            if resp.status() != StatusCode::UNAUTHORIZED {
                return read_body(resp).await;
            }

            if !pending.can_retry() {
                warn!(target: "uniteam::api", "{} {} rejected again after renewal", pending.method(), pending.path());
                return Err(self.end_session(AppError::session_expired(
                    "retry_rejected",
                    "request was rejected with a freshly renewed credential",
                )));
            }

            debug!(target: "uniteam::api", "{} {} -> 401, renewing", pending.method(), pending.path());
            let fresh = match self.renewal.renew_after(sent_with.as_deref()).await {
                Ok(token) => token,
                Err(e) => return Err(self.end_session(e)),
            };
            pending = match pending.retry_with(fresh) {
                Some(retry) => retry,
                None => return Err(self.end_session(AppError::session_expired("retry_rejected", "retry budget spent"))),
            };
        }
    }

    /// Unauthenticated call (login, register). No credential is attached and a 401 is
    /// returned to the caller like any other failure.
    pub async fn send_public(&self, method: Method, path: &str, body: Option<Value>) -> AppResult<Value> {
        let pending = PendingRequest::new(method, path).with_body(body);
        let resp = self.dispatch(&self.public_pipeline, &pending, &Session::default()).await?;
        read_body(resp).await
    }

    async fn dispatch(&self, pipeline: &Pipeline, pending: &PendingRequest, session: &Session) -> AppResult<Response> {
        let url = self.config.endpoint(pending.path())?;
        let mut out = Outgoing::from_pending(pending, url)?;
        pipeline.apply_request(&mut out, &RequestContext { pending, session })?;

        let mut req = self.client.request(out.method, out.url).headers(out.headers);
        if let Some(body) = out.body.as_ref() {
            req = req.json(body);
        }
        let resp = req.send().await?;
        pipeline.apply_response(resp.status(), pending);
        Ok(resp)
    }

    /// Unrecoverable session failure: make sure the store is empty and land on login. A
    /// renewal outliving its session (`session_cleared`) leaves both alone; that session
    /// was already ended or replaced by a newer login.
    fn end_session(&self, err: AppError) -> AppError {
        if err.is_session_expired() && err.code_str() != "session_cleared" {
            if let Err(e) = self.store.clear_session() {
                warn!(target: "uniteam::api", "failed to clear session: {}", e);
            }
            self.navigator.navigate(LOGIN_ROUTE);
        }
        err
    }
}

/// Decode a response body. Successful empty bodies (204) decode to `Value::Null`; failures
/// become `AppError::Transport` carrying the status and the backend's message.
async fn read_body(resp: Response) -> AppResult<Value> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if status.is_success() {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_slice(&bytes)?);
    }
    Err(AppError::Transport {
        code: "backend_error".into(),
        message: backend_message(&bytes, status),
        status: Some(status.as_u16()),
    })
}

fn backend_message(bytes: &[u8], status: StatusCode) -> String {
    if let Ok(v) = serde_json::from_slice::<Value>(bytes) {
        for key in ["error", "detail", "message"] {
            if let Some(s) = v.get(key).and_then(|m| m.as_str()) {
                return s.to_string();
            }
        }
        return v.to_string();
    }
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text
    }
}
