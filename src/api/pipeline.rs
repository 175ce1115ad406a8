//! Ordered request/response transforms applied by the gateway.
//! Layers run in insertion order on the way out and in the same order on the way back.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::identity::Session;

use super::pending::PendingRequest;

/// Request about to hit the wire.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl Outgoing {
    pub fn from_pending(pending: &PendingRequest, url: Url) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        for (k, v) in pending.headers() {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| AppError::Config { code: "bad_header".into(), message: format!("{}: {}", k, e) })?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| AppError::Config { code: "bad_header".into(), message: format!("{}: {}", k, e) })?;
            headers.insert(name, value);
        }
        Ok(Self { method: pending.method().clone(), url, headers, body: pending.body().cloned() })
    }
}

/// What a layer may look at while shaping a request.
pub struct RequestContext<'a> {
    pub pending: &'a PendingRequest,
    pub session: &'a Session,
}

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_request(&self, _req: &mut Outgoing, _ctx: &RequestContext<'_>) -> AppResult<()> { Ok(()) }

    fn on_response(&self, _status: StatusCode, _pending: &PendingRequest) {}
}

/// JSON content negotiation.
pub struct JsonHeaders;

impl Middleware for JsonHeaders {
    fn name(&self) -> &'static str { "json" }

    fn on_request(&self, req: &mut Outgoing, _ctx: &RequestContext<'_>) -> AppResult<()> {
        req.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if req.body.is_some() {
            req.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(())
    }
}

/// Attaches `Authorization: Bearer <token>`. A credential pinned on the request (a retry)
/// wins over the session's; with neither, no header is sent.
pub struct BearerCredential;

impl Middleware for BearerCredential {
    fn name(&self) -> &'static str { "bearer" }

    fn on_request(&self, req: &mut Outgoing, ctx: &RequestContext<'_>) -> AppResult<()> {
        let token = ctx.pending.credential().or(ctx.session.access_token.as_deref());
        match token {
            Some(t) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", t)).map_err(|_| {
                    AppError::unauthenticated("bad_credential", "access credential is not a valid header value")
                })?;
                req.headers.insert(AUTHORIZATION, value);
            }
            None => {
                req.headers.remove(AUTHORIZATION);
            }
        }
        Ok(())
    }
}

/// Request/response logging under `uniteam::api`.
pub struct TraceLayer;

impl Middleware for TraceLayer {
    fn name(&self) -> &'static str { "trace" }

    fn on_request(&self, req: &mut Outgoing, ctx: &RequestContext<'_>) -> AppResult<()> {
        debug!(
            target: "uniteam::api",
            "{} {} attempt={} auth={}",
            req.method, req.url.path(), ctx.pending.attempt(), req.headers.contains_key(AUTHORIZATION)
        );
        Ok(())
    }

    fn on_response(&self, status: StatusCode, pending: &PendingRequest) {
        if status.is_server_error() {
            warn!(target: "uniteam::api", "{} {} -> {}", pending.method(), pending.path(), status);
        } else {
            debug!(target: "uniteam::api", "{} {} -> {}", pending.method(), pending.path(), status);
        }
    }
}

#[derive(Clone, Default)]
pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self { Self::default() }

    /// Layers for authenticated API calls.
    pub fn standard() -> Self {
        Self::new().push(JsonHeaders).push(BearerCredential).push(TraceLayer)
    }

    /// Layers for login, register and refresh: never carries a credential.
    pub fn public() -> Self {
        Self::new().push(JsonHeaders).push(TraceLayer)
    }

    pub fn push<M: Middleware + 'static>(mut self, layer: M) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    pub fn names(&self) -> Vec<&'static str> { self.layers.iter().map(|l| l.name()).collect() }

    pub fn apply_request(&self, req: &mut Outgoing, ctx: &RequestContext<'_>) -> AppResult<()> {
        for layer in self.layers.iter() {
            layer.on_request(req, ctx)?;
        }
        Ok(())
    }

    pub fn apply_response(&self, status: StatusCode, pending: &PendingRequest) {
        for layer in self.layers.iter() {
            layer.on_response(status, pending);
        }
    }
}
