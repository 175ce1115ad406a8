use reqwest::Method;
use serde_json::Value;

/// How many times one logical request may be resent after a credential renewal.
pub const MAX_RETRIES: u8 = 1;

/// One logical API call. Values are never mutated in place: a retry is a new value with
/// a higher attempt count and the renewed credential pinned on it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    attempt: u8,
    credential: Option<String>,
}

impl PendingRequest {
    pub fn new<S: Into<String>>(method: Method, path: S) -> Self {
        Self { method, path: path.into(), body: None, headers: Vec::new(), attempt: 0, credential: None }
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn attempt(&self) -> u8 { self.attempt }

    /// Credential pinned by a retry. `None` means "use whatever the session holds".
    pub fn credential(&self) -> Option<&str> { self.credential.as_deref() }

    pub fn is_retry(&self) -> bool { self.attempt > 0 }

    pub fn can_retry(&self) -> bool { self.attempt < MAX_RETRIES }

    /// The resend of this request carrying `credential`, or `None` once retries are spent.
    pub fn retry_with<S: Into<String>>(&self, credential: S) -> Option<PendingRequest> {
        if !self.can_retry() {
            return None;
        }
        Some(PendingRequest {
            attempt: self.attempt + 1,
            credential: Some(credential.into()),
            ..self.clone()
        })
    }
}
