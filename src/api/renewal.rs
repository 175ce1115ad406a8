//! Access-credential renewal.
//!
//! A rejected request exchanges the stored refresh credential for a new access credential
//! at `/api/auth/token/refresh/`. Concurrent callers share one in-flight exchange: the first
//! caller installs a shared future, everyone else awaits a clone of it, and the slot is
//! emptied once it settles. Any failure clears the whole session and yields
//! `AppError::SessionExpired`. A renewal that settles after the session was cleared (or
//! replaced by a new login) installs nothing and fails with `session_cleared`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::SessionStore;

pub const REFRESH_PATH: &str = "/api/auth/token/refresh/";

/// How long a credential installed by a settled renewal may be handed to requests that
/// were rejected with the credential it replaced.
pub const REUSE_WINDOW: Duration = Duration::from_secs(5);

type RenewalFuture = Shared<BoxFuture<'static, AppResult<String>>>;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

enum Ticket {
    /// The credential the caller was rejected with has already been replaced.
    Reuse(String),
    Wait(RenewalFuture),
}

pub struct TokenRenewal {
    client: reqwest::Client,
    refresh_url: Url,
    store: Arc<SessionStore>,
    inflight: Mutex<Option<RenewalFuture>>,
    last_renewed: Mutex<Option<(String, Instant)>>,
    exchanges: Arc<AtomicU64>,
}

impl TokenRenewal {
    pub fn new(client: reqwest::Client, refresh_url: Url, store: Arc<SessionStore>) -> Self {
        Self {
            client,
            refresh_url,
            store,
            inflight: Mutex::new(None),
            last_renewed: Mutex::new(None),
            exchanges: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of refresh exchanges actually sent to the backend.
    pub fn exchanges(&self) -> u64 { self.exchanges.load(Ordering::SeqCst) }

    pub fn is_in_flight(&self) -> bool { self.inflight.lock().is_some() }

    /// Obtain a new access credential, joining an exchange already in flight.
    pub async fn renew(&self) -> AppResult<String> {
        let fut = {
            let mut slot = self.inflight.lock();
            self.join_or_start(&mut slot)
        };
        self.wait(fut).await
    }

    /// Like `renew`, for a request that was rejected while carrying `stale`. When no exchange
    /// is running and the session holds a different credential that this renewal installed
    /// less than `REUSE_WINDOW` ago, that credential is returned without contacting the
    /// backend. Any other credential (restored from disk, set by a login) may be just as
    /// expired, so a fresh exchange is started instead.
    pub async fn renew_after(&self, stale: Option<&str>) -> AppResult<String> {
        let ticket = {
            let mut slot = self.inflight.lock();
            match (slot.is_some(), self.store.access_token()) {
                (false, Some(current)) if stale != Some(current.as_str()) && self.recently_renewed(&current) => {
                    Ticket::Reuse(current)
                }
                _ => Ticket::Wait(self.join_or_start(&mut slot)),
            }
        };
        match ticket {
            Ticket::Reuse(token) => Ok(token),
            Ticket::Wait(fut) => self.wait(fut).await,
        }
    }

    fn recently_renewed(&self, token: &str) -> bool {
        matches!(self.last_renewed.lock().as_ref(), Some((t, at)) if t == token && at.elapsed() < REUSE_WINDOW)
    }

    fn join_or_start(&self, slot: &mut Option<RenewalFuture>) -> RenewalFuture {
        if let Some(fut) = slot.as_ref() {
            return fut.clone();
        }
        let fut = exchange(self.client.clone(), self.refresh_url.clone(), self.store.clone(), self.exchanges.clone())
            .boxed()
            .shared();
        *slot = Some(fut.clone());
        fut
    }

    async fn wait(&self, fut: RenewalFuture) -> AppResult<String> {
        let out = fut.clone().await;
        let mut slot = self.inflight.lock();
        if slot.as_ref().is_some_and(|cur| cur.ptr_eq(&fut)) {
            *slot = None;
            if let Ok(token) = out.as_ref() {
                *self.last_renewed.lock() = Some((token.clone(), Instant::now()));
            }
        }
        out
    }
}

async fn exchange(
    client: reqwest::Client,
    url: Url,
    store: Arc<SessionStore>,
    exchanges: Arc<AtomicU64>,
) -> AppResult<String> {
    let Some(refresh) = store.refresh_token() else {
        warn!(target: "uniteam::renewal", "renewal requested without a refresh credential");
        expire(&store);
        return Err(AppError::no_refresh_token());
    };

    exchanges.fetch_add(1, Ordering::SeqCst);
    let access = match post_refresh(&client, url, &refresh).await {
        Ok(access) => access,
        Err(e) => {
            warn!(target: "uniteam::renewal", "refresh rejected: {}", e);
            return Err(match store.clear_session_if(&refresh) {
                Ok(false) => session_cleared(),
                cleared => {
                    if let Err(ce) = cleared {
                        warn!(target: "uniteam::renewal", "failed to clear session after renewal failure: {}", ce);
                    }
                    AppError::SessionExpired { code: "refresh_rejected".into(), message: e.to_string() }
                }
            });
        }
    };

    match store.replace_access_if(&refresh, &access) {
        Ok(true) => {}
        Ok(false) => {
            info!(target: "uniteam::renewal", "session ended during renewal, discarding credential");
            return Err(session_cleared());
        }
        Err(e) => {
            warn!(target: "uniteam::renewal", "could not store renewed credential: {}", e);
            expire(&store);
            return Err(AppError::SessionExpired { code: "session_store_failed".into(), message: e.to_string() });
        }
    }
    info!(target: "uniteam::renewal", "access credential renewed");
    Ok(access)
}

async fn post_refresh(client: &reqwest::Client, url: Url, refresh: &str) -> AppResult<String> {
    let resp = client
        .post(url)
        .json(&serde_json::json!({ "refresh": refresh }))
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(AppError::Transport { code: "refresh_failed".into(), message: text, status: Some(status.as_u16()) });
    }
    let body: RefreshResponse = resp.json().await?;
    if body.access.is_empty() {
        return Err(AppError::decode("empty_access", "refresh response carried an empty access credential"));
    }
    Ok(body.access)
}

fn session_cleared() -> AppError {
    AppError::session_expired("session_cleared", "session ended while the credential was being renewed")
}

fn expire(store: &SessionStore) {
    if let Err(e) = store.clear_session() {
        warn!(target: "uniteam::renewal", "failed to clear session after renewal failure: {}", e);
    }
}
