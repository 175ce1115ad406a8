#![allow(dead_code)]

// In-process fake of the UniTeam REST backend, bound to an ephemeral localhost port.
// Only the endpoints the client core touches are implemented.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use uniteam::api::{ApiGateway, AuthService, ResourceClient};
use uniteam::config::ClientConfig;
use uniteam::identity::{RecordingNavigator, Role, SessionStore, SessionUpdate, UserProfile};
use uniteam::storage::{KeyValueBackend, MemoryBackend};

pub const PASSWORD: &str = "secret";
pub const REFRESH: &str = "r1";

/// A write call as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub auth: Option<String>,
    pub body: Option<Value>,
}

pub struct FakeBackend {
    /// The only access credential the protected endpoints accept.
    pub valid_access: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub refresh_ok: AtomicBool,
    pub refresh_delay: Mutex<Duration>,
    /// Reject every protected call, whatever credential it carries.
    pub reject_all: AtomicBool,
    /// Authorization header of every call to `/api/projects/`.
    pub seen_auth: Mutex<Vec<Option<String>>>,
    /// Every call to the write endpoints, in arrival order.
    pub writes: Mutex<Vec<RecordedCall>>,
    pub invitations: Mutex<Value>,
    pub users: Mutex<Value>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            valid_access: Mutex::new("t1".to_string()),
            refresh_calls: AtomicUsize::new(0),
            refresh_ok: AtomicBool::new(true),
            refresh_delay: Mutex::new(Duration::from_millis(0)),
            reject_all: AtomicBool::new(false),
            seen_auth: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            invitations: Mutex::new(json!([
                {"id": 1, "project": 7, "status": "PENDING"},
                {"id": 2, "project": 8, "status": "ACCEPTED"},
                {"id": 3, "project": 9, "status": "PENDING"}
            ])),
            users: Mutex::new(json!([
                {"id": 1, "username": "alice", "role": "STUDENT", "is_approved": true},
                {"id": 2, "username": "bob", "role": "LECTURER", "is_approved": true},
                {"id": 3, "username": "carol", "role": "LECTURER", "is_approved": false},
                {"id": 4, "username": "root", "role": "ADMIN", "is_approved": true}
            ])),
        }
    }
}

impl FakeBackend {
    pub fn refresh_calls(&self) -> usize { self.refresh_calls.load(Ordering::SeqCst) }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            return false;
        }
        let want = format!("Bearer {}", self.valid_access.lock());
        headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(want.as_str())
    }
}

fn user_json(username: &str) -> Value {
    let (id, role) = match username {
        "bob" => (2, "LECTURER"),
        "root" => (4, "ADMIN"),
        _ => (1, "STUDENT"),
    };
    json!({"id": id, "username": username, "full_name": format!("{} tester", username), "role": role, "is_approved": true})
}

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Given token not valid for any token type"}))).into_response()
}

async fn login(State(st): State<Arc<FakeBackend>>, Json(body): Json<Value>) -> Response {
    let username = body.get("username").and_then(|v| v.as_str()).unwrap_or_default();
    if body.get("password").and_then(|v| v.as_str()) != Some(PASSWORD) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid credentials or account not approved"}))).into_response();
    }
    let access = st.valid_access.lock().clone();
    Json(json!({"access": access, "refresh": REFRESH, "user": user_json(username)})).into_response()
}

async fn refresh(State(st): State<Arc<FakeBackend>>, Json(body): Json<Value>) -> Response {
    let n = st.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let delay = *st.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if !st.refresh_ok.load(Ordering::SeqCst) || body.get("refresh").and_then(|v| v.as_str()) != Some(REFRESH) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token is invalid or expired"}))).into_response();
    }
    let access = format!("t{}", n + 1);
    *st.valid_access.lock() = access.clone();
    Json(json!({"access": access})).into_response()
}

// Students are active at once and get a session; lecturers wait for approval.
async fn register(Json(body): Json<Value>) -> Response {
    let username = body.get("username").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let role = body.get("role").and_then(|v| v.as_str()).unwrap_or("STUDENT").to_string();
    let user = json!({"id": 42, "username": username, "role": role, "is_approved": role != "LECTURER"});
    if role == "LECTURER" {
        return (StatusCode::CREATED, Json(json!({"message": "Registration successful. Awaiting admin approval.", "user": user})))
            .into_response();
    }
    (StatusCode::CREATED, Json(json!({"access": "t-new", "refresh": "r-new", "user": user}))).into_response()
}

/// Write endpoints: record the call, answer DELETE with 204 and everything else with an echo.
async fn write(State(st): State<Arc<FakeBackend>>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let call = RecordedCall {
        method: method.to_string(),
        path: uri.path().to_string(),
        auth: auth_header(&headers),
        body: serde_json::from_slice(&body).ok(),
    };
    st.writes.lock().push(call.clone());
    if !st.authorized(&headers) {
        return unauthorized();
    }
    if method == Method::DELETE {
        return StatusCode::NO_CONTENT.into_response();
    }
    let status = if method == Method::POST && uri.path() == "/api/projects/" { StatusCode::CREATED } else { StatusCode::OK };
    (status, Json(json!({"id": 99, "path": call.path, "received": call.body}))).into_response()
}

async fn me(State(st): State<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    if !st.authorized(&headers) {
        return unauthorized();
    }
    Json(user_json("alice")).into_response()
}

async fn projects(State(st): State<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    st.seen_auth.lock().push(auth_header(&headers));
    if !st.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "count": 2,
        "next": null,
        "results": [{"id": 7, "title": "Robotics"}, {"id": 8, "title": "Compilers"}]
    }))
    .into_response()
}

async fn invitations(State(st): State<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    if !st.authorized(&headers) {
        return unauthorized();
    }
    Json(st.invitations.lock().clone()).into_response()
}

async fn users(State(st): State<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    if !st.authorized(&headers) {
        return unauthorized();
    }
    Json(st.users.lock().clone()).into_response()
}

async fn milestones(State(st): State<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    if !st.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "milestone index unavailable"}))).into_response()
}

async fn templates(State(st): State<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    if !st.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::FORBIDDEN, Json(json!({"detail": "You do not have permission to perform this action."}))).into_response()
}

fn router(state: Arc<FakeBackend>) -> Router {
    Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register/", post(register))
        .route("/api/auth/token/refresh/", post(refresh))
        .route("/api/auth/me/", get(me))
        .route("/api/auth/users/", get(users))
        .route("/api/auth/users/{id}/{action}/", post(write))
        .route("/api/projects/", get(projects).post(write))
        .route("/api/projects/{id}/", any(write))
        .route("/api/invitations/{id}/{action}/", post(write))
        .route("/api/team-memberships/{id}/{action}/", post(write))
        .route("/api/invitations/", get(invitations))
        .route("/api/milestones/", get(milestones))
        .route("/api/project-templates/", get(templates))
        .with_state(state)
}

/// Start the fake backend. The listener is bound before this returns, so the server is
/// reachable immediately. Abort the handle to stop it.
pub async fn start_fake_backend(state: Arc<FakeBackend>) -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    let app = router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("fake backend error: {e:?}");
        }
    });
    (format!("http://{}", addr), handle)
}

/// A gateway wired to a fresh fake backend over an in-memory store.
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub storage: Arc<MemoryBackend>,
    pub store: Arc<SessionStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub gateway: Arc<ApiGateway>,
    server: JoinHandle<()>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_backend(FakeBackend::default()).await
    }

    pub async fn with_backend(fake: FakeBackend) -> Self {
        let backend = Arc::new(fake);
        let (base, server) = start_fake_backend(backend.clone()).await;
        let storage = Arc::new(MemoryBackend::new());
        let kv: Arc<dyn KeyValueBackend> = storage.clone();
        let store = Arc::new(SessionStore::new(kv));
        let navigator = Arc::new(RecordingNavigator::new());
        let config = ClientConfig::new(&base).expect("config").with_timeout(Duration::from_secs(10));
        let gateway = Arc::new(ApiGateway::new(config, store.clone(), navigator.clone()).expect("gateway"));
        Self { backend, storage, store, navigator, gateway, server }
    }

    /// Pretend an earlier login happened with `access` (and `refresh` if given).
    pub fn seed_session(&self, access: &str, refresh: Option<&str>) {
        let mut update = SessionUpdate::default().access(access).user(UserProfile::new(1, "alice", Role::Student));
        if let Some(r) = refresh {
            update = update.refresh(r);
        }
        self.store.set_session(update).expect("seed session");
    }

    pub fn auth(&self) -> AuthService { AuthService::new(self.gateway.clone()) }

    pub fn resources(&self) -> ResourceClient { ResourceClient::new(self.gateway.clone()) }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.server.abort();
    }
}
