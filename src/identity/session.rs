use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::storage::{KeyValueBackend, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER};
use crate::tprintln;

use super::profile::{Role, UserProfile};

/// Client-side session. `user` is present only while `access_token` is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool { self.user.is_some() }

    pub fn role(&self) -> Option<&Role> { self.user.as_ref().map(|u| &u.role) }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Partial session write. Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl SessionUpdate {
    pub fn access<S: Into<String>>(mut self, token: S) -> Self { self.access_token = Some(token.into()); self }
    pub fn refresh<S: Into<String>>(mut self, token: S) -> Self { self.refresh_token = Some(token.into()); self }
    pub fn user(mut self, user: UserProfile) -> Self { self.user = Some(user); self }
}

/// Sole owner of the session. Every mutation goes through `set_session` or `clear_session`
/// and is persisted field by field to the backend.
pub struct SessionStore {
    state: RwLock<Session>,
    backend: Arc<dyn KeyValueBackend>,
}

impl SessionStore {
    /// Empty session over `backend`; nothing is read from it.
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { state: RwLock::new(Session::default()), backend }
    }

    /// Rebuild the session from what an earlier run persisted. A stored user without a
    /// stored access token is discarded, as is a user record that no longer decodes. An
    /// unreadable store yields the empty session and its session keys are cleared.
    pub fn restore(backend: Arc<dyn KeyValueBackend>) -> AppResult<Self> {
        let session = match read_persisted(backend.as_ref()) {
            Ok(session) => session,
            Err(e) if e.code_str() == "corrupt_store" => {
                warn!(target: "uniteam::session", "stored session unreadable, starting anonymous: {}", e);
                for key in SESSION_KEYS {
                    backend.clear(key)?;
                }
                Session::default()
            }
            Err(e) => return Err(e),
        };
        debug!(
            target: "uniteam::session",
            "restored session access={} refresh={} user={}",
            session.access_token.is_some(), session.refresh_token.is_some(), session.user.is_some()
        );
        Ok(Self { state: RwLock::new(session), backend })
    }

    pub fn get_session(&self) -> Session { self.state.read().clone() }

    pub fn access_token(&self) -> Option<String> { self.state.read().access_token.clone() }

    pub fn refresh_token(&self) -> Option<String> { self.state.read().refresh_token.clone() }

    pub fn user(&self) -> Option<UserProfile> { self.state.read().user.clone() }

    pub fn backend(&self) -> &Arc<dyn KeyValueBackend> { &self.backend }

    /// Merge `update` into the session and persist the fields it carries. Memory is only
    /// updated once every field is persisted; if a write fails, fields already written are
    /// put back to their previous values and the session is left as it was.
    pub fn set_session(&self, update: SessionUpdate) -> AppResult<()> {
        let mut state = self.state.write();
        let mut next = state.clone();
        if let Some(t) = update.access_token.as_ref() { next.access_token = Some(t.clone()); }
        if let Some(t) = update.refresh_token.as_ref() { next.refresh_token = Some(t.clone()); }
        if let Some(u) = update.user.as_ref() { next.user = Some(u.clone()); }
        if next.user.is_some() && next.access_token.is_none() {
            return Err(AppError::unauthenticated("user_without_credential", "a user profile requires an access credential"));
        }

        let mut writes: Vec<(&'static str, String)> = Vec::with_capacity(3);
        if let Some(t) = update.access_token.as_ref() { writes.push((KEY_ACCESS_TOKEN, t.clone())); }
        if let Some(t) = update.refresh_token.as_ref() { writes.push((KEY_REFRESH_TOKEN, t.clone())); }
        if let Some(u) = update.user.as_ref() { writes.push((KEY_USER, serde_json::to_string(u)?)); }

        for (i, (key, value)) in writes.iter().enumerate() {
            if let Err(e) = self.backend.save(key, value) {
                warn!(target: "uniteam::session", "failed to persist '{}', rolling back: {}", key, e);
                self.roll_back(&state, writes[..i].iter().map(|(k, _)| *k));
                return Err(e);
            }
        }
        *state = next;
        tprintln!(
            "session.set access={} refresh={} user={}",
            update.access_token.is_some(), update.refresh_token.is_some(), update.user.is_some()
        );
        Ok(())
    }

    /// Install a renewed access credential, but only while the session still holds the
    /// refresh credential it was obtained with. Returns false, and writes nothing, when the
    /// session was cleared or replaced in the meantime.
    pub fn replace_access_if(&self, expected_refresh: &str, access: &str) -> AppResult<bool> {
        let mut state = self.state.write();
        if state.refresh_token.as_deref() != Some(expected_refresh) {
            debug!(target: "uniteam::session", "renewed credential discarded, session changed");
            return Ok(false);
        }
        self.backend.save(KEY_ACCESS_TOKEN, access)?;
        state.access_token = Some(access.to_string());
        Ok(true)
    }

    /// Reset to the empty session. The in-memory state is cleared even when the backend
    /// fails; the first backend error is returned.
    pub fn clear_session(&self) -> AppResult<()> {
        let mut state = self.state.write();
        self.clear_locked(&mut state)
    }

    /// `clear_session`, but only while the session still holds `expected_refresh`.
    /// Returns false when the session was already cleared or replaced.
    pub fn clear_session_if(&self, expected_refresh: &str) -> AppResult<bool> {
        let mut state = self.state.write();
        if state.refresh_token.as_deref() != Some(expected_refresh) {
            return Ok(false);
        }
        self.clear_locked(&mut state).map(|_| true)
    }

    fn clear_locked(&self, state: &mut Session) -> AppResult<()> {
        *state = Session::default();
        let mut first_err = None;
        for key in SESSION_KEYS {
            if let Err(e) = self.backend.clear(key) {
                warn!(target: "uniteam::session", "failed to clear '{}': {}", key, e);
                first_err.get_or_insert(e);
            }
        }
        debug!(target: "uniteam::session", "session cleared");
        match first_err { Some(e) => Err(e), None => Ok(()) }
    }

    /// Restore persisted `keys` to the values held by `prev`. Best effort.
    fn roll_back<'k>(&self, prev: &Session, keys: impl Iterator<Item = &'k str>) {
        for key in keys {
            let old = match key {
                KEY_ACCESS_TOKEN => prev.access_token.clone(),
                KEY_REFRESH_TOKEN => prev.refresh_token.clone(),
                _ => prev.user.as_ref().and_then(|u| serde_json::to_string(u).ok()),
            };
            let res = match old {
                Some(v) => self.backend.save(key, &v),
                None => self.backend.clear(key),
            };
            if let Err(e) = res {
                warn!(target: "uniteam::session", "rollback of '{}' failed: {}", key, e);
            }
        }
    }
}

const SESSION_KEYS: [&str; 3] = [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER];

fn read_persisted(backend: &dyn KeyValueBackend) -> AppResult<Session> {
    let access_token = backend.load(KEY_ACCESS_TOKEN)?;
    let refresh_token = backend.load(KEY_REFRESH_TOKEN)?;
    let user = match (access_token.as_ref(), backend.load(KEY_USER)?) {
        (Some(_), Some(raw)) => match serde_json::from_str::<UserProfile>(&raw) {
            Ok(u) => Some(u),
            Err(e) => {
                warn!(target: "uniteam::session", "discarding stored user record: {}", e);
                backend.clear(KEY_USER)?;
                None
            }
        },
        (None, Some(_)) => {
            backend.clear(KEY_USER)?;
            None
        }
        (_, None) => None,
    };
    Ok(Session { access_token, refresh_token, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileBackend, MemoryBackend};
    use parking_lot::Mutex;

    /// Memory backend whose saves fail for one chosen key.
    #[derive(Default)]
    struct FailingBackend {
        inner: MemoryBackend,
        fail_on: Mutex<Option<&'static str>>,
    }

    impl KeyValueBackend for FailingBackend {
        fn load(&self, key: &str) -> AppResult<Option<String>> { self.inner.load(key) }

        fn save(&self, key: &str, value: &str) -> AppResult<()> {
            if *self.fail_on.lock() == Some(key) {
                return Err(AppError::storage("disk_full", "no space left on device"));
            }
            self.inner.save(key, value)
        }

        fn clear(&self, key: &str) -> AppResult<()> { self.inner.clear(key) }
    }

    fn student() -> UserProfile { UserProfile::new(1, "sara", Role::Student) }

    #[test]
    fn set_session_merges_and_persists_each_field() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SessionStore::new(backend.clone());
        store.set_session(SessionUpdate::default().access("t1").refresh("r1").user(student())).unwrap();
        store.set_session(SessionUpdate::default().access("t2")).unwrap();

        let s = store.get_session();
        assert_eq!(s.access_token.as_deref(), Some("t2"));
        assert_eq!(s.refresh_token.as_deref(), Some("r1"));
        assert_eq!(s.role(), Some(&Role::Student));

        let snap = backend.snapshot();
        assert_eq!(snap.get(KEY_ACCESS_TOKEN).map(String::as_str), Some("t2"));
        assert_eq!(snap.get(KEY_REFRESH_TOKEN).map(String::as_str), Some("r1"));
        assert!(snap.get(KEY_USER).unwrap().contains("\"STUDENT\""));
    }

    #[test]
    fn user_without_access_token_is_rejected() {
        let store = SessionStore::new(Arc::new(MemoryBackend::new()));
        let err = store.set_session(SessionUpdate::default().user(student())).unwrap_err();
        assert_eq!(err.code_str(), "user_without_credential");
        assert!(store.get_session().is_empty());
    }

    #[test]
    fn clear_session_empties_memory_and_backend() {
        let backend = Arc::new(MemoryBackend::with_entries([("theme", "dark")]));
        let store = SessionStore::new(backend.clone());
        store.set_session(SessionUpdate::default().access("t1").refresh("r1").user(student())).unwrap();
        store.clear_session().unwrap();
        assert!(store.get_session().is_empty());
        let snap = backend.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn restore_reads_tokens_and_user() {
        let user_json = serde_json::to_string(&student()).unwrap();
        let backend = Arc::new(MemoryBackend::with_entries([
            (KEY_ACCESS_TOKEN, "t1".to_string()),
            (KEY_REFRESH_TOKEN, "r1".to_string()),
            (KEY_USER, user_json),
        ]));
        let store = SessionStore::restore(backend).unwrap();
        let s = store.get_session();
        assert_eq!(s.access_token.as_deref(), Some("t1"));
        assert!(s.is_authenticated());
    }

    #[test]
    fn restore_drops_user_without_access_token() {
        let user_json = serde_json::to_string(&student()).unwrap();
        let backend = Arc::new(MemoryBackend::with_entries([
            (KEY_REFRESH_TOKEN, "r1".to_string()),
            (KEY_USER, user_json),
        ]));
        let store = SessionStore::restore(backend.clone()).unwrap();
        assert!(!store.get_session().is_authenticated());
        assert!(backend.snapshot().get(KEY_USER).is_none());
    }

    #[test]
    fn restore_drops_undecodable_user() {
        let backend = Arc::new(MemoryBackend::with_entries([
            (KEY_ACCESS_TOKEN, "t1"),
            (KEY_USER, "{broken"),
        ]));
        let store = SessionStore::restore(backend).unwrap();
        let s = store.get_session();
        assert_eq!(s.access_token.as_deref(), Some("t1"));
        assert!(s.user.is_none());
    }

    #[test]
    fn failed_write_rolls_back_earlier_fields() {
        let backend = Arc::new(FailingBackend::default());
        let store = SessionStore::new(backend.clone());
        store.set_session(SessionUpdate::default().access("t1").refresh("r1").user(student())).unwrap();

        *backend.fail_on.lock() = Some(KEY_USER);
        let other = UserProfile::new(2, "leo", Role::Lecturer);
        let err = store.set_session(SessionUpdate::default().access("t2").refresh("r2").user(other)).unwrap_err();
        assert_eq!(err.code_str(), "disk_full");

        let s = store.get_session();
        assert_eq!(s.access_token.as_deref(), Some("t1"));
        assert_eq!(s.role(), Some(&Role::Student));
        let snap = backend.inner.snapshot();
        assert_eq!(snap.get(KEY_ACCESS_TOKEN).map(String::as_str), Some("t1"));
        assert_eq!(snap.get(KEY_REFRESH_TOKEN).map(String::as_str), Some("r1"));
        assert!(snap.get(KEY_USER).unwrap().contains("sara"));
    }

    #[test]
    fn failed_first_login_leaves_nothing_behind() {
        let backend = Arc::new(FailingBackend::default());
        *backend.fail_on.lock() = Some(KEY_REFRESH_TOKEN);
        let store = SessionStore::new(backend.clone());
        store.set_session(SessionUpdate::default().access("t1").refresh("r1").user(student())).unwrap_err();
        assert!(store.get_session().is_empty());
        assert!(backend.inner.snapshot().is_empty());
    }

    #[test]
    fn renewed_access_only_lands_on_the_session_it_belongs_to() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SessionStore::new(backend.clone());
        store.set_session(SessionUpdate::default().access("t1").refresh("r1").user(student())).unwrap();

        assert!(store.replace_access_if("r1", "t2").unwrap());
        assert_eq!(store.access_token().as_deref(), Some("t2"));
        assert!(store.get_session().is_authenticated());

        // a newer login replaced the refresh credential
        store.set_session(SessionUpdate::default().access("t9").refresh("r9")).unwrap();
        assert!(!store.replace_access_if("r1", "t3").unwrap());
        assert_eq!(store.access_token().as_deref(), Some("t9"));

        assert!(!store.clear_session_if("r1").unwrap());
        assert_eq!(store.access_token().as_deref(), Some("t9"));
        assert!(store.clear_session_if("r9").unwrap());
        assert!(!store.replace_access_if("r9", "t4").unwrap());
        assert!(store.get_session().is_empty());
        assert!(backend.snapshot().is_empty());
    }

    #[test]
    fn restore_from_corrupt_file_starts_anonymous() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.json");
        std::fs::write(&path, "{\"access_token\": \"t1\", \"refr").unwrap();

        let backend: Arc<dyn KeyValueBackend> = Arc::new(FileBackend::new(&path));
        let store = SessionStore::restore(backend.clone()).unwrap();
        assert!(store.get_session().is_empty());
        // the file is readable again and accepts a new login
        assert_eq!(backend.load(KEY_ACCESS_TOKEN).unwrap(), None);
        store.set_session(SessionUpdate::default().access("t1").refresh("r1").user(student())).unwrap();
        let again = SessionStore::restore(backend).unwrap();
        assert_eq!(again.get_session().role(), Some(&Role::Student));
    }
}
