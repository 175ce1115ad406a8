use parking_lot::RwLock;
use tracing::info;

/// Receiver of forced navigations (the logout redirect after an unrecoverable session failure).
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Keeps every navigation it was asked to perform, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: RwLock<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self { Self::default() }

    pub fn history(&self) -> Vec<String> { self.history.read().clone() }

    pub fn last(&self) -> Option<String> { self.history.read().last().cloned() }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        info!(target: "uniteam::nav", "navigate -> {}", path);
        self.history.write().push(path.to_string());
    }
}
