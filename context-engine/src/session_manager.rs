//! `SessionManager`: owns session lifecycle and the current-session pointer.

use crate::types::{EngineError, Session, SessionError, SessionId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Callback invoked synchronously whenever the current session changes.
/// Grounded on the teacher's synchronous-listener contract: listeners must
/// not block, and a panicking listener must not corrupt session state —
/// enforced here with `catch_unwind`.
pub type SessionListener = Box<dyn Fn(&Session) + Send + Sync>;

pub struct SessionManager {
    storage_root: PathBuf,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    current: RwLock<Option<SessionId>>,
    listeners: RwLock<Vec<SessionListener>>,
}

impl SessionManager {
    pub fn new(storage_root: PathBuf) -> Self {
        Self {
            storage_root,
            sessions: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub async fn on_session_changed(&self, listener: SessionListener) {
        self.listeners.write().await.push(listener);
    }

    /// Creates a session, clamping `window_tokens` happens in the caller
    /// (the `SizingController`, per §4.5 — the manager itself only stores
    /// whatever window it is given) and emits the change to listeners.
    pub async fn new_session(&self, model_id: impl Into<String>, window_tokens: usize) -> Result<Arc<Session>, EngineError> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(EngineError::Session(SessionError::ModelUnavailable(
                "empty model id".into(),
            )));
        }

        let session = Arc::new(Session::new(model_id, window_tokens, &self.storage_root));
        tokio::fs::create_dir_all(session.snapshots_dir())
            .await
            .map_err(|e| EngineError::Session(SessionError::StorageUnavailable(e.to_string())))?;

        self.sessions.write().await.insert(session.session_id, session.clone());
        *self.current.write().await = Some(session.session_id);

        info!(session_id = %session.session_id, model_id = %session.model_id, window_tokens, "session created");
        self.notify_listeners(&session).await;
        Ok(session)
    }

    pub async fn get(&self, session_id: SessionId) -> Result<Arc<Session>, EngineError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| EngineError::Session(SessionError::NotFound(session_id.to_string())))
    }

    pub async fn current(&self) -> Result<Arc<Session>, EngineError> {
        let current_id = self
            .current
            .read()
            .await
            .ok_or_else(|| EngineError::Session(SessionError::NotFound("no current session".into())))?;
        self.sessions
            .read()
            .await
            .get(&current_id)
            .cloned()
            .ok_or_else(|| EngineError::Session(SessionError::NotFound(current_id.to_string())))
    }

    /// Ends the current session and starts a new one on `new_model_id`. The
    /// only correct pathway to apply a user-selected window size across a
    /// model swap, per §4.1.
    pub async fn switch_model(
        &self,
        new_model_id: impl Into<String>,
        pending_window: usize,
    ) -> Result<Arc<Session>, EngineError> {
        if let Some(current_id) = *self.current.read().await {
            self.end(current_id).await;
        }
        self.new_session(new_model_id, pending_window).await
    }

    /// Flushes and releases a session; idempotent — ending an unknown or
    /// already-ended session id is not an error.
    pub async fn end(&self, session_id: SessionId) {
        let removed = self.sessions.write().await.remove(&session_id);
        let mut current = self.current.write().await;
        if *current == Some(session_id) {
            *current = None;
        }
        if removed.is_some() {
            info!(session_id = %session_id, "session ended");
        }
    }

    async fn notify_listeners(&self, session: &Session) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(session))).is_err() {
                warn!(session_id = %session.session_id, "session listener panicked; ignoring");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[tokio::test]
    async fn new_session_becomes_current_and_notifies_listeners() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManager::new(dir.path().to_path_buf());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        manager
            .on_session_changed(Box::new(move |_session| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .await;

        let session = manager.new_session("model-a", 4096).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current().await.unwrap().session_id, session.session_id);
    }

    #[tokio::test]
    async fn switch_model_ends_old_session_and_starts_isolated_new_one() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManager::new(dir.path().to_path_buf());

        let a = manager.new_session("model-a", 4096).await.unwrap();
        let b = manager.switch_model("model-b", 16384).await.unwrap();

        assert_ne!(a.session_id, b.session_id);
        assert_eq!(b.window_tokens, 16384);
        assert!(manager.current().await.unwrap().session_id == b.session_id);
        assert_ne!(a.root_dir, b.root_dir);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_corrupt_session_state() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManager::new(dir.path().to_path_buf());
        manager
            .on_session_changed(Box::new(|_session| panic!("boom")))
            .await;

        let session = manager.new_session("model-a", 4096).await.unwrap();
        assert_eq!(manager.current().await.unwrap().session_id, session.session_id);
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManager::new(dir.path().to_path_buf());
        let unknown = SessionId::new();
        manager.end(unknown).await;
        manager.end(unknown).await;
    }
}
