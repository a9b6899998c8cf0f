//! Session manager for handling conversation state.

use crate::storage::BackendKind;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Conversation state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Waiting for the user to pick a storage service.
    AwaitingBackendChoice,
    /// Backend chosen; every document or video is uploaded.
    AwaitingFile,
    /// Conversation ended; the session is about to be removed.
    Terminated,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingBackendChoice => "awaiting_backend_choice",
            Self::AwaitingFile => "awaiting_file",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A conversation session.
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    state: State,
    backend: Option<BackendKind>,
}

impl Session {
    /// Create a fresh session waiting for a backend choice.
    fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: State::AwaitingBackendChoice,
            backend: None,
        }
    }

    /// Get the session key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Backend selected for uploads, if any.
    #[must_use]
    pub const fn backend(&self) -> Option<BackendKind> {
        self.backend
    }

    /// Record the chosen backend and start accepting files.
    pub fn select_backend(&mut self, kind: BackendKind) {
        self.backend = Some(kind);
        self.transition(State::AwaitingFile);
    }

    /// Mark the conversation as finished.
    pub fn terminate(&mut self) {
        self.transition(State::Terminated);
    }

    fn transition(&mut self, next: State) {
        debug!(key = %self.key, from = %self.state, to = %next, "session transition");
        self.state = next;
    }
}

/// Shared, lockable handle to one session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Owns every live session, keyed by chat.
///
/// Each session sits behind its own mutex so events for different chats run
/// concurrently while events for the same chat are serialized.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create an empty session manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the session for a key.
    pub async fn get(&self, key: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Start a fresh session, replacing any existing one for the key.
    pub async fn create(&self, key: &str) -> SessionHandle {
        let handle = Arc::new(Mutex::new(Session::new(key)));
        self.sessions
            .write()
            .await
            .insert(key.to_string(), Arc::clone(&handle));
        debug!(key = %key, "created new session");
        handle
    }

    /// Remove a session. Returns whether one existed.
    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.sessions.write().await.remove(key).is_some();
        if removed {
            info!(key = %key, "session deleted");
        }
        removed
    }

    /// Snapshot of a session's state, if the session exists.
    pub async fn state_of(&self, key: &str) -> Option<State> {
        let handle = self.get(key).await?;
        let session = handle.lock().await;
        Some(session.state())
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
