//! Session token storage shared by every request of a client.

use tokio::sync::{Mutex, MutexGuard, RwLock};

/// The token currently attached to outgoing requests.
///
/// Requests read a [`SessionSnapshot`] when they are built. Only the login
/// exchange writes the token, and it does so while holding the login guard,
/// so at most one login runs per client at a time.
#[derive(Debug, Default)]
pub struct Session {
    state: RwLock<SessionState>,
    login_guard: Mutex<()>,
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    generation: u64,
}

/// The session as seen by one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// The token sent with the request, if any.
    pub token: Option<String>,
    /// Number of tokens installed so far when the snapshot was taken.
    pub generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            token: state.token.clone(),
            generation: state.generation,
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    /// Returns the current token if one was installed after `generation`.
    pub async fn token_newer_than(&self, generation: u64) -> Option<String> {
        let state = self.state.read().await;
        if state.generation > generation {
            state.token.clone()
        } else {
            None
        }
    }

    pub async fn clear(&self) {
        self.state.write().await.token = None;
    }

    /// Installs a freshly issued token, replacing any previous one.
    pub async fn install(&self, token: String) -> u64 {
        let mut state = self.state.write().await;
        state.token = Some(token);
        state.generation += 1;
        state.generation
    }

    /// Waits for any running login to finish and blocks new ones while held.
    pub async fn lock_login(&self) -> MutexGuard<'_, ()> {
        self.login_guard.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_replaces_token() {
        let session = Session::new();
        assert_eq!(session.token().await, None);

        assert_eq!(session.install("tok1".to_string()).await, 1);
        assert_eq!(session.install("tok2".to_string()).await, 2);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.token.as_deref(), Some("tok2"));
        assert_eq!(snapshot.generation, 2);
    }

    #[tokio::test]
    async fn test_clear_keeps_generation() {
        let session = Session::new();
        session.install("tok1".to_string()).await;
        session.clear().await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.token, None);
        assert_eq!(snapshot.generation, 1);
    }

    #[tokio::test]
    async fn test_token_newer_than() {
        let session = Session::new();
        assert_eq!(session.token_newer_than(0).await, None);

        session.install("tok1".to_string()).await;
        assert_eq!(session.token_newer_than(0).await.as_deref(), Some("tok1"));
        assert_eq!(session.token_newer_than(1).await, None);

        // A login that cleared the token and then failed leaves nothing to reuse.
        session.clear().await;
        assert_eq!(session.token_newer_than(0).await, None);
    }
}
