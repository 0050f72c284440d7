use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::errors::ClientError;

/// Credentials for an authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Credentials {
    /// Bearer token sent with every request.
    pub token: String,
    /// Display name or email of the signed-in user.
    pub user: Option<String>,
}

/// Shared authentication state for one running application.
///
/// Create one at startup and hand clones to every client. The session becomes
/// inactive on logout or when the backend rejects the token.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<Credentials>>>,
}

impl SessionContext {
    /// Creates an inactive session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session that is already signed in.
    pub fn signed_in(token: impl Into<String>, user: Option<String>) -> Self {
        let session = Self::new();
        session.sign_in(token, user);
        session
    }

    /// Stores new credentials, replacing any previous ones.
    pub fn sign_in(&self, token: impl Into<String>, user: Option<String>) {
        let credentials = Credentials {
            token: token.into(),
            user,
        };
        info!(user = credentials.user.as_deref().unwrap_or("<unknown>"), "session started");
        *self.write() = Some(credentials);
    }

    /// Drops the stored credentials.
    pub fn invalidate(&self) {
        if self.write().take().is_some() {
            info!("session invalidated");
        }
    }

    /// Returns true while credentials are stored.
    pub fn is_active(&self) -> bool {
        self.read().is_some()
    }

    /// Returns the signed-in user, if known.
    pub fn current_user(&self) -> Option<String> {
        self.read().as_ref().and_then(|c| c.user.clone())
    }

    /// Returns the bearer token or `ClientError::Unauthenticated`.
    pub fn bearer_token(&self) -> Result<String, ClientError> {
        self.read()
            .as_ref()
            .map(|c| c.token.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or(ClientError::Unauthenticated)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Credentials>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Credentials>> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
