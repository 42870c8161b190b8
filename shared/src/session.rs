//! Session/identity context.
//!
//! Two states: `Anonymous` and `Authenticated`. The context is created once
//! per app and handed to every consumer; there is no ambient global.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::capabilities::TokenStore;
use crate::model::{User, UserId};

pub struct Session {
    user: User,
    token: SecretString,
}

impl Session {
    #[must_use]
    pub fn new(user: User, token: SecretString) -> Self {
        Self { user, token }
    }

    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub(crate) const fn token(&self) -> &SecretString {
        &self.token
    }

    fn same_token(&self, other: &SecretString) -> bool {
        self.token.expose_secret() == other.expose_secret()
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            token: SecretString::new(self.token.expose_secret().clone()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.id)
            .field("role", &self.user.role)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// False in every state but an authenticated admin. Never fails.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        match self {
            Self::Authenticated(session) => session.is_admin(),
            Self::Anonymous => false,
        }
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(session) => Some(&session.user),
            Self::Anonymous => None,
        }
    }
}

/// What the token store holds between runs.
#[derive(Serialize, Deserialize)]
struct PersistedSession {
    token: String,
    user: User,
}

pub struct SessionContext {
    state: watch::Sender<SessionState>,
    store: Arc<dyn TokenStore>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self { state, store }
    }

    /// Start-up: adopt a persisted session if one is stored. A malformed
    /// value is cleared and the context stays anonymous.
    pub async fn restore(&self) -> SessionState {
        let stored = match self.store.get().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no persisted session");
                return self.state();
            }
            Err(e) => {
                warn!(error = %e, "failed to read persisted session");
                return self.state();
            }
        };

        match serde_json::from_str::<PersistedSession>(stored.expose_secret()) {
            Ok(persisted) if !persisted.token.trim().is_empty() => {
                info!(user_id = %persisted.user.id, role = persisted.user.role.as_str(), "session restored");
                self.state.send_replace(SessionState::Authenticated(Session::new(
                    persisted.user,
                    SecretString::new(persisted.token),
                )));
            }
            Ok(_) | Err(_) => {
                warn!("discarding malformed persisted session");
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "failed to clear malformed session");
                }
            }
        }
        self.state()
    }

    /// Anonymous -> Authenticated. A failure to persist keeps the session
    /// for this run only.
    pub async fn sign_in(&self, session: Session) {
        let persisted = PersistedSession {
            token: session.token.expose_secret().clone(),
            user: session.user.clone(),
        };
        match serde_json::to_string(&persisted) {
            Ok(json) => {
                if let Err(e) = self.store.set(SecretString::new(json)).await {
                    warn!(error = %e, "failed to persist session");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode session"),
        }

        info!(user_id = %session.user.id, role = session.user.role.as_str(), "signed in");
        self.state.send_replace(SessionState::Authenticated(session));
    }

    pub async fn logout(&self) {
        let previous = self.state.send_replace(SessionState::Anonymous);
        if let SessionState::Authenticated(session) = previous {
            info!(user_id = %session.user.id, "signed out");
        }
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear persisted session");
        }
    }

    /// Teardown after the backend rejected our credentials.
    pub async fn auth_failure_observed(&self) {
        warn!("authentication rejected by server, ending session");
        self.logout().await;
    }

    /// Teardown only if the rejected request carried the current token, so a
    /// late 401 from an old session cannot end a newer one.
    pub(crate) async fn auth_failure_for(&self, token_used: Option<&SecretString>) {
        let Some(token_used) = token_used else {
            return;
        };
        let current = matches!(
            &*self.state.borrow(),
            SessionState::Authenticated(session) if session.same_token(token_used)
        );
        if current {
            self.auth_failure_observed().await;
        } else {
            debug!("ignoring auth failure for a token that is no longer current");
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn current_user_id(&self) -> Option<UserId> {
        self.state.borrow().user().map(|u| u.id.clone())
    }

    pub(crate) fn bearer_token(&self) -> Option<SecretString> {
        match &*self.state.borrow() {
            SessionState::Authenticated(session) => {
                Some(SecretString::new(session.token().expose_secret().clone()))
            }
            SessionState::Anonymous => None,
        }
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
