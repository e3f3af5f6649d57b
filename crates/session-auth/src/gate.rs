//! Read-only session view for other components.

use crate::AuthState;
use tokio::sync::watch;

/// What push registration and the unread poller need to know about the
/// session, without being able to change it.
pub trait SessionGate: Send + Sync {
    fn state(&self) -> AuthState;

    /// Current access token while a session is held.
    fn authenticated_token(&self) -> Option<String>;

    /// Receiver that observes every state change.
    fn subscribe(&self) -> watch::Receiver<AuthState>;
}
