//! Push registration error types.

use crate::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    /// Platform cannot show notifications or receive pushes
    #[error("Push notifications are not supported on this platform")]
    Unsupported,

    /// User denied notifications; they are not prompted again
    #[error("Notification permission denied")]
    PermissionDenied,

    /// Prompt closed without a decision
    #[error("Notification permission prompt dismissed")]
    PermissionDismissed,

    /// No server public key configured
    #[error("Push server key is not configured")]
    MissingServerKey,

    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Backend association failed
    #[error("Device registration failed: {0}")]
    Auth(#[from] session_auth::AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] credential_store::StorageError),
}

pub type PushResult<T> = Result<T, PushError>;
