//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Account exists but the email address has not been confirmed yet
    #[error("Email verification required for {email}")]
    VerificationRequired { email: String },

    /// The backend rejected the access token (HTTP 401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Session was invalidated server-side and could not be refreshed
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// No credential record
    #[error("Not logged in")]
    NotLoggedIn,

    /// Device reports no connectivity
    #[error("Device is offline")]
    Offline,

    /// Transport failure (DNS, connect, reset)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Non-success response other than the ones above
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid state transition in the session FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] credential_store::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// Returns true for failures that say nothing about the credential:
    /// offline, transport errors and timeouts. These never end a session.
    pub fn is_network(&self) -> bool {
        match self {
            AuthError::Offline | AuthError::NetworkUnavailable | AuthError::Timeout => true,
            AuthError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Returns true if the backend rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            AuthError::Unauthorized => true,
            AuthError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 401),
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors() {
        assert!(AuthError::Offline.is_network());
        assert!(AuthError::NetworkUnavailable.is_network());
        assert!(AuthError::Timeout.is_network());
    }

    #[test]
    fn test_rejections_are_not_network() {
        assert!(!AuthError::Unauthorized.is_network());
        assert!(!AuthError::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_network());
        assert!(!AuthError::InvalidCredentials("bad password".to_string()).is_network());
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(AuthError::Unauthorized.is_unauthorized());
        assert!(!AuthError::Api {
            status: 403,
            message: "forbidden".to_string()
        }
        .is_unauthorized());
        assert!(!AuthError::NotLoggedIn.is_unauthorized());
    }
}
