//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! Unauthenticated ──RestoreRequested──► Restoring ──SessionFound──► Authenticated
//!                                           └──NoSession──► Unauthenticated
//! Unauthenticated ──LoginAttempt──► Authenticating ──LoginSuccess──► Authenticated
//!                                           └──LoginFailed──► Unauthenticated
//! Authenticated ──TokenRejected──► Refreshing ──RefreshSuccess──► Authenticated
//!                                      ├──RefreshDeferred──► OfflineDegraded
//!                                      └──RefreshFailed──► Unauthenticated
//! OfflineDegraded ──TokenRejected──► Refreshing
//! {Authenticated, Refreshing, OfflineDegraded} ──LogoutRequested──► LoggingOut
//! LoggingOut ──LogoutComplete──► Unauthenticated
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        RestoreRequested => Restoring,
        LoginAttempt => Authenticating
    },
    Restoring => {
        SessionFound => Authenticated,
        NoSession => Unauthenticated
    },
    Authenticating => {
        LoginSuccess => Authenticated,
        LoginFailed => Unauthenticated
    },
    Authenticated => {
        TokenRejected => Refreshing,
        LogoutRequested => LoggingOut
    },
    Refreshing => {
        RefreshSuccess => Authenticated,
        // Offline or transport failure: keep the last-known token
        RefreshDeferred => OfflineDegraded,
        RefreshFailed => Unauthenticated,
        LogoutRequested => LoggingOut
    },
    OfflineDegraded => {
        TokenRejected => Refreshing,
        LogoutRequested => LoggingOut
    },
    LoggingOut => {
        LogoutComplete => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    /// Reading a persisted record on startup.
    Restoring,
    Authenticating,
    Authenticated,
    Refreshing,
    /// Signed in, but the last refresh could not reach the server.
    OfflineDegraded,
    LoggingOut,
}

impl AuthState {
    /// True only for a fully authenticated session.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// True while a credential record is in use, including degraded mode.
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticated | AuthState::Refreshing | AuthState::OfflineDegraded
        )
    }

    /// Returns true if the state is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthState::Restoring
                | AuthState::Authenticating
                | AuthState::Refreshing
                | AuthState::LoggingOut
        )
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => AuthState::Unauthenticated,
            SessionMachineState::Restoring => AuthState::Restoring,
            SessionMachineState::Authenticating => AuthState::Authenticating,
            SessionMachineState::Authenticated => AuthState::Authenticated,
            SessionMachineState::Refreshing => AuthState::Refreshing,
            SessionMachineState::OfflineDegraded => AuthState::OfflineDegraded,
            SessionMachineState::LoggingOut => AuthState::LoggingOut,
        }
    }
}

/// Payload for auth state change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    /// Current auth state.
    pub state: AuthState,
    /// User ID if a record is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> SessionMachine {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        machine.consume(&SessionMachineInput::LoginSuccess).unwrap();
        machine
    }

    #[test]
    fn test_initial_state_is_unauthenticated() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_restore_flow() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::RestoreRequested).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Restoring);

        machine.consume(&SessionMachineInput::SessionFound).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_login_failure_returns_to_unauthenticated() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        machine.consume(&SessionMachineInput::LoginFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_refresh_deferred_then_recovered() {
        let mut machine = signed_in();

        machine.consume(&SessionMachineInput::TokenRejected).unwrap();
        machine.consume(&SessionMachineInput::RefreshDeferred).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::OfflineDegraded);

        machine.consume(&SessionMachineInput::TokenRejected).unwrap();
        machine.consume(&SessionMachineInput::RefreshSuccess).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_refresh_failure_signs_out() {
        let mut machine = signed_in();
        machine.consume(&SessionMachineInput::TokenRejected).unwrap();
        machine.consume(&SessionMachineInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_cannot_refresh_without_session() {
        let mut machine = SessionMachine::new();
        assert!(machine.consume(&SessionMachineInput::TokenRejected).is_err());
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_logout_from_degraded() {
        let mut machine = signed_in();
        machine.consume(&SessionMachineInput::TokenRejected).unwrap();
        machine.consume(&SessionMachineInput::RefreshDeferred).unwrap();

        machine.consume(&SessionMachineInput::LogoutRequested).unwrap();
        machine.consume(&SessionMachineInput::LogoutComplete).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_auth_state_helpers() {
        assert!(AuthState::Authenticated.is_authenticated());
        assert!(!AuthState::OfflineDegraded.is_authenticated());
        assert!(AuthState::OfflineDegraded.has_session());
        assert!(!AuthState::LoggingOut.has_session());
        assert!(AuthState::Restoring.is_transient());
        assert!(!AuthState::Unauthenticated.is_transient());
    }

    #[test]
    fn test_auth_state_serializes_snake_case() {
        let json = serde_json::to_string(&AuthState::OfflineDegraded).unwrap();
        assert_eq!(json, "\"offline_degraded\"");
    }
}
