//! Authenticated session for the CropWatch client.
//!
//! - [`SessionManager`]: login, refresh, logout and the authenticated
//!   request wrapper, with state tracked by an explicit FSM
//! - [`AuthApi`] / [`HttpAuthApi`]: backend auth endpoints
//! - [`SessionGate`]: read-only view for push registration and polling

mod api_client;
mod auth_fsm;
mod connectivity;
mod error;
mod gate;
mod retry;
mod session;

pub use api_client::{
    check_response, error_for_status, transport_error, ApiClient, AuthApi, HttpAuthApi,
    LoginCredentials, LoginResponse, RefreshResponse, EMAIL_NOT_VERIFIED,
};
pub use auth_fsm::{
    AuthState, AuthStateChangedPayload, SessionMachine, SessionMachineInput, SessionMachineState,
};
pub use connectivity::{Connectivity, ConnectivityFlag};
pub use error::{AuthError, AuthResult};
pub use gate::SessionGate;
pub use retry::{RetryBudget, RetryPolicy};
pub use session::{AuthStateCallback, RefreshOutcome, SessionManager, DEFAULT_LOGOUT_TIMEOUT};
