//! Session management with token refresh, driven by an explicit FSM.
//!
//! The FSM tracks transient states (authenticating, refreshing, logging out)
//! that are never persisted. The credential record itself lives in the
//! [`CredentialStore`]; on startup [`SessionManager::restore`] derives the
//! FSM state from it.

use crate::api_client::{AuthApi, LoginCredentials};
use crate::auth_fsm::{AuthState, AuthStateChangedPayload, SessionMachine, SessionMachineInput};
use crate::{AuthError, AuthResult, Connectivity, RetryPolicy, SessionGate};
use credential_store::{CredentialRecord, CredentialStore, StorageError, UserProfile};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default bound on the server-side logout call.
pub const DEFAULT_LOGOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

/// Result of a refresh attempt that did not end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh token is stored.
    Refreshed(String),
    /// The server could not be reached; this is the last-known token.
    OfflineDegraded(String),
}

impl RefreshOutcome {
    pub fn token(&self) -> &str {
        match self {
            RefreshOutcome::Refreshed(token) | RefreshOutcome::OfflineDegraded(token) => token,
        }
    }
}

/// Owns the signed-in state of the client.
pub struct SessionManager {
    store: CredentialStore,
    api: Arc<dyn AuthApi>,
    connectivity: Arc<dyn Connectivity>,
    fsm: Mutex<SessionMachine>,
    state_tx: watch::Sender<AuthState>,
    state_callback: Mutex<Option<AuthStateCallback>>,
    /// Serializes refreshes so concurrent 401s share one server call.
    refresh_lock: tokio::sync::Mutex<()>,
    retry_policy: RetryPolicy,
    logout_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        store: CredentialStore,
        api: Arc<dyn AuthApi>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            store,
            api,
            connectivity,
            fsm: Mutex::new(SessionMachine::new()),
            state_tx,
            state_callback: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            retry_policy: RetryPolicy::once(),
            logout_timeout: DEFAULT_LOGOUT_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Bound the server logout call, normally to the request budget.
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Set a callback to be notified of auth state changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    /// Get the current FSM state.
    pub fn fsm_state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().state())
    }

    /// The credential store this manager writes through.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Current record, if a session is held.
    pub fn current_record(&self) -> AuthResult<Option<CredentialRecord>> {
        if !self.fsm_state().has_session() {
            return Ok(None);
        }
        Ok(self.store.read()?)
    }

    /// Transition the FSM and notify observers if the state changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Auth state transition"
            );
            self.notify_state_change(new_state);
        }

        Ok(new_state)
    }

    /// Apply an input whose rejection is expected in some races (a logout
    /// landing mid-refresh, for example).
    fn try_transition(&self, input: &SessionMachineInput) {
        if let Err(e) = self.transition(input) {
            debug!(error = %e, "Ignoring transition");
        }
    }

    fn notify_state_change(&self, state: AuthState) {
        self.state_tx.send_replace(state);

        let cb = self.state_callback.lock();
        if let Some(callback) = cb.as_ref() {
            let (user_id, email) = self
                .store
                .read()
                .ok()
                .flatten()
                .map(|r| (Some(r.user.id), Some(r.user.email)))
                .unwrap_or((None, None));

            callback(AuthStateChangedPayload {
                state,
                user_id,
                email,
            });
        }
    }

    /// Derive the session state from the persisted record.
    ///
    /// Returns `Ok(true)` when a record was found. A record that no longer
    /// decodes is discarded and treated as no session.
    pub fn restore(&self) -> AuthResult<bool> {
        self.transition(&SessionMachineInput::RestoreRequested)?;

        match self.store.read() {
            Ok(Some(record)) => {
                self.transition(&SessionMachineInput::SessionFound)?;
                info!(user_id = %record.user.id, "Session restored");
                Ok(true)
            }
            Ok(None) => {
                self.transition(&SessionMachineInput::NoSession)?;
                debug!("No stored session");
                Ok(false)
            }
            Err(StorageError::Encoding(reason)) => {
                warn!(%reason, "Stored session is unreadable, discarding it");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear unreadable credential record");
                }
                self.transition(&SessionMachineInput::NoSession)?;
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                self.transition(&SessionMachineInput::NoSession)?;
                Err(e.into())
            }
        }
    }

    /// Sign in and persist the issued credential.
    pub async fn login(&self, credentials: &LoginCredentials) -> AuthResult<CredentialRecord> {
        self.transition(&SessionMachineInput::LoginAttempt)?;

        if !self.connectivity.is_online() {
            self.try_transition(&SessionMachineInput::LoginFailed);
            return Err(AuthError::Offline);
        }

        let response = match self.api.login(credentials).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Login rejected");
                self.try_transition(&SessionMachineInput::LoginFailed);
                return Err(e);
            }
        };

        let record = CredentialRecord {
            access_token: response.access_token,
            user: response.user,
            remember_me: credentials.remember_me,
        };

        match self.store.write(&record) {
            Ok(()) => {}
            Err(e @ StorageError::PartialWrite { .. }) => {
                warn!(error = %e, "Credential stored in one layer only");
            }
            Err(e) => {
                self.try_transition(&SessionMachineInput::LoginFailed);
                return Err(e.into());
            }
        }

        self.transition(&SessionMachineInput::LoginSuccess)?;
        info!(user_id = %record.user.id, "Logged in");
        Ok(record)
    }

    /// Refresh the access token after the backend rejected it.
    pub async fn refresh(&self) -> AuthResult<RefreshOutcome> {
        let current = self
            .current_record()?
            .ok_or(AuthError::NotLoggedIn)?
            .access_token;
        self.refresh_after(&current).await
    }

    /// Refresh unless the rejected token has already been replaced.
    async fn refresh_after(&self, rejected: &str) -> AuthResult<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;

        let record = self.current_record()?.ok_or(AuthError::NotLoggedIn)?;
        if record.access_token != rejected && self.fsm_state().is_authenticated() {
            debug!("Token already refreshed by a concurrent request");
            return Ok(RefreshOutcome::Refreshed(record.access_token));
        }

        self.transition(&SessionMachineInput::TokenRejected)?;

        if !self.connectivity.is_online() {
            self.transition(&SessionMachineInput::RefreshDeferred)?;
            warn!("Offline, keeping last-known token");
            return Ok(RefreshOutcome::OfflineDegraded(record.access_token));
        }

        let ticket = self.store.begin_write();
        let response = match self.api.refresh_token(&record.access_token).await {
            Ok(response) => response,
            Err(e) if e.is_network() => {
                warn!(error = %e, "Refresh could not reach the server, keeping last-known token");
                self.try_transition(&SessionMachineInput::RefreshDeferred);
                return Ok(RefreshOutcome::OfflineDegraded(record.access_token));
            }
            Err(e) => {
                warn!(error = %e, "Refresh rejected, clearing session");
                if let Err(clear_err) = self.store.clear() {
                    warn!(error = %clear_err, "Failed to clear credential record");
                }
                self.try_transition(&SessionMachineInput::RefreshFailed);
                return Err(e);
            }
        };

        let fresh = response.access_token.clone();
        let token = match self
            .store
            .commit_access_token(ticket, &response.access_token, response.user)
        {
            Ok(updated) => updated.access_token,
            Err(e @ StorageError::PartialWrite { .. }) => {
                warn!(error = %e, "Refreshed token stored in one layer only");
                fresh
            }
            Err(StorageError::StaleWrite) => {
                debug!("Discarding refresh result, a newer record was written");
                match self.store.read()? {
                    Some(newer) => newer.access_token,
                    None => {
                        self.try_transition(&SessionMachineInput::RefreshFailed);
                        return Err(AuthError::NotLoggedIn);
                    }
                }
            }
            Err(e) => {
                self.try_transition(&SessionMachineInput::RefreshFailed);
                return Err(e.into());
            }
        };

        self.try_transition(&SessionMachineInput::RefreshSuccess);
        info!("Access token refreshed");
        Ok(RefreshOutcome::Refreshed(token))
    }

    /// Run an authenticated request, refreshing and replaying it when the
    /// backend rejects the token.
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> AuthResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        let mut budget = self.retry_policy.budget();
        let mut token = self
            .current_record()?
            .ok_or(AuthError::NotLoggedIn)?
            .access_token;

        loop {
            match call(token.clone()).await {
                Err(e) if e.is_unauthorized() && budget.try_consume() => {
                    debug!("Request unauthorized, refreshing token");
                    match self.refresh_after(&token).await? {
                        RefreshOutcome::Refreshed(fresh) => token = fresh,
                        RefreshOutcome::OfflineDegraded(_) => return Err(e),
                    }
                }
                other => return other,
            }
        }
    }

    /// Sign out. The local record is cleared whatever the server says.
    pub async fn logout(&self) -> AuthResult<()> {
        self.try_transition(&SessionMachineInput::LogoutRequested);

        let token = self.store.read().ok().flatten().map(|r| r.access_token);
        if let Some(token) = token {
            if self.connectivity.is_online() {
                match tokio::time::timeout(self.logout_timeout, self.api.logout(&token)).await {
                    Ok(Ok(())) => debug!("Server session invalidated"),
                    Ok(Err(e)) => warn!(error = %e, "Server logout failed, clearing local session"),
                    Err(_) => warn!("Server logout timed out, clearing local session"),
                }
            } else {
                debug!("Offline, skipping server logout");
            }
        }

        let cleared = self.store.clear();
        self.try_transition(&SessionMachineInput::LogoutComplete);
        info!("Logged out");
        cleared.map_err(AuthError::from)
    }

    /// Persist a profile mutation.
    pub fn update_profile(&self, user: UserProfile) -> AuthResult<CredentialRecord> {
        if !self.fsm_state().has_session() {
            return Err(AuthError::NotLoggedIn);
        }
        Ok(self.store.update_user(user)?)
    }

    pub async fn resend_verification(&self, email: &str) -> AuthResult<()> {
        self.api.resend_verification(email).await
    }

    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        self.api.request_password_reset(email).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        self.api.reset_password(token, new_password).await
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }
}

impl SessionGate for SessionManager {
    fn state(&self) -> AuthState {
        self.fsm_state()
    }

    fn authenticated_token(&self) -> Option<String> {
        self.current_record()
            .ok()
            .flatten()
            .map(|record| record.access_token)
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> {
        SessionManager::subscribe(self)
    }
}
