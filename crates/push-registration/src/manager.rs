//! Push opt-in / opt-out flow.

use crate::classify::{is_effectively_complete, Completion, Expectation};
use crate::{
    AgentRegistration, DeviceRegistry, PermissionSource, PermissionState, PushError, PushPlatform,
    PushResult,
};
use credential_store::TokenCache;
use parking_lot::Mutex;
use serde::Serialize;
use session_auth::SessionGate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Static inputs for registration.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Script URL of the background agent.
    pub agent_script: String,
    /// Server public key (VAPID) passed to the push service.
    pub server_key: String,
}

/// Current registration as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRegistration {
    pub permission_state: PermissionState,
    pub delivery_token: Option<String>,
    pub agent_registered: bool,
}

/// Result of a successful `enable()` or token rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The backend now knows the token.
    Registered { token: String },
    /// Signed out or unreachable; association happens on the next sign-in.
    Deferred { token: String },
}

impl RegistrationOutcome {
    pub fn token(&self) -> &str {
        match self {
            RegistrationOutcome::Registered { token } | RegistrationOutcome::Deferred { token } => {
                token
            }
        }
    }
}

#[derive(Debug, Default)]
struct RegistrationState {
    agent: Option<AgentRegistration>,
    /// Token waiting for a session before it can be associated.
    pending: Option<String>,
    /// Token last accepted by the backend.
    associated: Option<String>,
}

pub struct PushRegistrationManager {
    config: PushConfig,
    permission: Arc<dyn PermissionSource>,
    platform: Arc<dyn PushPlatform>,
    registry: Arc<dyn DeviceRegistry>,
    session: Arc<dyn SessionGate>,
    tokens: TokenCache,
    state: Mutex<RegistrationState>,
    /// One enable/disable/flush at a time.
    op_lock: tokio::sync::Mutex<()>,
}

impl PushRegistrationManager {
    pub fn new(
        config: PushConfig,
        permission: Arc<dyn PermissionSource>,
        platform: Arc<dyn PushPlatform>,
        registry: Arc<dyn DeviceRegistry>,
        session: Arc<dyn SessionGate>,
        tokens: TokenCache,
    ) -> Self {
        Self {
            config,
            permission,
            platform,
            registry,
            session,
            tokens,
            state: Mutex::new(RegistrationState::default()),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Opt in: permission, agent, delivery token, backend association.
    pub async fn enable(&self) -> PushResult<RegistrationOutcome> {
        let _op = self.op_lock.lock().await;

        if !self.permission.is_supported() {
            return Err(PushError::Unsupported);
        }
        if self.config.server_key.trim().is_empty() {
            return Err(PushError::MissingServerKey);
        }

        match self.permission.current() {
            PermissionState::Granted => {}
            PermissionState::Denied => {
                debug!("Permission previously denied, not prompting");
                return Err(PushError::PermissionDenied);
            }
            PermissionState::Default => match self.permission.request().await {
                PermissionState::Granted => info!("Notification permission granted"),
                PermissionState::Denied => {
                    info!("Notification permission denied");
                    return Err(PushError::PermissionDenied);
                }
                PermissionState::Default => return Err(PushError::PermissionDismissed),
            },
        }

        let agent = self.ensure_agent().await?;
        self.platform.wait_until_active(&agent).await?;
        let token = self.ensure_token(&agent).await?;
        self.associate(token).await
    }

    /// Reuse the agent registered for our script, or register it.
    async fn ensure_agent(&self) -> PushResult<AgentRegistration> {
        let script = self.config.agent_script.as_str();

        let known = self.state.lock().agent.clone();
        if let Some(agent) = known.filter(|a| a.script_url == script) {
            return Ok(agent);
        }

        let agent = match self.platform.find_agent(script).await? {
            Some(existing) => {
                debug!(agent_id = %existing.id, "Reusing background agent");
                existing
            }
            None => {
                let registered = self.platform.register_agent(script).await?;
                info!(agent_id = %registered.id, script, "Background agent registered");
                registered
            }
        };

        self.state.lock().agent = Some(agent.clone());
        Ok(agent)
    }

    /// Cached token if present, else a new subscription.
    async fn ensure_token(&self, agent: &AgentRegistration) -> PushResult<String> {
        if let Some(token) = self.tokens.get()? {
            debug!("Reusing cached delivery token");
            return Ok(token);
        }

        let token = match self.platform.subscribe(agent, &self.config.server_key).await {
            Ok(token) => token,
            Err(e) => {
                match is_effectively_complete(
                    self.platform.as_ref(),
                    agent,
                    Expectation::Subscribed,
                    &e,
                )
                .await
                {
                    Completion::Complete(Some(token)) => {
                        warn!(error = %e, "Subscribe reported failure but subscription is live");
                        token
                    }
                    _ => return Err(e.into()),
                }
            }
        };

        if let Err(e) = self.tokens.set(&token) {
            warn!(error = %e, "Failed to cache delivery token");
        }
        Ok(token)
    }

    /// Send the token to the backend, or park it until a session exists.
    async fn associate(&self, token: String) -> PushResult<RegistrationOutcome> {
        let access_token = if self.session.state().is_authenticated() {
            self.session.authenticated_token()
        } else {
            None
        };

        let Some(access_token) = access_token else {
            debug!("No session, deferring device registration");
            return Ok(self.defer(token));
        };

        match self.registry.register(&access_token, &token).await {
            Ok(()) => {
                let mut state = self.state.lock();
                state.pending = None;
                state.associated = Some(token.clone());
                drop(state);
                info!("Delivery token registered with backend");
                Ok(RegistrationOutcome::Registered { token })
            }
            Err(e) if e.is_unauthorized() || e.is_network() => {
                warn!(error = %e, "Device registration deferred");
                Ok(self.defer(token))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn defer(&self, token: String) -> RegistrationOutcome {
        self.state.lock().pending = Some(token.clone());
        RegistrationOutcome::Deferred { token }
    }

    /// Associate a deferred token now. `Ok(None)` when nothing is waiting.
    pub async fn flush_deferred(&self) -> PushResult<Option<RegistrationOutcome>> {
        let _op = self.op_lock.lock().await;
        let pending = self.state.lock().pending.clone();
        match pending {
            Some(token) => self.associate(token).await.map(Some),
            None => Ok(None),
        }
    }

    /// Flush deferred registrations whenever the session becomes
    /// authenticated.
    ///
    /// The task holds only a weak reference to the manager. It ends on the
    /// first state change after the manager is dropped, or when the session's
    /// state channel closes.
    pub fn spawn_deferred_flush(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut rx = self.session.subscribe();
        tokio::spawn(async move {
            loop {
                let authenticated = rx.borrow_and_update().is_authenticated();
                let Some(manager) = weak.upgrade() else {
                    debug!("Registration manager dropped, stopping deferred flush");
                    break;
                };
                if authenticated {
                    match manager.flush_deferred().await {
                        Ok(Some(outcome)) => debug!(?outcome, "Deferred registration flushed"),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Deferred registration failed"),
                    }
                }
                drop(manager);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Opt out. Local state is cleared first; platform and backend cleanup
    /// are best effort.
    pub async fn disable(&self) -> PushResult<()> {
        let _op = self.op_lock.lock().await;

        let token = {
            let mut state = self.state.lock();
            let pending = state.pending.take();
            state.associated.take().or(pending)
        };
        let token = match self.tokens.get() {
            Ok(Some(cached)) => Some(cached),
            Ok(None) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read cached delivery token");
                token
            }
        };
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear cached delivery token");
        }

        let known = self.state.lock().agent.clone();
        let agent = match known {
            Some(agent) => Some(agent),
            None => match self.platform.find_agent(&self.config.agent_script).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "Failed to look up background agent");
                    None
                }
            },
        };

        if let Some(agent) = agent {
            if let Err(e) = self.platform.unsubscribe(&agent).await {
                match is_effectively_complete(
                    self.platform.as_ref(),
                    &agent,
                    Expectation::Unsubscribed,
                    &e,
                )
                .await
                {
                    Completion::Complete(_) => {
                        debug!(error = %e, "Unsubscribe reported failure but took effect")
                    }
                    Completion::Failed => warn!(error = %e, "Platform unsubscribe failed"),
                }
            }
        }

        if let (Some(token), Some(access_token)) = (token, self.session.authenticated_token()) {
            if let Err(e) = self.registry.unregister(&access_token, &token).await {
                warn!(error = %e, "Backend device unregistration failed");
            }
        }

        info!("Push notifications disabled");
        Ok(())
    }

    /// The platform replaced the delivery token.
    pub async fn handle_token_rotation(&self, new_token: &str) -> PushResult<RegistrationOutcome> {
        let _op = self.op_lock.lock().await;

        if let Err(e) = self.tokens.set(new_token) {
            warn!(error = %e, "Failed to cache rotated delivery token");
        }

        let previous = self.state.lock().associated.clone();
        if let (Some(previous), Some(access_token)) = (previous, self.session.authenticated_token())
        {
            if previous != new_token {
                if let Err(e) = self.registry.unregister(&access_token, &previous).await {
                    debug!(error = %e, "Failed to unregister rotated-out token");
                }
            }
        }

        info!("Delivery token rotated");
        self.associate(new_token.to_string()).await
    }

    pub fn snapshot(&self) -> PushRegistration {
        let delivery_token = self.tokens.get().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read cached delivery token");
            None
        });
        PushRegistration {
            permission_state: self.permission.current(),
            delivery_token,
            agent_registered: self.state.lock().agent.is_some(),
        }
    }
}
