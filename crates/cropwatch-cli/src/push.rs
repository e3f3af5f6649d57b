//! Push host for headless runs.
//!
//! There is no push service in a terminal. The delivery token is issued on a
//! paired browser or device and handed to the CLI, which then owns its
//! association with the signed-in user.

use async_trait::async_trait;
use credential_store::TokenCache;
use parking_lot::Mutex;
use push_registration::{
    AgentRegistration, PermissionSource, PermissionState, PlatformError, PushPlatform,
};
use tracing::debug;

pub const HEADLESS_AGENT_ID: &str = "headless";

pub struct HeadlessPush {
    tokens: TokenCache,
    offered: Mutex<Option<String>>,
}

impl HeadlessPush {
    pub fn new(tokens: TokenCache) -> Self {
        Self {
            tokens,
            offered: Mutex::new(None),
        }
    }

    /// Token to hand out on the next subscribe.
    pub fn offer(&self, token: &str) {
        *self.offered.lock() = Some(token.to_string());
    }

    fn agent(script_url: &str) -> AgentRegistration {
        AgentRegistration {
            id: HEADLESS_AGENT_ID.to_string(),
            script_url: script_url.to_string(),
        }
    }
}

/// Running a push command is the opt-in; there is no prompt to show.
#[async_trait]
impl PermissionSource for HeadlessPush {
    fn is_supported(&self) -> bool {
        true
    }

    fn current(&self) -> PermissionState {
        PermissionState::Granted
    }

    async fn request(&self) -> PermissionState {
        PermissionState::Granted
    }
}

#[async_trait]
impl PushPlatform for HeadlessPush {
    async fn find_agent(&self, script_url: &str) -> Result<Option<AgentRegistration>, PlatformError> {
        Ok(Some(Self::agent(script_url)))
    }

    async fn register_agent(&self, script_url: &str) -> Result<AgentRegistration, PlatformError> {
        Ok(Self::agent(script_url))
    }

    async fn wait_until_active(&self, _agent: &AgentRegistration) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn subscribe(
        &self,
        _agent: &AgentRegistration,
        _server_key: &str,
    ) -> Result<String, PlatformError> {
        self.offered
            .lock()
            .clone()
            .ok_or_else(|| PlatformError::Failed("no delivery token supplied, pass --token".into()))
    }

    async fn current_subscription(
        &self,
        _agent: &AgentRegistration,
    ) -> Result<Option<String>, PlatformError> {
        let cached = self
            .tokens
            .get()
            .map_err(|e| PlatformError::Failed(e.to_string()))?;
        Ok(cached.or_else(|| self.offered.lock().clone()))
    }

    async fn unsubscribe(&self, _agent: &AgentRegistration) -> Result<(), PlatformError> {
        debug!("Dropping offered delivery token");
        self.offered.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credential_store::{stores_over, DualStore, MemoryBackend};
    use push_registration::{
        DeviceRegistry, PushConfig, PushError, PushRegistrationManager, RegistrationOutcome,
    };
    use session_auth::{AuthResult, AuthState, SessionGate};
    use std::sync::Arc;
    use tokio::sync::watch;

    struct FakeGate {
        tx: watch::Sender<AuthState>,
    }

    impl SessionGate for FakeGate {
        fn state(&self) -> AuthState {
            *self.tx.borrow()
        }

        fn authenticated_token(&self) -> Option<String> {
            self.state().has_session().then(|| "access-1".to_string())
        }

        fn subscribe(&self) -> watch::Receiver<AuthState> {
            self.tx.subscribe()
        }
    }

    #[derive(Default)]
    struct FakeRegistry {
        registered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeviceRegistry for FakeRegistry {
        async fn register(&self, _access_token: &str, delivery_token: &str) -> AuthResult<()> {
            self.registered.lock().push(delivery_token.to_string());
            Ok(())
        }

        async fn unregister(&self, _access_token: &str, _delivery_token: &str) -> AuthResult<()> {
            Ok(())
        }
    }

    fn manager(
        state: AuthState,
        server_key: &str,
    ) -> (PushRegistrationManager, Arc<HeadlessPush>, Arc<FakeRegistry>, TokenCache) {
        let (_, tokens) = stores_over(DualStore::new(
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
        ));
        let headless = Arc::new(HeadlessPush::new(tokens.clone()));
        let registry = Arc::new(FakeRegistry::default());
        let (tx, _) = watch::channel(state);
        let manager = PushRegistrationManager::new(
            PushConfig {
                agent_script: "/sw.js".to_string(),
                server_key: server_key.to_string(),
            },
            headless.clone(),
            headless.clone(),
            registry.clone(),
            Arc::new(FakeGate { tx }),
            tokens.clone(),
        );
        (manager, headless, registry, tokens)
    }

    #[tokio::test]
    async fn test_offered_token_is_cached_and_registered() {
        let (manager, headless, registry, tokens) = manager(AuthState::Authenticated, "BKey");
        headless.offer("delivery-1");

        let outcome = manager.enable().await.unwrap();
        assert_eq!(
            outcome,
            RegistrationOutcome::Registered {
                token: "delivery-1".to_string()
            }
        );
        assert_eq!(tokens.get().unwrap().as_deref(), Some("delivery-1"));
        assert_eq!(*registry.registered.lock(), vec!["delivery-1".to_string()]);
        assert!(manager.snapshot().agent_registered);
    }

    #[tokio::test]
    async fn test_enable_without_token_fails() {
        let (manager, _, registry, _) = manager(AuthState::Authenticated, "BKey");

        let err = manager.enable().await.unwrap_err();
        assert!(matches!(err, PushError::Platform(_)));
        assert!(registry.registered.lock().is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_enable_defers() {
        let (manager, headless, registry, tokens) = manager(AuthState::Unauthenticated, "BKey");
        headless.offer("delivery-2");

        let outcome = manager.enable().await.unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Deferred { .. }));
        assert!(registry.registered.lock().is_empty());
        assert_eq!(tokens.get().unwrap().as_deref(), Some("delivery-2"));
    }

    #[tokio::test]
    async fn test_missing_server_key() {
        let (manager, headless, _, _) = manager(AuthState::Authenticated, "");
        headless.offer("delivery-3");
        assert!(matches!(
            manager.enable().await,
            Err(PushError::MissingServerKey)
        ));
    }
}
