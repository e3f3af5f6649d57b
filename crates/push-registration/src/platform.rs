//! Platform capabilities the registration flow depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Never asked, or the prompt was dismissed.
    Default,
    Granted,
    Denied,
}

/// Notification permission prompt.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Whether the platform can show notifications and receive pushes.
    fn is_supported(&self) -> bool;

    fn current(&self) -> PermissionState;

    /// Prompt the user. Resolves to the state after the prompt closes.
    async fn request(&self) -> PermissionState;
}

/// A registered background execution agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRegistration {
    pub id: String,
    pub script_url: String,
}

/// Failure reported by the platform push stack.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// The messaging channel to the agent closed before a reply arrived.
    #[error("Message channel closed: {0}")]
    ChannelClosed(String),

    #[error("Platform error: {0}")]
    Failed(String),
}

/// Background agent lifecycle and push subscription.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Existing registration for `script_url`, if any.
    async fn find_agent(&self, script_url: &str) -> Result<Option<AgentRegistration>, PlatformError>;

    async fn register_agent(&self, script_url: &str) -> Result<AgentRegistration, PlatformError>;

    /// Resolves once the agent is active and can own a subscription.
    async fn wait_until_active(&self, agent: &AgentRegistration) -> Result<(), PlatformError>;

    /// Subscribe with the server's public key and return the delivery token.
    async fn subscribe(
        &self,
        agent: &AgentRegistration,
        server_key: &str,
    ) -> Result<String, PlatformError>;

    /// Delivery token of the live subscription, if one exists.
    async fn current_subscription(
        &self,
        agent: &AgentRegistration,
    ) -> Result<Option<String>, PlatformError>;

    async fn unsubscribe(&self, agent: &AgentRegistration) -> Result<(), PlatformError>;
}
