//! Deciding whether a failed subscribe/unsubscribe actually took effect.
//!
//! Some platforms report "message channel closed" even though the operation
//! completed. The post-condition is checked first; the error text is only
//! consulted when the platform cannot be queried.

use crate::{AgentRegistration, PlatformError, PushPlatform};
use tracing::debug;

const CHANNEL_CLOSED_MARKERS: &[&str] = &[
    "message channel closed",
    "channel closed",
    "receiving end does not exist",
];

/// What the caller was trying to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Subscribed,
    Unsubscribed,
}

/// Verdict on a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The operation took effect. Carries the live token after a subscribe.
    Complete(Option<String>),
    Failed,
}

/// True when the error looks like the agent's channel closing early.
pub fn is_channel_closed(err: &PlatformError) -> bool {
    match err {
        PlatformError::ChannelClosed(_) => true,
        PlatformError::Failed(message) => {
            let message = message.to_lowercase();
            CHANNEL_CLOSED_MARKERS
                .iter()
                .any(|marker| message.contains(marker))
        }
    }
}

pub async fn is_effectively_complete(
    platform: &dyn PushPlatform,
    agent: &AgentRegistration,
    expected: Expectation,
    err: &PlatformError,
) -> Completion {
    match (expected, platform.current_subscription(agent).await) {
        (Expectation::Subscribed, Ok(Some(token))) => Completion::Complete(Some(token)),
        (Expectation::Subscribed, Ok(None)) => Completion::Failed,
        (Expectation::Subscribed, Err(query_err)) => {
            // Without a readable subscription there is no token to register.
            debug!(error = %query_err, "Cannot confirm subscription");
            Completion::Failed
        }
        (Expectation::Unsubscribed, Ok(None)) => Completion::Complete(None),
        (Expectation::Unsubscribed, Ok(Some(_))) => Completion::Failed,
        (Expectation::Unsubscribed, Err(query_err)) => {
            debug!(error = %query_err, "Cannot query subscription, classifying error");
            if is_channel_closed(err) {
                Completion::Complete(None)
            } else {
                Completion::Failed
            }
        }
    }
}
