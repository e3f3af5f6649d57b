//! Display and window capabilities provided by the host.

use crate::{NotificationSpec, RouterResult};
use async_trait::async_trait;

/// Shows system notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, spec: &NotificationSpec) -> RouterResult<()>;
}

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    pub id: String,
    pub url: String,
}

/// Window management for click handling.
#[async_trait]
pub trait WindowHost: Send + Sync {
    async fn list_windows(&self) -> RouterResult<Vec<WindowHandle>>;

    async fn focus(&self, window: &WindowHandle) -> RouterResult<()>;

    async fn navigate(&self, window: &WindowHandle, path: &str) -> RouterResult<()>;

    async fn open(&self, path: &str) -> RouterResult<WindowHandle>;
}

/// Something that can reload the in-app unread list on demand.
pub trait UnreadRefresher: Send + Sync {
    fn request_refresh(&self);
}
