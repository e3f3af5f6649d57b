//! Foreground and background delivery plus click handling.

use crate::notification::{compose, RouterConfig};
use crate::platform::{Notifier, UnreadRefresher, WindowHost};
use crate::routing::resolve_destination;
use crate::{Destination, Envelope, PayloadData, PushPayload, RouterResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which channel a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Delivered to the background agent with no page open.
    Background,
    /// Delivered to a running page.
    Foreground,
}

/// How a click was served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowAction {
    /// An existing window was focused and navigated.
    Focused(String),
    Opened(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickOutcome {
    pub destination: Destination,
    pub window: WindowAction,
}

struct Queued {
    tag: String,
    envelope: Envelope,
}

pub struct DeliveryRouter {
    config: RouterConfig,
    notifier: Arc<dyn Notifier>,
    windows: Arc<dyn WindowHost>,
    unread: Mutex<Option<Arc<dyn UnreadRefresher>>>,
    queue: Mutex<VecDeque<Queued>>,
}

impl DeliveryRouter {
    pub fn new(
        config: RouterConfig,
        notifier: Arc<dyn Notifier>,
        windows: Arc<dyn WindowHost>,
    ) -> Self {
        Self {
            config,
            notifier,
            windows,
            unread: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Attach the unread list refresher used by the foreground path.
    pub fn set_unread_refresher(&self, refresher: Arc<dyn UnreadRefresher>) {
        *self.unread.lock() = Some(refresher);
    }

    /// Message received by the background agent.
    pub async fn handle_background(&self, raw: &[u8]) -> Envelope {
        info!(bytes = raw.len(), "Push received in background");
        self.deliver(PushPayload::parse(raw), Channel::Background)
            .await
    }

    /// Message received while a page is open.
    pub async fn handle_foreground(&self, raw: &[u8]) -> Envelope {
        debug!(bytes = raw.len(), "Push received in foreground");
        let refresher = self.unread.lock().clone();
        match refresher {
            Some(refresher) => refresher.request_refresh(),
            None => debug!("No unread refresher attached"),
        }
        self.deliver(PushPayload::parse(raw), Channel::Foreground)
            .await
    }

    async fn deliver(&self, payload: PushPayload, channel: Channel) -> Envelope {
        let (spec, envelope) = compose(&self.config, &payload);

        if let Err(e) = self.notifier.show(&spec).await {
            warn!(error = %e, ?channel, tag = %spec.tag, "Failed to show notification");
        }

        let mut queue = self.queue.lock();
        // Same tag means the same notification slot.
        queue.retain(|q| q.tag != spec.tag);
        queue.push_back(Queued {
            tag: spec.tag,
            envelope: envelope.clone(),
        });
        drop(queue);

        debug!(
            ?channel,
            id = %envelope.id(),
            category = %envelope.category(),
            "Notification delivered"
        );
        envelope
    }

    /// Envelopes not yet handed to the notification list.
    pub fn pending(&self) -> Vec<Envelope> {
        self.queue.lock().iter().map(|q| q.envelope.clone()).collect()
    }

    /// Hand an envelope over to the caller, removing it from the queue.
    pub fn acknowledge(&self, id: Uuid) -> Option<Envelope> {
        let mut queue = self.queue.lock();
        let index = queue.iter().position(|q| q.envelope.id() == id)?;
        queue.remove(index).map(|q| q.envelope)
    }

    /// Mark a queued envelope read. Returns false if unknown or already read.
    pub fn mark_read(&self, id: Uuid) -> bool {
        self.queue
            .lock()
            .iter_mut()
            .find(|q| q.envelope.id() == id)
            .is_some_and(|q| q.envelope.mark_read())
    }

    /// Route a notification click. `action` is the shortcut the user
    /// pressed, if any.
    pub async fn handle_click(
        &self,
        data: &PayloadData,
        action: Option<&str>,
    ) -> RouterResult<ClickOutcome> {
        let mut data = data.clone();
        if let Some(action) = action.filter(|a| !a.is_empty()) {
            data.action = Some(action.to_string());
        }

        let destination = resolve_destination(&data);
        let path = destination.path();
        debug!(path = %path, "Resolved click destination");

        let windows = self.windows.list_windows().await?;
        let window = match windows.into_iter().next() {
            Some(existing) => {
                self.windows.focus(&existing).await?;
                self.windows.navigate(&existing, &path).await?;
                WindowAction::Focused(existing.id)
            }
            None => {
                let opened = self.windows.open(&path).await?;
                WindowAction::Opened(opened.id)
            }
        };

        info!(path = %path, ?window, "Notification click handled");
        Ok(ClickOutcome {
            destination,
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NotificationSpec, RouterError, WindowHandle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeNotifier {
        shown: Mutex<Vec<NotificationSpec>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn show(&self, spec: &NotificationSpec) -> RouterResult<()> {
            if self.fail {
                return Err(RouterError::Display("permission revoked".to_string()));
            }
            self.shown.lock().push(spec.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeWindows {
        open_windows: Mutex<Vec<WindowHandle>>,
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WindowHost for FakeWindows {
        async fn list_windows(&self) -> RouterResult<Vec<WindowHandle>> {
            Ok(self.open_windows.lock().clone())
        }

        async fn focus(&self, window: &WindowHandle) -> RouterResult<()> {
            self.log.lock().push(format!("focus {}", window.id));
            Ok(())
        }

        async fn navigate(&self, window: &WindowHandle, path: &str) -> RouterResult<()> {
            self.log.lock().push(format!("navigate {} {}", window.id, path));
            Ok(())
        }

        async fn open(&self, path: &str) -> RouterResult<WindowHandle> {
            self.log.lock().push(format!("open {path}"));
            let window = WindowHandle {
                id: "w-new".to_string(),
                url: path.to_string(),
            };
            self.open_windows.lock().push(window.clone());
            Ok(window)
        }
    }

    #[derive(Default)]
    struct CountingRefresher(AtomicUsize);

    impl UnreadRefresher for CountingRefresher {
        fn request_refresh(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn router_with(notifier: Arc<FakeNotifier>, windows: Arc<FakeWindows>) -> DeliveryRouter {
        DeliveryRouter::new(
            RouterConfig {
                app_name: "CropWatch".to_string(),
                icon: "/icons/icon-192.png".to_string(),
            },
            notifier,
            windows,
        )
    }

    const WEATHER: &[u8] = br#"{"notification":{"title":"Frost","body":"Cover seedlings"},
                                 "data":{"type":"weather","notificationId":"n-1"}}"#;

    #[tokio::test]
    async fn test_foreground_and_background_show_identical_notifications() {
        let notifier = Arc::new(FakeNotifier::default());
        let router = router_with(notifier.clone(), Arc::new(FakeWindows::default()));
        let refresher = Arc::new(CountingRefresher::default());
        router.set_unread_refresher(refresher.clone());

        router.handle_background(WEATHER).await;
        router.handle_foreground(WEATHER).await;

        let shown = notifier.shown.lock();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0], shown[1]);
        assert_eq!(refresher.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_notification_id_occupies_one_slot() {
        let notifier = Arc::new(FakeNotifier::default());
        let router = router_with(notifier.clone(), Arc::new(FakeWindows::default()));

        router.handle_background(WEATHER).await;
        let second = router.handle_background(WEATHER).await;

        let shown = notifier.shown.lock();
        assert!(shown.iter().all(|s| s.tag == "n-1" && s.renotify));
        let pending = router.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), second.id());
    }

    #[tokio::test]
    async fn test_malformed_payload_still_delivers() {
        let notifier = Arc::new(FakeNotifier::default());
        let router = router_with(notifier.clone(), Arc::new(FakeWindows::default()));

        let envelope = router.handle_background(b"{not json").await;
        assert_eq!(envelope.title(), "CropWatch");
        assert_eq!(notifier.shown.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_display_failure_still_queues_envelope() {
        let notifier = Arc::new(FakeNotifier {
            fail: true,
            ..Default::default()
        });
        let router = router_with(notifier, Arc::new(FakeWindows::default()));

        router.handle_background(WEATHER).await;
        assert_eq!(router.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_acknowledge_and_mark_read() {
        let router = router_with(
            Arc::new(FakeNotifier::default()),
            Arc::new(FakeWindows::default()),
        );
        let envelope = router.handle_background(WEATHER).await;

        assert!(router.mark_read(envelope.id()));
        assert!(!router.mark_read(envelope.id()));

        let handed = router.acknowledge(envelope.id()).unwrap();
        assert!(handed.is_read());
        assert!(router.pending().is_empty());
        assert!(router.acknowledge(envelope.id()).is_none());
    }

    #[tokio::test]
    async fn test_click_focuses_existing_window() {
        let windows = Arc::new(FakeWindows::default());
        windows.open_windows.lock().push(WindowHandle {
            id: "w-1".to_string(),
            url: "/".to_string(),
        });
        let router = router_with(Arc::new(FakeNotifier::default()), windows.clone());

        let data = PayloadData {
            kind: Some("blight".to_string()),
            diagnosis_id: Some("X".to_string()),
            ..Default::default()
        };
        let outcome = router.handle_click(&data, None).await.unwrap();

        assert_eq!(outcome.destination, Destination::DiagnoseEntry);
        assert_eq!(outcome.window, WindowAction::Focused("w-1".to_string()));
        assert_eq!(
            *windows.log.lock(),
            vec!["focus w-1".to_string(), "navigate w-1 /diagnose".to_string()]
        );
    }

    #[tokio::test]
    async fn test_click_opens_window_when_none_exist() {
        let windows = Arc::new(FakeWindows::default());
        let router = router_with(Arc::new(FakeNotifier::default()), windows.clone());

        let data = PayloadData {
            kind: Some("tip".to_string()),
            ..Default::default()
        };
        let outcome = router.handle_click(&data, None).await.unwrap();

        assert_eq!(outcome.window, WindowAction::Opened("w-new".to_string()));
        assert_eq!(*windows.log.lock(), vec!["open /tips".to_string()]);
    }

    #[tokio::test]
    async fn test_click_on_diagnose_shortcut() {
        let router = router_with(
            Arc::new(FakeNotifier::default()),
            Arc::new(FakeWindows::default()),
        );
        let data = PayloadData {
            kind: Some("weather".to_string()),
            ..Default::default()
        };

        let outcome = router.handle_click(&data, Some("diagnose")).await.unwrap();
        assert_eq!(outcome.destination, Destination::DiagnoseEntry);
    }
}
