//! Periodic unread-count polling.
//!
//! Polls through [`SessionManager::execute`] so a rejected token is refreshed
//! once, and stops as soon as the session leaves every signed-in state.

use crate::UnreadRefresher;
use async_trait::async_trait;
use serde::Deserialize;
use session_auth::{check_response, transport_error, ApiClient, AuthResult, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Source of the unread notification count.
#[async_trait]
pub trait UnreadFeed: Send + Sync {
    async fn unread_count(&self, access_token: &str) -> AuthResult<u64>;
}

#[derive(Deserialize)]
struct UnreadCountResponse {
    count: u64,
}

/// reqwest-backed [`UnreadFeed`].
#[derive(Clone)]
pub struct HttpUnreadFeed {
    client: ApiClient,
}

impl HttpUnreadFeed {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UnreadFeed for HttpUnreadFeed {
    async fn unread_count(&self, access_token: &str) -> AuthResult<u64> {
        let response = self
            .client
            .http()
            .get(self.client.url("/notifications/unread-count"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_response(response, "unread count", None).await?;
        let body: UnreadCountResponse = response.json().await?;
        Ok(body.count)
    }
}

enum Wake {
    Tick,
    Requested,
    SessionChanged,
    SessionGone,
}

pub struct UnreadPoller {
    session: Arc<SessionManager>,
    feed: Arc<dyn UnreadFeed>,
    interval: Duration,
}

impl UnreadPoller {
    pub fn new(session: Arc<SessionManager>, feed: Arc<dyn UnreadFeed>, interval: Duration) -> Self {
        Self {
            session,
            feed,
            interval,
        }
    }

    /// Start polling. The first poll happens immediately.
    pub fn spawn(self) -> PollerHandle {
        let refresh = Arc::new(Notify::new());
        let (count_tx, count_rx) = watch::channel(None);
        let task = tokio::spawn(self.run(refresh.clone(), count_tx));
        PollerHandle {
            refresh,
            count_rx,
            task,
        }
    }

    async fn run(self, refresh: Arc<Notify>, count_tx: watch::Sender<Option<u64>>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state_rx = self.session.subscribe();

        debug!(interval_secs = self.interval.as_secs(), "Unread poller started");

        loop {
            let wake = tokio::select! {
                _ = ticker.tick() => Wake::Tick,
                _ = refresh.notified() => Wake::Requested,
                changed = state_rx.changed() => match changed {
                    Ok(()) => Wake::SessionChanged,
                    Err(_) => Wake::SessionGone,
                },
            };

            if matches!(wake, Wake::SessionGone) || !self.session.fsm_state().has_session() {
                info!("Session ended, stopping unread poller");
                break;
            }
            if matches!(wake, Wake::SessionChanged) {
                continue;
            }
            if matches!(wake, Wake::Requested) {
                debug!("Unread refresh requested");
            }

            let feed = self.feed.clone();
            let result = self
                .session
                .execute(move |token| {
                    let feed = feed.clone();
                    async move { feed.unread_count(&token).await }
                })
                .await;

            match result {
                Ok(count) => {
                    count_tx.send_replace(Some(count));
                }
                Err(e) if e.is_network() => debug!(error = %e, "Unread poll skipped, offline"),
                Err(e) => warn!(error = %e, "Unread poll failed"),
            }
        }
    }
}

/// Running poller.
pub struct PollerHandle {
    refresh: Arc<Notify>,
    count_rx: watch::Receiver<Option<u64>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Latest unread count; `None` until the first successful poll.
    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.count_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl UnreadRefresher for PollerHandle {
    fn request_refresh(&self) {
        self.refresh.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credential_store::{stores_over, DualStore, MemoryBackend};
    use session_auth::{
        AuthApi, AuthError, ConnectivityFlag, LoginCredentials, LoginResponse, RefreshResponse,
    };
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeAuth;

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn login(&self, _credentials: &LoginCredentials) -> AuthResult<LoginResponse> {
            Ok(LoginResponse {
                access_token: "token-1".to_string(),
                user: credential_store::UserProfile {
                    id: "u-1".to_string(),
                    name: "Amina".to_string(),
                    email: "amina@example.com".to_string(),
                    extra: Default::default(),
                },
            })
        }

        async fn refresh_token(&self, _access_token: &str) -> AuthResult<RefreshResponse> {
            Err(AuthError::Unauthorized)
        }

        async fn logout(&self, _access_token: &str) -> AuthResult<()> {
            Ok(())
        }

        async fn resend_verification(&self, _email: &str) -> AuthResult<()> {
            Ok(())
        }

        async fn request_password_reset(&self, _email: &str) -> AuthResult<()> {
            Ok(())
        }

        async fn reset_password(&self, _token: &str, _new_password: &str) -> AuthResult<()> {
            Ok(())
        }
    }

    /// Returns the number of calls so far as the count.
    #[derive(Default)]
    struct CountingFeed {
        calls: AtomicU64,
    }

    #[async_trait]
    impl UnreadFeed for CountingFeed {
        async fn unread_count(&self, access_token: &str) -> AuthResult<u64> {
            assert_eq!(access_token, "token-1");
            Ok(self.calls.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    async fn signed_in_session() -> Arc<SessionManager> {
        let (credentials, _) = stores_over(DualStore::new(
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
        ));
        let session = Arc::new(SessionManager::new(
            credentials,
            Arc::new(FakeAuth),
            Arc::new(ConnectivityFlag::default()),
        ));
        session
            .login(&LoginCredentials {
                email: "amina@example.com".to_string(),
                password: "pw".to_string(),
                remember_me: false,
            })
            .await
            .unwrap();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_and_on_interval() {
        let session = signed_in_session().await;
        let feed = Arc::new(CountingFeed::default());
        let handle = UnreadPoller::new(session, feed.clone(), Duration::from_secs(60)).spawn();
        let mut counts = handle.subscribe();

        counts.changed().await.unwrap();
        assert_eq!(*counts.borrow_and_update(), Some(1));

        let start = tokio::time::Instant::now();
        counts.changed().await.unwrap();
        assert_eq!(*counts.borrow_and_update(), Some(2));
        assert!(start.elapsed() >= Duration::from_secs(59));

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_requested_refresh_polls_without_waiting() {
        let session = signed_in_session().await;
        let feed = Arc::new(CountingFeed::default());
        let handle = UnreadPoller::new(session, feed.clone(), Duration::from_secs(60)).spawn();
        let mut counts = handle.subscribe();
        counts.changed().await.unwrap();

        let start = tokio::time::Instant::now();
        handle.request_refresh();
        counts.changed().await.unwrap();

        assert_eq!(*counts.borrow(), Some(2));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_logout() {
        let session = signed_in_session().await;
        let feed = Arc::new(CountingFeed::default());
        let handle =
            UnreadPoller::new(session.clone(), feed.clone(), Duration::from_secs(60)).spawn();
        let mut counts = handle.subscribe();
        counts.changed().await.unwrap();

        session.logout().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_start_without_session() {
        let (credentials, _) = stores_over(DualStore::new(
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
        ));
        let session = Arc::new(SessionManager::new(
            credentials,
            Arc::new(FakeAuth),
            Arc::new(ConnectivityFlag::default()),
        ));
        let feed = Arc::new(CountingFeed::default());
        let handle = UnreadPoller::new(session, feed.clone(), Duration::from_secs(60)).spawn();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
    }
}
