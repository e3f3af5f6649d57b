//! Wiring of stores, API client, session and push registration for a
//! single CLI invocation.

use crate::push::HeadlessPush;
use cropwatch_config::{Config, Paths};
use credential_store::{open_stores, TokenCache};
use delivery_router::HttpUnreadFeed;
use push_registration::{HttpDeviceRegistry, PushConfig, PushRegistrationManager};
use session_auth::{ApiClient, ConnectivityFlag, HttpAuthApi, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct App {
    pub session: Arc<SessionManager>,
    pub unread: HttpUnreadFeed,
    pub unread_interval: Duration,
    pub tokens: TokenCache,
    pub push: Arc<PushRegistrationManager>,
    pub headless: Arc<HeadlessPush>,
}

impl App {
    /// Open the credential store, build the API client and restore any
    /// persisted session.
    pub fn open(
        config: &Config,
        paths: &Paths,
        online: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        paths.ensure_dirs()?;
        let (credentials, tokens) = open_stores(&paths.credentials_db())?;

        let client = ApiClient::new(&config.api_base(), config.request_timeout())?;
        let connectivity = Arc::new(ConnectivityFlag::new(online));

        let session = Arc::new(
            SessionManager::new(
                credentials,
                Arc::new(HttpAuthApi::new(client.clone())),
                connectivity,
            )
            .with_logout_timeout(config.request_timeout()),
        );
        let restored = session.restore()?;
        debug!(restored, online, "Session bootstrapped");

        let headless = Arc::new(HeadlessPush::new(tokens.clone()));
        let push = Arc::new(PushRegistrationManager::new(
            PushConfig {
                agent_script: config.agent_script.clone(),
                server_key: config.vapid_public_key.clone(),
            },
            headless.clone(),
            headless.clone(),
            Arc::new(HttpDeviceRegistry::new(client.clone())),
            session.clone(),
            tokens.clone(),
        ));

        Ok(Self {
            session,
            unread: HttpUnreadFeed::new(client),
            unread_interval: config.unread_poll_interval(),
            tokens,
            push,
            headless,
        })
    }
}
