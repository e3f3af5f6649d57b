//! Configuration management for the client core.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend URL (can be overridden at compile time via CROPWATCH_API_URL env var).
pub const DEFAULT_API_URL: &str = match option_env!("CROPWATCH_API_URL") {
    Some(url) => url,
    None => "https://api.cropwatch.app",
};

/// Server VAPID public key handed to the push service when subscribing.
pub const DEFAULT_VAPID_PUBLIC_KEY: &str = match option_env!("CROPWATCH_VAPID_PUBLIC_KEY") {
    Some(key) => key,
    None => "",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Script URL of the background agent.
pub const DEFAULT_AGENT_SCRIPT: &str = "/sw.js";

/// Application name shown when a push payload carries no title.
pub const DEFAULT_APP_NAME: &str = "CropWatch";

/// Icon attached to every notification.
pub const DEFAULT_NOTIFICATION_ICON: &str = "/icons/icon-192.png";

/// Unread-list polling interval.
pub const DEFAULT_UNREAD_POLL_INTERVAL_SECS: u64 = 60;

/// Budget for a single backend request (also bounds the logout call).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Backend REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// VAPID application server key (base64url).
    #[serde(default = "default_vapid_public_key")]
    pub vapid_public_key: String,
    /// Background agent script URL.
    #[serde(default = "default_agent_script")]
    pub agent_script: String,
    /// Application display name.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Notification icon path.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,
    /// Seconds between unread-count polls.
    #[serde(default = "default_unread_poll_interval_secs")]
    pub unread_poll_interval_secs: u64,
    /// Milliseconds allowed for one backend request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_vapid_public_key() -> String {
    DEFAULT_VAPID_PUBLIC_KEY.to_string()
}

fn default_agent_script() -> String {
    DEFAULT_AGENT_SCRIPT.to_string()
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_notification_icon() -> String {
    DEFAULT_NOTIFICATION_ICON.to_string()
}

fn default_unread_poll_interval_secs() -> u64 {
    DEFAULT_UNREAD_POLL_INTERVAL_SECS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_url: default_api_url(),
            vapid_public_key: default_vapid_public_key(),
            agent_script: default_agent_script(),
            app_name: default_app_name(),
            notification_icon: default_notification_icon(),
            unread_poll_interval_secs: DEFAULT_UNREAD_POLL_INTERVAL_SECS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("CROPWATCH_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(api_url) = std::env::var("CROPWATCH_API_URL") {
            if !api_url.trim().is_empty() {
                self.api_url = api_url.trim().to_string();
            }
        }
    }

    fn validate(&self) -> CoreResult<()> {
        self.api_url()?;
        if self.unread_poll_interval_secs == 0 {
            return Err(CoreError::Config(
                "unread_poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the backend URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }

    /// Backend base URL without a trailing slash, ready for path joins.
    pub fn api_base(&self) -> String {
        self.api_url.trim_end_matches('/').to_string()
    }

    /// Unread polling interval.
    pub fn unread_poll_interval(&self) -> Duration {
        Duration::from_secs(self.unread_poll_interval_secs)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
