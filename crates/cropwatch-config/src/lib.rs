//! Configuration, filesystem paths and logging bootstrap for the CropWatch
//! client core.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_AGENT_SCRIPT, DEFAULT_API_URL, DEFAULT_APP_NAME, DEFAULT_LOG_LEVEL,
    DEFAULT_NOTIFICATION_ICON, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_UNREAD_POLL_INTERVAL_SECS,
    DEFAULT_VAPID_PUBLIC_KEY,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service};
pub use paths::Paths;
