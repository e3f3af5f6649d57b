//! Push message delivery for the CropWatch client.
//!
//! Both delivery channels (background agent, open page) normalize the
//! payload the same way, show one notification per logical event and route
//! clicks through an ordered rule list.

mod envelope;
mod error;
mod notification;
mod payload;
mod platform;
mod poller;
mod router;
mod routing;

pub use envelope::{Category, Envelope, Priority};
pub use error::{RouterError, RouterResult};
pub use notification::{compose, NotificationAction, NotificationSpec, RouterConfig, FALLBACK_BODY};
pub use payload::{NotificationContent, PayloadData, PushPayload};
pub use platform::{Notifier, UnreadRefresher, WindowHandle, WindowHost};
pub use poller::{HttpUnreadFeed, PollerHandle, UnreadFeed, UnreadPoller};
pub use router::{Channel, ClickOutcome, DeliveryRouter, WindowAction};
pub use routing::{resolve_destination, ClickRule, Destination, CLICK_RULES, DIAGNOSE_ACTION};
