//! Payload normalization shared by both delivery paths.

use crate::routing::DIAGNOSE_ACTION;
use crate::{Category, Envelope, PayloadData, PushPayload};
use serde::Serialize;

/// Body shown when the payload has none.
pub const FALLBACK_BODY: &str = "You have a new notification";

/// Display settings for composed notifications.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Title used when the payload has none.
    pub app_name: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// What the platform is asked to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSpec {
    pub title: String,
    pub body: String,
    /// Deliveries sharing a tag replace each other.
    pub tag: String,
    /// Re-alert when replacing a notification with the same tag.
    pub renotify: bool,
    pub icon: String,
    pub actions: Vec<NotificationAction>,
    /// Routing data, read back when the notification is clicked.
    pub data: PayloadData,
}

/// Build the displayed notification and its envelope.
pub fn compose(config: &RouterConfig, payload: &PushPayload) -> (NotificationSpec, Envelope) {
    let data = payload.data();
    let category = Category::from_type(data.kind.as_deref());

    let title = payload
        .title()
        .map(str::to_string)
        .unwrap_or_else(|| config.app_name.clone());
    let body = payload
        .body()
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_BODY.to_string());
    let tag = data
        .notification_id
        .clone()
        .unwrap_or_else(|| category.as_str().to_string());

    let action = if data.action.as_deref() == Some(DIAGNOSE_ACTION) {
        NotificationAction {
            action: DIAGNOSE_ACTION.to_string(),
            title: "Diagnose now".to_string(),
        }
    } else {
        NotificationAction {
            action: "view".to_string(),
            title: "View".to_string(),
        }
    };

    let envelope = Envelope::new(
        title.clone(),
        body.clone(),
        category,
        data.diagnosis_id.clone(),
    );

    let spec = NotificationSpec {
        title,
        body,
        tag,
        renotify: true,
        icon: config.icon.clone(),
        actions: vec![action],
        data,
    };

    (spec, envelope)
}
