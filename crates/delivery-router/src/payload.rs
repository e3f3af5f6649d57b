//! Push payload wire format.
//!
//! `{ notification?: {title, body}, data?: {type, action, diagnosisId, notificationId, url} }`
//!
//! Parsing never fails. Fields of the wrong type are dropped and a payload
//! that is not JSON at all becomes a body-only notification.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Display part of the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: Option<String>,
}

/// Routing part of the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadData {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub diagnosis_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notification_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PayloadData>,
}

/// Strings and numbers become strings; blanks and other types become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl PushPayload {
    /// Decode raw push bytes.
    pub fn parse(raw: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(raw) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                let text = String::from_utf8_lossy(raw).trim().to_string();
                warn!(error = %e, "Push payload is not JSON, using text body");
                Self {
                    notification: (!text.is_empty()).then(|| NotificationContent {
                        title: None,
                        body: Some(text),
                    }),
                    data: None,
                }
            }
        }
    }

    /// Decode a JSON value section by section so one bad section does not
    /// discard the other.
    pub fn from_value(value: &Value) -> Self {
        let notification = value
            .get("notification")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let data = value
            .get("data")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        Self { notification, data }
    }

    pub fn title(&self) -> Option<&str> {
        self.notification.as_ref()?.title.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.notification.as_ref()?.body.as_deref()
    }

    /// Routing data, empty when absent.
    pub fn data(&self) -> PayloadData {
        self.data.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_payload() {
        let payload = PushPayload::parse(
            br#"{
                "notification": {"title": "Blight risk", "body": "High risk tonight"},
                "data": {"type": "blight", "action": "diagnose", "diagnosisId": "d-1",
                         "notificationId": "n-1", "url": "/custom"}
            }"#,
        );
        assert_eq!(payload.title(), Some("Blight risk"));
        let data = payload.data();
        assert_eq!(data.kind.as_deref(), Some("blight"));
        assert_eq!(data.diagnosis_id.as_deref(), Some("d-1"));
        assert_eq!(data.notification_id.as_deref(), Some("n-1"));
        assert_eq!(data.url.as_deref(), Some("/custom"));
    }

    #[test]
    fn test_numeric_ids_become_strings() {
        let payload = PushPayload::parse(br#"{"data": {"notificationId": 42, "diagnosisId": 7}}"#);
        assert_eq!(payload.data().notification_id.as_deref(), Some("42"));
        assert_eq!(payload.data().diagnosis_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_wrong_types_are_dropped() {
        let payload = PushPayload::parse(
            br#"{"notification": {"title": null, "body": ["x"]}, "data": {"type": true, "url": ""}}"#,
        );
        assert_eq!(payload.title(), None);
        assert_eq!(payload.body(), None);
        assert_eq!(payload.data(), PayloadData::default());
    }

    #[test]
    fn test_bad_section_keeps_the_other() {
        let payload = PushPayload::parse(br#"{"notification": "oops", "data": {"type": "tip"}}"#);
        assert!(payload.notification.is_none());
        assert_eq!(payload.data().kind.as_deref(), Some("tip"));
    }

    #[test]
    fn test_plain_text_payload() {
        let payload = PushPayload::parse(b"Rain expected at 4pm");
        assert_eq!(payload.body(), Some("Rain expected at 4pm"));
        assert!(payload.data.is_none());
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(PushPayload::parse(b""), PushPayload::default());
    }
}
