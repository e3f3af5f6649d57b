//! Normalized inbound message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Weather,
    Blight,
    Tip,
    Diagnosis,
    System,
}

impl Category {
    /// Map the payload `type`. Unknown or missing types are `System`.
    pub fn from_type(kind: Option<&str>) -> Self {
        match kind.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
            Some("weather") => Category::Weather,
            Some("blight") => Category::Blight,
            Some("tip") => Category::Tip,
            Some("diagnosis") => Category::Diagnosis,
            _ => Category::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Weather => "weather",
            Category::Blight => "blight",
            Category::Tip => "tip",
            Category::Diagnosis => "diagnosis",
            Category::System => "system",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Blight => Priority::Urgent,
            Category::Diagnosis => Priority::High,
            Category::Weather => Priority::Medium,
            Category::Tip | Category::System => Priority::Low,
        }
    }
}

/// A delivered notification. Only `read` changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    id: Uuid,
    title: String,
    body: String,
    category: Category,
    priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_id: Option<String>,
    read: bool,
    received_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(
        title: String,
        body: String,
        category: Category,
        target_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            body,
            category,
            priority: Priority::for_category(category),
            target_id,
            read: false,
            received_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Mark as read. Returns false if it already was.
    pub fn mark_read(&mut self) -> bool {
        !std::mem::replace(&mut self.read, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_type() {
        assert_eq!(Category::from_type(Some("Blight")), Category::Blight);
        assert_eq!(Category::from_type(Some(" weather ")), Category::Weather);
        assert_eq!(Category::from_type(Some("promo")), Category::System);
        assert_eq!(Category::from_type(None), Category::System);
    }

    #[test]
    fn test_priority_follows_category() {
        assert_eq!(Priority::for_category(Category::Blight), Priority::Urgent);
        assert_eq!(Priority::for_category(Category::Diagnosis), Priority::High);
        assert_eq!(Priority::for_category(Category::Weather), Priority::Medium);
        assert_eq!(Priority::for_category(Category::Tip), Priority::Low);
        assert!(Priority::Urgent > Priority::High);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut envelope = Envelope::new("t".into(), "b".into(), Category::Tip, None);
        assert!(!envelope.is_read());
        assert!(envelope.mark_read());
        assert!(!envelope.mark_read());
        assert!(envelope.is_read());
    }
}
