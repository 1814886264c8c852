use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const ROLE_LOGISTICS: &str = "LOGISTICS";

pub const TEMPLATE_CONFIRMATION_REMINDER: &str = "cargo.confirmation_reminder";
pub const TEMPLATE_CONFIRMATION_REMINDER_STAFF: &str = "cargo.confirmation_reminder.staff";
pub const TEMPLATE_COURIER_CALL_FAILED: &str = "cargo.courier_call_failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Role(String),
    User(Uuid),
}

/// A templated alert. Rendering happens downstream; we only supply the attribute map.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub template: String,
    pub audience: Audience,
    pub attributes: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(template: &str, audience: Audience) -> Self {
        Self {
            template: template.to_string(),
            audience,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
