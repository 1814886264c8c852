use std::collections::BTreeMap;
use uuid::Uuid;

/// Wire form of an operator/staff alert, published for the notification worker to render.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct NotificationEvent {
    pub template: String,
    pub audience_role: Option<String>,
    pub audience_user_id: Option<Uuid>,
    pub attributes: BTreeMap<String, String>,
    pub timestamp: i64,
}
