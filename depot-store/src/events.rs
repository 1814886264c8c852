use async_trait::async_trait;
use chrono::Utc;
use depot_core::notify::{Audience, Notification, NotificationSink};
use depot_shared::models::events::NotificationEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Publishes alerts as `NotificationEvent` JSON; the notification worker renders and delivers them.
#[derive(Clone)]
pub struct KafkaNotificationSink {
    producer: EventProducer,
    topic: String,
}

impl KafkaNotificationSink {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

pub fn to_event(notification: Notification) -> NotificationEvent {
    let (audience_role, audience_user_id) = match notification.audience {
        Audience::Role(role) => (Some(role), None),
        Audience::User(user_id) => (None, Some(user_id)),
    };
    NotificationEvent {
        template: notification.template,
        audience_role,
        audience_user_id,
        attributes: notification.attributes,
        timestamp: Utc::now().timestamp(),
    }
}

#[async_trait]
impl NotificationSink for KafkaNotificationSink {
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // keyed by template so one template's alerts stay ordered
        let key = notification.template.clone();
        let payload = serde_json::to_string(&to_event(notification))?;
        self.producer.publish(&self.topic, &key, &payload).await?;
        Ok(())
    }
}
