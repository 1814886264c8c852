use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Dimensions, TimeWindow};
use crate::provider::ProviderId;

/// Cargo lifecycle. Ordering matters: cancellation is only possible below `Shipped`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CargoStatus {
    Created,
    Shipped,
    Taken,
}

crate::text_enum!(CargoStatus {
    Created => "CREATED",
    Shipped => "SHIPPED",
    Taken => "TAKEN",
});

/// A consolidated handoff unit: shipments picked up from one store by one zero-mile provider.
///
/// `dimensions` is derived from the packages of the attached shipments and is
/// rewritten every time the shipment set changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cargo {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub store_id: Uuid,
    pub provider_id: ProviderId,
    pub status: CargoStatus,
    pub dimensions: Dimensions,
    pub is_canceled: bool,
    pub is_problem: bool,
    pub external_id: Option<String>,
    pub error_text: Option<String>,
    pub intake_number: Option<String>,
    pub intake_date: Option<NaiveDate>,
    pub intake_window: Option<TimeWindow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cargo {
    pub fn new(merchant_id: Uuid, store_id: Uuid, provider_id: ProviderId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            store_id,
            provider_id,
            status: CargoStatus::Created,
            dimensions: Dimensions::ZERO,
            is_canceled: false,
            is_problem: false,
            external_id: None,
            error_text: None,
            intake_number: None,
            intake_date: None,
            intake_window: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_courier_call(&self) -> bool {
        self.external_id.is_some()
    }

    /// Forget everything the provider told us about the courier call.
    pub fn clear_courier_call(&mut self) {
        self.external_id = None;
        self.error_text = None;
        self.intake_number = None;
        self.intake_date = None;
        self.intake_window = None;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
