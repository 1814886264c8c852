use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Dimensions;
use crate::provider::ProviderId;

/// Fulfillment status of a merchant shipment, in pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    New,
    AwaitingConfirmation,
    Confirmed,
    Assembling,
    Assembled,
    Shipped,
    Delivered,
    Canceled,
}

crate::text_enum!(ShipmentStatus {
    New => "NEW",
    AwaitingConfirmation => "AWAITING_CONFIRMATION",
    Confirmed => "CONFIRMED",
    Assembling => "ASSEMBLING",
    Assembled => "ASSEMBLED",
    Shipped => "SHIPPED",
    Delivered => "DELIVERED",
    Canceled => "CANCELED",
});

impl ShipmentStatus {
    /// Ready to be handed to a last-mile provider.
    pub fn is_ready(&self) -> bool {
        *self == ShipmentStatus::Assembled
    }

    pub fn is_canceled(&self) -> bool {
        *self == ShipmentStatus::Canceled
    }
}

/// A basket line as it was sourced into the shipment. Money in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasketItem {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub price: i64,
    pub cost: i64,
    pub weight: f64,
    pub width: f64,
    pub height: f64,
    pub length: f64,
}

impl BasketItem {
    pub fn unit_box(&self) -> Dimensions {
        Dimensions::new(self.width, self.height, self.length, self.weight)
    }
}

/// Items of one merchant warehouse travelling to one delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: Uuid,
    pub number: String,
    pub delivery_id: Uuid,
    pub merchant_id: Uuid,
    pub store_id: Uuid,
    pub cargo_id: Option<Uuid>,
    pub status: ShipmentStatus,
    pub provider_override: Option<ProviderId>,
    pub items: Vec<BasketItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(
        number: impl Into<String>,
        delivery_id: Uuid,
        merchant_id: Uuid,
        store_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            delivery_id,
            merchant_id,
            store_id,
            cargo_id: None,
            status: ShipmentStatus::New,
            provider_override: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self, basket_item_id: Uuid) -> Option<&BasketItem> {
        self.items.iter().find(|i| i.id == basket_item_id)
    }

    /// The zero-mile provider: the shipment's own override, else the delivery's provider.
    pub fn zero_mile_provider(&self, delivery_provider: ProviderId) -> ProviderId {
        self.provider_override.unwrap_or(delivery_provider)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PackageItem {
    pub basket_item_id: Uuid,
    pub quantity: u32,
}

/// A physical box. Sides are measured by the packer; weight is derived from contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipmentPackage {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub dimensions: Dimensions,
    pub wrapper_weight: f64,
    pub external_code: Option<String>,
    pub items: Vec<PackageItem>,
}

impl ShipmentPackage {
    pub fn new(
        shipment_id: Uuid,
        width: f64,
        height: f64,
        length: f64,
        wrapper_weight: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shipment_id,
            dimensions: Dimensions::new(width, height, length, wrapper_weight),
            wrapper_weight,
            external_code: None,
            items: Vec::new(),
        }
    }

    pub fn packed_quantity(&self, basket_item_id: Uuid) -> u32 {
        self.items
            .iter()
            .filter(|i| i.basket_item_id == basket_item_id)
            .map(|i| i.quantity)
            .sum()
    }
}
