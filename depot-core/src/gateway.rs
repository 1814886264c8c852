use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::directory::SenderIdentity;
use crate::models::{Address, DeliveryStatus, Dimensions, Recipient, TimeWindow};
use crate::provider::ProviderId;

pub type GatewayResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

// ============================================================================
// Requests
// ============================================================================

/// Manifest sent when asking a provider to pick a cargo up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierCallRequest {
    pub cargo_id: Uuid,
    pub provider_id: ProviderId,
    pub sender: SenderIdentity,
    pub intake_date: NaiveDate,
    pub window: TimeWindow,
    pub dimensions: Dimensions,
    /// Provider order ids of the deliveries the cargo's shipments belong to.
    pub order_ids: Vec<String>,
    pub shipment_numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostBlock {
    pub cash_on_delivery: i64,
    pub declared_value: i64,
    pub delivery_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceItem {
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

/// One physical place of a last-mile order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    /// Our code for the place: the package id, or the shipment number for unpackaged shipments.
    pub code: String,
    pub shipment_number: String,
    pub dimensions: Dimensions,
    pub items: Vec<PlaceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub delivery_id: Uuid,
    pub number: String,
    pub provider_id: ProviderId,
    pub external_id: Option<String>,
    pub recipient: Recipient,
    pub address: Address,
    pub point_id: Option<String>,
    pub tariff_id: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub time_window: Option<TimeWindow>,
    pub dimensions: Dimensions,
    pub cost: CostBlock,
    pub sender: SenderIdentity,
    pub places: Vec<Place>,
}

// ============================================================================
// Replies
// ============================================================================

/// Shared view over the provider-specific reply schemas.
pub trait ProviderResponse {
    fn success(&self) -> bool;
    fn external_id(&self) -> Option<&str>;
    /// Informational text that accompanies a (possibly successful) reply.
    fn diagnostic(&self) -> Option<String>;
    /// Why the request failed.
    fn error_message(&self) -> Option<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderMessage {
    pub code: Option<String>,
    pub message: String,
}

fn join_messages(messages: &[ProviderMessage]) -> Option<String> {
    if messages.is_empty() {
        return None;
    }
    Some(
        messages
            .iter()
            .map(|m| match &m.code {
                Some(code) => format!("[{}] {}", code, m.message),
                None => m.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Provider place code returned for one of our places.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceCode {
    pub code: String,
    pub external_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CdekIntakeReply {
    pub uuid: Option<String>,
    pub requests_state: String,
    #[serde(default)]
    pub errors: Vec<ProviderMessage>,
    #[serde(default)]
    pub warnings: Vec<ProviderMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenericCourierReply {
    pub success: bool,
    pub external_id: Option<String>,
    pub diagnostic: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourierCallReply {
    Cdek(CdekIntakeReply),
    Generic(GenericCourierReply),
}

impl ProviderResponse for CourierCallReply {
    fn success(&self) -> bool {
        match self {
            CourierCallReply::Cdek(r) => {
                r.requests_state != "INVALID" && r.errors.is_empty() && r.uuid.is_some()
            }
            CourierCallReply::Generic(r) => r.success && r.external_id.is_some(),
        }
    }

    fn external_id(&self) -> Option<&str> {
        match self {
            CourierCallReply::Cdek(r) => r.uuid.as_deref(),
            CourierCallReply::Generic(r) => r.external_id.as_deref(),
        }
    }

    fn diagnostic(&self) -> Option<String> {
        match self {
            CourierCallReply::Cdek(r) => join_messages(&r.warnings),
            CourierCallReply::Generic(r) => r.diagnostic.clone(),
        }
    }

    fn error_message(&self) -> Option<String> {
        match self {
            CourierCallReply::Cdek(r) => join_messages(&r.errors)
                .or_else(|| Some(format!("Intake request state {}", r.requests_state))),
            CourierCallReply::Generic(r) => r.message.clone(),
        }
    }
}

/// Result of polling a provider that reports courier-call problems asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CourierCallCheck {
    pub error: Option<String>,
    pub intake_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CdekOrderReply {
    pub uuid: Option<String>,
    pub cdek_number: Option<String>,
    pub requests_state: String,
    #[serde(default)]
    pub errors: Vec<ProviderMessage>,
    #[serde(default)]
    pub warnings: Vec<ProviderMessage>,
    #[serde(default)]
    pub packages: Vec<PlaceCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DpdOrderReply {
    pub order_num: Option<String>,
    /// `OK`, `OrderPending`, `OrderError`, `OrderDuplicate`
    pub status: String,
    pub error_message: Option<String>,
    #[serde(default)]
    pub parcels: Vec<PlaceCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct B2cplOrderReply {
    pub flag_error: bool,
    pub message: Option<String>,
    pub code: Option<String>,
    pub barcode: Option<String>,
    #[serde(default)]
    pub places: Vec<PlaceCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenericOrderReply {
    pub success: bool,
    pub external_id: Option<String>,
    pub tracknumber: Option<String>,
    pub barcode: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub places: Vec<PlaceCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderReply {
    Cdek(CdekOrderReply),
    Dpd(DpdOrderReply),
    B2cpl(B2cplOrderReply),
    Generic(GenericOrderReply),
}

impl OrderReply {
    pub fn tracknumber(&self) -> Option<&str> {
        match self {
            OrderReply::Cdek(r) => r.cdek_number.as_deref(),
            OrderReply::Dpd(r) => r.order_num.as_deref(),
            OrderReply::B2cpl(r) => r.code.as_deref(),
            OrderReply::Generic(r) => r.tracknumber.as_deref(),
        }
    }

    pub fn barcode(&self) -> Option<&str> {
        match self {
            OrderReply::Cdek(r) => r.cdek_number.as_deref(),
            OrderReply::Dpd(_) => None,
            OrderReply::B2cpl(r) => r.barcode.as_deref(),
            OrderReply::Generic(r) => r.barcode.as_deref(),
        }
    }

    pub fn places(&self) -> &[PlaceCode] {
        match self {
            OrderReply::Cdek(r) => &r.packages,
            OrderReply::Dpd(r) => &r.parcels,
            OrderReply::B2cpl(r) => &r.places,
            OrderReply::Generic(r) => &r.places,
        }
    }
}

impl ProviderResponse for OrderReply {
    fn success(&self) -> bool {
        match self {
            OrderReply::Cdek(r) => r.requests_state != "INVALID" && r.errors.is_empty(),
            OrderReply::Dpd(r) => matches!(r.status.as_str(), "OK" | "OrderPending"),
            OrderReply::B2cpl(r) => !r.flag_error,
            OrderReply::Generic(r) => r.success,
        }
    }

    fn external_id(&self) -> Option<&str> {
        match self {
            OrderReply::Cdek(r) => r.uuid.as_deref(),
            OrderReply::Dpd(r) => r.order_num.as_deref(),
            OrderReply::B2cpl(r) => r.code.as_deref(),
            OrderReply::Generic(r) => r.external_id.as_deref(),
        }
    }

    fn diagnostic(&self) -> Option<String> {
        match self {
            OrderReply::Cdek(r) => join_messages(&r.warnings),
            _ => None,
        }
    }

    fn error_message(&self) -> Option<String> {
        match self {
            OrderReply::Cdek(r) => join_messages(&r.errors)
                .or_else(|| Some(format!("Order request state {}", r.requests_state))),
            OrderReply::Dpd(r) => r.error_message.clone().or_else(|| Some(r.status.clone())),
            OrderReply::B2cpl(r) => r.message.clone(),
            OrderReply::Generic(r) => r.message.clone(),
        }
    }
}

/// One entry of a batch status answer.
///
/// `status` is set only when the gateway already normalized the answer;
/// otherwise the provider's raw code in `status_xml_id` decides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    pub key: String,
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<DeliveryStatus>,
    pub status_xml_id: Option<String>,
    pub status_date: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
    pub message: Option<String>,
}

impl StatusRecord {
    /// The internal status this record stands for, if it carries one.
    pub fn resolve_status(&self, provider: ProviderId) -> Option<DeliveryStatus> {
        self.status
            .or_else(|| self.status_xml_id.as_deref().map(|code| provider.map_status(code)))
    }
}

// Providers put their own codes in `status`; those fall back to `status_xml_id`.
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<DeliveryStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|code| code.parse().ok()))
}

// ============================================================================
// Gateway
// ============================================================================

#[async_trait]
pub trait LogisticsGateway: Send + Sync {
    /// Ask the provider to send a courier for a cargo
    async fn create_courier_call(
        &self,
        provider: ProviderId,
        request: &CourierCallRequest,
    ) -> GatewayResult<CourierCallReply>;

    async fn cancel_courier_call(
        &self,
        provider: ProviderId,
        external_id: &str,
    ) -> GatewayResult<()>;

    async fn check_courier_call(
        &self,
        provider: ProviderId,
        external_id: &str,
    ) -> GatewayResult<CourierCallCheck>;

    /// Register a last-mile order
    async fn create_order(
        &self,
        provider: ProviderId,
        order: &DeliveryOrder,
    ) -> GatewayResult<OrderReply>;

    async fn update_order(
        &self,
        provider: ProviderId,
        order: &DeliveryOrder,
    ) -> GatewayResult<OrderReply>;

    async fn cancel_order(&self, provider: ProviderId, external_id: &str) -> GatewayResult<()>;

    /// Batch status query; keys are external ids or delivery numbers depending on the provider
    async fn status_orders(
        &self,
        provider: ProviderId,
        keys: &[String],
    ) -> GatewayResult<Vec<StatusRecord>>;
}
