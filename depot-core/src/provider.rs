use serde::{Deserialize, Serialize};

use crate::models::DeliveryStatus;

/// Logistics providers integrated through the gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderId {
    Cdek,
    Dpd,
    B2cpl,
    Boxberry,
    PickPoint,
    OwnCourier,
}

crate::text_enum!(ProviderId {
    Cdek => "CDEK",
    Dpd => "DPD",
    B2cpl => "B2CPL",
    Boxberry => "BOXBERRY",
    PickPoint => "PICK_POINT",
    OwnCourier => "OWN_COURIER",
});

/// Which identifier a provider expects in a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKey {
    ExternalId,
    OrderNumber,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::Cdek,
        ProviderId::Dpd,
        ProviderId::B2cpl,
        ProviderId::Boxberry,
        ProviderId::PickPoint,
        ProviderId::OwnCourier,
    ];

    pub fn status_key(&self) -> StatusKey {
        match self {
            ProviderId::B2cpl => StatusKey::OrderNumber,
            _ => StatusKey::ExternalId,
        }
    }

    pub fn reports_status_without_external_id(&self) -> bool {
        self.status_key() == StatusKey::OrderNumber
    }

    /// "Update" is implemented by the provider as cancel + recreate and yields a new id.
    pub fn update_recreates_order(&self) -> bool {
        matches!(self, ProviderId::Dpd)
    }

    /// The provider refuses cancellation once any shipment has been assembled.
    pub fn cancel_locked_after_assembly(&self) -> bool {
        matches!(self, ProviderId::Boxberry)
    }

    /// Courier-call faults and intake numbers arrive later through a status check.
    pub fn reports_courier_faults_async(&self) -> bool {
        matches!(self, ProviderId::Cdek)
    }

    pub fn handles_zero_mile(&self) -> bool {
        !matches!(self, ProviderId::PickPoint)
    }

    pub fn async_courier_fault_providers() -> Vec<ProviderId> {
        Self::ALL
            .into_iter()
            .filter(|p| p.reports_courier_faults_async())
            .collect()
    }

    pub fn keyless_status_providers() -> Vec<ProviderId> {
        Self::ALL
            .into_iter()
            .filter(|p| p.reports_status_without_external_id())
            .collect()
    }

    /// Map a raw provider status code onto the internal pipeline.
    pub fn map_status(&self, code: &str) -> DeliveryStatus {
        let code = code.trim();
        match self {
            ProviderId::Cdek => match code {
                "CREATED" | "ACCEPTED" => DeliveryStatus::Uploaded,
                "INVALID" => DeliveryStatus::UploadingError,
                "RECEIVED_AT_SHIPMENT_WAREHOUSE" => DeliveryStatus::OnPointIn,
                "READY_TO_SHIP_AT_SENDING_OFFICE"
                | "SENT_TO_TRANSIT_CITY"
                | "ACCEPTED_IN_TRANSIT_CITY" => DeliveryStatus::OnWay,
                "ACCEPTED_AT_RECIPIENT_CITY_WAREHOUSE" => DeliveryStatus::OnPointOut,
                "TAKEN_BY_COURIER" => DeliveryStatus::Delivering,
                "ACCEPTED_AT_PICK_UP_POINT" => DeliveryStatus::ReadyForRecipient,
                "DELIVERED" => DeliveryStatus::Done,
                "NOT_DELIVERED" => DeliveryStatus::ReturnedFromDelivery,
                "PARTIALLY_DELIVERED" => DeliveryStatus::PartialReturn,
                "READY_FOR_RETURN" => DeliveryStatus::ReturnReady,
                "RETURNED_TO_SENDER_CITY_WAREHOUSE" | "SENT_TO_SENDER_CITY" => {
                    DeliveryStatus::Returning
                }
                "RETURNED" => DeliveryStatus::Returned,
                "LOST" => DeliveryStatus::Lost,
                "REMOVED" => DeliveryStatus::Cancel,
                _ => DeliveryStatus::Unknown,
            },
            ProviderId::B2cpl => match code {
                "0" => DeliveryStatus::Uploaded,
                "1" => DeliveryStatus::OnPointIn,
                "2" | "3" => DeliveryStatus::OnWay,
                "4" => DeliveryStatus::OnPointOut,
                "5" => DeliveryStatus::Delivering,
                "6" => DeliveryStatus::ReadyForRecipient,
                "7" => DeliveryStatus::Done,
                "8" => DeliveryStatus::PartialReturn,
                "9" => DeliveryStatus::ReturnedFromDelivery,
                "10" => DeliveryStatus::Returning,
                "11" => DeliveryStatus::Returned,
                "12" => DeliveryStatus::Cancel,
                "13" => DeliveryStatus::Problem,
                _ => DeliveryStatus::Unknown,
            },
            ProviderId::Boxberry => match code {
                "LOADED" | "CREATED" => DeliveryStatus::Uploaded,
                "ACCEPTED_FOR_DELIVERY" => DeliveryStatus::OnPointIn,
                "SENT_TO_SORTING" | "IN_TRANSIT" => DeliveryStatus::OnWay,
                "ARRIVED_AT_POINT" => DeliveryStatus::ReadyForRecipient,
                "COURIER_DELIVERY" => DeliveryStatus::Delivering,
                "ISSUED" => DeliveryStatus::Done,
                "PARTIALLY_ISSUED" => DeliveryStatus::PartialReturn,
                "REFUSED" => DeliveryStatus::ReturnedFromDelivery,
                "RETURN_PREPARING" => DeliveryStatus::ReturnReady,
                "RETURN_SENT" => DeliveryStatus::Returning,
                "RETURNED_TO_SENDER" => DeliveryStatus::Returned,
                "CANCELED" => DeliveryStatus::Cancel,
                _ => DeliveryStatus::Unknown,
            },
            // Everyone else already speaks our vocabulary through the gateway adapter.
            _ => code.parse().unwrap_or(DeliveryStatus::Unknown),
        }
    }
}
