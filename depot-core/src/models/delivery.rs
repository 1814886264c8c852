use chrono::{DateTime, NaiveDate, Utc};
use depot_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Address, TimeWindow};
use crate::provider::ProviderId;

/// Internal last-mile pipeline. Provider statuses are mapped onto this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Created,
    Uploading,
    Uploaded,
    UploadingError,
    OnPointIn,
    OnWay,
    OnPointOut,
    Delivering,
    ReadyForRecipient,
    Done,
    ReturnedFromDelivery,
    PartialReturn,
    ReturnReady,
    Returning,
    Returned,
    Lost,
    Problem,
    Cancel,
    Unknown,
    #[serde(rename = "NA")]
    NA,
}

crate::text_enum!(DeliveryStatus {
    Created => "CREATED",
    Uploading => "UPLOADING",
    Uploaded => "UPLOADED",
    UploadingError => "UPLOADING_ERROR",
    OnPointIn => "ON_POINT_IN",
    OnWay => "ON_WAY",
    OnPointOut => "ON_POINT_OUT",
    Delivering => "DELIVERING",
    ReadyForRecipient => "READY_FOR_RECIPIENT",
    Done => "DONE",
    ReturnedFromDelivery => "RETURNED_FROM_DELIVERY",
    PartialReturn => "PARTIAL_RETURN",
    ReturnReady => "RETURN_READY",
    Returning => "RETURNING",
    Returned => "RETURNED",
    Lost => "LOST",
    Problem => "PROBLEM",
    Cancel => "CANCEL",
    Unknown => "UNKNOWN",
    NA => "NA",
});

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Done | DeliveryStatus::Returned)
    }

    /// Statuses owned by the upload step rather than by provider tracking.
    pub fn is_upload_phase(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Created
                | DeliveryStatus::Uploading
                | DeliveryStatus::Uploaded
                | DeliveryStatus::UploadingError
        )
    }

    /// Statuses after which a postpaid order will not be paid.
    pub fn times_out_payment(&self) -> bool {
        matches!(self, DeliveryStatus::Cancel | DeliveryStatus::Returned)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    NotPaid,
    Paid,
    Timeout,
}

crate::text_enum!(PaymentStatus {
    NotPaid => "NOT_PAID",
    Paid => "PAID",
    Timeout => "TIMEOUT",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Recipient {
    pub name: Masked<String>,
    pub phone: Masked<String>,
    pub email: Option<Masked<String>>,
}

/// Last-mile grouping of shipments: one recipient, one provider, one timeframe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Order-number-derived key, e.g. `100234-2`.
    pub number: String,
    pub provider_id: ProviderId,
    pub status: DeliveryStatus,
    pub status_xml_id: Option<String>,
    pub status_xml_id_at: Option<DateTime<Utc>>,
    pub payment_status: PaymentStatus,
    pub is_postpaid: bool,
    pub is_canceled: bool,
    pub external_id: Option<String>,
    pub tracknumber: Option<String>,
    pub barcode: Option<String>,
    pub error_text: Option<String>,
    pub recipient: Recipient,
    pub address: Option<Address>,
    pub point_id: Option<String>,
    pub tariff_id: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub time_window: Option<TimeWindow>,
    pub delivery_cost: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(
        order_id: Uuid,
        number: impl Into<String>,
        provider_id: ProviderId,
        recipient: Recipient,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            number: number.into(),
            provider_id,
            status: DeliveryStatus::Created,
            status_xml_id: None,
            status_xml_id_at: None,
            payment_status: PaymentStatus::NotPaid,
            is_postpaid: false,
            is_canceled: false,
            external_id: None,
            tracknumber: None,
            barcode: None,
            error_text: None,
            recipient,
            address: None,
            point_id: None,
            tariff_id: None,
            delivery_date: None,
            time_window: None,
            delivery_cost: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
