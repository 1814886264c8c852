use depot_core::{CoreError, CoreResult, Delivery, DeliveryStatus, ShipmentStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::Collaborators;

/// Manages delivery lifecycle transitions outside provider tracking.
#[derive(Clone)]
pub struct DeliveryManager {
    ctx: Collaborators,
}

impl DeliveryManager {
    pub fn new(ctx: Collaborators) -> Self {
        Self { ctx }
    }

    /// Cancel a delivery that has not been handed to the recipient.
    ///
    /// The provider order is canceled on a best-effort basis, except for
    /// providers that refuse once goods were assembled.
    pub async fn cancel_delivery(&self, delivery_id: Uuid) -> CoreResult<Delivery> {
        let mut delivery = self
            .ctx
            .deliveries
            .get_delivery(delivery_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::NotFound(format!("delivery {}", delivery_id)))?;

        if delivery.status == DeliveryStatus::Done {
            return Err(CoreError::InvalidState(format!(
                "delivery {} is already done",
                delivery.number
            )));
        }
        if delivery.is_canceled {
            return Ok(delivery);
        }

        if let Some(external_id) = delivery.external_id.clone() {
            let locked = delivery.provider_id.cancel_locked_after_assembly() && {
                let shipments = self
                    .ctx
                    .shipments
                    .list_by_delivery(delivery.id)
                    .await
                    .map_err(CoreError::storage)?;
                shipments
                    .iter()
                    .any(|s| !s.status.is_canceled() && s.status >= ShipmentStatus::Assembled)
            };

            if locked {
                info!(
                    delivery = %delivery.number,
                    provider = %delivery.provider_id,
                    "Provider order kept, goods already assembled"
                );
            } else if let Err(e) =
                self.ctx.gateway.cancel_order(delivery.provider_id, &external_id).await
            {
                warn!(
                    delivery = %delivery.number,
                    %external_id,
                    "Provider order cancellation failed: {}",
                    e
                );
                self.ctx.reporter.report("delivery.cancel", &e);
            }
        }

        delivery.is_canceled = true;
        delivery.status = DeliveryStatus::Cancel;
        delivery.touch();
        self.ctx.deliveries.update_delivery(&delivery).await.map_err(CoreError::storage)?;

        info!(delivery = %delivery.number, "Delivery canceled");
        Ok(delivery)
    }

    /// Transition: Created/UploadingError -> Uploading (order is being sent)
    pub fn mark_uploading(delivery: &mut Delivery) -> bool {
        Self::move_upload_phase(delivery, DeliveryStatus::Uploading)
    }

    /// Transition: Uploading -> Uploaded (provider accepted the order)
    pub fn mark_uploaded(delivery: &mut Delivery) -> bool {
        Self::move_upload_phase(delivery, DeliveryStatus::Uploaded)
    }

    /// Transition: Uploading -> UploadingError (provider rejected the order)
    pub fn mark_upload_failed(delivery: &mut Delivery) -> bool {
        Self::move_upload_phase(delivery, DeliveryStatus::UploadingError)
    }

    /// Upload statuses only move while provider tracking has not taken over.
    fn move_upload_phase(delivery: &mut Delivery, status: DeliveryStatus) -> bool {
        if !delivery.status.is_upload_phase() || delivery.status == status {
            return false;
        }
        delivery.status = status;
        delivery.touch();
        true
    }
}
