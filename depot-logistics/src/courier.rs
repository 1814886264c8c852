use chrono::{Datelike, Days, Local, NaiveDateTime};
use depot_core::directory::SenderIdentity;
use depot_core::gateway::{CourierCallRequest, ProviderResponse};
use depot_core::notify::{Audience, Notification, ROLE_LOGISTICS, TEMPLATE_COURIER_CALL_FAILED};
use depot_core::{Cargo, CargoStatus, CoreError, CoreResult};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cargo::CargoLifecycleManager;
use crate::Collaborators;

/// How many calendar days ahead (today included) a pickup may be booked.
const BOOKING_HORIZON_DAYS: u64 = 7;

/// Books, cancels and polls courier pickups for cargo.
#[derive(Clone)]
pub struct CourierCallScheduler {
    ctx: Collaborators,
    lifecycle: CargoLifecycleManager,
}

impl CourierCallScheduler {
    pub fn new(ctx: Collaborators) -> Self {
        let lifecycle = CargoLifecycleManager::new(ctx.clone());
        Self { ctx, lifecycle }
    }

    pub async fn create_courier_call(&self, cargo_id: Uuid) -> CoreResult<Cargo> {
        self.create_courier_call_at(cargo_id, Local::now().naive_local()).await
    }

    /// Book the first pickup slot the provider accepts, walking forward from `now`.
    ///
    /// Every rejected attempt overwrites `error_text`. When no day works the last
    /// error stays on the cargo and the call fails with `CoreError::Provider`.
    pub async fn create_courier_call_at(
        &self,
        cargo_id: Uuid,
        now: NaiveDateTime,
    ) -> CoreResult<Cargo> {
        let mut cargo = self.lifecycle.load_cargo(cargo_id).await?;
        if cargo.is_canceled || cargo.status != CargoStatus::Created {
            return Err(CoreError::InvalidState(format!(
                "cargo {} is not awaiting pickup",
                cargo.id
            )));
        }
        if let Some(external_id) = &cargo.external_id {
            return Err(CoreError::InvalidState(format!(
                "cargo {} already has courier call {}",
                cargo.id, external_id
            )));
        }
        let shipments = self
            .ctx
            .shipments
            .list_by_cargo(cargo.id)
            .await
            .map_err(CoreError::storage)?;
        if shipments.is_empty() {
            return Err(CoreError::InvalidState(format!("cargo {} holds no shipments", cargo.id)));
        }

        let store = self
            .ctx
            .directory
            .store(cargo.store_id)
            .await
            .map_err(|e| CoreError::Provider(format!("store directory: {}", e)))?
            .ok_or_else(|| CoreError::NotFound(format!("store {}", cargo.store_id)))?;
        let merchant = match self
            .ctx
            .directory
            .merchant(cargo.merchant_id)
            .await
            .map_err(|e| CoreError::Provider(format!("store directory: {}", e)))?
        {
            Some(merchant) => merchant,
            None => {
                let message = format!("Merchant {} not found", cargo.merchant_id);
                cargo.error_text = Some(message.clone());
                cargo.touch();
                self.ctx.cargo.update_cargo(&cargo).await.map_err(CoreError::storage)?;
                return Err(CoreError::NotFound(message));
            }
        };
        let sender = SenderIdentity::from_store(&store, &merchant);

        self.lifecycle.recalculate_cargo(&mut cargo).await?;

        let mut order_ids = Vec::new();
        let mut seen = HashSet::new();
        for shipment in &shipments {
            if !seen.insert(shipment.delivery_id) {
                continue;
            }
            if let Some(delivery) = self
                .ctx
                .deliveries
                .get_delivery(shipment.delivery_id)
                .await
                .map_err(CoreError::storage)?
            {
                order_ids.push(delivery.external_id.unwrap_or(delivery.number));
            }
        }
        let shipment_numbers: Vec<String> = shipments.iter().map(|s| s.number.clone()).collect();

        let mut last_error = None;
        for offset in 0..BOOKING_HORIZON_DAYS {
            let Some(date) = now.date().checked_add_days(Days::new(offset)) else {
                break;
            };
            let Some(window) = store.pickup_window(date.weekday(), cargo.provider_id) else {
                continue;
            };
            if offset == 0 && window.has_elapsed(now.time()) {
                continue;
            }

            let request = CourierCallRequest {
                cargo_id: cargo.id,
                provider_id: cargo.provider_id,
                sender: sender.clone(),
                intake_date: date,
                window,
                dimensions: cargo.dimensions,
                order_ids: order_ids.clone(),
                shipment_numbers: shipment_numbers.clone(),
            };

            let reply = self.ctx.gateway.create_courier_call(cargo.provider_id, &request).await;
            let error = match reply {
                Ok(reply) if reply.success() => {
                    cargo.external_id = reply.external_id().map(str::to_string);
                    cargo.error_text = reply.diagnostic();
                    cargo.is_problem = false;
                    cargo.intake_date = Some(date);
                    cargo.intake_window = Some(window);
                    cargo.touch();
                    self.ctx.cargo.update_cargo(&cargo).await.map_err(CoreError::storage)?;

                    info!(
                        cargo_id = %cargo.id,
                        provider = %cargo.provider_id,
                        intake_date = %date,
                        window = %window.label(),
                        "Courier call booked"
                    );
                    return Ok(cargo);
                }
                Ok(reply) => reply
                    .error_message()
                    .unwrap_or_else(|| "Provider rejected the courier call".to_string()),
                Err(e) => e.to_string(),
            };

            warn!(
                cargo_id = %cargo.id,
                intake_date = %date,
                "Courier call attempt failed: {}",
                error
            );
            cargo.error_text = Some(error.clone());
            last_error = Some(error);
        }

        let error = last_error.unwrap_or_else(|| {
            format!("No pickup window in the next {} days", BOOKING_HORIZON_DAYS)
        });
        cargo.error_text = Some(error.clone());
        cargo.is_problem = true;
        cargo.touch();
        self.ctx.cargo.update_cargo(&cargo).await.map_err(CoreError::storage)?;

        let audience = Audience::Role(ROLE_LOGISTICS.to_string());
        let alert = Notification::new(TEMPLATE_COURIER_CALL_FAILED, audience)
            .with("cargo_id", cargo.id)
            .with("store_id", cargo.store_id)
            .with("error", &error);
        if let Err(e) = self.ctx.notifier.notify(alert).await {
            warn!(cargo_id = %cargo.id, "Courier call alert not sent: {}", e);
            self.ctx.reporter.report("courier_call.alert", &e);
        }

        Err(CoreError::Provider(error))
    }

    /// Drop the courier call. Local fields are cleared whatever the provider answers.
    pub async fn cancel_courier_call(&self, cargo_id: Uuid) -> CoreResult<Cargo> {
        let mut cargo = self.lifecycle.load_cargo(cargo_id).await?;
        self.lifecycle.release_courier_call(&mut cargo).await;
        self.ctx.cargo.update_cargo(&cargo).await.map_err(CoreError::storage)?;

        info!(cargo_id = %cargo.id, "Courier call cleared");
        Ok(cargo)
    }

    /// Pull asynchronously reported faults and the intake number for a booked call.
    pub async fn check_external_status(&self, cargo_id: Uuid) -> CoreResult<Cargo> {
        let mut cargo = self.lifecycle.load_cargo(cargo_id).await?;
        if !cargo.provider_id.reports_courier_faults_async() {
            return Ok(cargo);
        }
        let Some(external_id) = cargo.external_id.clone() else {
            return Ok(cargo);
        };

        let check = self
            .ctx
            .gateway
            .check_courier_call(cargo.provider_id, &external_id)
            .await
            .map_err(|e| CoreError::Provider(e.to_string()))?;

        cargo.is_problem = check.error.is_some();
        cargo.error_text = check.error;
        cargo.intake_number = check.intake_number;
        cargo.touch();
        self.ctx.cargo.update_cargo(&cargo).await.map_err(CoreError::storage)?;
        Ok(cargo)
    }
}
