use chrono::NaiveDate;
use depot_core::notify::{
    Audience, Notification, ROLE_LOGISTICS, TEMPLATE_CONFIRMATION_REMINDER,
    TEMPLATE_CONFIRMATION_REMINDER_STAFF,
};
use depot_core::{
    Cargo, CargoStatus, CoreError, CoreResult, Dimensions, ProviderId, Shipment, ShipmentPackage,
    ShipmentStatus,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dimensions::DimensionAggregator;
use crate::Collaborators;

/// Outcome of one intake-day validity pass over a cargo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeCheck {
    pub detached: usize,
    pub reminded: usize,
    pub courier_call_canceled: bool,
}

/// Creates, cancels and recomputes cargo, and moves shipments between them.
///
/// Every operation that changes which shipments a cargo holds recomputes the
/// affected cargo dimensions before returning.
#[derive(Clone)]
pub struct CargoLifecycleManager {
    ctx: Collaborators,
}

impl CargoLifecycleManager {
    pub fn new(ctx: Collaborators) -> Self {
        Self { ctx }
    }

    pub(crate) async fn load_cargo(&self, cargo_id: Uuid) -> CoreResult<Cargo> {
        self.ctx
            .cargo
            .get_cargo(cargo_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::NotFound(format!("cargo {}", cargo_id)))
    }

    async fn load_shipment(&self, shipment_id: Uuid) -> CoreResult<Shipment> {
        self.ctx
            .shipments
            .get_shipment(shipment_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::NotFound(format!("shipment {}", shipment_id)))
    }

    /// Shipments of a cargo together with their packages.
    pub(crate) async fn contents(
        &self,
        cargo_id: Uuid,
    ) -> CoreResult<Vec<(Shipment, Vec<ShipmentPackage>)>> {
        let shipments = self
            .ctx
            .shipments
            .list_by_cargo(cargo_id)
            .await
            .map_err(CoreError::storage)?;
        let mut contents = Vec::with_capacity(shipments.len());
        for shipment in shipments {
            let packages = self
                .ctx
                .shipments
                .list_packages(shipment.id)
                .await
                .map_err(CoreError::storage)?;
            contents.push((shipment, packages));
        }
        Ok(contents)
    }

    /// New empty cargo for the shipment's store, picked up by `provider`.
    pub async fn create_cargo(
        &self,
        shipment: &Shipment,
        provider: ProviderId,
    ) -> CoreResult<Cargo> {
        if !provider.handles_zero_mile() {
            return Err(CoreError::Validation(format!("{} does not pick up from stores", provider)));
        }

        let cargo = Cargo::new(shipment.merchant_id, shipment.store_id, provider);
        self.ctx.cargo.insert_cargo(&cargo).await.map_err(CoreError::storage)?;

        info!(
            cargo_id = %cargo.id,
            store_id = %cargo.store_id,
            provider = %provider,
            "Cargo created"
        );
        Ok(cargo)
    }

    /// Put a shipment on the open cargo of its store for `provider`, creating one if needed.
    pub async fn attach_to_cargo(
        &self,
        shipment_id: Uuid,
        provider: ProviderId,
    ) -> CoreResult<Cargo> {
        let shipment = self.load_shipment(shipment_id).await?;

        let open = self
            .ctx
            .cargo
            .find_open_cargo(shipment.store_id, provider)
            .await
            .map_err(CoreError::storage)?;
        let cargo = match open {
            Some(cargo) => cargo,
            None => self.create_cargo(&shipment, provider).await?,
        };

        self.reassign_shipment(shipment_id, Some(cargo.id)).await?;
        self.load_cargo(cargo.id).await
    }

    /// Move a shipment to another cargo, or off any cargo with `None`.
    pub async fn reassign_shipment(
        &self,
        shipment_id: Uuid,
        target: Option<Uuid>,
    ) -> CoreResult<Shipment> {
        let mut shipment = self.load_shipment(shipment_id).await?;
        if shipment.cargo_id == target {
            return Ok(shipment);
        }

        if let Some(target_id) = target {
            let cargo = self.load_cargo(target_id).await?;
            if cargo.is_canceled {
                return Err(CoreError::InvalidState(format!("cargo {} is canceled", cargo.id)));
            }
            if cargo.status != CargoStatus::Created {
                return Err(CoreError::InvalidState(format!(
                    "cargo {} is already {}",
                    cargo.id, cargo.status
                )));
            }
            if cargo.store_id != shipment.store_id {
                return Err(CoreError::Validation(format!(
                    "shipment {} belongs to another store",
                    shipment.number
                )));
            }
        }

        let previous = shipment.cargo_id;
        shipment.cargo_id = target;
        shipment.touch();
        self.ctx.shipments.update_shipment(&shipment).await.map_err(CoreError::storage)?;

        info!(shipment = %shipment.number, from = ?previous, to = ?target, "Shipment reassigned");

        if let Some(previous) = previous {
            self.refresh(previous).await?;
        }
        if let Some(target) = target {
            self.refresh(target).await?;
        }
        Ok(shipment)
    }

    /// Delete a shipment together with its packages.
    pub async fn delete_shipment(&self, shipment_id: Uuid) -> CoreResult<()> {
        let shipment = self.load_shipment(shipment_id).await?;

        let removed = self
            .ctx
            .shipments
            .delete_packages(shipment.id)
            .await
            .map_err(CoreError::storage)?;
        self.ctx.shipments.delete_shipment(shipment.id).await.map_err(CoreError::storage)?;
        info!(shipment = %shipment.number, packages = removed, "Shipment deleted");

        if let Some(cargo_id) = shipment.cargo_id {
            self.refresh(cargo_id).await?;
        }
        Ok(())
    }

    /// Recompute cargo dimensions from its current shipments and persist them.
    pub async fn recalculate(&self, cargo_id: Uuid) -> CoreResult<Cargo> {
        let mut cargo = self.load_cargo(cargo_id).await?;
        self.recalculate_cargo(&mut cargo).await?;
        Ok(cargo)
    }

    pub(crate) async fn recalculate_cargo(&self, cargo: &mut Cargo) -> CoreResult<()> {
        let dimensions = if cargo.is_canceled {
            Dimensions::ZERO
        } else {
            DimensionAggregator::cargo(&self.contents(cargo.id).await?)
        };

        cargo.dimensions = dimensions;
        cargo.touch();
        self.ctx.cargo.update_cargo(cargo).await.map_err(CoreError::storage)
    }

    /// Recompute a cargo that may have disappeared meanwhile.
    pub(crate) async fn refresh(&self, cargo_id: Uuid) -> CoreResult<()> {
        match self.ctx.cargo.get_cargo(cargo_id).await.map_err(CoreError::storage)? {
            Some(mut cargo) => self.recalculate_cargo(&mut cargo).await,
            None => {
                warn!(%cargo_id, "Cargo vanished before recalculation");
                Ok(())
            }
        }
    }

    /// Created -> Shipped -> Taken, never backwards.
    pub async fn advance_status(&self, cargo_id: Uuid, status: CargoStatus) -> CoreResult<Cargo> {
        let mut cargo = self.load_cargo(cargo_id).await?;
        if cargo.is_canceled {
            return Err(CoreError::InvalidState(format!("cargo {} is canceled", cargo.id)));
        }
        if status <= cargo.status {
            return Err(CoreError::InvalidState(format!(
                "cargo {} cannot move from {} to {}",
                cargo.id, cargo.status, status
            )));
        }

        cargo.status = status;
        cargo.touch();
        self.ctx.cargo.update_cargo(&cargo).await.map_err(CoreError::storage)?;

        info!(cargo_id = %cargo.id, status = %status, "Cargo status advanced");
        Ok(cargo)
    }

    /// Cancel a cargo that has not left the store yet.
    ///
    /// The cargo row and the detach of its shipments commit together. The
    /// courier call is released afterwards on a best-effort basis.
    pub async fn cancel_cargo(&self, cargo_id: Uuid) -> CoreResult<Cargo> {
        let mut cargo = self.load_cargo(cargo_id).await?;
        if cargo.status >= CargoStatus::Shipped {
            return Err(CoreError::InvalidState(format!(
                "cargo {} is already {}",
                cargo.id, cargo.status
            )));
        }
        if cargo.is_canceled {
            return Ok(cargo);
        }

        cargo.is_canceled = true;
        cargo.dimensions = Dimensions::ZERO;
        cargo.touch();
        let detached = self.ctx.cargo.cancel_and_detach(&cargo).await.map_err(CoreError::storage)?;
        info!(cargo_id = %cargo.id, detached = detached.len(), "Cargo canceled");

        if cargo.has_courier_call() {
            self.release_courier_call(&mut cargo).await;
            if let Err(e) = self.ctx.cargo.update_cargo(&cargo).await {
                warn!(cargo_id = %cargo.id, "Failed to persist released courier call: {}", e);
                self.ctx.reporter.report("cargo.cancel", &e);
            }
        }
        Ok(cargo)
    }

    /// Ask the provider to drop the courier call, then forget it locally whatever it answered.
    pub async fn release_courier_call(&self, cargo: &mut Cargo) {
        if let Some(external_id) = cargo.external_id.clone() {
            let released = self
                .ctx
                .gateway
                .cancel_courier_call(cargo.provider_id, &external_id)
                .await;
            if let Err(e) = released {
                warn!(
                    cargo_id = %cargo.id,
                    %external_id,
                    "Courier call cancellation failed: {}",
                    e
                );
                self.ctx.reporter.report("cargo.courier_call.cancel", &e);
            }
        }
        cargo.clear_courier_call();
    }

    /// On the intake day, drop shipments that can no longer travel with the
    /// cargo and chase merchants who still have to confirm theirs.
    pub async fn check_intake_day_validity(
        &self,
        cargo_id: Uuid,
        today: NaiveDate,
    ) -> CoreResult<IntakeCheck> {
        let cargo = self.load_cargo(cargo_id).await?;
        let mut check = IntakeCheck::default();
        if cargo.is_canceled || cargo.intake_date != Some(today) {
            return Ok(check);
        }

        let shipments = self
            .ctx
            .shipments
            .list_by_cargo(cargo.id)
            .await
            .map_err(CoreError::storage)?;
        let mut merchant_user: Option<Option<Uuid>> = None;
        let mut remaining = 0;

        for shipment in shipments {
            if !self.travels_with(&shipment, &cargo).await? {
                self.reassign_shipment(shipment.id, None).await?;
                check.detached += 1;
                continue;
            }
            remaining += 1;

            if shipment.status == ShipmentStatus::AwaitingConfirmation {
                if merchant_user.is_none() {
                    merchant_user = Some(self.merchant_contact(cargo.merchant_id).await);
                }
                self.remind(&cargo, &shipment, merchant_user.flatten()).await;
                check.reminded += 1;
            }
        }

        if remaining == 0 {
            let mut cargo = self.load_cargo(cargo.id).await?;
            if cargo.has_courier_call() {
                self.release_courier_call(&mut cargo).await;
                self.ctx.cargo.update_cargo(&cargo).await.map_err(CoreError::storage)?;
                check.courier_call_canceled = true;
            }
        }

        info!(
            cargo_id = %cargo.id,
            detached = check.detached,
            reminded = check.reminded,
            courier_call_canceled = check.courier_call_canceled,
            "Intake day checked"
        );
        Ok(check)
    }

    async fn travels_with(&self, shipment: &Shipment, cargo: &Cargo) -> CoreResult<bool> {
        if shipment.status.is_canceled() {
            return Ok(false);
        }
        let delivery = self
            .ctx
            .deliveries
            .get_delivery(shipment.delivery_id)
            .await
            .map_err(CoreError::storage)?;
        Ok(match delivery {
            Some(delivery) => {
                shipment.zero_mile_provider(delivery.provider_id) == cargo.provider_id
            }
            None => {
                warn!(shipment = %shipment.number, "Shipment has no delivery");
                false
            }
        })
    }

    async fn merchant_contact(&self, merchant_id: Uuid) -> Option<Uuid> {
        match self.ctx.directory.merchant(merchant_id).await {
            Ok(merchant) => merchant.and_then(|m| m.contact_user_id),
            Err(e) => {
                warn!(%merchant_id, "Merchant lookup failed: {}", e);
                self.ctx.reporter.report("cargo.intake_validity", &e);
                None
            }
        }
    }

    async fn remind(&self, cargo: &Cargo, shipment: &Shipment, merchant_user: Option<Uuid>) {
        let intake_date = cargo.intake_date.map(|d| d.to_string()).unwrap_or_default();
        let build = |template: &str, audience: Audience| {
            Notification::new(template, audience)
                .with("cargo_id", cargo.id)
                .with("shipment_number", &shipment.number)
                .with("intake_date", &intake_date)
                .with("store_id", cargo.store_id)
        };

        let mut notifications = vec![build(
            TEMPLATE_CONFIRMATION_REMINDER_STAFF,
            Audience::Role(ROLE_LOGISTICS.to_string()),
        )];
        if let Some(user_id) = merchant_user {
            notifications.insert(0, build(TEMPLATE_CONFIRMATION_REMINDER, Audience::User(user_id)));
        }

        for notification in notifications {
            if let Err(e) = self.ctx.notifier.notify(notification).await {
                warn!(shipment = %shipment.number, "Reminder not sent: {}", e);
                self.ctx.reporter.report("cargo.reminder", &e);
            }
        }
    }
}
