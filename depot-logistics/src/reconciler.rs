use depot_core::directory::SenderIdentity;
use depot_core::gateway::{
    CostBlock, DeliveryOrder, OrderReply, Place, PlaceCode, PlaceItem, ProviderResponse,
};
use depot_core::{Address, BasketItem, CoreError, CoreResult, Delivery, Shipment, ShipmentPackage};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::delivery::DeliveryManager;
use crate::dimensions::DimensionAggregator;
use crate::Collaborators;

type Contents = Vec<(Shipment, Vec<ShipmentPackage>)>;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub delivery: Delivery,
    /// The provider accepted the order.
    pub success: bool,
}

/// Builds last-mile orders from a delivery's shipments and upserts them at the provider.
#[derive(Clone)]
pub struct DeliveryOrderReconciler {
    ctx: Collaborators,
}

impl DeliveryOrderReconciler {
    pub fn new(ctx: Collaborators) -> Self {
        Self { ctx }
    }

    /// Create or update the provider order for a delivery.
    ///
    /// Fails only when the delivery cannot be dispatched at all (missing,
    /// canceled, or shipments not assembled); nothing is sent in that case.
    /// Everything that goes wrong afterwards lands in `error_text` and is
    /// reported as an unsuccessful outcome.
    pub async fn dispatch(&self, delivery_id: Uuid) -> CoreResult<DispatchOutcome> {
        let mut delivery = self
            .ctx
            .deliveries
            .get_delivery(delivery_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::NotFound(format!("delivery {}", delivery_id)))?;
        if delivery.is_canceled {
            return Err(CoreError::InvalidState(format!(
                "delivery {} is canceled",
                delivery.number
            )));
        }

        let shipments: Vec<Shipment> = self
            .ctx
            .shipments
            .list_by_delivery(delivery.id)
            .await
            .map_err(CoreError::storage)?
            .into_iter()
            .filter(|s| !s.status.is_canceled())
            .collect();
        if shipments.is_empty() {
            return Err(CoreError::InvalidState(format!(
                "delivery {} has no shipments to dispatch",
                delivery.number
            )));
        }
        let unready: Vec<&str> = shipments
            .iter()
            .filter(|s| !s.status.is_ready())
            .map(|s| s.number.as_str())
            .collect();
        if !unready.is_empty() {
            return Err(CoreError::InvalidState(format!(
                "delivery {} has shipments that are not assembled: {}",
                delivery.number,
                unready.join(", ")
            )));
        }

        match self.upsert(&mut delivery, shipments).await {
            Ok(success) => Ok(DispatchOutcome { delivery, success }),
            Err(e) => {
                warn!(delivery = %delivery.number, "Dispatch failed: {}", e);
                self.ctx.reporter.report("delivery.dispatch", &e);

                delivery.error_text = Some(e.to_string());
                DeliveryManager::mark_upload_failed(&mut delivery);
                delivery.touch();
                if let Err(e) = self.ctx.deliveries.update_delivery(&delivery).await {
                    warn!(delivery = %delivery.number, "Failed to persist dispatch error: {}", e);
                    self.ctx.reporter.report("delivery.dispatch", &e);
                }
                Ok(DispatchOutcome { delivery, success: false })
            }
        }
    }

    async fn upsert(&self, delivery: &mut Delivery, shipments: Vec<Shipment>) -> CoreResult<bool> {
        let mut contents: Contents = Vec::with_capacity(shipments.len());
        for shipment in shipments {
            let packages = self
                .ctx
                .shipments
                .list_packages(shipment.id)
                .await
                .map_err(CoreError::storage)?;
            contents.push((shipment, packages));
        }

        let order = self.build_order(delivery, &contents).await?;

        if DeliveryManager::mark_uploading(delivery) {
            self.ctx.deliveries.update_delivery(delivery).await.map_err(CoreError::storage)?;
        }

        let creating = delivery.external_id.is_none();
        let reply = if creating {
            self.ctx.gateway.create_order(delivery.provider_id, &order).await
        } else {
            self.ctx.gateway.update_order(delivery.provider_id, &order).await
        };

        let success = match reply {
            Ok(reply) if reply.success() => {
                self.accept(delivery, &reply, creating);
                self.apply_place_codes(reply.places(), &contents).await?;
                true
            }
            Ok(reply) => {
                let error = reply
                    .error_message()
                    .unwrap_or_else(|| "Provider rejected the order".to_string());
                self.reject(delivery, error);
                false
            }
            Err(e) => {
                self.reject(delivery, e.to_string());
                false
            }
        };

        delivery.touch();
        self.ctx.deliveries.update_delivery(delivery).await.map_err(CoreError::storage)?;

        if creating {
            let unassigned: Vec<Uuid> = contents
                .iter()
                .filter(|(s, _)| s.cargo_id.is_none())
                .map(|(s, _)| s.id)
                .collect();
            if !unassigned.is_empty() {
                self.ctx.shipments.touch_shipments(&unassigned).await.map_err(CoreError::storage)?;
            }
        }
        Ok(success)
    }

    fn accept(&self, delivery: &mut Delivery, reply: &OrderReply, created: bool) {
        let adopt_id = created || delivery.provider_id.update_recreates_order();
        if let (true, Some(external_id)) = (adopt_id, reply.external_id()) {
            if delivery.external_id.as_deref() != Some(external_id) {
                info!(delivery = %delivery.number, %external_id, "Provider order id assigned");
                delivery.external_id = Some(external_id.to_string());
            }
        }
        if let Some(tracknumber) = reply.tracknumber() {
            delivery.tracknumber = Some(tracknumber.to_string());
        }
        if let Some(barcode) = reply.barcode() {
            delivery.barcode = Some(barcode.to_string());
        }
        delivery.error_text = None;
        DeliveryManager::mark_uploaded(delivery);
    }

    fn reject(&self, delivery: &mut Delivery, error: String) {
        warn!(
            delivery = %delivery.number,
            provider = %delivery.provider_id,
            "Provider rejected order: {}",
            error
        );
        delivery.error_text = Some(error);
        DeliveryManager::mark_upload_failed(delivery);
    }

    /// Store provider place codes on our packages. A place code names a package
    /// id or, failing that, a shipment number whose first package takes it.
    async fn apply_place_codes(
        &self,
        places: &[PlaceCode],
        contents: &Contents,
    ) -> CoreResult<usize> {
        let mut applied = 0;
        for place in places {
            let by_id = place.code.parse::<Uuid>().ok().and_then(|id| {
                contents
                    .iter()
                    .flat_map(|(_, packages)| packages.iter())
                    .find(|p| p.id == id)
            });
            let package = by_id.or_else(|| {
                contents
                    .iter()
                    .find(|(s, _)| s.number == place.code)
                    .and_then(|(_, packages)| packages.first())
            });

            let Some(package) = package else {
                continue;
            };
            if package.external_code.as_deref() == Some(place.external_code.as_str()) {
                continue;
            }
            let mut package = package.clone();
            package.external_code = Some(place.external_code.clone());
            self.ctx.shipments.save_package(&package).await.map_err(CoreError::storage)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Assemble the provider payload for a delivery.
    pub async fn build_order(
        &self,
        delivery: &Delivery,
        contents: &Contents,
    ) -> CoreResult<DeliveryOrder> {
        let address = self.recipient_address(delivery).await?;
        let sender = self.sender(contents).await?;

        let places: Vec<Place> = contents
            .iter()
            .flat_map(|(shipment, packages)| places_of(shipment, packages, delivery.is_postpaid))
            .collect();
        let dimensions = DimensionAggregator::recalc(places.iter().map(|p| p.dimensions));

        let lines = || contents.iter().flat_map(|(s, _)| s.items.iter());
        let cost = CostBlock {
            cash_on_delivery: if delivery.is_postpaid {
                lines().map(|i| i.price * i64::from(i.quantity)).sum()
            } else {
                0
            },
            declared_value: lines().map(|i| i.cost * i64::from(i.quantity)).sum(),
            delivery_cost: if delivery.is_postpaid { delivery.delivery_cost } else { 0 },
        };

        Ok(DeliveryOrder {
            delivery_id: delivery.id,
            number: delivery.number.clone(),
            provider_id: delivery.provider_id,
            external_id: delivery.external_id.clone(),
            recipient: delivery.recipient.clone(),
            address,
            point_id: delivery.point_id.clone(),
            tariff_id: delivery.tariff_id.clone(),
            delivery_date: delivery.delivery_date,
            time_window: delivery.time_window,
            dimensions,
            cost,
            sender,
            places,
        })
    }

    async fn recipient_address(&self, delivery: &Delivery) -> CoreResult<Address> {
        if let Some(address) = &delivery.address {
            return Ok(address.clone());
        }
        let Some(point_id) = &delivery.point_id else {
            return Err(CoreError::Validation(format!(
                "delivery {} has neither an address nor a pickup point",
                delivery.number
            )));
        };

        self.ctx
            .directory
            .pickup_point(delivery.provider_id, point_id)
            .await
            .map_err(|e| CoreError::Provider(format!("pickup point lookup: {}", e)))?
            .map(|point| point.address)
            .ok_or_else(|| CoreError::NotFound(format!("pickup point {}", point_id)))
    }

    /// A lone shipment travels under its merchant's name, a mix under the marketplace's.
    async fn sender(&self, contents: &Contents) -> CoreResult<SenderIdentity> {
        let directory_error = |e: Box<dyn std::error::Error + Send + Sync>| {
            CoreError::Provider(format!("store directory: {}", e))
        };

        match contents.as_slice() {
            [(shipment, _)] => {
                let store = self
                    .ctx
                    .directory
                    .store(shipment.store_id)
                    .await
                    .map_err(directory_error)?
                    .ok_or_else(|| CoreError::NotFound(format!("store {}", shipment.store_id)))?;
                let merchant = self
                    .ctx
                    .directory
                    .merchant(shipment.merchant_id)
                    .await
                    .map_err(directory_error)?
                    .ok_or_else(|| {
                        CoreError::NotFound(format!("merchant {}", shipment.merchant_id))
                    })?;
                Ok(SenderIdentity::from_store(&store, &merchant))
            }
            _ => self.ctx.directory.marketplace_identity().await.map_err(directory_error),
        }
    }
}

fn place_item(item: &BasketItem, quantity: u32, postpaid: bool) -> PlaceItem {
    PlaceItem {
        sku: item.sku.clone(),
        name: item.name.clone(),
        quantity,
        price: if postpaid { item.price } else { 0 },
        cost: item.cost,
        weight: item.weight,
        width: item.width,
        height: item.height,
        length: item.length,
    }
}

/// One place per package, or one estimated place for an unpackaged shipment.
fn places_of(shipment: &Shipment, packages: &[ShipmentPackage], postpaid: bool) -> Vec<Place> {
    if packages.is_empty() {
        return vec![Place {
            code: shipment.number.clone(),
            shipment_number: shipment.number.clone(),
            dimensions: DimensionAggregator::unpacked_box(shipment),
            items: shipment
                .items
                .iter()
                .map(|item| place_item(item, item.quantity, postpaid))
                .collect(),
        }];
    }

    packages
        .iter()
        .map(|package| Place {
            code: package.id.to_string(),
            shipment_number: shipment.number.clone(),
            dimensions: package.dimensions,
            items: package
                .items
                .iter()
                .filter_map(|packed| {
                    shipment
                        .item(packed.basket_item_id)
                        .map(|item| place_item(item, packed.quantity, postpaid))
                })
                .collect(),
        })
        .collect()
}
