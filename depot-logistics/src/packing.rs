use depot_core::{CoreError, CoreResult, PackageItem, Shipment, ShipmentPackage};
use tracing::info;
use uuid::Uuid;

use crate::cargo::CargoLifecycleManager;
use crate::dimensions::DimensionAggregator;
use crate::Collaborators;

/// Packer-facing operations on shipment boxes.
///
/// Keeps the packed quantity of every basket item within what the basket holds
/// and pushes weight changes up to the owning cargo.
#[derive(Clone)]
pub struct PackingService {
    ctx: Collaborators,
    lifecycle: CargoLifecycleManager,
}

impl PackingService {
    pub fn new(ctx: Collaborators) -> Self {
        let lifecycle = CargoLifecycleManager::new(ctx.clone());
        Self { ctx, lifecycle }
    }

    async fn load(&self, shipment_id: Uuid) -> CoreResult<(Shipment, Vec<ShipmentPackage>)> {
        let shipment = self
            .ctx
            .shipments
            .get_shipment(shipment_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::NotFound(format!("shipment {}", shipment_id)))?;
        let packages = self
            .ctx
            .shipments
            .list_packages(shipment_id)
            .await
            .map_err(CoreError::storage)?;
        Ok((shipment, packages))
    }

    /// Open a new empty box on a shipment.
    pub async fn add_package(
        &self,
        shipment_id: Uuid,
        width: f64,
        height: f64,
        length: f64,
        wrapper_weight: f64,
    ) -> CoreResult<ShipmentPackage> {
        if [width, height, length].iter().any(|side| !(*side > 0.0)) {
            return Err(CoreError::Validation("package sides must be positive".to_string()));
        }
        if !(wrapper_weight >= 0.0) {
            return Err(CoreError::Validation("wrapper weight must not be negative".to_string()));
        }

        let (shipment, _) = self.load(shipment_id).await?;
        let package = ShipmentPackage::new(shipment.id, width, height, length, wrapper_weight);
        self.ctx.shipments.save_package(&package).await.map_err(CoreError::storage)?;

        info!(shipment = %shipment.number, package_id = %package.id, "Package added");
        self.after_change(&shipment).await?;
        Ok(package)
    }

    /// Put `quantity` units of a basket item into a box.
    pub async fn put_item(
        &self,
        shipment_id: Uuid,
        package_id: Uuid,
        basket_item_id: Uuid,
        quantity: u32,
    ) -> CoreResult<ShipmentPackage> {
        if quantity == 0 {
            return Err(CoreError::Validation("quantity must be positive".to_string()));
        }

        let (shipment, packages) = self.load(shipment_id).await?;
        let item = shipment
            .item(basket_item_id)
            .ok_or_else(|| CoreError::NotFound(format!("basket item {}", basket_item_id)))?;

        let packed: u32 = packages.iter().map(|p| p.packed_quantity(basket_item_id)).sum();
        if quantity > item.quantity.saturating_sub(packed) {
            return Err(CoreError::Validation(format!(
                "{} of {} units of {} already packed, cannot add {}",
                packed, item.quantity, item.sku, quantity
            )));
        }

        let mut package = find_package(packages, package_id)?;
        match package.items.iter_mut().find(|i| i.basket_item_id == basket_item_id) {
            Some(line) => line.quantity += quantity,
            None => package.items.push(PackageItem { basket_item_id, quantity }),
        }

        self.save(&shipment, &mut package).await?;
        Ok(package)
    }

    /// Take `quantity` units of a basket item out of a box.
    pub async fn remove_item(
        &self,
        shipment_id: Uuid,
        package_id: Uuid,
        basket_item_id: Uuid,
        quantity: u32,
    ) -> CoreResult<ShipmentPackage> {
        let (shipment, packages) = self.load(shipment_id).await?;
        let mut package = find_package(packages, package_id)?;

        let held = package.packed_quantity(basket_item_id);
        if quantity == 0 || quantity > held {
            return Err(CoreError::Validation(format!(
                "package holds {} units, cannot remove {}",
                held, quantity
            )));
        }

        let mut left = quantity;
        for line in package.items.iter_mut().filter(|i| i.basket_item_id == basket_item_id) {
            let taken = left.min(line.quantity);
            line.quantity -= taken;
            left -= taken;
        }
        package.items.retain(|i| i.quantity > 0);

        self.save(&shipment, &mut package).await?;
        Ok(package)
    }

    async fn save(&self, shipment: &Shipment, package: &mut ShipmentPackage) -> CoreResult<()> {
        package.dimensions.weight = DimensionAggregator::package_weight(package, shipment);
        self.ctx.shipments.save_package(package).await.map_err(CoreError::storage)?;
        self.after_change(shipment).await
    }

    async fn after_change(&self, shipment: &Shipment) -> CoreResult<()> {
        match shipment.cargo_id {
            Some(cargo_id) => self.lifecycle.refresh(cargo_id).await,
            None => Ok(()),
        }
    }
}

fn find_package(packages: Vec<ShipmentPackage>, package_id: Uuid) -> CoreResult<ShipmentPackage> {
    packages
        .into_iter()
        .find(|p| p.id == package_id)
        .ok_or_else(|| CoreError::NotFound(format!("package {}", package_id)))
}
