use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{Cargo, CargoStatus, Delivery, DeliveryStatus, Shipment, ShipmentPackage};
use crate::provider::ProviderId;
use crate::repository::{CargoRepository, DeliveryRepository, RepoResult, ShipmentRepository};

#[derive(Default)]
struct State {
    cargo: HashMap<Uuid, Cargo>,
    shipments: HashMap<Uuid, Shipment>,
    packages: HashMap<Uuid, ShipmentPackage>,
    deliveries: HashMap<Uuid, Delivery>,
    failing_deliveries: HashSet<Uuid>,
}

/// In-memory implementation of every repository trait. Backs tests and local runs.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| "in-memory repository poisoned".into())
    }

    pub fn insert_shipment(&self, shipment: Shipment) -> RepoResult<()> {
        self.lock()?.shipments.insert(shipment.id, shipment);
        Ok(())
    }

    pub fn insert_delivery(&self, delivery: Delivery) -> RepoResult<()> {
        self.lock()?.deliveries.insert(delivery.id, delivery);
        Ok(())
    }

    /// Make every subsequent `update_delivery` for this id fail.
    pub fn fail_updates_for(&self, delivery_id: Uuid) -> RepoResult<()> {
        self.lock()?.failing_deliveries.insert(delivery_id);
        Ok(())
    }
}

fn sorted<T: Clone>(
    mut items: Vec<T>,
    key: impl Fn(&T) -> (chrono::DateTime<Utc>, Uuid),
) -> Vec<T> {
    items.sort_by_key(|i| key(i));
    items
}

fn take(items: Vec<Cargo>, limit: i64) -> Vec<Cargo> {
    let mut items = sorted(items, |c| (c.created_at, c.id));
    items.truncate(limit.max(0) as usize);
    items
}

#[async_trait]
impl CargoRepository for InMemoryRepository {
    async fn get_cargo(&self, id: Uuid) -> RepoResult<Option<Cargo>> {
        Ok(self.lock()?.cargo.get(&id).cloned())
    }

    async fn find_open_cargo(
        &self,
        store_id: Uuid,
        provider_id: ProviderId,
    ) -> RepoResult<Option<Cargo>> {
        let state = self.lock()?;
        let open = state
            .cargo
            .values()
            .filter(|c| {
                c.store_id == store_id
                    && c.provider_id == provider_id
                    && c.status == CargoStatus::Created
                    && !c.is_canceled
                    && c.external_id.is_none()
            })
            .cloned()
            .collect();
        Ok(take(open, 1).into_iter().next())
    }

    async fn insert_cargo(&self, cargo: &Cargo) -> RepoResult<()> {
        self.lock()?.cargo.insert(cargo.id, cargo.clone());
        Ok(())
    }

    async fn update_cargo(&self, cargo: &Cargo) -> RepoResult<()> {
        let mut state = self.lock()?;
        if !state.cargo.contains_key(&cargo.id) {
            return Err(format!("cargo {} does not exist", cargo.id).into());
        }
        state.cargo.insert(cargo.id, cargo.clone());
        Ok(())
    }

    async fn cancel_and_detach(&self, cargo: &Cargo) -> RepoResult<Vec<Uuid>> {
        let mut state = self.lock()?;
        if !state.cargo.contains_key(&cargo.id) {
            return Err(format!("cargo {} does not exist", cargo.id).into());
        }
        let now = Utc::now();
        let mut detached = Vec::new();
        for shipment in state.shipments.values_mut() {
            if shipment.cargo_id == Some(cargo.id) {
                shipment.cargo_id = None;
                shipment.updated_at = now;
                detached.push(shipment.id);
            }
        }
        state.cargo.insert(cargo.id, cargo.clone());
        Ok(detached)
    }

    async fn list_unscheduled(&self, limit: i64) -> RepoResult<Vec<Cargo>> {
        let state = self.lock()?;
        let items = state
            .cargo
            .values()
            .filter(|c| {
                c.status == CargoStatus::Created && !c.is_canceled && c.external_id.is_none()
            })
            .cloned()
            .collect();
        Ok(take(items, limit))
    }

    async fn list_by_intake_date(&self, date: NaiveDate, limit: i64) -> RepoResult<Vec<Cargo>> {
        let state = self.lock()?;
        let items = state
            .cargo
            .values()
            .filter(|c| !c.is_canceled && c.external_id.is_some() && c.intake_date == Some(date))
            .cloned()
            .collect();
        Ok(take(items, limit))
    }

    async fn list_scheduled(&self, providers: &[ProviderId], limit: i64) -> RepoResult<Vec<Cargo>> {
        let state = self.lock()?;
        let items = state
            .cargo
            .values()
            .filter(|c| {
                c.status == CargoStatus::Created
                    && !c.is_canceled
                    && c.external_id.is_some()
                    && providers.contains(&c.provider_id)
            })
            .cloned()
            .collect();
        Ok(take(items, limit))
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryRepository {
    async fn get_shipment(&self, id: Uuid) -> RepoResult<Option<Shipment>> {
        Ok(self.lock()?.shipments.get(&id).cloned())
    }

    async fn list_by_cargo(&self, cargo_id: Uuid) -> RepoResult<Vec<Shipment>> {
        let state = self.lock()?;
        let items = state
            .shipments
            .values()
            .filter(|s| s.cargo_id == Some(cargo_id))
            .cloned()
            .collect();
        Ok(sorted(items, |s: &Shipment| (s.created_at, s.id)))
    }

    async fn list_by_delivery(&self, delivery_id: Uuid) -> RepoResult<Vec<Shipment>> {
        let state = self.lock()?;
        let items = state
            .shipments
            .values()
            .filter(|s| s.delivery_id == delivery_id)
            .cloned()
            .collect();
        Ok(sorted(items, |s: &Shipment| (s.created_at, s.id)))
    }

    async fn update_shipment(&self, shipment: &Shipment) -> RepoResult<()> {
        let mut state = self.lock()?;
        if !state.shipments.contains_key(&shipment.id) {
            return Err(format!("shipment {} does not exist", shipment.id).into());
        }
        state.shipments.insert(shipment.id, shipment.clone());
        Ok(())
    }

    async fn delete_shipment(&self, id: Uuid) -> RepoResult<()> {
        let mut state = self.lock()?;
        if state.packages.values().any(|p| p.shipment_id == id) {
            return Err(format!("shipment {} still has packages", id).into());
        }
        state.shipments.remove(&id);
        Ok(())
    }

    async fn touch_shipments(&self, ids: &[Uuid]) -> RepoResult<()> {
        let mut state = self.lock()?;
        let now = Utc::now();
        for id in ids {
            if let Some(shipment) = state.shipments.get_mut(id) {
                shipment.updated_at = now;
            }
        }
        Ok(())
    }

    async fn list_packages(&self, shipment_id: Uuid) -> RepoResult<Vec<ShipmentPackage>> {
        let state = self.lock()?;
        let mut items: Vec<ShipmentPackage> = state
            .packages
            .values()
            .filter(|p| p.shipment_id == shipment_id)
            .cloned()
            .collect();
        items.sort_by_key(|p| p.id);
        Ok(items)
    }

    async fn save_package(&self, package: &ShipmentPackage) -> RepoResult<()> {
        self.lock()?.packages.insert(package.id, package.clone());
        Ok(())
    }

    async fn delete_packages(&self, shipment_id: Uuid) -> RepoResult<u64> {
        let mut state = self.lock()?;
        let before = state.packages.len();
        state.packages.retain(|_, p| p.shipment_id != shipment_id);
        Ok((before - state.packages.len()) as u64)
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryRepository {
    async fn get_delivery(&self, id: Uuid) -> RepoResult<Option<Delivery>> {
        Ok(self.lock()?.deliveries.get(&id).cloned())
    }

    async fn update_delivery(&self, delivery: &Delivery) -> RepoResult<()> {
        let mut state = self.lock()?;
        if state.failing_deliveries.contains(&delivery.id) {
            return Err(format!("write rejected for delivery {}", delivery.id).into());
        }
        if !state.deliveries.contains_key(&delivery.id) {
            return Err(format!("delivery {} does not exist", delivery.id).into());
        }
        state.deliveries.insert(delivery.id, delivery.clone());
        Ok(())
    }

    async fn list_for_status_sync(
        &self,
        keyless_providers: &[ProviderId],
        limit: i64,
    ) -> RepoResult<Vec<Delivery>> {
        let state = self.lock()?;
        let items = state
            .deliveries
            .values()
            .filter(|d| {
                !d.is_canceled
                    && !d.status.is_terminal()
                    && (d.external_id.is_some() || keyless_providers.contains(&d.provider_id))
            })
            .cloned()
            .collect();
        let mut items = sorted(items, |d: &Delivery| (d.created_at, d.id));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn list_pending_dispatch(&self, limit: i64) -> RepoResult<Vec<Delivery>> {
        let state = self.lock()?;
        let items = state
            .deliveries
            .values()
            .filter(|d| {
                !d.is_canceled
                    && matches!(d.status, DeliveryStatus::Created | DeliveryStatus::UploadingError)
            })
            .cloned()
            .collect();
        let mut items = sorted(items, |d: &Delivery| (d.created_at, d.id));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}
