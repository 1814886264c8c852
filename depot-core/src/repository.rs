use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Cargo, Delivery, Shipment, ShipmentPackage};
use crate::provider::ProviderId;

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository trait for cargo data access
#[async_trait]
pub trait CargoRepository: Send + Sync {
    async fn get_cargo(&self, id: Uuid) -> RepoResult<Option<Cargo>>;

    /// A not-canceled, not-yet-scheduled cargo collecting shipments for (store, provider).
    async fn find_open_cargo(
        &self,
        store_id: Uuid,
        provider_id: ProviderId,
    ) -> RepoResult<Option<Cargo>>;

    async fn insert_cargo(&self, cargo: &Cargo) -> RepoResult<()>;

    async fn update_cargo(&self, cargo: &Cargo) -> RepoResult<()>;

    /// Persist the canceled cargo and null out `cargo_id` on its shipments in one
    /// transaction. Returns the detached shipment ids.
    async fn cancel_and_detach(&self, cargo: &Cargo) -> RepoResult<Vec<Uuid>>;

    /// Created, not canceled, without a courier call.
    async fn list_unscheduled(&self, limit: i64) -> RepoResult<Vec<Cargo>>;

    /// Not canceled, courier call scheduled for the given date.
    async fn list_by_intake_date(&self, date: NaiveDate, limit: i64) -> RepoResult<Vec<Cargo>>;

    /// Created, not canceled, with a courier call at one of the given providers.
    async fn list_scheduled(&self, providers: &[ProviderId], limit: i64) -> RepoResult<Vec<Cargo>>;
}

/// Repository trait for shipment and package data access
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    async fn get_shipment(&self, id: Uuid) -> RepoResult<Option<Shipment>>;

    async fn list_by_cargo(&self, cargo_id: Uuid) -> RepoResult<Vec<Shipment>>;

    async fn list_by_delivery(&self, delivery_id: Uuid) -> RepoResult<Vec<Shipment>>;

    async fn update_shipment(&self, shipment: &Shipment) -> RepoResult<()>;

    async fn delete_shipment(&self, id: Uuid) -> RepoResult<()>;

    /// Bump `updated_at`; cargo-assignment polling keys off it.
    async fn touch_shipments(&self, ids: &[Uuid]) -> RepoResult<()>;

    async fn list_packages(&self, shipment_id: Uuid) -> RepoResult<Vec<ShipmentPackage>>;

    async fn save_package(&self, package: &ShipmentPackage) -> RepoResult<()>;

    async fn delete_packages(&self, shipment_id: Uuid) -> RepoResult<u64>;
}

/// Repository trait for delivery data access
#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    async fn get_delivery(&self, id: Uuid) -> RepoResult<Option<Delivery>>;

    async fn update_delivery(&self, delivery: &Delivery) -> RepoResult<()>;

    /// Not canceled, not terminal, and either holding an external id or belonging
    /// to one of `keyless_providers`.
    async fn list_for_status_sync(
        &self,
        keyless_providers: &[ProviderId],
        limit: i64,
    ) -> RepoResult<Vec<Delivery>>;

    /// Not canceled, still `Created` or `UploadingError`.
    async fn list_pending_dispatch(&self, limit: i64) -> RepoResult<Vec<Delivery>>;
}
