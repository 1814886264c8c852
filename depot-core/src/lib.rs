pub mod models;
pub mod provider;
pub mod gateway;
pub mod directory;
pub mod notify;
pub mod observability;
pub mod repository;
pub mod memory;

pub use models::{
    Address, BasketItem, Cargo, CargoStatus, Delivery, DeliveryStatus, Dimensions, PackageItem,
    PaymentStatus, Recipient, Shipment, ShipmentPackage, ShipmentStatus, TimeWindow,
};
pub use provider::ProviderId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Wraps a boxed repository/adapter error.
    pub fn storage(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Storage(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
