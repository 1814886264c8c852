use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::cargo_repo::StoreCargoRepository;
use crate::delivery_repo::StoreDeliveryRepository;
use crate::shipment_repo::StoreShipmentRepository;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    pub fn cargo_repository(&self) -> StoreCargoRepository {
        StoreCargoRepository::new(self.pool.clone())
    }

    pub fn shipment_repository(&self) -> StoreShipmentRepository {
        StoreShipmentRepository::new(self.pool.clone())
    }

    pub fn delivery_repository(&self) -> StoreDeliveryRepository {
        StoreDeliveryRepository::new(self.pool.clone())
    }
}
