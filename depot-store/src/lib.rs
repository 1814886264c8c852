pub mod app_config;
pub mod cargo_repo;
pub mod database;
pub mod delivery_repo;
pub mod directory_client;
pub mod events;
pub mod gateway_client;
pub mod redis_repo;
pub mod shipment_repo;

pub use app_config::Config;
pub use cargo_repo::StoreCargoRepository;
pub use database::DbClient;
pub use delivery_repo::StoreDeliveryRepository;
pub use directory_client::HttpStoreDirectory;
pub use events::{EventProducer, KafkaNotificationSink};
pub use gateway_client::HttpLogisticsGateway;
pub use redis_repo::{CachedStoreDirectory, RedisClient};
pub use shipment_repo::StoreShipmentRepository;
