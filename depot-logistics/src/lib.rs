pub mod dimensions;
pub mod cargo;
pub mod packing;
pub mod courier;
pub mod delivery;
pub mod reconciler;
pub mod status_sync;
pub mod jobs;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use depot_core::directory::StoreDirectory;
use depot_core::gateway::LogisticsGateway;
use depot_core::notify::NotificationSink;
use depot_core::observability::ErrorReporter;
use depot_core::repository::{CargoRepository, DeliveryRepository, ShipmentRepository};

pub use cargo::{CargoLifecycleManager, IntakeCheck};
pub use courier::CourierCallScheduler;
pub use delivery::DeliveryManager;
pub use jobs::{DispatchJobs, JobSummary};
pub use dimensions::DimensionAggregator;
pub use packing::PackingService;
pub use reconciler::{DeliveryOrderReconciler, DispatchOutcome};
pub use status_sync::{StatusSyncEngine, SyncReport};

/// Everything the orchestrator talks to, injected explicitly.
#[derive(Clone)]
pub struct Collaborators {
    pub cargo: Arc<dyn CargoRepository>,
    pub shipments: Arc<dyn ShipmentRepository>,
    pub deliveries: Arc<dyn DeliveryRepository>,
    pub directory: Arc<dyn StoreDirectory>,
    pub gateway: Arc<dyn LogisticsGateway>,
    pub notifier: Arc<dyn NotificationSink>,
    pub reporter: Arc<dyn ErrorReporter>,
}
