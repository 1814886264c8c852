use depot_logistics::{
    CargoLifecycleManager, Collaborators, CourierCallScheduler, DeliveryManager,
    DeliveryOrderReconciler, DispatchJobs, PackingService, StatusSyncEngine,
};
use std::sync::Arc;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// The orchestrator components, all sharing one set of collaborators.
#[derive(Clone)]
pub struct Services {
    pub lifecycle: CargoLifecycleManager,
    pub scheduler: CourierCallScheduler,
    pub reconciler: DeliveryOrderReconciler,
    pub deliveries: DeliveryManager,
    pub packing: PackingService,
    pub status_sync: StatusSyncEngine,
    pub jobs: DispatchJobs,
}

impl Services {
    pub fn new(ctx: Collaborators) -> Self {
        Self {
            lifecycle: CargoLifecycleManager::new(ctx.clone()),
            scheduler: CourierCallScheduler::new(ctx.clone()),
            reconciler: DeliveryOrderReconciler::new(ctx.clone()),
            deliveries: DeliveryManager::new(ctx.clone()),
            packing: PackingService::new(ctx.clone()),
            status_sync: StatusSyncEngine::new(ctx.clone()),
            jobs: DispatchJobs::new(ctx),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub auth: AuthConfig,
    pub metrics: Arc<Metrics>,
    /// Default batch size for operator-triggered runs.
    pub batch_limit: i64,
}
