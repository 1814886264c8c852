use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use depot_core::{CoreError, CoreResult, ProviderId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cargo::CargoLifecycleManager;
use crate::courier::CourierCallScheduler;
use crate::reconciler::DeliveryOrderReconciler;
use crate::status_sync::StatusSyncEngine;
use crate::Collaborators;

pub const JOB_COURIER_CALLS: &str = "courier_calls";
pub const JOB_INTAKE_VALIDITY: &str = "intake_validity";
pub const JOB_COURIER_STATUS: &str = "courier_status";
pub const JOB_DELIVERY_DISPATCH: &str = "delivery_dispatch";
pub const JOB_STATUS_SYNC: &str = "status_sync";

/// Counters of one job run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub job: &'static str,
    pub processed: usize,
    /// Items the job had no business touching (e.g. a cargo that emptied in the meantime).
    pub skipped: usize,
    pub failed: usize,
}

impl JobSummary {
    fn new(job: &'static str) -> Self {
        Self { job, ..Self::default() }
    }

    fn record<T>(&mut self, item: impl std::fmt::Display, result: CoreResult<T>) {
        match result {
            Ok(_) => self.processed += 1,
            Err(CoreError::InvalidState(reason)) => {
                debug!(job = self.job, %item, "skipped: {}", reason);
                self.skipped += 1;
            }
            Err(e) => {
                warn!(job = self.job, %item, "item failed: {}", e);
                self.failed += 1;
            }
        }
    }

    fn log(self) -> Self {
        info!(
            job = self.job,
            processed = self.processed,
            skipped = self.skipped,
            failed = self.failed,
            "job finished"
        );
        self
    }
}

/// Periodic batch work. Every job takes a bounded snapshot and walks it
/// sequentially; one item failing never stops the rest.
#[derive(Clone)]
pub struct DispatchJobs {
    ctx: Collaborators,
    lifecycle: CargoLifecycleManager,
    scheduler: CourierCallScheduler,
    reconciler: DeliveryOrderReconciler,
    sync: StatusSyncEngine,
}

impl DispatchJobs {
    pub fn new(ctx: Collaborators) -> Self {
        Self {
            lifecycle: CargoLifecycleManager::new(ctx.clone()),
            scheduler: CourierCallScheduler::new(ctx.clone()),
            reconciler: DeliveryOrderReconciler::new(ctx.clone()),
            sync: StatusSyncEngine::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn courier_calls(&self, limit: i64) -> CoreResult<JobSummary> {
        self.courier_calls_at(limit, Local::now().naive_local()).await
    }

    /// Book a courier for every open cargo that has none yet.
    pub async fn courier_calls_at(&self, limit: i64, now: NaiveDateTime) -> CoreResult<JobSummary> {
        let open = self.ctx.cargo.list_unscheduled(limit).await.map_err(CoreError::storage)?;
        let mut summary = JobSummary::new(JOB_COURIER_CALLS);
        for cargo in open {
            let result = self.scheduler.create_courier_call_at(cargo.id, now).await;
            summary.record(cargo.id, result);
        }
        Ok(summary.log())
    }

    pub async fn intake_validity(&self, limit: i64) -> CoreResult<JobSummary> {
        self.intake_validity_on(limit, Local::now().date_naive()).await
    }

    /// Re-check every cargo whose courier comes `today`.
    pub async fn intake_validity_on(&self, limit: i64, today: NaiveDate) -> CoreResult<JobSummary> {
        let due = self
            .ctx
            .cargo
            .list_by_intake_date(today, limit)
            .await
            .map_err(CoreError::storage)?;
        let mut summary = JobSummary::new(JOB_INTAKE_VALIDITY);
        for cargo in due {
            let result = self.lifecycle.check_intake_day_validity(cargo.id, today).await;
            summary.record(cargo.id, result);
        }
        Ok(summary.log())
    }

    /// Poll providers that report courier-call faults after accepting the call.
    pub async fn courier_status(&self, limit: i64) -> CoreResult<JobSummary> {
        let scheduled = self
            .ctx
            .cargo
            .list_scheduled(&ProviderId::async_courier_fault_providers(), limit)
            .await
            .map_err(CoreError::storage)?;
        let mut summary = JobSummary::new(JOB_COURIER_STATUS);
        for cargo in scheduled {
            let result = self.scheduler.check_external_status(cargo.id).await;
            summary.record(cargo.id, result);
        }
        Ok(summary.log())
    }

    /// Upload new and previously failed deliveries. A delivery whose shipments
    /// are not assembled yet is skipped until a later run.
    pub async fn delivery_dispatch(&self, limit: i64) -> CoreResult<JobSummary> {
        let pending = self
            .ctx
            .deliveries
            .list_pending_dispatch(limit)
            .await
            .map_err(CoreError::storage)?;
        let mut summary = JobSummary::new(JOB_DELIVERY_DISPATCH);
        for delivery in pending {
            match self.reconciler.dispatch(delivery.id).await {
                Ok(outcome) if !outcome.success => {
                    warn!(
                        job = JOB_DELIVERY_DISPATCH,
                        delivery = %delivery.number,
                        "upload failed: {}",
                        outcome.delivery.error_text.as_deref().unwrap_or("unknown error")
                    );
                    summary.failed += 1;
                }
                result => summary.record(&delivery.number, result),
            }
        }
        Ok(summary.log())
    }

    pub async fn status_sync(&self, limit: i64) -> CoreResult<JobSummary> {
        self.status_sync_at(limit, Utc::now()).await
    }

    pub async fn status_sync_at(&self, limit: i64, now: DateTime<Utc>) -> CoreResult<JobSummary> {
        let report = self.sync.sync_at(limit, now).await?;
        let summary = JobSummary {
            job: JOB_STATUS_SYNC,
            processed: report.updated + report.unchanged,
            skipped: report.ignored,
            failed: report.persist_failures + report.failed_providers.len(),
        };
        Ok(summary.log())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, GatewayCall};
    use chrono::{NaiveTime, Weekday};
    use depot_core::gateway::StatusRecord;
    use depot_core::repository::{CargoRepository, DeliveryRepository};
    use depot_core::{DeliveryStatus, ShipmentStatus};

    fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_isoywd_opt(2026, 43, Weekday::Mon)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_courier_calls_isolates_failures() {
        let fx = Fixture::new();
        let jobs = DispatchJobs::new(fx.collaborators());
        let lifecycle = CargoLifecycleManager::new(fx.collaborators());

        let delivery = fx.delivery("1001-1", ProviderId::Dpd);
        let loaded = fx.shipment("S-1", &delivery, ShipmentStatus::Assembling, 1.0, 1);
        let booked = lifecycle.attach_to_cargo(loaded.id, ProviderId::Dpd).await.unwrap();

        // an empty cargo of another provider is skipped, not failed
        let other = fx.delivery("1002-1", ProviderId::Cdek);
        let spare = fx.shipment("S-2", &other, ShipmentStatus::New, 1.0, 1);
        lifecycle.create_cargo(&spare, ProviderId::Cdek).await.unwrap();

        fx.gateway.courier_ok("intake-1");

        let summary = jobs.courier_calls_at(10, monday_morning()).await.unwrap();

        assert_eq!(
            summary,
            JobSummary { job: JOB_COURIER_CALLS, processed: 1, skipped: 1, failed: 0 }
        );
        let cargo = fx.repo.get_cargo(booked.id).await.unwrap().unwrap();
        assert_eq!(cargo.external_id.as_deref(), Some("intake-1"));
    }

    #[tokio::test]
    async fn test_delivery_dispatch_counts_rejections_as_failures() {
        let fx = Fixture::new();
        let jobs = DispatchJobs::new(fx.collaborators());

        let ready = fx.delivery("1001-1", ProviderId::Dpd);
        fx.shipment("S-1", &ready, ShipmentStatus::Assembled, 1.0, 1);
        let waiting = fx.delivery("1002-1", ProviderId::Dpd);
        fx.shipment("S-2", &waiting, ShipmentStatus::Assembling, 1.0, 1);
        fx.gateway.order_rejected("address not serviced");

        let summary = jobs.delivery_dispatch(10).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        let stored = fx.repo.get_delivery(ready.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::UploadingError);
        assert_eq!(
            fx.gateway.calls().iter().filter(|c| matches!(c, GatewayCall::CreateOrder(_))).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_status_sync_summary_folds_report() {
        let fx = Fixture::new();
        let jobs = DispatchJobs::new(fx.collaborators());

        let mut delivery = fx.delivery("1001-1", ProviderId::Cdek);
        delivery.external_id = Some("cdek-1".to_string());
        delivery.status = DeliveryStatus::Uploaded;
        fx.repo.update_delivery(&delivery).await.unwrap();
        fx.gateway.set_status_reply(
            ProviderId::Cdek,
            Ok(vec![StatusRecord {
                key: "cdek-1".to_string(),
                success: true,
                status: Some(DeliveryStatus::OnWay),
                status_xml_id: Some("SENT_TO_TRANSIT_CITY".to_string()),
                status_date: None,
                external_id: None,
                message: None,
            }]),
        );

        let summary = jobs.status_sync_at(10, Utc::now()).await.unwrap();

        assert_eq!(
            summary,
            JobSummary { job: JOB_STATUS_SYNC, processed: 1, skipped: 0, failed: 0 }
        );
    }
}
