use depot_core::CoreResult;
use depot_logistics::jobs::{
    JOB_COURIER_CALLS, JOB_COURIER_STATUS, JOB_DELIVERY_DISPATCH, JOB_INTAKE_VALIDITY,
    JOB_STATUS_SYNC,
};
use depot_logistics::{DispatchJobs, JobSummary};
use depot_store::app_config::JobsConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    CourierCalls,
    IntakeValidity,
    CourierStatus,
    DeliveryDispatch,
    StatusSync,
}

impl Job {
    pub const ALL: [Job; 5] = [
        Job::CourierCalls,
        Job::IntakeValidity,
        Job::CourierStatus,
        Job::DeliveryDispatch,
        Job::StatusSync,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Job::CourierCalls => JOB_COURIER_CALLS,
            Job::IntakeValidity => JOB_INTAKE_VALIDITY,
            Job::CourierStatus => JOB_COURIER_STATUS,
            Job::DeliveryDispatch => JOB_DELIVERY_DISPATCH,
            Job::StatusSync => JOB_STATUS_SYNC,
        }
    }

    /// `None` when the interval is configured as zero.
    pub fn interval(&self, config: &JobsConfig) -> Option<Duration> {
        let seconds = match self {
            Job::CourierCalls => config.courier_calls_interval_seconds,
            Job::IntakeValidity => config.intake_validity_interval_seconds,
            Job::CourierStatus => config.courier_status_interval_seconds,
            Job::DeliveryDispatch => config.delivery_dispatch_interval_seconds,
            Job::StatusSync => config.status_sync_interval_seconds,
        };
        (seconds > 0).then(|| Duration::from_secs(seconds))
    }

    pub async fn run(&self, jobs: &DispatchJobs, limit: i64) -> CoreResult<JobSummary> {
        match self {
            Job::CourierCalls => jobs.courier_calls(limit).await,
            Job::IntakeValidity => jobs.intake_validity(limit).await,
            Job::CourierStatus => jobs.courier_status(limit).await,
            Job::DeliveryDispatch => jobs.delivery_dispatch(limit).await,
            Job::StatusSync => jobs.status_sync(limit).await,
        }
    }
}

/// One background loop per enabled job. A run never overlaps the previous one
/// of the same job; ticks missed while a run is in flight are delayed.
pub fn spawn_all(
    jobs: DispatchJobs,
    config: &JobsConfig,
    metrics: Arc<Metrics>,
) -> Vec<JoinHandle<()>> {
    Job::ALL
        .into_iter()
        .filter_map(|job| {
            let period = match job.interval(config) {
                Some(period) => period,
                None => {
                    info!(job = job.name(), "job disabled");
                    return None;
                }
            };
            let jobs = jobs.clone();
            let metrics = metrics.clone();
            let limit = config.batch_limit;

            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                info!(job = job.name(), every_secs = period.as_secs(), "job scheduled");
                loop {
                    ticker.tick().await;
                    match job.run(&jobs, limit).await {
                        Ok(summary) => metrics.record_job(&summary),
                        Err(e) => {
                            metrics.record_error(&format!("job.{}", job.name()));
                            error!(job = job.name(), "job run failed: {}", e);
                        }
                    }
                }
            }))
        })
        .collect()
}
