use depot_core::observability::{ErrorReporter, TracingErrorReporter};
use depot_logistics::JobSummary;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::fmt::Display;
use std::sync::Arc;

/// Process metrics, exported on `/metrics`.
pub struct Metrics {
    registry: Registry,
    reported_errors: IntCounterVec,
    job_runs: IntCounterVec,
    job_item_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reported_errors = IntCounterVec::new(
            Opts::new("depot_reported_errors_total", "Errors passed to the error reporter"),
            &["context"],
        )?;
        let job_runs = IntCounterVec::new(
            Opts::new("depot_job_runs_total", "Completed periodic job runs"),
            &["job"],
        )?;
        let job_item_failures = IntCounterVec::new(
            Opts::new("depot_job_item_failures_total", "Items that failed inside a job run"),
            &["job"],
        )?;

        registry.register(Box::new(reported_errors.clone()))?;
        registry.register(Box::new(job_runs.clone()))?;
        registry.register(Box::new(job_item_failures.clone()))?;

        Ok(Self {
            registry,
            reported_errors,
            job_runs,
            job_item_failures,
        })
    }

    pub fn record_error(&self, context: &str) {
        self.reported_errors.with_label_values(&[context]).inc();
    }

    pub fn record_job(&self, summary: &JobSummary) {
        self.job_runs.with_label_values(&[summary.job]).inc();
        self.job_item_failures
            .with_label_values(&[summary.job])
            .inc_by(summary.failed as u64);
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| e.to_string())?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Logs through `tracing` and counts by context.
pub struct MetricsReporter {
    inner: TracingErrorReporter,
    metrics: Arc<Metrics>,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            inner: TracingErrorReporter,
            metrics,
        }
    }
}

impl ErrorReporter for MetricsReporter {
    fn report(&self, context: &str, error: &dyn Display) {
        self.metrics.record_error(context);
        self.inner.report(context, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_counts_by_context() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let reporter = MetricsReporter::new(metrics.clone());

        reporter.report("cargo.cancel", &"provider unavailable");
        reporter.report("cargo.cancel", &"provider unavailable");

        let text = metrics.render().unwrap();
        assert!(text.contains("depot_reported_errors_total{context=\"cargo.cancel\"} 2"));
    }

    #[test]
    fn test_job_failures_accumulate() {
        let metrics = Metrics::new().unwrap();
        let summary = JobSummary { job: "delivery_dispatch", processed: 3, skipped: 0, failed: 2 };

        metrics.record_job(&summary);
        metrics.record_job(&summary);

        let text = metrics.render().unwrap();
        assert!(text.contains("depot_job_runs_total{job=\"delivery_dispatch\"} 2"));
        assert!(text.contains("depot_job_item_failures_total{job=\"delivery_dispatch\"} 4"));
    }
}
