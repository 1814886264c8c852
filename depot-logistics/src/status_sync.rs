use chrono::{DateTime, Utc};
use depot_core::gateway::StatusRecord;
use depot_core::provider::StatusKey;
use depot_core::{CoreError, CoreResult, Delivery, DeliveryStatus, PaymentStatus, ProviderId};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::Collaborators;

/// Summary of one status sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub candidates: usize,
    /// Deliveries whose status, payment, identifiers or error changed.
    pub updated: usize,
    /// Matched deliveries where only the mirrored provider status was refreshed.
    pub unchanged: usize,
    /// Records for unknown keys or reported as unsuccessful.
    pub ignored: usize,
    pub persist_failures: usize,
    pub failed_providers: Vec<ProviderId>,
}

#[derive(Default)]
struct GroupOutcome {
    updated: usize,
    unchanged: usize,
    ignored: usize,
    persist_failures: usize,
    failed: Option<ProviderId>,
}

/// Polls providers for delivery statuses and folds them into the delivery state machine.
#[derive(Clone)]
pub struct StatusSyncEngine {
    ctx: Collaborators,
}

impl StatusSyncEngine {
    pub fn new(ctx: Collaborators) -> Self {
        Self { ctx }
    }

    pub async fn sync(&self, limit: i64) -> CoreResult<SyncReport> {
        self.sync_at(limit, Utc::now()).await
    }

    /// One batch query per provider; groups run concurrently and fail independently.
    pub async fn sync_at(&self, limit: i64, now: DateTime<Utc>) -> CoreResult<SyncReport> {
        let candidates = self
            .ctx
            .deliveries
            .list_for_status_sync(&ProviderId::keyless_status_providers(), limit)
            .await
            .map_err(CoreError::storage)?;

        let mut report = SyncReport { candidates: candidates.len(), ..SyncReport::default() };
        let mut groups: BTreeMap<ProviderId, Vec<Delivery>> = BTreeMap::new();
        for delivery in candidates {
            groups.entry(delivery.provider_id).or_default().push(delivery);
        }

        let outcomes = join_all(
            groups
                .into_iter()
                .map(|(provider, deliveries)| self.sync_group(provider, deliveries, now)),
        )
        .await;

        for outcome in outcomes {
            report.updated += outcome.updated;
            report.unchanged += outcome.unchanged;
            report.ignored += outcome.ignored;
            report.persist_failures += outcome.persist_failures;
            report.failed_providers.extend(outcome.failed);
        }

        info!(
            candidates = report.candidates,
            updated = report.updated,
            ignored = report.ignored,
            failed_providers = report.failed_providers.len(),
            "Status sync finished"
        );
        Ok(report)
    }

    async fn sync_group(
        &self,
        provider: ProviderId,
        mut deliveries: Vec<Delivery>,
        now: DateTime<Utc>,
    ) -> GroupOutcome {
        let mut outcome = GroupOutcome::default();

        let mut by_key: HashMap<String, usize> = HashMap::new();
        for (index, delivery) in deliveries.iter().enumerate() {
            let key = match provider.status_key() {
                StatusKey::ExternalId => delivery.external_id.clone(),
                StatusKey::OrderNumber => Some(delivery.number.clone()),
            };
            let Some(key) = key else { continue };
            if let Some(&first) = by_key.get(&key) {
                warn!(
                    provider = %provider,
                    %key,
                    kept = %deliveries[first].number,
                    dropped = %delivery.number,
                    "Duplicate status key, keeping the first delivery"
                );
                continue;
            }
            by_key.insert(key, index);
        }
        if by_key.is_empty() {
            return outcome;
        }
        let keys: Vec<String> = by_key.keys().cloned().collect();

        let records = match self.ctx.gateway.status_orders(provider, &keys).await {
            Ok(records) => records,
            Err(e) => {
                warn!(provider = %provider, keys = keys.len(), "Status query failed: {}", e);
                self.ctx.reporter.report("delivery.status_sync", &e);
                outcome.failed = Some(provider);
                return outcome;
            }
        };

        for record in records {
            let Some(&index) = by_key.get(&record.key) else {
                debug!(
                    provider = %provider,
                    key = %record.key,
                    "Status for unknown delivery ignored"
                );
                outcome.ignored += 1;
                continue;
            };
            if !record.success {
                debug!(
                    provider = %provider,
                    key = %record.key,
                    message = ?record.message,
                    "Unsuccessful status record"
                );
                outcome.ignored += 1;
                continue;
            }

            let delivery = &mut deliveries[index];
            let changed = apply_status(delivery, &record, now);
            if let Err(e) = self.ctx.deliveries.update_delivery(delivery).await {
                warn!(delivery = %delivery.number, "Failed to persist synced status: {}", e);
                self.ctx.reporter.report("delivery.status_sync", &e);
                outcome.persist_failures += 1;
                continue;
            }

            if changed {
                info!(
                    delivery = %delivery.number,
                    status = %delivery.status,
                    "Delivery status synced"
                );
                outcome.updated += 1;
            } else {
                outcome.unchanged += 1;
            }
        }
        outcome
    }
}

/// Fold one provider status record into a delivery. Returns whether anything
/// beyond the mirrored provider status changed.
pub fn apply_status(delivery: &mut Delivery, record: &StatusRecord, now: DateTime<Utc>) -> bool {
    let mut changed = false;

    if let Some(status) = record.resolve_status(delivery.provider_id) {
        if status != delivery.status {
            delivery.status = status;
            changed = true;
        }
        if delivery.is_postpaid && delivery.payment_status == PaymentStatus::NotPaid {
            let payment = match status {
                DeliveryStatus::Done => Some(PaymentStatus::Paid),
                s if s.times_out_payment() => Some(PaymentStatus::Timeout),
                _ => None,
            };
            if let Some(payment) = payment {
                delivery.payment_status = payment;
                changed = true;
            }
        }
    }

    if let Some(status_xml_id) = &record.status_xml_id {
        delivery.status_xml_id = Some(status_xml_id.clone());
    }
    delivery.status_xml_id_at = Some(record.status_date.unwrap_or(now));

    if let Some(external_id) = &record.external_id {
        if delivery.external_id.as_ref() != Some(external_id) {
            delivery.external_id = Some(external_id.clone());
            changed = true;
        }
    }
    if record.message.is_none() && delivery.error_text.is_some() {
        delivery.error_text = None;
        changed = true;
    }

    if changed {
        delivery.touch();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, GatewayCall};
    use chrono::TimeZone;
    use depot_core::repository::DeliveryRepository;

    fn record(key: &str, status: DeliveryStatus) -> StatusRecord {
        StatusRecord {
            key: key.to_string(),
            success: true,
            status: Some(status),
            status_xml_id: Some(status.as_str().to_string()),
            status_date: Some(Utc.with_ymd_and_hms(2026, 10, 12, 8, 30, 0).unwrap()),
            external_id: None,
            message: None,
        }
    }

    /// A record in the provider's own vocabulary, as the gateway relays it untouched.
    fn raw(key: &str, code: &str) -> StatusRecord {
        StatusRecord {
            key: key.to_string(),
            success: true,
            status: None,
            status_xml_id: Some(code.to_string()),
            status_date: None,
            external_id: None,
            message: None,
        }
    }

    async fn tracked(
        fx: &Fixture,
        number: &str,
        provider: ProviderId,
        external_id: Option<&str>,
    ) -> Delivery {
        let mut delivery = fx.delivery(number, provider);
        delivery.external_id = external_id.map(str::to_string);
        delivery.status = DeliveryStatus::Uploaded;
        fx.repo.update_delivery(&delivery).await.unwrap();
        delivery
    }

    #[tokio::test]
    async fn test_unknown_keys_are_ignored_and_the_rest_applied() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let quiet = tracked(&fx, "1001-1", ProviderId::Cdek, Some("c-1")).await;
        let moving = tracked(&fx, "1001-2", ProviderId::Cdek, Some("c-2")).await;
        fx.gateway.set_status_reply(
            ProviderId::Cdek,
            Ok(vec![record("c-404", DeliveryStatus::Done), record("c-2", DeliveryStatus::OnWay)]),
        );

        let report = engine.sync(100).await.unwrap();

        assert_eq!(report.ignored, 1);
        assert_eq!(report.updated, 1);
        let moving = fx.repo.get_delivery(moving.id).await.unwrap().unwrap();
        assert_eq!(moving.status, DeliveryStatus::OnWay);
        assert_eq!(fx.repo.get_delivery(quiet.id).await.unwrap().unwrap(), quiet);
    }

    #[tokio::test]
    async fn test_replaying_the_same_answer_changes_nothing() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let delivery = tracked(&fx, "1001-1", ProviderId::Cdek, Some("c-1")).await;
        let answer = record("c-1", DeliveryStatus::Delivering);
        fx.gateway.set_status_reply(ProviderId::Cdek, Ok(vec![answer]));

        let first = engine.sync(100).await.unwrap();
        let after_first = fx.repo.get_delivery(delivery.id).await.unwrap().unwrap();
        let second = engine.sync(100).await.unwrap();
        let after_second = fx.repo.get_delivery(delivery.id).await.unwrap().unwrap();

        assert_eq!(first.updated, 1);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(after_first, after_second);
        assert_eq!(after_second.status_xml_id.as_deref(), Some("DELIVERING"));
    }

    #[tokio::test]
    async fn test_one_provider_outage_does_not_block_others() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        tracked(&fx, "1001-1", ProviderId::Cdek, Some("c-1")).await;
        let dpd = tracked(&fx, "1001-2", ProviderId::Dpd, Some("d-1")).await;
        fx.gateway.set_status_reply(ProviderId::Cdek, Err("503 Service Unavailable".to_string()));
        let answer = record("d-1", DeliveryStatus::OnPointOut);
        fx.gateway.set_status_reply(ProviderId::Dpd, Ok(vec![answer]));

        let report = engine.sync(100).await.unwrap();

        assert_eq!(report.failed_providers, vec![ProviderId::Cdek]);
        assert_eq!(report.updated, 1);
        let dpd = fx.repo.get_delivery(dpd.id).await.unwrap().unwrap();
        assert_eq!(dpd.status, DeliveryStatus::OnPointOut);
        assert_eq!(fx.reporter.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_is_isolated() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let broken = tracked(&fx, "1001-1", ProviderId::Cdek, Some("c-1")).await;
        let fine = tracked(&fx, "1001-2", ProviderId::Cdek, Some("c-2")).await;
        fx.repo.fail_updates_for(broken.id).unwrap();
        fx.gateway.set_status_reply(
            ProviderId::Cdek,
            Ok(vec![record("c-1", DeliveryStatus::OnWay), record("c-2", DeliveryStatus::OnWay)]),
        );

        let report = engine.sync(100).await.unwrap();

        assert_eq!(report.persist_failures, 1);
        assert_eq!(report.updated, 1);
        let fine = fx.repo.get_delivery(fine.id).await.unwrap().unwrap();
        assert_eq!(fine.status, DeliveryStatus::OnWay);
    }

    #[tokio::test]
    async fn test_order_number_keyed_provider_adopts_external_id() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let mut delivery = tracked(&fx, "1001-1", ProviderId::B2cpl, None).await;
        delivery.error_text = Some("timeout while uploading".to_string());
        fx.repo.update_delivery(&delivery).await.unwrap();
        let mut answer = record("1001-1", DeliveryStatus::OnPointIn);
        answer.external_id = Some("b2-77".to_string());
        fx.gateway.set_status_reply(ProviderId::B2cpl, Ok(vec![answer]));

        engine.sync(100).await.unwrap();

        let stored = fx.repo.get_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(stored.external_id.as_deref(), Some("b2-77"));
        assert_eq!(stored.error_text, None);
        assert_eq!(stored.status, DeliveryStatus::OnPointIn);
    }

    #[tokio::test]
    async fn test_cdek_raw_code_completes_postpaid_delivery() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let mut delivery = tracked(&fx, "1001-1", ProviderId::Cdek, Some("c-1")).await;
        delivery.is_postpaid = true;
        fx.repo.update_delivery(&delivery).await.unwrap();
        fx.gateway.set_status_reply(ProviderId::Cdek, Ok(vec![raw("c-1", "DELIVERED")]));

        let report = engine.sync(100).await.unwrap();

        let stored = fx.repo.get_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(stored.status, DeliveryStatus::Done);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.status_xml_id.as_deref(), Some("DELIVERED"));
    }

    #[tokio::test]
    async fn test_b2cpl_raw_code_returns_and_times_out_payment() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let mut delivery = tracked(&fx, "1001-1", ProviderId::B2cpl, None).await;
        delivery.is_postpaid = true;
        fx.repo.update_delivery(&delivery).await.unwrap();
        fx.gateway.set_status_reply(ProviderId::B2cpl, Ok(vec![raw("1001-1", "11")]));

        engine.sync(100).await.unwrap();

        let stored = fx.repo.get_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Returned);
        assert_eq!(stored.payment_status, PaymentStatus::Timeout);
    }

    #[tokio::test]
    async fn test_boxberry_raw_codes_follow_the_return_path() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let refused = tracked(&fx, "1001-1", ProviderId::Boxberry, Some("bb-1")).await;
        let strange = tracked(&fx, "1001-2", ProviderId::Boxberry, Some("bb-2")).await;
        fx.gateway.set_status_reply(
            ProviderId::Boxberry,
            Ok(vec![raw("bb-1", "REFUSED"), raw("bb-2", "SOMETHING_NEW")]),
        );

        engine.sync(100).await.unwrap();

        let refused = fx.repo.get_delivery(refused.id).await.unwrap().unwrap();
        let strange = fx.repo.get_delivery(strange.id).await.unwrap().unwrap();
        assert_eq!(refused.status, DeliveryStatus::ReturnedFromDelivery);
        assert_eq!(refused.payment_status, PaymentStatus::NotPaid);
        assert_eq!(strange.status, DeliveryStatus::Unknown);
        assert_eq!(strange.status_xml_id.as_deref(), Some("SOMETHING_NEW"));
    }

    #[tokio::test]
    async fn test_duplicate_keys_only_update_the_first_delivery() {
        let fx = Fixture::new();
        let engine = StatusSyncEngine::new(fx.collaborators());
        let first = tracked(&fx, "1001-1", ProviderId::Cdek, Some("c-1")).await;
        let second = tracked(&fx, "1001-2", ProviderId::Cdek, Some("c-1")).await;
        fx.gateway.set_status_reply(ProviderId::Cdek, Ok(vec![raw("c-1", "SENT_TO_TRANSIT_CITY")]));

        let report = engine.sync(100).await.unwrap();

        assert_eq!(report.updated, 1);
        assert!(fx.gateway.calls().iter().any(|call| matches!(
            call,
            GatewayCall::StatusOrders(ProviderId::Cdek, keys) if keys == &["c-1".to_string()]
        )));
        let statuses = [
            fx.repo.get_delivery(first.id).await.unwrap().unwrap().status,
            fx.repo.get_delivery(second.id).await.unwrap().unwrap().status,
        ];
        assert_eq!(statuses.iter().filter(|s| **s == DeliveryStatus::OnWay).count(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == DeliveryStatus::Uploaded).count(), 1);
    }

    #[test]
    fn test_postpaid_payment_follows_final_status() {
        let now = Utc::now();
        let mut paid =
            Delivery::new(uuid::Uuid::new_v4(), "1-1", ProviderId::Cdek, Default::default());
        paid.is_postpaid = true;
        let mut timed_out = paid.clone();
        let mut prepaid = paid.clone();
        prepaid.is_postpaid = false;

        apply_status(&mut paid, &record("k", DeliveryStatus::Done), now);
        apply_status(&mut timed_out, &record("k", DeliveryStatus::Cancel), now);
        apply_status(&mut prepaid, &record("k", DeliveryStatus::Done), now);

        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(timed_out.payment_status, PaymentStatus::Timeout);
        assert_eq!(prepaid.payment_status, PaymentStatus::NotPaid);
    }

    #[test]
    fn test_missing_status_date_uses_now() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let mut delivery =
            Delivery::new(uuid::Uuid::new_v4(), "1-1", ProviderId::Cdek, Default::default());
        let mut answer = record("k", DeliveryStatus::OnWay);
        answer.status_date = None;

        apply_status(&mut delivery, &answer, now);

        assert_eq!(delivery.status_xml_id_at, Some(now));
    }
}
