use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use depot_core::repository::{DeliveryRepository, RepoResult};
use depot_core::{
    Address, Delivery, DeliveryStatus, PaymentStatus, ProviderId, Recipient, TimeWindow,
};
use depot_shared::Masked;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

const DELIVERY_COLUMNS: &str = "id, order_id, number, provider_id, status, \
     status_xml_id, status_xml_id_at, payment_status, is_postpaid, is_canceled, \
     external_id, tracknumber, barcode, error_text, \
     recipient_name, recipient_phone, recipient_email, address, point_id, tariff_id, \
     delivery_date, window_from, window_to, delivery_cost, created_at, updated_at";

pub struct StoreDeliveryRepository {
    pool: PgPool,
}

impl StoreDeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    order_id: Uuid,
    number: String,
    provider_id: String,
    status: String,
    status_xml_id: Option<String>,
    status_xml_id_at: Option<DateTime<Utc>>,
    payment_status: String,
    is_postpaid: bool,
    is_canceled: bool,
    external_id: Option<String>,
    tracknumber: Option<String>,
    barcode: Option<String>,
    error_text: Option<String>,
    recipient_name: String,
    recipient_phone: String,
    recipient_email: Option<String>,
    address: Option<Json<Address>>,
    point_id: Option<String>,
    tariff_id: Option<String>,
    delivery_date: Option<NaiveDate>,
    window_from: Option<NaiveTime>,
    window_to: Option<NaiveTime>,
    delivery_cost: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_delivery(self) -> RepoResult<Delivery> {
        Ok(Delivery {
            id: self.id,
            order_id: self.order_id,
            number: self.number,
            provider_id: self.provider_id.parse::<ProviderId>()?,
            status: self.status.parse::<DeliveryStatus>()?,
            status_xml_id: self.status_xml_id,
            status_xml_id_at: self.status_xml_id_at,
            payment_status: self.payment_status.parse::<PaymentStatus>()?,
            is_postpaid: self.is_postpaid,
            is_canceled: self.is_canceled,
            external_id: self.external_id,
            tracknumber: self.tracknumber,
            barcode: self.barcode,
            error_text: self.error_text,
            recipient: Recipient {
                name: Masked::new(self.recipient_name),
                phone: Masked::new(self.recipient_phone),
                email: self.recipient_email.map(Masked::new),
            },
            address: self.address.map(|Json(address)| address),
            point_id: self.point_id,
            tariff_id: self.tariff_id,
            delivery_date: self.delivery_date,
            time_window: match (self.window_from, self.window_to) {
                (Some(from), Some(to)) => Some(TimeWindow::new(from, to)),
                _ => None,
            },
            delivery_cost: self.delivery_cost,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl DeliveryRepository for StoreDeliveryRepository {
    async fn get_delivery(&self, id: Uuid) -> RepoResult<Option<Delivery>> {
        let sql = format!("SELECT {} FROM deliveries WHERE id = $1", DELIVERY_COLUMNS);
        let row = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DeliveryRow::into_delivery).transpose()
    }

    /// Recipient, address and order linkage are owned by checkout and never rewritten here.
    async fn update_delivery(&self, delivery: &Delivery) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries SET
                status = $2, status_xml_id = $3, status_xml_id_at = $4, payment_status = $5,
                is_canceled = $6, external_id = $7, tracknumber = $8, barcode = $9,
                error_text = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.status.as_str())
        .bind(delivery.status_xml_id.as_deref())
        .bind(delivery.status_xml_id_at)
        .bind(delivery.payment_status.as_str())
        .bind(delivery.is_canceled)
        .bind(delivery.external_id.as_deref())
        .bind(delivery.tracknumber.as_deref())
        .bind(delivery.barcode.as_deref())
        .bind(delivery.error_text.as_deref())
        .bind(delivery.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("delivery {} does not exist", delivery.id).into());
        }
        Ok(())
    }

    async fn list_for_status_sync(
        &self,
        keyless_providers: &[ProviderId],
        limit: i64,
    ) -> RepoResult<Vec<Delivery>> {
        let keyless: Vec<&str> = keyless_providers.iter().map(|p| p.as_str()).collect();
        let sql = format!(
            "SELECT {} FROM deliveries \
             WHERE NOT is_canceled AND status NOT IN ('DONE', 'RETURNED') \
             AND (external_id IS NOT NULL OR provider_id = ANY($1)) \
             ORDER BY updated_at, id LIMIT $2",
            DELIVERY_COLUMNS
        );
        let rows = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(keyless)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(DeliveryRow::into_delivery).collect()
    }

    async fn list_pending_dispatch(&self, limit: i64) -> RepoResult<Vec<Delivery>> {
        let sql = format!(
            "SELECT {} FROM deliveries \
             WHERE NOT is_canceled AND status IN ('CREATED', 'UPLOADING_ERROR') \
             ORDER BY created_at, id LIMIT $1",
            DELIVERY_COLUMNS
        );
        let rows = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(DeliveryRow::into_delivery).collect()
    }
}
