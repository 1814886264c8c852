use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::repository::{RepoResult, ShipmentRepository};
use depot_core::{
    BasketItem, Dimensions, PackageItem, ProviderId, Shipment, ShipmentPackage, ShipmentStatus,
};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

const SHIPMENT_COLUMNS: &str = "id, number, delivery_id, merchant_id, store_id, cargo_id, \
     status, provider_override, created_at, updated_at";

/// Shipments, their basket lines and packages.
///
/// Basket lines are written when the order is split into shipments; this
/// repository only reads them.
pub struct StoreShipmentRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    number: String,
    delivery_id: Uuid,
    merchant_id: Uuid,
    store_id: Uuid,
    cargo_id: Option<Uuid>,
    status: String,
    provider_override: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    shipment_id: Uuid,
    sku: String,
    name: String,
    quantity: i32,
    price: i64,
    cost: i64,
    weight: f64,
    width: f64,
    height: f64,
    length: f64,
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    id: Uuid,
    shipment_id: Uuid,
    width: f64,
    height: f64,
    length: f64,
    weight: f64,
    wrapper_weight: f64,
    external_code: Option<String>,
}

#[derive(sqlx::FromRow)]
struct PackageItemRow {
    package_id: Uuid,
    basket_item_id: Uuid,
    quantity: i32,
}

impl ItemRow {
    fn into_item(self) -> RepoResult<BasketItem> {
        Ok(BasketItem {
            id: self.id,
            sku: self.sku,
            name: self.name,
            quantity: u32::try_from(self.quantity)?,
            price: self.price,
            cost: self.cost,
            weight: self.weight,
            width: self.width,
            height: self.height,
            length: self.length,
        })
    }
}

impl StoreShipmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load shipments matching `filter` (bound to `$1`) together with their basket lines.
    async fn fetch_by<T>(&self, filter: &str, value: T) -> RepoResult<Vec<Shipment>>
    where
        T: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send,
    {
        let sql = format!(
            "SELECT {} FROM shipments WHERE {} = $1 ORDER BY created_at, id",
            SHIPMENT_COLUMNS, filter
        );
        let rows: Vec<ShipmentRow> = sqlx::query_as(&sql).bind(value).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items: Vec<ItemRow> = sqlx::query_as(
            "SELECT id, shipment_id, sku, name, quantity, price, cost, \
             weight, width, height, length \
             FROM shipment_items WHERE shipment_id = ANY($1) ORDER BY sku, id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_shipment: HashMap<Uuid, Vec<BasketItem>> = HashMap::new();
        for item in items {
            let shipment_id = item.shipment_id;
            by_shipment.entry(shipment_id).or_default().push(item.into_item()?);
        }

        rows.into_iter()
            .map(|row| {
                Ok(Shipment {
                    id: row.id,
                    number: row.number,
                    delivery_id: row.delivery_id,
                    merchant_id: row.merchant_id,
                    store_id: row.store_id,
                    cargo_id: row.cargo_id,
                    status: row.status.parse::<ShipmentStatus>()?,
                    provider_override: row
                        .provider_override
                        .map(|p| p.parse::<ProviderId>())
                        .transpose()?,
                    items: by_shipment.remove(&row.id).unwrap_or_default(),
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ShipmentRepository for StoreShipmentRepository {
    async fn get_shipment(&self, id: Uuid) -> RepoResult<Option<Shipment>> {
        Ok(self.fetch_by("id", id).await?.into_iter().next())
    }

    async fn list_by_cargo(&self, cargo_id: Uuid) -> RepoResult<Vec<Shipment>> {
        self.fetch_by("cargo_id", cargo_id).await
    }

    async fn list_by_delivery(&self, delivery_id: Uuid) -> RepoResult<Vec<Shipment>> {
        self.fetch_by("delivery_id", delivery_id).await
    }

    async fn update_shipment(&self, shipment: &Shipment) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE shipments \
             SET cargo_id = $2, status = $3, provider_override = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(shipment.id)
        .bind(shipment.cargo_id)
        .bind(shipment.status.as_str())
        .bind(shipment.provider_override.map(|p| p.as_str()))
        .bind(shipment.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("shipment {} does not exist", shipment.id).into());
        }
        Ok(())
    }

    async fn delete_shipment(&self, id: Uuid) -> RepoResult<()> {
        // basket lines cascade; packages must already be gone
        sqlx::query("DELETE FROM shipments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_shipments(&self, ids: &[Uuid]) -> RepoResult<()> {
        sqlx::query("UPDATE shipments SET updated_at = NOW() WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_packages(&self, shipment_id: Uuid) -> RepoResult<Vec<ShipmentPackage>> {
        let rows: Vec<PackageRow> = sqlx::query_as(
            "SELECT id, shipment_id, width, height, length, weight, wrapper_weight, external_code \
             FROM shipment_packages WHERE shipment_id = $1 ORDER BY id",
        )
        .bind(shipment_id)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<PackageItemRow> = sqlx::query_as(
            "SELECT i.package_id, i.basket_item_id, i.quantity FROM shipment_package_items i \
             JOIN shipment_packages p ON p.id = i.package_id WHERE p.shipment_id = $1 \
             ORDER BY i.basket_item_id",
        )
        .bind(shipment_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_package: HashMap<Uuid, Vec<PackageItem>> = HashMap::new();
        for item in items {
            by_package.entry(item.package_id).or_default().push(PackageItem {
                basket_item_id: item.basket_item_id,
                quantity: u32::try_from(item.quantity)?,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| ShipmentPackage {
                id: row.id,
                shipment_id: row.shipment_id,
                dimensions: Dimensions::new(row.width, row.height, row.length, row.weight),
                wrapper_weight: row.wrapper_weight,
                external_code: row.external_code,
                items: by_package.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn save_package(&self, package: &ShipmentPackage) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO shipment_packages
                (id, shipment_id, width, height, length, weight, wrapper_weight, external_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                width = EXCLUDED.width, height = EXCLUDED.height, length = EXCLUDED.length,
                weight = EXCLUDED.weight, wrapper_weight = EXCLUDED.wrapper_weight,
                external_code = EXCLUDED.external_code
            "#,
        )
        .bind(package.id)
        .bind(package.shipment_id)
        .bind(package.dimensions.width)
        .bind(package.dimensions.height)
        .bind(package.dimensions.length)
        .bind(package.dimensions.weight)
        .bind(package.wrapper_weight)
        .bind(package.external_code.as_deref())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM shipment_package_items WHERE package_id = $1")
            .bind(package.id)
            .execute(&mut *tx)
            .await?;

        for item in &package.items {
            sqlx::query(
                "INSERT INTO shipment_package_items (package_id, basket_item_id, quantity) \
                 VALUES ($1, $2, $3)",
            )
            .bind(package.id)
            .bind(item.basket_item_id)
            .bind(i32::try_from(item.quantity)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_packages(&self, shipment_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM shipment_packages WHERE shipment_id = $1")
            .bind(shipment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
