use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use depot_core::repository::{CargoRepository, RepoResult};
use depot_core::{Cargo, CargoStatus, Dimensions, ProviderId, TimeWindow};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const CARGO_COLUMNS: &str = "id, merchant_id, store_id, provider_id, status, \
     width, height, length, weight, is_canceled, is_problem, external_id, error_text, \
     intake_number, intake_date, intake_from, intake_to, created_at, updated_at";

pub struct StoreCargoRepository {
    pool: PgPool,
}

impl StoreCargoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Oldest first. `limit_param` is the placeholder index the limit is bound to.
    async fn fetch(
        &self,
        filter: &str,
        limit_param: usize,
        bind: impl FnOnce(CargoQuery<'_>) -> CargoQuery<'_>,
    ) -> RepoResult<Vec<Cargo>> {
        let sql = format!(
            "SELECT {} FROM cargo WHERE {} ORDER BY created_at, id LIMIT ${}",
            CARGO_COLUMNS, filter, limit_param
        );
        let rows = bind(sqlx::query_as::<_, CargoRow>(&sql)).fetch_all(&self.pool).await?;
        rows.into_iter().map(CargoRow::into_cargo).collect()
    }
}

type CargoQuery<'q> = sqlx::query::QueryAs<'q, Postgres, CargoRow, PgArguments>;

#[derive(sqlx::FromRow)]
struct CargoRow {
    id: Uuid,
    merchant_id: Uuid,
    store_id: Uuid,
    provider_id: String,
    status: String,
    width: f64,
    height: f64,
    length: f64,
    weight: f64,
    is_canceled: bool,
    is_problem: bool,
    external_id: Option<String>,
    error_text: Option<String>,
    intake_number: Option<String>,
    intake_date: Option<NaiveDate>,
    intake_from: Option<NaiveTime>,
    intake_to: Option<NaiveTime>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CargoRow {
    fn into_cargo(self) -> RepoResult<Cargo> {
        Ok(Cargo {
            id: self.id,
            merchant_id: self.merchant_id,
            store_id: self.store_id,
            provider_id: self.provider_id.parse::<ProviderId>()?,
            status: self.status.parse::<CargoStatus>()?,
            dimensions: Dimensions::new(self.width, self.height, self.length, self.weight),
            is_canceled: self.is_canceled,
            is_problem: self.is_problem,
            external_id: self.external_id,
            error_text: self.error_text,
            intake_number: self.intake_number,
            intake_date: self.intake_date,
            intake_window: match (self.intake_from, self.intake_to) {
                (Some(from), Some(to)) => Some(TimeWindow::new(from, to)),
                _ => None,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn update_query(cargo: &Cargo) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(
        r#"
        UPDATE cargo SET
            status = $2, width = $3, height = $4, length = $5, weight = $6,
            is_canceled = $7, is_problem = $8, external_id = $9, error_text = $10,
            intake_number = $11, intake_date = $12, intake_from = $13, intake_to = $14,
            updated_at = $15
        WHERE id = $1
        "#,
    )
    .bind(cargo.id)
    .bind(cargo.status.as_str())
    .bind(cargo.dimensions.width)
    .bind(cargo.dimensions.height)
    .bind(cargo.dimensions.length)
    .bind(cargo.dimensions.weight)
    .bind(cargo.is_canceled)
    .bind(cargo.is_problem)
    .bind(cargo.external_id.as_deref())
    .bind(cargo.error_text.as_deref())
    .bind(cargo.intake_number.as_deref())
    .bind(cargo.intake_date)
    .bind(cargo.intake_window.map(|w| w.from))
    .bind(cargo.intake_window.map(|w| w.to))
    .bind(cargo.updated_at)
}

fn provider_texts(providers: &[ProviderId]) -> Vec<String> {
    providers.iter().map(|p| p.as_str().to_string()).collect()
}

#[async_trait]
impl CargoRepository for StoreCargoRepository {
    async fn get_cargo(&self, id: Uuid) -> RepoResult<Option<Cargo>> {
        let sql = format!("SELECT {} FROM cargo WHERE id = $1", CARGO_COLUMNS);
        let row = sqlx::query_as::<_, CargoRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CargoRow::into_cargo).transpose()
    }

    async fn find_open_cargo(
        &self,
        store_id: Uuid,
        provider_id: ProviderId,
    ) -> RepoResult<Option<Cargo>> {
        let open = self
            .fetch(
                "store_id = $1 AND provider_id = $2 AND status = 'CREATED' \
                 AND NOT is_canceled AND external_id IS NULL",
                3,
                |q| q.bind(store_id).bind(provider_id.as_str()).bind(1i64),
            )
            .await?;
        Ok(open.into_iter().next())
    }

    async fn insert_cargo(&self, cargo: &Cargo) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cargo (id, merchant_id, store_id, provider_id, status,
                               width, height, length, weight,
                               is_canceled, is_problem, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(cargo.id)
        .bind(cargo.merchant_id)
        .bind(cargo.store_id)
        .bind(cargo.provider_id.as_str())
        .bind(cargo.status.as_str())
        .bind(cargo.dimensions.width)
        .bind(cargo.dimensions.height)
        .bind(cargo.dimensions.length)
        .bind(cargo.dimensions.weight)
        .bind(cargo.is_canceled)
        .bind(cargo.is_problem)
        .bind(cargo.created_at)
        .bind(cargo.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_cargo(&self, cargo: &Cargo) -> RepoResult<()> {
        let result = update_query(cargo).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(format!("cargo {} does not exist", cargo.id).into());
        }
        Ok(())
    }

    async fn cancel_and_detach(&self, cargo: &Cargo) -> RepoResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let result = update_query(cargo).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(format!("cargo {} does not exist", cargo.id).into());
        }

        let detached: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE shipments SET cargo_id = NULL, updated_at = NOW() \
             WHERE cargo_id = $1 RETURNING id",
        )
        .bind(cargo.id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(detached.into_iter().map(|(id,)| id).collect())
    }

    async fn list_unscheduled(&self, limit: i64) -> RepoResult<Vec<Cargo>> {
        self.fetch(
            "status = 'CREATED' AND NOT is_canceled AND external_id IS NULL",
            1,
            |q| q.bind(limit),
        )
        .await
    }

    async fn list_by_intake_date(&self, date: NaiveDate, limit: i64) -> RepoResult<Vec<Cargo>> {
        self.fetch(
            "NOT is_canceled AND external_id IS NOT NULL AND intake_date = $1",
            2,
            |q| q.bind(date).bind(limit),
        )
        .await
    }

    async fn list_scheduled(&self, providers: &[ProviderId], limit: i64) -> RepoResult<Vec<Cargo>> {
        let providers = provider_texts(providers);
        self.fetch(
            "status = 'CREATED' AND NOT is_canceled AND external_id IS NOT NULL \
             AND provider_id = ANY($1)",
            2,
            |q| q.bind(providers).bind(limit),
        )
        .await
    }
}
