//! Postgres-backed storage.
//!
//! ## Concurrency
//!
//! Every engine operation runs in one transaction at the default `READ
//! COMMITTED` level. Races are settled by the database itself:
//!
//! - the partial unique index `receptions_one_in_progress_per_pickup_point`
//!   rejects a second open reception for the same pickup point;
//! - add/remove take a row lock on the open reception (`SELECT ... FOR
//!   UPDATE`), so concurrent mutations of one batch queue up and each sees the
//!   previous one's `product_ids`;
//! - close is a single conditional `UPDATE`, so a close racing an add either
//!   happens entirely before or entirely after it.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation(constraint)` |
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (deadlock detected) | `40P01` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolTimedOut / PoolClosed / Io / Tls | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use pvz_auth::{Email, Role, User};
use pvz_core::{Entity, PickupPointId, ProductId, ReceptionId, UserId};
use pvz_reception::{City, PickupPoint, PickupPointPage, Product, Reception, ReceptionStatus};

use super::r#trait::{Storage, StorageTx, StoreError};
use crate::config::DatabaseConfig;

/// Postgres-backed storage over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration and verify it can hand out a connection.
    #[instrument(skip(config), fields(host = %config.host, database = %config.name), err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = match &config.url {
            Some(url) => PgConnectOptions::from_str(url)
                .map_err(|e| StoreError::Backend(format!("invalid DATABASE_URL: {e}")))?,
            None => PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(&config.name)
                .ssl_mode(
                    PgSslMode::from_str(&config.ssl_mode)
                        .map_err(|e| StoreError::Backend(format!("invalid DB_SSLMODE: {e}")))?,
                ),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        tracing::info!(max_connections = config.max_connections, "postgres pool ready");
        Ok(Self::from_pool(pool))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTx { tx })
    }
}

/// One Postgres transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StorageTx for PostgresTx {
    async fn insert_pickup_point(&mut self, pickup_point: &PickupPoint) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pickup_points (id, city, registration_date)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(pickup_point.id.as_uuid())
        .bind(pickup_point.city.as_str())
        .bind(pickup_point.registration_date)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_pickup_point", e))?;
        Ok(())
    }

    async fn pickup_point_exists(&mut self, id: PickupPointId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM pickup_points WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("pickup_point_exists", e))?;
        Ok(row.is_some())
    }

    #[instrument(skip(self), fields(page = page.page(), limit = page.limit()), err)]
    async fn list_pickup_points(&mut self, page: &PickupPointPage) -> Result<Vec<PickupPoint>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, city, registration_date
            FROM pickup_points
            WHERE ($1::text IS NULL OR city = $1)
              AND ($2::timestamptz IS NULL OR registration_date >= $2)
              AND ($3::timestamptz IS NULL OR registration_date <= $3)
            ORDER BY registration_date DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(page.city().map(|c| c.as_str()))
        .bind(page.registered_from())
        .bind(page.registered_to())
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_pickup_points", e))?;

        rows.iter().map(pickup_point_from_row).collect()
    }

    async fn insert_reception(&mut self, reception: &Reception) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO receptions (id, pickup_point_id, date_time, status, product_ids)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(reception.id().as_uuid())
        .bind(reception.pickup_point_id().as_uuid())
        .bind(reception.date_time())
        .bind(reception.status().as_str())
        .bind(product_uuids(reception))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_reception", e))?;
        Ok(())
    }

    async fn lock_active_reception(
        &mut self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, pickup_point_id, date_time, status, product_ids
            FROM receptions
            WHERE pickup_point_id = $1 AND status = 'in_progress'
            ORDER BY date_time DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(pickup_point_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_active_reception", e))?;

        row.as_ref().map(reception_from_row).transpose()
    }

    async fn save_product_ids(&mut self, reception: &Reception) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE receptions SET product_ids = $2 WHERE id = $1")
            .bind(reception.id().as_uuid())
            .bind(product_uuids(reception))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("save_product_ids", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!(
                "reception {} not found",
                reception.id()
            )));
        }
        Ok(())
    }

    async fn close_active_reception(
        &mut self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE receptions
            SET status = 'close'
            WHERE pickup_point_id = $1 AND status = 'in_progress'
            RETURNING id, pickup_point_id, date_time, status, product_ids
            "#,
        )
        .bind(pickup_point_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("close_active_reception", e))?;

        row.as_ref().map(reception_from_row).transpose()
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id), err)]
    async fn list_receptions(&mut self, pickup_point_id: PickupPointId) -> Result<Vec<Reception>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, pickup_point_id, date_time, status, product_ids
            FROM receptions
            WHERE pickup_point_id = $1
            ORDER BY date_time DESC, id DESC
            "#,
        )
        .bind(pickup_point_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_receptions", e))?;

        rows.iter().map(reception_from_row).collect()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, reception_id, type, date_time)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.reception_id.as_uuid())
        .bind(product.product_type.as_str())
        .bind(product.added_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn user_by_email(&mut self, email: &Email) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("user_by_email", e))?;

        row.as_ref()
            .map(|row| decode::<UserRow>(row)?.try_into())
            .transpose()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

fn product_uuids(reception: &Reception) -> Vec<Uuid> {
    reception
        .product_ids()
        .iter()
        .map(|id| *id.as_uuid())
        .collect()
}

fn decode<'r, T: FromRow<'r, PgRow>>(row: &'r PgRow) -> Result<T, StoreError> {
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

fn pickup_point_from_row(row: &PgRow) -> Result<PickupPoint, StoreError> {
    decode::<PickupPointRow>(row)?.try_into()
}

fn reception_from_row(row: &PgRow) -> Result<Reception, StoreError> {
    decode::<ReceptionRow>(row)?.try_into()
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(
                    db_err.constraint().map(str::to_string).unwrap_or(msg),
                ),
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(format!("{operation}: {err}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct PickupPointRow {
    id: Uuid,
    city: String,
    registration_date: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PickupPointRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PickupPointRow {
            id: row.try_get("id")?,
            city: row.try_get("city")?,
            registration_date: row.try_get("registration_date")?,
        })
    }
}

impl TryFrom<PickupPointRow> for PickupPoint {
    type Error = StoreError;

    fn try_from(row: PickupPointRow) -> Result<Self, Self::Error> {
        Ok(PickupPoint {
            id: PickupPointId::from_uuid(row.id),
            city: City::from_str(&row.city).map_err(|e| StoreError::Backend(e.to_string()))?,
            registration_date: row.registration_date,
        })
    }
}

#[derive(Debug)]
struct ReceptionRow {
    id: Uuid,
    pickup_point_id: Uuid,
    date_time: DateTime<Utc>,
    status: String,
    product_ids: Vec<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for ReceptionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReceptionRow {
            id: row.try_get("id")?,
            pickup_point_id: row.try_get("pickup_point_id")?,
            date_time: row.try_get("date_time")?,
            status: row.try_get("status")?,
            product_ids: row.try_get("product_ids")?,
        })
    }
}

impl TryFrom<ReceptionRow> for Reception {
    type Error = StoreError;

    fn try_from(row: ReceptionRow) -> Result<Self, Self::Error> {
        let status =
            ReceptionStatus::from_str(&row.status).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Reception::restore(
            ReceptionId::from_uuid(row.id),
            PickupPointId::from_uuid(row.pickup_point_id),
            row.date_time,
            status,
            row.product_ids.into_iter().map(ProductId::from_uuid).collect(),
        ))
    }
}

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_uuid(row.id),
            email: Email::from_str(&row.email).map_err(|e| StoreError::Backend(e.to_string()))?,
            password_hash: row.password_hash,
            role: Role::from_str(&row.role).map_err(|e| StoreError::Backend(e.to_string()))?,
            created_at: row.created_at,
        })
    }
}
