use bon::bon;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
    types::Json,
};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{DbError, DbResult},
    types::{
        NewPayment, Parcel, ParcelUpdate, PaymentCommit, PaymentRecord, PaymentStatus,
        RecordedPayment, User,
    },
};

const PARCEL_COLUMNS: &str =
    "id, sender_email, parcel_name, cost, details, payment_status, tracking_id, created_at";
const PAYMENT_COLUMNS: &str = "id, amount, currency, customer_email, parcel_id, transaction_id, payment_status, paid_at, tracking_id";

/// Shared Postgres handle. Constructed once at startup and passed to every
/// service that needs storage.
#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        Ok(())
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }

    // =========================================================================
    // Users
    // =========================================================================

    #[builder]
    pub async fn create_user(
        &self,
        email: String,
        name: Option<String>,
        photo_url: Option<String>,
    ) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, photo_url, role, created_at)
            VALUES ($1, $2, $3, $4, 'user', $5)
            RETURNING id, email, name, photo_url, role, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&email)
        .bind(&name)
        .bind(&photo_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[builder]
    pub async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, photo_url, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    // =========================================================================
    // Parcels
    // =========================================================================

    #[builder]
    pub async fn create_parcel(
        &self,
        sender_email: String,
        parcel_name: String,
        cost: Decimal,
        details: serde_json::Value,
    ) -> DbResult<Parcel> {
        if cost <= Decimal::ZERO {
            return Err(DbError::invalid_input("parcel cost must be positive"));
        }
        if cost.normalize().scale() > 2 {
            return Err(DbError::invalid_input("parcel cost has more than two decimal places"));
        }

        let query = format!(
            r#"
            INSERT INTO parcels (id, sender_email, parcel_name, cost, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PARCEL_COLUMNS}
            "#
        );

        let parcel = sqlx::query_as::<_, Parcel>(&query)
            .bind(Uuid::now_v7())
            .bind(&sender_email)
            .bind(&parcel_name)
            .bind(cost)
            .bind(Json(details))
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(parcel)
    }

    #[builder]
    pub async fn list_parcels(&self, sender_email: Option<&str>) -> DbResult<Vec<Parcel>> {
        let query = format!(
            r#"
            SELECT {PARCEL_COLUMNS}
            FROM parcels
            WHERE ($1::text IS NULL OR sender_email = $1)
            ORDER BY created_at DESC
            "#
        );

        let parcels = sqlx::query_as::<_, Parcel>(&query)
            .bind(sender_email)
            .fetch_all(&self.pool)
            .await?;

        Ok(parcels)
    }

    #[builder]
    pub async fn get_parcel(&self, id: Uuid) -> DbResult<Parcel> {
        let query = format!("SELECT {PARCEL_COLUMNS} FROM parcels WHERE id = $1");

        sqlx::query_as::<_, Parcel>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("parcel", id.to_string()))
    }

    #[builder]
    pub async fn delete_parcel(&self, id: Uuid) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM parcels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Payments
    // =========================================================================

    #[builder]
    pub async fn find_payment_by_transaction(
        &self,
        transaction_id: &str,
    ) -> DbResult<Option<PaymentRecord>> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1");

        let record = sqlx::query_as::<_, PaymentRecord>(&query)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    #[builder]
    pub async fn tracking_id_exists(&self, tracking_id: &str) -> DbResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM payments WHERE tracking_id = $1)
                OR EXISTS (SELECT 1 FROM parcels WHERE tracking_id = $1)
            "#,
        )
        .bind(tracking_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Marks the parcel paid and appends the ledger row in one transaction.
    ///
    /// The parcel row is locked first. A missing parcel leaves `matched_count`
    /// at zero and the ledger row is still written. A parcel already paid
    /// under another transaction is left alone and nothing is written, so no
    /// ledger row ever carries a tracking id its parcel does not. A unique
    /// violation (transaction or tracking id) rolls back both writes.
    #[builder]
    pub async fn record_payment(&self, payment: NewPayment) -> DbResult<PaymentCommit> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<PaymentStatus>, Option<String>)> = sqlx::query_as(
            "SELECT payment_status, tracking_id FROM parcels WHERE id = $1 FOR UPDATE",
        )
        .bind(payment.parcel_id)
        .fetch_optional(&mut *tx)
        .await?;
        let matched = u64::from(current.is_some());

        let query = format!(
            r#"
            INSERT INTO payments (
                id, amount, currency, customer_email, parcel_id,
                transaction_id, payment_status, paid_at, tracking_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        // Before the paid check: a replayed transaction must surface as a
        // transaction id violation.
        let record = sqlx::query_as::<_, PaymentRecord>(&query)
            .bind(Uuid::now_v7())
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(&payment.customer_email)
            .bind(payment.parcel_id)
            .bind(&payment.transaction_id)
            .bind(payment.payment_status)
            .bind(Utc::now())
            .bind(&payment.tracking_id)
            .fetch_one(&mut *tx)
            .await?;

        if let Some((Some(PaymentStatus::Paid), existing)) = current {
            tx.rollback().await?;
            let tracking_id = existing.ok_or_else(|| {
                DbError::invalid_input(format!(
                    "parcel {} is paid but has no tracking id",
                    payment.parcel_id
                ))
            })?;
            debug!(
                transaction_id = %payment.transaction_id,
                parcel_id = %payment.parcel_id,
                %tracking_id,
                "Parcel already paid, payment not recorded"
            );
            return Ok(PaymentCommit::ParcelAlreadyPaid { tracking_id });
        }

        let modified = if matched > 0 {
            sqlx::query(
                r#"
                UPDATE parcels
                SET payment_status = $2, tracking_id = $3
                WHERE id = $1 AND payment_status IS DISTINCT FROM $2
                "#,
            )
            .bind(payment.parcel_id)
            .bind(PaymentStatus::Paid)
            .bind(&payment.tracking_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else {
            0
        };

        tx.commit().await?;

        debug!(
            transaction_id = %record.transaction_id,
            parcel_id = %record.parcel_id,
            matched,
            modified,
            "Payment recorded"
        );

        Ok(PaymentCommit::Recorded(RecordedPayment {
            parcel_update: ParcelUpdate {
                matched_count: matched,
                modified_count: modified,
            },
            record,
        }))
    }

    #[builder]
    pub async fn list_payments(&self, customer_email: Option<&str>) -> DbResult<Vec<PaymentRecord>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE ($1::text IS NULL OR customer_email = $1)
            ORDER BY paid_at DESC
            "#
        );

        let payments = sqlx::query_as::<_, PaymentRecord>(&query)
            .bind(customer_email)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }
}
