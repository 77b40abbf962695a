//! Error types for the remote database system

use thiserror::Error;

/// Unique constraint guarding one ledger row per provider transaction.
pub const PAYMENTS_TRANSACTION_ID_KEY: &str = "payments_transaction_id_key";
/// Unique constraint guarding tracking ids handed out by the ledger.
pub const PAYMENTS_TRACKING_ID_KEY: &str = "payments_tracking_id_key";
/// Unique constraint guarding tracking ids stamped on parcels.
pub const PARCELS_TRACKING_ID_KEY: &str = "parcels_tracking_id_key";
/// Unique constraint on registered user emails.
pub const USERS_EMAIL_KEY: &str = "users_email_key";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity} not found{}", .id.as_ref().map(|id| format!(": {}", id)).unwrap_or_default())]
    NotFound {
        entity: &'static str,
        id: Option<String>,
    },

    #[error("Duplicate value violates {constraint}")]
    Duplicate { constraint: String },

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl DbError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity, id: None }
    }

    pub fn not_found_with_id(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: Some(id.into()),
        }
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// True when the error is a unique violation of the named constraint.
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, Self::Duplicate { constraint: c } if c == constraint)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "record",
                id: None,
            },
            sqlx::Error::Database(db_err) => {
                // PostgreSQL error codes
                // 23505 = unique_violation
                // 23514 = check_violation
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => Self::Duplicate {
                            constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                        },
                        "23514" => Self::InvalidInput(format!(
                            "Check constraint violated: {}",
                            db_err.constraint().unwrap_or("unknown")
                        )),
                        _ => Self::Database(sqlx::Error::Database(db_err)),
                    }
                } else {
                    Self::Database(sqlx::Error::Database(db_err))
                }
            }
            sqlx::Error::PoolTimedOut => Self::Pool("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::Io(io_err) => Self::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => Self::Connection(format!("TLS error: {}", tls_err)),
            other => Self::Database(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
