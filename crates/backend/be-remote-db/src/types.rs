use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type, types::Json};
use uuid::Uuid;

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Parcels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Unpaid => write!(f, "unpaid"),
            PaymentStatus::NoPaymentRequired => write!(f, "no_payment_required"),
        }
    }
}

/// A booked shipment. `tracking_id` is set exactly when `payment_status` is `Paid`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: Uuid,
    pub sender_email: String,
    pub parcel_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    pub details: Json<serde_json::Value>,
    pub payment_status: Option<PaymentStatus>,
    pub tracking_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Parcel {
    pub fn is_paid(&self) -> bool {
        self.payment_status == Some(PaymentStatus::Paid)
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub customer_email: Option<String>,
    pub parcel_id: Uuid,
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
    pub tracking_id: String,
}

/// Ledger entry about to be written; id and `paid_at` are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub currency: String,
    pub customer_email: Option<String>,
    pub parcel_id: Uuid,
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub tracking_id: String,
}

impl NewPayment {
    pub fn into_record(self, id: Uuid, paid_at: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            id,
            amount: self.amount,
            currency: self.currency,
            customer_email: self.customer_email,
            parcel_id: self.parcel_id,
            transaction_id: self.transaction_id,
            payment_status: self.payment_status,
            paid_at,
            tracking_id: self.tracking_id,
        }
    }
}

/// How the parcel side of a committed payment went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelUpdate {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedPayment {
    pub parcel_update: ParcelUpdate,
    pub record: PaymentRecord,
}

/// Outcome of [`crate::DatabaseManager::record_payment`].
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentCommit {
    Recorded(RecordedPayment),
    /// The parcel was already paid under another transaction. Nothing was
    /// written; `tracking_id` is the one the parcel already carries.
    ParcelAlreadyPaid { tracking_id: String },
}
