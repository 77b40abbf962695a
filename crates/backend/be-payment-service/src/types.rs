use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parcel summary submitted when the sender chooses to pay.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub parcel_id: Uuid,
    /// Price in currency units; accepted as a JSON number or string.
    pub cost: Decimal,
    pub parcel_name: String,
    pub sender_email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    pub email: Option<String>,
}
