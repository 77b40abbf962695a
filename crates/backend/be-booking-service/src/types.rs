use be_remote_db::User;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default, alias = "displayName")]
    pub name: Option<String>,
    #[serde(default, alias = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RegisterUserResponse {
    Created(User),
    Exists { message: &'static str },
}

impl RegisterUserResponse {
    pub fn exists() -> Self {
        Self::Exists {
            message: "user exists",
        }
    }
}

/// Booking form. Fields beyond the ones named here are kept as parcel details.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParcelRequest {
    pub sender_email: String,
    pub parcel_name: String,
    pub cost: Decimal,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ParcelsQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParcelResponse {
    pub deleted_count: u64,
}
