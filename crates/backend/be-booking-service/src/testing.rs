use std::sync::Mutex;

use be_remote_db::error::USERS_EMAIL_KEY;
use be_remote_db::{DbError, DbResult, Json, Parcel, User};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::BookingStore;

/// Store kept in insertion order, so newest-first is reverse iteration.
#[derive(Default)]
pub struct InMemoryBooking {
    users: Mutex<Vec<User>>,
    parcels: Mutex<Vec<Parcel>>,
}

impl InMemoryBooking {
    pub fn seed_parcel(&self, sender_email: &str, cost: Decimal) -> Parcel {
        let parcel = Parcel {
            id: Uuid::now_v7(),
            sender_email: sender_email.to_string(),
            parcel_name: "Seeded".to_string(),
            cost,
            details: Json(serde_json::json!({})),
            payment_status: None,
            tracking_id: None,
            created_at: Utc::now(),
        };
        self.parcels.lock().unwrap().push(parcel.clone());
        parcel
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn parcel_count(&self) -> usize {
        self.parcels.lock().unwrap().len()
    }
}

impl BookingStore for InMemoryBooking {
    async fn user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(
        &self,
        email: String,
        name: Option<String>,
        photo_url: Option<String>,
    ) -> DbResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(DbError::duplicate(USERS_EMAIL_KEY));
        }
        let user = User {
            id: Uuid::now_v7(),
            email,
            name,
            photo_url,
            role: "user".to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn insert_parcel(
        &self,
        sender_email: String,
        parcel_name: String,
        cost: Decimal,
        details: serde_json::Value,
    ) -> DbResult<Parcel> {
        let parcel = Parcel {
            id: Uuid::now_v7(),
            sender_email,
            parcel_name,
            cost,
            details: Json(details),
            payment_status: None,
            tracking_id: None,
            created_at: Utc::now(),
        };
        self.parcels.lock().unwrap().push(parcel.clone());
        Ok(parcel)
    }

    async fn parcels(&self, sender_email: Option<&str>) -> DbResult<Vec<Parcel>> {
        Ok(self
            .parcels
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|p| sender_email.is_none_or(|email| p.sender_email == email))
            .cloned()
            .collect())
    }

    async fn parcel(&self, id: Uuid) -> DbResult<Parcel> {
        self.parcels
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("parcel", id.to_string()))
    }

    async fn remove_parcel(&self, id: Uuid) -> DbResult<u64> {
        let mut parcels = self.parcels.lock().unwrap();
        let before = parcels.len();
        parcels.retain(|p| p.id != id);
        Ok((before - parcels.len()) as u64)
    }
}
