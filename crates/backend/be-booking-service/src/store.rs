use std::future::Future;

use be_remote_db::{DatabaseManager, DbResult, Parcel, User};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Storage operations behind the booking routes.
pub trait BookingStore: Send + Sync + 'static {
    fn user_by_email(&self, email: &str) -> impl Future<Output = DbResult<Option<User>>> + Send;

    fn insert_user(
        &self,
        email: String,
        name: Option<String>,
        photo_url: Option<String>,
    ) -> impl Future<Output = DbResult<User>> + Send;

    fn insert_parcel(
        &self,
        sender_email: String,
        parcel_name: String,
        cost: Decimal,
        details: serde_json::Value,
    ) -> impl Future<Output = DbResult<Parcel>> + Send;

    /// Newest first.
    fn parcels(
        &self,
        sender_email: Option<&str>,
    ) -> impl Future<Output = DbResult<Vec<Parcel>>> + Send;

    fn parcel(&self, id: Uuid) -> impl Future<Output = DbResult<Parcel>> + Send;

    fn remove_parcel(&self, id: Uuid) -> impl Future<Output = DbResult<u64>> + Send;
}

impl BookingStore for DatabaseManager {
    async fn user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        self.find_user_by_email().email(email).call().await
    }

    async fn insert_user(
        &self,
        email: String,
        name: Option<String>,
        photo_url: Option<String>,
    ) -> DbResult<User> {
        self.create_user()
            .email(email)
            .maybe_name(name)
            .maybe_photo_url(photo_url)
            .call()
            .await
    }

    async fn insert_parcel(
        &self,
        sender_email: String,
        parcel_name: String,
        cost: Decimal,
        details: serde_json::Value,
    ) -> DbResult<Parcel> {
        self.create_parcel()
            .sender_email(sender_email)
            .parcel_name(parcel_name)
            .cost(cost)
            .details(details)
            .call()
            .await
    }

    async fn parcels(&self, sender_email: Option<&str>) -> DbResult<Vec<Parcel>> {
        self.list_parcels()
            .maybe_sender_email(sender_email)
            .call()
            .await
    }

    async fn parcel(&self, id: Uuid) -> DbResult<Parcel> {
        self.get_parcel().id(id).call().await
    }

    async fn remove_parcel(&self, id: Uuid) -> DbResult<u64> {
        self.delete_parcel().id(id).call().await
    }
}
