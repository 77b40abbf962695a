use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use be_remote_db::error::USERS_EMAIL_KEY;
use be_remote_db::Parcel;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::BookingError;
use crate::store::BookingStore;
use crate::types::{
    CreateParcelRequest, DeleteParcelResponse, ParcelsQuery, RegisterUserRequest,
    RegisterUserResponse,
};

/// Costs are stored as `NUMERIC(12,2)`; anything finer would be rounded.
fn valid_cost(cost: Decimal) -> bool {
    cost > Decimal::ZERO && cost.normalize().scale() <= 2
}

fn parse_id(raw: &str) -> Result<Uuid, BookingError> {
    Uuid::parse_str(raw).map_err(|_| BookingError::InvalidField("id"))
}

fn required(value: &str, field: &'static str) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::InvalidField(field));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// POST /users
// ---------------------------------------------------------------------------

/// Registers a user on first sign-in. Registering an existing email is a no-op.
pub async fn register_user<S: BookingStore>(
    State(store): State<Arc<S>>,
    Json(body): Json<RegisterUserRequest>,
) -> Result<Json<RegisterUserResponse>, BookingError> {
    required(&body.email, "email")?;

    if store.user_by_email(&body.email).await?.is_some() {
        debug!(email = %body.email, "User already registered");
        return Ok(Json(RegisterUserResponse::exists()));
    }

    match store
        .insert_user(body.email, body.name, body.photo_url)
        .await
    {
        Ok(user) => {
            info!(user_id = %user.id, "User registered");
            Ok(Json(RegisterUserResponse::Created(user)))
        }
        Err(e) if e.violates(USERS_EMAIL_KEY) => Ok(Json(RegisterUserResponse::exists())),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// /parcels
// ---------------------------------------------------------------------------

pub async fn list_parcels<S: BookingStore>(
    State(store): State<Arc<S>>,
    Query(params): Query<ParcelsQuery>,
) -> Result<Json<Vec<Parcel>>, BookingError> {
    let email = params
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    Ok(Json(store.parcels(email).await?))
}

pub async fn get_parcel<S: BookingStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Json<Parcel>, BookingError> {
    let id = parse_id(&id)?;
    Ok(Json(store.parcel(id).await?))
}

/// Books a new, unpaid parcel.
pub async fn create_parcel<S: BookingStore>(
    State(store): State<Arc<S>>,
    Json(body): Json<CreateParcelRequest>,
) -> Result<Json<Parcel>, BookingError> {
    required(&body.sender_email, "senderEmail")?;
    required(&body.parcel_name, "parcelName")?;
    if !valid_cost(body.cost) {
        return Err(BookingError::InvalidField("cost"));
    }

    let parcel = store
        .insert_parcel(
            body.sender_email,
            body.parcel_name,
            body.cost,
            serde_json::Value::Object(body.details),
        )
        .await?;

    info!(parcel_id = %parcel.id, cost = %parcel.cost, "Parcel booked");
    Ok(Json(parcel))
}

pub async fn delete_parcel<S: BookingStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteParcelResponse>, BookingError> {
    let id = parse_id(&id)?;
    let deleted_count = store.remove_parcel(id).await?;
    info!(parcel_id = %id, deleted_count, "Parcel deleted");
    Ok(Json(DeleteParcelResponse { deleted_count }))
}
