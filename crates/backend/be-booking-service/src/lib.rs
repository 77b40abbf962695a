use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use be_remote_db::DatabaseManager;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod error;
pub mod handlers;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub fn create_router<S: BookingStore>(store: Arc<S>) -> Router {
    Router::new()
        .route("/users", post(handlers::register_user::<S>))
        .route(
            "/parcels",
            get(handlers::list_parcels::<S>).post(handlers::create_parcel::<S>),
        )
        .route(
            "/parcels/{id}",
            get(handlers::get_parcel::<S>).delete(handlers::delete_parcel::<S>),
        )
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(store)
}

pub fn init_booking_service(db: Arc<DatabaseManager>) -> Router {
    debug!("Initializing booking service");
    create_router(db)
}

pub use error::BookingError;
pub use store::BookingStore;
