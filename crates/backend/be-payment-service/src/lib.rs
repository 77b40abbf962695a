use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use be_auth_core::JwtConfig;
use be_remote_db::DatabaseManager;
use tower::ServiceBuilder;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;

pub mod analytics;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod provider;
pub mod reconcile;
pub mod service;
pub mod tracking;
pub mod types;

#[cfg(test)]
mod testing;

use service::AppState;

pub fn create_router<P, L>(state: Arc<AppState<P, L>>) -> Result<Router, PaymentError>
where
    P: CheckoutProvider,
    L: PaymentLedger,
{
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(state.config.site_origin.clone()))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let checkout_governor = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .ok_or_else(|| PaymentError::Config("invalid checkout rate limit".into()))?;

    let jwt_config = state.jwt_config.clone();

    let checkout_route = Router::new()
        .route(
            "/payment-checkout-session",
            post(handlers::create_checkout_session::<P, L>),
        )
        .layer(GovernorLayer::new(Arc::new(checkout_governor)));

    let confirm_route = Router::new().route(
        "/payment-success",
        patch(handlers::payment_success::<P, L>),
    );

    let authed_routes = Router::new().route("/payments", get(handlers::list_payments::<P, L>));

    Ok(checkout_route
        .merge(confirm_route)
        .merge(authed_routes)
        .layer(Extension(jwt_config))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}

/// Wires the Stripe-backed payment routes onto the shared database.
pub fn init_payment_service(db: Arc<DatabaseManager>, jwt_config: Arc<JwtConfig>) -> Result<Router> {
    debug!("Initializing payment service");

    let config = PaymentConfig::from_env().context("Failed to load payment configuration")?;
    let provider = Arc::new(StripeCheckout::new(&config).context("Failed to create Stripe client")?);
    let state = Arc::new(AppState::new(config, provider, db, jwt_config));

    create_router(state).context("Failed to build payment router")
}

pub use checkout::CheckoutInitiator;
pub use config::PaymentConfig;
pub use error::PaymentError;
pub use ledger::PaymentLedger;
pub use provider::{CheckoutProvider, StripeCheckout};
pub use reconcile::{ReconciliationResult, Reconciler};
pub use types::{CheckoutRequest, CheckoutResponse};
