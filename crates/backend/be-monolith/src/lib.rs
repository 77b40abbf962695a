use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use be_auth_core::JwtConfig;
use be_booking_service::init_booking_service;
use be_payment_service::init_payment_service;
use be_remote_db::DatabaseManager;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Configuration for running the monolith server.
pub struct ServerConfig {
    pub database_url: String,
    pub http_addr: SocketAddr,
    /// Browser origin allowed to call the API.
    pub site_origin: HeaderValue,
    pub jwt_config: Arc<JwtConfig>,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

fn build_cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Liveness endpoints shared by every deployment.
pub fn status_routes() -> Router {
    Router::new()
        .route("/", get(|| async { "ZapShift server is running" }))
        .route("/health", get(|| async { StatusCode::OK }))
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(posthog_key) = std::env::var("POSTHOG_API_KEY")
        .ok()
        .filter(|s| !s.is_empty())
    {
        match posthog_rs::init_global(posthog_key.as_str()).await {
            Ok(()) => tracing::info!("PostHog analytics initialized"),
            Err(e) => tracing::warn!("Failed to initialize PostHog: {}", e),
        }
    } else {
        tracing::info!("POSTHOG_API_KEY not set, analytics disabled");
    }

    let db_manager = match DatabaseManager::new(&config.database_url).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Database connected and migrated");

    let payment_router = match init_payment_service(db_manager.clone(), config.jwt_config) {
        Ok(router) => router,
        Err(e) => {
            tracing::error!("Failed to initialize payment service: {:#}", e);
            db_manager.close().await;
            return Err(e.into());
        }
    };

    let booking_router =
        init_booking_service(db_manager.clone()).layer(build_cors(config.site_origin));

    let http_router = payment_router
        .merge(booking_router)
        .merge(status_routes());

    tracing::info!("Starting HTTP server at {}", config.http_addr);

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    let result = axum::serve(
        http_listener,
        http_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await;

    db_manager.close().await;

    if let Err(e) = result {
        tracing::error!("HTTP server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
