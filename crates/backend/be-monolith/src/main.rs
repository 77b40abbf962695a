use anyhow::{Context, anyhow};
use axum::http::HeaderValue;
use be_auth_core::JwtConfig;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn server_config(
    shutdown: tokio::sync::watch::Receiver<()>,
) -> anyhow::Result<be_monolith::ServerConfig> {
    let database_url = std::env::var("REMOTE_DATABASE_URL")
        .map_err(|_| anyhow!("REMOTE_DATABASE_URL environment variable must be set"))?;

    let http_addr = std::env::var("HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:5000".to_string())
        .parse::<SocketAddr>()
        .context("Invalid HTTP_ADDR format")?;

    let site_domain =
        std::env::var("SITE_DOMAIN").unwrap_or_else(|_| "http://localhost:5173".to_string());
    let site_origin = HeaderValue::from_str(site_domain.trim_end_matches('/'))
        .context("SITE_DOMAIN is not a valid origin")?;

    let jwt_config = Arc::new(JwtConfig::from_env()?);

    Ok(be_monolith::ServerConfig {
        database_url,
        http_addr,
        site_origin,
        jwt_config,
        shutdown,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();

    // --- Sentry ---
    let _sentry_guard = if cfg!(not(debug_assertions)) {
        std::env::var("SENTRY_MONOLITH_DSN")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|sentry_dsn| {
                let send_pii = std::env::var("SENTRY_SEND_PII")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);

                sentry::init((
                    sentry_dsn,
                    sentry::ClientOptions {
                        release: sentry::release_name!(),
                        traces_sample_rate: 0.0,
                        send_default_pii: send_pii,
                        ..Default::default()
                    },
                ))
            })
    } else {
        None
    };

    // --- Tracing ---
    let app_level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let global_filter = Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target("be_", app_level)
        .with_target("tower_http", app_level)
        .with_target("hyper", LevelFilter::OFF)
        .with_target("tokio", LevelFilter::OFF);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .with(global_filter)
        .try_init()?;

    // --- Shutdown channel ---
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C signal handler: {}", e);
            return;
        }
        tracing::info!("Received CTRL+C, initiating shutdown...");
        let _ = shutdown_tx.send(());
    });

    // --- Server config from environment ---
    let config = match server_config(shutdown_rx) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid server configuration: {:#}", e);
            return Err(e.into());
        }
    };

    be_monolith::run_server(config).await
}
