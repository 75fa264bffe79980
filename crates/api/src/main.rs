//! SocialNet API server

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use socialnet_api::{
    create_router,
    email::{EmailConfig, ResendMailer},
    routes::with_request_timeout,
    store::Storage,
    AppState, Config,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.is_production());

    tracing::info!(environment = %config.environment, "Starting SocialNet API");

    let pool = socialnet_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    socialnet_shared::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database ready");

    let storage = Storage::postgres(pool, Duration::from_secs(config.query_timeout_secs));
    let mailer = ResendMailer::new(EmailConfig::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ))
    .context("Failed to build email client")?;
    if config.resend_api_key.is_empty() {
        tracing::warn!("RESEND_API_KEY not set; emails will be logged only");
    }

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .client_url
                .parse::<HeaderValue>()
                .context("CLIENT_URL is not a valid origin")?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, storage, Arc::new(mailer));

    let app = with_request_timeout(create_router(state), REQUEST_TIMEOUT)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(address = %bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "socialnet_api=debug,tower_http=info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
