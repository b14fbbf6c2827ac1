//! aniseg server entry point.

use std::sync::Arc;

use aniseg_api::{
    middleware::{AppState, auth_middleware},
    router as api_router,
};
use aniseg_common::{Config, config::LogFormat};
use aniseg_core::{LifecycleSettings, ReportService, UserService};
use aniseg_db::repositories::{ReportRepository, ReportStore, UserRepository};
use axum::{Router, middleware};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Request bodies carry file descriptors only, never file contents.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aniseg=debug,tower_http=debug".into()),
        )
        .with((!json).then(fmt::layer))
        .with(json.then(|| fmt::layer().json()))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    init_tracing(config.logging.format);

    info!("Starting aniseg server...");

    // Connect to database
    let db = Arc::new(aniseg_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    aniseg_db::migrate(&db).await?;
    info!("Migrations completed");

    // Services
    let store: Arc<dyn ReportStore> = Arc::new(ReportRepository::new(Arc::clone(&db)));
    let settings = LifecycleSettings::from_config(&config)?;
    let report_service = ReportService::with_settings(store, settings);
    let user_service = UserService::new(UserRepository::new(Arc::clone(&db)));

    if let Some((email, token)) = config.auth.bootstrap_admin()
        && user_service.ensure_bootstrap_admin(email, token).await?
    {
        info!(email, "Bootstrap admin provisioned");
    }

    let state = AppState {
        report_service,
        user_service,
    };

    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
