use std::net::SocketAddr;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model_gallery::{config::AppConfig, create_app, metrics, rate_limit::run_sweeper, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing()?;

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded successfully");

    // Initialize metrics before any handle is registered
    let metrics_handle = if config.metrics.enabled {
        let handle = metrics::install_recorder()?;
        info!("Metrics recorder installed");
        Some(handle)
    } else {
        None
    };

    let state = AppState::new(config.clone(), metrics_handle)?;

    info!(
        enabled = config.rate_limiting.enabled,
        allowed_origin = %config.rate_limiting.allowed_origin,
        max_requests = config.rate_limiting.max_requests_per_window,
        window_seconds = config.rate_limiting.window_seconds,
        "Rate limiter configured"
    );

    // Start expired-entry sweeper
    tokio::spawn(run_sweeper(
        state.rate_limiter.clone(),
        config.rate_limiting.sweep_interval(),
    ));

    // Build the application router
    let app = create_app(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("🚀 Model Gallery starting on http://{}", addr);
    info!("📊 Metrics available at http://{}{}", addr, config.metrics.path);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Model Gallery stopped");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));
    let subscriber = tracing_subscriber::registry().with(filter);

    match log_format.as_str() {
        "json" => {
            subscriber
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
        _ => {
            subscriber
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
