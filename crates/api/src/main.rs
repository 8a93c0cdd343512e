use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taleforge_api::background::ledger_reconcile;
use taleforge_api::config::ServerConfig;
use taleforge_api::router::build_app_router;
use taleforge_api::state::AppState;
use taleforge_events::{EventBus, RewardListener};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taleforge_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pricing = config
        .chapter_pricing()
        .expect("Invalid chapter pricing configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        chapter_unlock_coins = config.chapter_unlock_coins,
        free_chapters = config.free_chapters,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = taleforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    taleforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    taleforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus and reward listener ---
    let event_bus = Arc::new(EventBus::default());
    let rewards_handle = tokio::spawn(RewardListener::run(pool.clone(), event_bus.subscribe()));
    tracing::info!("Reward listener started");

    // --- Ledger reconciliation ---
    let reconcile_cancel = CancellationToken::new();
    let reconcile_handle = tokio::spawn(ledger_reconcile::run(
        pool.clone(),
        Duration::from_secs(config.ledger_reconcile_interval_secs),
        reconcile_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        pricing: Arc::new(pricing),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    reconcile_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), reconcile_handle).await;
    tracing::info!("Ledger reconciliation stopped");

    // Last handle to the bus: dropping it closes the channel and the
    // listener drains and exits.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), rewards_handle).await;
    tracing::info!("Reward listener shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
