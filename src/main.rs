use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leornian_core::config::{init_db, Config};
use leornian_core::services::email::LogEmailSender;
use leornian_core::services::metrics::PoolMetricsCollector;
use leornian_core::services::sweeper::run_pool_health_checks;
use leornian_core::{build_state, create_app, serve, Repositories, SHUTDOWN_GRACE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Failed to load environment configuration")?;
    let port = config.port;

    let db = init_db(&config)
        .await
        .context("Failed to connect to MySQL")?;
    tracing::info!("Connected to MySQL");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("Failed to run database migrations")?;

    let shutdown = CancellationToken::new();
    let repos = Repositories::mysql(db.clone());
    let state = build_state(config, &repos, Arc::new(LogEmailSender), shutdown.clone())?;

    let sweeper = tokio::spawn(
        repos
            .sweeper(state.rate_limits.clone())
            .run(shutdown.clone()),
    );
    let health = tokio::spawn(run_pool_health_checks(
        db.clone(),
        PoolMetricsCollector::new(state.metrics.clone()),
        shutdown.clone(),
    ));

    let app = create_app(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Server listening");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    serve(listener, app, shutdown.clone(), SHUTDOWN_GRACE)
        .await
        .context("Server error")?;

    // The hub closes every socket once the token is cancelled.
    shutdown.cancel();
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = sweeper.await;
        let _ = health.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Background tasks did not stop within the grace period");
    }

    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// JSON output when `LOG_FORMAT=json`; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "leornian_core=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
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
}
