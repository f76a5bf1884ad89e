mod auth;
mod config;
mod db;
mod engine;
mod errors;
mod files;
mod metrics;
mod notify;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    dotenvy::dotenv().ok();
    let config = Arc::new(config::AppConfig::load()?);

    // 2. Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting routing service"
    );

    // 3. Metrics
    metrics::register_metrics();

    // 4. Database
    let db = db::DbPool::new(&config.database).await?;
    let repo = db::Repository::new(db.clone());

    // 5. Engine wiring
    let files: Arc<dyn files::FileStore> = Arc::new(files::LocalFileStore::new(&config.routing));
    let notifier = notify::Notifier::new(db.clone());
    let policy = engine::policy::RoutingPolicy::from(&config.routing);
    let engine = Arc::new(engine::RoutingEngine::new(repo, notifier, files, policy));

    // 6. Router
    let state = routes::AppState {
        config: config.clone(),
        db,
        engine,
    };
    let app = routes::create_router(state);

    // 7. Serve
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    // Bound the drain of in-flight requests after the shutdown signal
    let shutdown_timeout = config.shutdown_timeout();
    tokio::select! {
        result = server => result?,
        () = async {
            shutdown_signal().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, exiting with requests in flight"
            );
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
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
