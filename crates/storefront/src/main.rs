//! Storefront server entry point.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use functions::services::{FileStore, InMemoryFileStore, InMemoryQueue, LocalFileStore};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, PostgresStore, Store};
use storefront::client::{FunctionsClient, HttpFunctionsClient, LocalFunctions};
use storefront::config::Config;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How often expired sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Runs the functions in-process and mounts their HTTP API under `/functions`
/// so stored files stay downloadable.
fn embedded_functions<S: Store>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> (Arc<dyn FunctionsClient>, Router) {
    let functions_config = config.embedded_functions();
    let files: Arc<dyn FileStore> = match &functions_config.file_storage_root {
        Some(root) => {
            tracing::info!(root = %root.display(), "storing files on disk");
            Arc::new(LocalFileStore::new(root))
        }
        None => {
            tracing::warn!("FILE_STORAGE_ROOT not set, uploaded files are kept in memory");
            Arc::new(InMemoryFileStore::new())
        }
    };

    let state = Arc::new(functions::AppState::new(
        store,
        files,
        Arc::new(InMemoryQueue::new()),
        &functions_config,
    ));
    let router = functions::create_app(state.clone(), metrics_handle);
    let client: Arc<dyn FunctionsClient> = Arc::new(LocalFunctions::new(state));
    (client, router)
}

async fn serve<S: Store>(store: S, config: Config, metrics_handle: PrometheusHandle) {
    let (functions, functions_router) = match &config.functions_base_url {
        Some(url) => {
            tracing::info!(%url, "using remote functions service");
            let client = HttpFunctionsClient::new(url, config.functions_key.clone())
                .expect("invalid FUNCTIONS_BASE_URL");
            (Arc::new(client) as Arc<dyn FunctionsClient>, None)
        }
        None => {
            tracing::info!("FUNCTIONS_BASE_URL not set, running functions in-process under /functions");
            let (client, router) =
                embedded_functions(store.clone(), &config, metrics_handle.clone());
            (client, Some(router))
        }
    };

    let state = Arc::new(storefront::AppState::new(store, functions, &config));

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "expired sessions removed");
            }
        }
    });

    let mut app = storefront::create_app(state, metrics_handle);
    if let Some(router) = functions_router {
        app = app.nest("/functions", router);
    }

    let addr = config.addr();
    tracing::info!(%addr, "starting storefront server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load .env and configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // 2. Initialize tracing
    init_tracing(&config);

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the store and run
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(&url)
                .await
                .expect("failed to connect to database");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(InMemoryStore::new(), config, metrics_handle).await;
        }
    }
}
