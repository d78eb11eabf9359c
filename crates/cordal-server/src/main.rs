//! CORDAL server entry point.

use cordal_core::cache::CacheRegistry;
use cordal_core::config::loader::{ConfigLoader, FileLoader, FileLoaderConfig, StoreLoader};
use cordal_core::pool::PoolManager;
use cordal_core::query::QueryExecutor;
use cordal_core::snapshot::SnapshotHistory;
use cordal_events::{EventBus, InvalidationEngine};
use cordal_server::app_state::AppState;
use cordal_server::config::{ConfigSource, ServerConfig};
use cordal_server::registry::EndpointRegistry;
use cordal_server::reload::{ReloadOrchestrator, ReloadState};
use cordal_server::routes;
use cordal_server::watcher::FileWatcher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::load()?;
    tracing::info!(bind_address = %config.bind_address, "starting cordal-server");

    let loader = build_loader(&config).await?;
    let pools = Arc::new(PoolManager::new());
    let registry = Arc::new(EndpointRegistry::new(Vec::new()));
    let history = Arc::new(SnapshotHistory::new(config.reload.history_limit));
    let reload = Arc::new(ReloadOrchestrator::new(
        loader,
        pools.clone(),
        registry.clone(),
        history.clone(),
        config.reload.max_attempts,
    ));

    let outcome = reload.trigger().await;
    if !matches!(outcome.state, ReloadState::Watching) {
        anyhow::bail!("initial configuration load failed: {}", outcome.message);
    }

    let caches = Arc::new(CacheRegistry::new());
    let events = Arc::new(EventBus::new(config.event_bus.queue_capacity, config.event_bus.worker_concurrency));
    let invalidation = Arc::new(InvalidationEngine::new(caches.clone()));
    invalidation.register(&events);

    let state = AppState {
        registry: registry.clone(),
        pools: pools.clone(),
        executor: Arc::new(QueryExecutor::new(pools.clone())),
        caches: caches.clone(),
        events,
        invalidation: invalidation.clone(),
        history,
        reload: reload.clone(),
        started_at: Instant::now(),
    };

    let sweeper = spawn_cache_sweeper(caches, config.cache_sweep.period_seconds);
    let watcher = spawn_watcher(&config, reload.clone())?;

    let app = routes::build(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(bind_address = %config.bind_address, "cordal-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    invalidation.cancel_pending();
    pools.shutdown();
    Ok(())
}

async fn build_loader(config: &ServerConfig) -> anyhow::Result<Box<dyn ConfigLoader>> {
    match config.source {
        ConfigSource::File => {
            let file_source = config
                .file_source
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("source = \"file\" requires [file_source]"))?;
            let loader_config = FileLoaderConfig::with_defaults(file_source.directories.clone());
            Ok(Box::new(FileLoader::new(loader_config)))
        }
        ConfigSource::Store => {
            let store_source = config
                .store_source
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("source = \"store\" requires [store_source]"))?;
            let mut pg_config = deadpool_postgres::Config::new();
            pg_config.url = Some(store_source.url.clone());
            let pool = pg_config
                .create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)?;
            Ok(Box::new(StoreLoader::new(pool)))
        }
    }
}

fn spawn_cache_sweeper(caches: Arc<CacheRegistry>, period_seconds: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(period_seconds.max(1)));
        loop {
            interval.tick().await;
            caches.sweep_all();
        }
    })
}

fn spawn_watcher<L: ConfigLoader + Send + Sync + 'static>(
    config: &ServerConfig,
    reload: Arc<ReloadOrchestrator<L>>,
) -> anyhow::Result<Option<tokio::task::JoinHandle<()>>> {
    let Some(file_source) = (config.source == ConfigSource::File).then_some(()).and(config.file_source.as_ref())
    else {
        return Ok(None);
    };

    let defaults = FileLoaderConfig::with_defaults(file_source.directories.clone());
    let mut globs = defaults.database_globs;
    globs.extend(defaults.query_globs);
    globs.extend(defaults.endpoint_globs);

    let mut watcher = FileWatcher::start(
        file_source.directories.clone(),
        globs,
        Duration::from_millis(config.watcher.debounce_ms),
    )?;

    let handle = tokio::spawn(async move {
        while watcher.next().await.is_some() {
            let outcome = reload.trigger().await;
            tracing::info!(state = ?outcome.state, "file watcher triggered reload");
        }
    });
    Ok(Some(handle))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
