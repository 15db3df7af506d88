// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Binary
//!
//! Bootstraps the standalone sync worker: parses CLI args, loads
//! `WorkerSettings`, wires the store/embedder/engine/worker stack, starts the
//! HTTP trigger layer and the JSON-RPC stdio tool layer, and waits for a
//! shutdown signal before draining in-flight work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use codesync::application::services::batch_embedder::{BatchEmbedder, BatchEmbedderConfig};
use codesync::application::services::debouncer::{Debouncer, DebouncerConfig};
use codesync::application::services::file_watcher::{FileWatcher, FileWatcherConfig};
use codesync::application::services::health_monitor::{HealthMonitor, HealthMonitorConfig, WorkerHandle};
use codesync::application::services::recovery_service::RecoveryService;
use codesync::application::services::sync_engine::{SyncEngine, SyncEngineConfig};
use codesync::application::services::sync_queue::{SyncQueue, SyncQueueConfig};
use codesync::application::services::worker::{Worker, WorkerConfig};
use codesync::infrastructure::adapters::embedding_provider::HttpEmbeddingProvider;
use codesync::infrastructure::adapters::sqlite_store::SqliteStore;
use codesync::infrastructure::config::WorkerSettings;
use codesync::infrastructure::logging::init_logging;
use codesync::infrastructure::metrics::SyncMetrics;
use codesync::infrastructure::runtime::circuit_breaker::CircuitBreakerConfig;
use codesync::infrastructure::runtime::rate_limiter::{RateLimiter, RateLimiterConfig};
use codesync::presentation::http::{self, AppState};
use codesync::presentation::rpc::RpcServer;
use codesync_bootstrap::{create_signal_handler, result_to_exit_code, Cli, Commands, ExitCode, ShutdownCoordinator};
use codesync_domain::SyncError;
use parking_lot::Mutex;

fn main() {
    let cli = Cli::parse_args();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("fatal: failed to start the async runtime: {err}");
            std::process::exit(ExitCode::Fatal.as_i32());
        }
    };

    let exit_code = runtime.block_on(run(cli));
    std::process::exit(exit_code.as_i32());
}

async fn run(cli: Cli) -> ExitCode {
    if let Commands::ValidatePath { ref path } = cli.command {
        return result_to_exit_code(codesync_bootstrap::cli::run_validate_path(path));
    }

    let settings = match WorkerSettings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("fatal: failed to load configuration: {err}");
            return ExitCode::Fatal;
        }
    };

    init_logging(&settings.logging);

    let bind_address = match &cli.command {
        Commands::Run { bind: Some(bind) } => bind.clone(),
        _ => settings.http.bind_address.clone(),
    };

    result_to_exit_code(run_worker(settings, bind_address).await)
}

async fn run_worker(settings: WorkerSettings, bind_address: String) -> Result<(), SyncError> {
    let store = Arc::new(SqliteStore::connect(&settings.store.connection_string).await?);

    let api_key = std::env::var(&settings.embedding.api_key_env).unwrap_or_default();
    let embedding_provider: Arc<dyn codesync_domain::EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        settings.embedding.base_url.clone(),
        api_key,
        settings.embedding.model.clone(),
    ));

    let rate_limiter = RateLimiter::new(RateLimiterConfig {
        rate_limit: settings.batch_embedder.rate_limit as usize,
        time_window: Duration::from_secs(settings.batch_embedder.time_window_secs),
    });
    let batch_embedder = Arc::new(BatchEmbedder::new(
        embedding_provider,
        rate_limiter,
        BatchEmbedderConfig {
            batch_size: settings.batch_embedder.batch_size,
            max_retries: settings.batch_embedder.max_retries,
        },
    ));

    let sync_engine_config = SyncEngineConfig {
        insert_batch_size: settings.batch_embedder.batch_size,
        max_workers: settings.parallel_processor.max_workers,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: settings.circuit_breaker.failure_threshold,
            timeout: Duration::from_secs(settings.circuit_breaker.timeout_secs),
            half_open_max_calls: settings.circuit_breaker.half_open_max_calls,
        },
    };
    let sync_engine = Arc::new(SyncEngine::new(
        store.clone(),
        store.clone(),
        batch_embedder,
        Arc::new(codesync_domain::SystemClock),
        sync_engine_config,
    ));

    let recovery_service = RecoveryService::new(store.clone(), store.clone(), store.clone(), sync_engine.clone());
    match recovery_service.resume_all().await {
        Ok(resumed) => {
            if resumed > 0 {
                tracing::info!(resumed, "resumed in-flight checkpoints from a prior run");
            }
        }
        Err(err) => tracing::error!(%err, "failed to resume checkpoints on startup"),
    }

    let (file_watcher, file_events_rx) = FileWatcher::new(FileWatcherConfig::default());
    let (debouncer, flushed_rx) = Debouncer::new(DebouncerConfig {
        debounce: Duration::from_secs_f64(settings.debouncer.debounce_seconds),
        max_batch_size: settings.debouncer.max_batch_size,
    });
    let sync_queue = Arc::new(SyncQueue::new(SyncQueueConfig { max_concurrent: settings.worker_loop.max_concurrent }));

    let worker = Arc::new(Worker::new(
        store.clone(),
        sync_engine.clone(),
        file_watcher.clone(),
        file_events_rx,
        debouncer,
        flushed_rx,
        sync_queue.clone(),
        WorkerConfig {
            poll_interval: Duration::from_secs(settings.worker_loop.poll_interval_secs),
            periodic_sync_interval: Duration::from_secs(settings.worker_loop.periodic_sync_interval_secs),
            heartbeat_interval: Duration::from_secs(10),
        },
    ));
    worker.start().await?;

    let health_monitor = Arc::new(HealthMonitor::new(
        worker.clone(),
        HealthMonitorConfig {
            heartbeat_timeout: Duration::from_secs(settings.health_monitor.heartbeat_timeout_secs),
            check_interval: Duration::from_secs(settings.health_monitor.check_interval_secs),
            max_failures: settings.health_monitor.max_failures,
        },
    ));

    let metrics = Arc::new(SyncMetrics::new()?);

    let app_state = AppState {
        sync_engine: sync_engine.clone(),
        project_store: store.clone(),
        knowledge_store: store.clone(),
        analytics_store: store.clone(),
        file_watcher: file_watcher.clone(),
        sync_queue: sync_queue.clone(),
        metrics: metrics.clone(),
        health_snapshot: {
            let health_monitor = health_monitor.clone();
            Arc::new(move || health_monitor.metrics())
        },
        last_sync_duration: Arc::new(Mutex::new(HashMap::new())),
    };

    let router = http::router(app_state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|err| SyncError::Network(format!("failed to bind {bind_address}: {err}")))?;
    tracing::info!(address = %bind_address, "http trigger layer listening");

    let (monitor_shutdown_tx, monitor_shutdown_rx) = tokio::sync::watch::channel(false);
    let monitor_handle = {
        let health_monitor = health_monitor.clone();
        tokio::spawn(async move { health_monitor.monitor_loop(monitor_shutdown_rx).await })
    };

    let rpc_server = RpcServer::new(app_state);
    let rpc_handle = tokio::spawn(async move { rpc_server.serve_stdio().await });

    let coordinator = Arc::new(ShutdownCoordinator::default());
    let token = coordinator.token();
    let signal_handler = create_signal_handler();
    let signal_token = token.clone();
    tokio::spawn(async move {
        signal_handler.wait_for_signal(Box::new(move || signal_token.cancel())).await;
    });

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(err) = result {
                tracing::error!(%err, "http server exited with an error");
            }
        }
        _ = token.cancelled() => {
            tracing::info!("shutdown signal received, stopping worker");
        }
    }

    let _ = monitor_shutdown_tx.send(true);
    monitor_handle.abort();
    rpc_handle.abort();
    worker.stop().await?;

    Ok(())
}
