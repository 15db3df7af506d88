// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Trigger Layer
//!
//! An `axum` router implementing the trigger interface named in §6: project
//! sync config/status/trigger endpoints, the watcher start/stop/status/health
//! endpoints, and a Prometheus `/metrics` scrape endpoint. Handlers validate
//! their JSON body against a typed request struct and map [`SyncError`] to an
//! HTTP status with a `detail` field carrying the classifier's user message.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use codesync_domain::{
    AnalyticsStore, KnowledgeStore, ProjectStore, SyncError, SyncMode, SyncOperationRecord, SyncOperationStatus,
    SyncPriority, SyncTrigger,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::application::services::file_watcher::FileWatcher;
use crate::application::services::health_monitor::HealthMetrics;
use crate::application::services::sync_engine::SyncEngine;
use crate::application::services::sync_queue::SyncQueue;
use crate::infrastructure::metrics::SyncMetrics;
use codesync_bootstrap::path_safety;

/// A type-erased accessor for the supervising worker's health snapshot,
/// since [`HealthMonitor`](crate::application::services::health_monitor::HealthMonitor)
/// is generic over its `WorkerHandle` and the HTTP layer only needs the
/// snapshot, not the monitor itself.
pub type HealthSnapshotFn = Arc<dyn Fn() -> HealthMetrics + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub sync_engine: Arc<SyncEngine>,
    pub project_store: Arc<dyn ProjectStore>,
    pub knowledge_store: Arc<dyn KnowledgeStore>,
    pub analytics_store: Arc<dyn AnalyticsStore>,
    pub file_watcher: Arc<FileWatcher>,
    pub sync_queue: Arc<SyncQueue>,
    pub metrics: Arc<SyncMetrics>,
    pub health_snapshot: HealthSnapshotFn,
    /// `duration_seconds` of the most recent completed sync per project,
    /// surfaced in `GET /projects/{id}/sync/status`. Not a store concern —
    /// the analytics store is append-only and has no "most recent" query.
    pub last_sync_duration: Arc<Mutex<HashMap<String, f64>>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/projects/:id/sync/config", put(update_sync_config))
        .route("/projects/:id/sync/status", get(get_sync_status))
        .route("/projects/:id/sync", post(trigger_sync))
        .route("/api/watcher/projects/:id/start", post(start_watching))
        .route("/api/watcher/projects/:id/stop", post(stop_watching))
        .route("/api/watcher/projects/:id/status", get(watcher_status))
        .route("/api/watcher/health", get(watcher_health))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    detail: String,
}

/// Maps a domain error to its HTTP status, per §7's category taxonomy: not
/// found and bad input are client errors, circuit-open is a retryable
/// upstream-unavailable signal, the rest are server-side failures.
fn error_response(err: SyncError) -> Response {
    let status = match &err {
        SyncError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        SyncError::InvalidPath(_) | SyncError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
        SyncError::Permission(_) => StatusCode::FORBIDDEN,
        SyncError::Parsing(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SyncError::Network(_) | SyncError::Embedding(_) => StatusCode::BAD_GATEWAY,
        SyncError::Database(_) | SyncError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody { error: err.category().to_string(), detail: err.user_message() };
    (status, Json(body)).into_response()
}

fn path_safety_response(err: path_safety::PathSafetyError) -> Response {
    let body = ErrorBody { error: "invalid_path".to_string(), detail: err.to_string() };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct ConfigUpdateRequest {
    local_path: Option<String>,
    sync_mode: Option<SyncMode>,
    auto_sync_enabled: Option<bool>,
}

async fn update_sync_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ConfigUpdateRequest>,
) -> Response {
    let mut project = match state.project_store.get(&id).await {
        Ok(project) => project,
        Err(err) => return error_response(err),
    };

    if let Some(local_path) = &body.local_path {
        match path_safety::validate_local_path(local_path) {
            Ok(canonical) => project.local_path = canonical,
            Err(err) => return path_safety_response(err),
        }
    }
    if let Some(sync_mode) = body.sync_mode {
        project.sync_mode = sync_mode;
    }
    if let Some(auto_sync_enabled) = body.auto_sync_enabled {
        project.auto_sync_enabled = auto_sync_enabled;
    }

    if let Err(err) = state.project_store.upsert_project(&project).await {
        return error_response(err);
    }
    Json(serde_json::json!({ "id": project.id, "updated": true })).into_response()
}

#[derive(Debug, Serialize)]
struct SyncStatusStats {
    total_files: u64,
    total_chunks: u64,
    last_sync_duration_seconds: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SyncStatusResponse {
    sync_status: codesync_domain::SyncStatus,
    last_sync_at: Option<chrono::DateTime<Utc>>,
    last_sync_error: Option<String>,
    auto_sync_enabled: bool,
    sync_mode: SyncMode,
    local_path: String,
    stats: SyncStatusStats,
}

async fn get_sync_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let project = match state.project_store.get(&id).await {
        Ok(project) => project,
        Err(err) => return error_response(err),
    };

    let (total_files, total_chunks) = match &project.source_id {
        Some(source_id) => {
            let total_files = state.knowledge_store.count_unique_files(source_id).await.unwrap_or_else(|err| {
                warn!(project_id = id, %err, "failed to count unique files");
                0
            });
            let total_chunks = state
                .knowledge_store
                .select_chunk_handles(source_id)
                .await
                .map(|handles| handles.len() as u64)
                .unwrap_or_else(|err| {
                    warn!(project_id = id, %err, "failed to count chunks");
                    0
                });
            (total_files, total_chunks)
        }
        None => (0, 0),
    };

    let last_sync_duration_seconds = state.last_sync_duration.lock().get(&id).copied();

    Json(SyncStatusResponse {
        sync_status: project.sync_status,
        last_sync_at: project.last_sync_at,
        last_sync_error: project.last_sync_error,
        auto_sync_enabled: project.auto_sync_enabled,
        sync_mode: project.sync_mode,
        local_path: project.local_path.display().to_string(),
        stats: SyncStatusStats { total_files, total_chunks, last_sync_duration_seconds },
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
struct TriggerSyncRequest {
    trigger: String,
    changed_files: Option<Vec<String>>,
}

fn parse_trigger(raw: &str) -> Result<(SyncTrigger, SyncPriority), SyncError> {
    match raw {
        "manual" => Ok((SyncTrigger::Manual, SyncPriority::Manual)),
        "git-hook" => Ok((SyncTrigger::GitHook, SyncPriority::Auto)),
        "scheduled" => Ok((SyncTrigger::Scheduled, SyncPriority::Auto)),
        other => Err(SyncError::InvalidConfiguration(format!("unknown trigger: {other}"))),
    }
}

async fn trigger_sync(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<TriggerSyncRequest>) -> Response {
    if let Err(err) = state.project_store.get(&id).await {
        return error_response(err);
    }

    let (trigger, priority) = match parse_trigger(&body.trigger) {
        Ok(pair) => pair,
        Err(err) => return error_response(err),
    };

    let changed_files = body.changed_files.map(|files| files.into_iter().map(std::path::PathBuf::from).collect());
    state.sync_queue.enqueue(&id, changed_files, priority);

    let started_at = Utc::now();
    let sync_engine = Arc::clone(&state.sync_engine);
    let outcome = state
        .sync_queue
        .execute_next(&id, move |project_id, changed_files| async move {
            sync_engine.sync_project(&project_id, changed_files).await
        })
        .await;

    let Some(result) = outcome else {
        let body = ErrorBody {
            error: "sync_in_progress".to_string(),
            detail: format!("a sync for project {id} is already running"),
        };
        return (StatusCode::CONFLICT, Json(body)).into_response();
    };

    let completed_at = Utc::now();
    let record_base = SyncOperationRecord {
        id: Uuid::new_v4().to_string(),
        project_id: id.clone(),
        trigger,
        started_at,
        completed_at: Some(completed_at),
        status: SyncOperationStatus::Completed,
        files_processed: 0,
        chunks_added: 0,
        chunks_modified: 0,
        chunks_deleted: 0,
        duration_seconds: None,
        error_message: None,
    };

    match result {
        Ok(stats) => {
            state.last_sync_duration.lock().insert(id.clone(), stats.duration_seconds);
            state.metrics.record_sync_duration(std::time::Duration::from_secs_f64(stats.duration_seconds));
            state.metrics.record_chunks_added(stats.chunks_added);
            state.metrics.record_chunks_modified(stats.chunks_modified);
            state.metrics.record_chunks_deleted(stats.chunks_deleted);

            let record = SyncOperationRecord {
                files_processed: stats.files_processed,
                chunks_added: stats.chunks_added,
                chunks_modified: stats.chunks_modified,
                chunks_deleted: stats.chunks_deleted,
                duration_seconds: Some(stats.duration_seconds),
                status: if stats.has_errors() { SyncOperationStatus::Error } else { SyncOperationStatus::Completed },
                error_message: stats.errors.first().cloned(),
                ..record_base
            };
            if let Err(err) = state.analytics_store.record(&record).await {
                warn!(project_id = id, %err, "failed to record sync analytics");
            }

            Json(stats).into_response()
        }
        Err(err) => {
            let record = SyncOperationRecord {
                status: SyncOperationStatus::Error,
                error_message: Some(err.user_message()),
                ..record_base
            };
            if let Err(record_err) = state.analytics_store.record(&record).await {
                warn!(project_id = id, %record_err, "failed to record sync analytics");
            }
            error_response(err)
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartWatchingRequest {
    local_path: String,
}

async fn start_watching(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StartWatchingRequest>,
) -> Response {
    let mut project = match state.project_store.get(&id).await {
        Ok(project) => project,
        Err(err) => return error_response(err),
    };

    let canonical = match path_safety::validate_local_path(&body.local_path) {
        Ok(canonical) => canonical,
        Err(err) => return path_safety_response(err),
    };

    project.local_path = canonical.clone();
    if let Err(err) = state.project_store.upsert_project(&project).await {
        return error_response(err);
    }

    if let Err(err) = state.file_watcher.start_watching(&id, &canonical) {
        return error_response(err);
    }
    Json(serde_json::json!({ "id": id, "is_watching": true })).into_response()
}

async fn stop_watching(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let stopped = state.file_watcher.stop_watching(&id);
    Json(serde_json::json!({ "id": id, "is_watching": false, "was_watching": stopped })).into_response()
}

#[derive(Debug, Serialize)]
struct WatcherStatusResponse {
    is_active: bool,
    is_watching: bool,
}

async fn watcher_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    Json(WatcherStatusResponse { is_active: state.sync_queue.is_active(&id), is_watching: state.file_watcher.is_watching(&id) })
        .into_response()
}

async fn watcher_health(State(state): State<AppState>) -> Response {
    let metrics = (state.health_snapshot)();
    Json(serde_json::json!({
        "healthy": metrics.healthy,
        "running": metrics.running,
        "restart_count": metrics.restart_count,
        "failure_count": metrics.failure_count,
        "cpu_percent": metrics.cpu_percent,
        "memory_mb": metrics.memory_mb,
        "watched_projects": metrics.watched_projects,
        "pending_events": metrics.pending_events,
        "time_since_heartbeat": metrics.time_since_heartbeat,
    }))
    .into_response()
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(err) => error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::batch_embedder::{BatchEmbedder, BatchEmbedderConfig};
    use crate::application::services::file_watcher::FileWatcherConfig;
    use crate::application::services::sync_engine::SyncEngineConfig;
    use crate::application::services::sync_queue::SyncQueueConfig;
    use crate::infrastructure::adapters::embedding_provider::FakeEmbeddingProvider;
    use crate::infrastructure::adapters::sqlite_store::SqliteStore;
    use crate::infrastructure::runtime::rate_limiter::{RateLimiter, RateLimiterConfig};
    use codesync_domain::{Project, SystemClock};

    async fn test_state() -> (AppState, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let batch_embedder = Arc::new(BatchEmbedder::new(
            Arc::new(FakeEmbeddingProvider::new(8)),
            RateLimiter::new(RateLimiterConfig::default()),
            BatchEmbedderConfig::default(),
        ));
        let sync_engine = Arc::new(SyncEngine::new(
            store.clone(),
            store.clone(),
            batch_embedder,
            Arc::new(SystemClock),
            SyncEngineConfig::default(),
        ));
        let (file_watcher, _events) = FileWatcher::new(FileWatcherConfig::default());
        let state = AppState {
            sync_engine,
            project_store: store.clone(),
            knowledge_store: store.clone(),
            analytics_store: store.clone(),
            file_watcher,
            sync_queue: Arc::new(SyncQueue::new(SyncQueueConfig::default())),
            metrics: Arc::new(SyncMetrics::default()),
            health_snapshot: Arc::new(|| HealthMetrics {
                healthy: true,
                running: true,
                restart_count: 0,
                failure_count: 0,
                cpu_percent: 0.0,
                memory_mb: 0.0,
                watched_projects: 0,
                pending_events: 0,
                time_since_heartbeat: None,
            }),
            last_sync_duration: Arc::new(Mutex::new(HashMap::new())),
        };
        (state, store)
    }

    #[tokio::test]
    async fn update_sync_config_rejects_a_missing_project() {
        let (state, _store) = test_state().await;
        let body = ConfigUpdateRequest { local_path: None, sync_mode: None, auto_sync_enabled: Some(true) };
        let response = update_sync_config(State(state), Path("missing".to_string()), Json(body)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_sync_config_persists_allowed_fields() {
        let (state, store) = test_state().await;
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("p1", dir.path().to_path_buf(), SyncMode::Manual);
        store.upsert_project(&project).await.unwrap();

        let body = ConfigUpdateRequest { local_path: None, sync_mode: Some(SyncMode::Realtime), auto_sync_enabled: Some(true) };
        let response = update_sync_config(State(state), Path("p1".to_string()), Json(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let updated = store.get("p1").await.unwrap();
        assert_eq!(updated.sync_mode, SyncMode::Realtime);
        assert!(updated.auto_sync_enabled);
    }

    #[tokio::test]
    async fn get_sync_status_rejects_a_missing_project() {
        let (state, _store) = test_state().await;
        let response = get_sync_status(State(state), Path("missing".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn watcher_status_reports_inactive_for_an_unwatched_project() {
        let (state, _store) = test_state().await;
        let response = watcher_status(State(state), Path("p1".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_watching_accepts_a_readable_project_directory() {
        let (state, store) = test_state().await;
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("p1", dir.path().to_path_buf(), SyncMode::Realtime);
        store.upsert_project(&project).await.unwrap();

        let body = StartWatchingRequest { local_path: dir.path().to_string_lossy().into_owned() };
        let response = start_watching(State(state), Path("p1".to_string()), Json(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_watching_rejects_a_protected_system_path() {
        let (state, store) = test_state().await;
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("p1", dir.path().to_path_buf(), SyncMode::Realtime);
        store.upsert_project(&project).await.unwrap();

        let body = StartWatchingRequest { local_path: "/etc".to_string() };
        let response = start_watching(State(state), Path("p1".to_string()), Json(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_text() {
        let (state, _store) = test_state().await;
        let response = metrics_endpoint(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
