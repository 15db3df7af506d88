// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Worker
//!
//! The lifecycle supervisor: owns the [`FileWatcher`], [`Debouncer`],
//! [`SyncQueue`], and [`SyncEngine`], and drives them with four concurrent
//! loops (project discovery, event consumption, periodic sync, heartbeat)
//! plus a debounced-flush consumer that turns coalesced batches into queued
//! sync jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codesync_domain::{ProjectStore, SyncError, SyncMode, SyncPriority};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::debouncer::Debouncer;
use super::file_watcher::FileWatcher;
use super::health_monitor::WorkerHandle;
use super::sync_engine::SyncEngine;
use super::sync_queue::SyncQueue;

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub periodic_sync_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            periodic_sync_interval: Duration::from_secs(3600),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Default)]
struct RunState {
    running: bool,
    last_heartbeat: Option<DateTime<Utc>>,
    tasks: Vec<JoinHandle<()>>,
}

pub struct Worker {
    project_store: Arc<dyn ProjectStore>,
    sync_engine: Arc<SyncEngine>,
    file_watcher: Arc<FileWatcher>,
    debouncer: Arc<Debouncer>,
    sync_queue: Arc<SyncQueue>,
    config: WorkerConfig,
    state: Arc<Mutex<RunState>>,
    shutdown: watch::Sender<bool>,
    file_events_rx: Mutex<Option<mpsc::Receiver<codesync_domain::FileEvent>>>,
    flushed_rx: Mutex<Option<mpsc::UnboundedReceiver<(String, Vec<codesync_domain::FileEvent>)>>>,
}

/// Runs one sync through the queue, letting `execute_next` enforce
/// at-most-one-active-per-project. No-op if the project is already running.
fn spawn_queued_sync(sync_queue: Arc<SyncQueue>, sync_engine: Arc<SyncEngine>, project_id: String) {
    tokio::spawn(async move {
        sync_queue
            .execute_next(&project_id, move |project_id, changed_files| {
                let sync_engine = Arc::clone(&sync_engine);
                async move { sync_engine.sync_project(&project_id, changed_files).await }
            })
            .await;
    });
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_store: Arc<dyn ProjectStore>,
        sync_engine: Arc<SyncEngine>,
        file_watcher: Arc<FileWatcher>,
        file_events_rx: mpsc::Receiver<codesync_domain::FileEvent>,
        debouncer: Arc<Debouncer>,
        flushed_rx: mpsc::UnboundedReceiver<(String, Vec<codesync_domain::FileEvent>)>,
        sync_queue: Arc<SyncQueue>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            project_store,
            sync_engine,
            file_watcher,
            debouncer,
            sync_queue,
            config,
            state: Arc::new(Mutex::new(RunState::default())),
            shutdown,
            file_events_rx: Mutex::new(Some(file_events_rx)),
            flushed_rx: Mutex::new(Some(flushed_rx)),
        }
    }

    fn spawn_discovery_loop(&self) -> JoinHandle<()> {
        let project_store = Arc::clone(&self.project_store);
        let file_watcher = Arc::clone(&self.file_watcher);
        let poll_interval = self.config.poll_interval;
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => if *shutdown.borrow() { break },
                    _ = tokio::time::sleep(poll_interval) => {
                        run_discovery(&project_store, &file_watcher).await;
                    }
                }
            }
        })
    }

    fn spawn_event_consume_loop(&self, mut rx: mpsc::Receiver<codesync_domain::FileEvent>) -> JoinHandle<()> {
        let debouncer = Arc::clone(&self.debouncer);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debouncer.add_event(event);
            }
        })
    }

    fn spawn_flush_consume_loop(
        &self,
        mut rx: mpsc::UnboundedReceiver<(String, Vec<codesync_domain::FileEvent>)>,
    ) -> JoinHandle<()> {
        let sync_queue = Arc::clone(&self.sync_queue);
        let sync_engine = Arc::clone(&self.sync_engine);
        tokio::spawn(async move {
            while let Some((project_id, events)) = rx.recv().await {
                let changed_files: Vec<std::path::PathBuf> = events.into_iter().map(|e| e.file_path).collect();
                sync_queue.enqueue(&project_id, Some(changed_files), SyncPriority::Auto);
                spawn_queued_sync(Arc::clone(&sync_queue), Arc::clone(&sync_engine), project_id);
            }
        })
    }

    fn spawn_periodic_sync_loop(&self) -> JoinHandle<()> {
        let project_store = Arc::clone(&self.project_store);
        let sync_queue = Arc::clone(&self.sync_queue);
        let sync_engine = Arc::clone(&self.sync_engine);
        let periodic_sync_interval = self.config.periodic_sync_interval;
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => if *shutdown.borrow() { break },
                    _ = tokio::time::sleep(periodic_sync_interval) => {
                        run_periodic_sync(&project_store, &sync_queue, &sync_engine, periodic_sync_interval).await;
                    }
                }
            }
        })
    }

    fn spawn_heartbeat_loop(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let heartbeat_interval = self.config.heartbeat_interval;
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                state.lock().last_heartbeat = Some(Utc::now());
                tokio::select! {
                    _ = shutdown.changed() => if *shutdown.borrow() { break },
                    _ = tokio::time::sleep(heartbeat_interval) => {}
                }
            }
        })
    }
}

async fn run_discovery(project_store: &Arc<dyn ProjectStore>, file_watcher: &Arc<FileWatcher>) {
    let projects = match project_store.list_auto_sync_enabled().await {
        Ok(projects) => projects,
        Err(err) => {
            warn!(%err, "project discovery: failed to list auto-sync projects");
            return;
        }
    };

    let mut realtime_ids = std::collections::HashSet::new();
    for project in &projects {
        if project.sync_mode == SyncMode::Realtime {
            realtime_ids.insert(project.id.clone());
            if !file_watcher.is_watching(&project.id) {
                if let Err(err) = file_watcher.start_watching(&project.id, &project.local_path) {
                    warn!(project_id = project.id, %err, "failed to start watching project");
                }
            }
        }
    }

    for project_id in file_watcher.watched_projects() {
        if !realtime_ids.contains(&project_id) {
            file_watcher.stop_watching(&project_id);
        }
    }
}

async fn run_periodic_sync(
    project_store: &Arc<dyn ProjectStore>,
    sync_queue: &Arc<SyncQueue>,
    sync_engine: &Arc<SyncEngine>,
    periodic_sync_interval: Duration,
) {
    let projects = match project_store.list_auto_sync_enabled().await {
        Ok(projects) => projects,
        Err(err) => {
            warn!(%err, "periodic sync: failed to list auto-sync projects");
            return;
        }
    };

    let now = Utc::now();
    let interval = chrono::Duration::from_std(periodic_sync_interval).unwrap_or(chrono::Duration::seconds(3600));
    for project in projects {
        if project.sync_mode != SyncMode::Periodic {
            continue;
        }
        let due = project.last_sync_at.map(|last| now - last > interval).unwrap_or(true);
        if due {
            sync_queue.enqueue(&project.id, None, SyncPriority::Auto);
            spawn_queued_sync(Arc::clone(sync_queue), Arc::clone(sync_engine), project.id.clone());
        }
    }
}

#[async_trait]
impl WorkerHandle for Worker {
    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_heartbeat
    }

    async fn start(&self) -> Result<(), SyncError> {
        if self.state.lock().running {
            warn!("worker already running");
            return Ok(());
        }

        let Some(file_events_rx) = self.file_events_rx.lock().take() else {
            return Err(SyncError::Unknown("worker already consumed its file-event receiver".into()));
        };
        let Some(flushed_rx) = self.flushed_rx.lock().take() else {
            return Err(SyncError::Unknown("worker already consumed its debouncer-flush receiver".into()));
        };

        let _ = self.shutdown.send(false);

        let tasks = vec![
            self.spawn_event_consume_loop(file_events_rx),
            self.spawn_flush_consume_loop(flushed_rx),
            self.spawn_discovery_loop(),
            self.spawn_periodic_sync_loop(),
            self.spawn_heartbeat_loop(),
        ];

        let mut state = self.state.lock();
        state.running = true;
        state.last_heartbeat = Some(Utc::now());
        state.tasks = tasks;
        info!("worker started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), SyncError> {
        let tasks = {
            let mut state = self.state.lock();
            if !state.running {
                return Ok(());
            }
            state.running = false;
            std::mem::take(&mut state.tasks)
        };

        let _ = self.shutdown.send(true);
        for task in tasks {
            task.abort();
        }

        for project_id in self.file_watcher.watched_projects() {
            self.file_watcher.stop_watching(&project_id);
        }
        self.debouncer.flush_all();
        self.sync_queue.shutdown().await;

        info!("worker stopped");
        Ok(())
    }

    fn watched_projects(&self) -> usize {
        self.file_watcher.watched_projects().len()
    }

    fn pending_events(&self) -> usize {
        self.debouncer.pending_count(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::batch_embedder::{BatchEmbedder, BatchEmbedderConfig};
    use crate::application::services::debouncer::DebouncerConfig;
    use crate::application::services::file_watcher::FileWatcherConfig;
    use crate::application::services::sync_engine::SyncEngineConfig;
    use crate::application::services::sync_queue::SyncQueueConfig;
    use crate::infrastructure::runtime::rate_limiter::RateLimiter;
    use codesync_domain::{
        Chunk, ChunkHandle, Clock, Embedding, KnowledgeStore, Project, SyncStatus, SystemClock,
    };
    use std::path::PathBuf;

    struct FakeEmbedder;
    #[async_trait::async_trait]
    impl codesync_domain::EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>, SyncError> {
            Ok(texts.iter().map(|_| Some(vec![0.0_f32])).collect())
        }
        fn max_tokens_per_request(&self) -> usize {
            1000
        }
    }

    #[derive(Default)]
    struct FakeStore;
    #[async_trait::async_trait]
    impl KnowledgeStore for FakeStore {
        async fn upsert_source(&self, _project_id: &str, _display_name: &str) -> Result<String, SyncError> {
            Ok("source-1".to_string())
        }
        async fn delete_source(&self, _source_id: &str) -> Result<(), SyncError> {
            Ok(())
        }
        async fn insert_chunks(&self, _chunks: &[Chunk]) -> Result<(), SyncError> {
            Ok(())
        }
        async fn delete_chunks_by_ids(&self, _ids: &[String]) -> Result<u64, SyncError> {
            Ok(0)
        }
        async fn delete_chunks_by_file(&self, _source_id: &str, _file_path: &str) -> Result<u64, SyncError> {
            Ok(0)
        }
        async fn select_chunks_by_file(&self, _source_id: &str, _file_path: &str) -> Result<Vec<Chunk>, SyncError> {
            Ok(Vec::new())
        }
        async fn select_chunk_handles(&self, _source_id: &str) -> Result<Vec<ChunkHandle>, SyncError> {
            Ok(Vec::new())
        }
        async fn count_unique_files(&self, _source_id: &str) -> Result<u64, SyncError> {
            Ok(0)
        }
        async fn find_duplicate_chunk_hashes(&self, _source_id: &str) -> Result<Vec<String>, SyncError> {
            Ok(Vec::new())
        }
        async fn find_chunks_missing_embeddings(&self, _source_id: &str) -> Result<Vec<String>, SyncError> {
            Ok(Vec::new())
        }
    }

    struct FakeProjectStore;
    #[async_trait::async_trait]
    impl ProjectStore for FakeProjectStore {
        async fn get(&self, project_id: &str) -> Result<Project, SyncError> {
            Ok(Project::new(project_id, PathBuf::new(), SyncMode::Manual))
        }
        async fn upsert_project(&self, _project: &Project) -> Result<(), SyncError> {
            Ok(())
        }
        async fn set_source_id(&self, _project_id: &str, _source_id: &str) -> Result<(), SyncError> {
            Ok(())
        }
        async fn update_sync_status(
            &self,
            _project_id: &str,
            _status: SyncStatus,
            _at: DateTime<Utc>,
            _error: Option<&str>,
        ) -> Result<(), SyncError> {
            Ok(())
        }
        async fn list_auto_sync_enabled(&self) -> Result<Vec<Project>, SyncError> {
            Ok(Vec::new())
        }
    }

    fn test_worker() -> Arc<Worker> {
        let knowledge_store: Arc<dyn KnowledgeStore> = Arc::new(FakeStore);
        let project_store: Arc<dyn ProjectStore> = Arc::new(FakeProjectStore);
        let rate_limiter = RateLimiter::new(Default::default());
        let embedder = Arc::new(BatchEmbedder::new(Arc::new(FakeEmbedder), rate_limiter, BatchEmbedderConfig::default()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sync_engine =
            Arc::new(SyncEngine::new(knowledge_store, project_store.clone(), embedder, clock, SyncEngineConfig::default()));
        let (file_watcher, file_events_rx) = FileWatcher::new(FileWatcherConfig::default());
        let (debouncer, flushed_rx) = Debouncer::new(DebouncerConfig::default());
        let sync_queue = Arc::new(SyncQueue::new(SyncQueueConfig::default()));

        Arc::new(Worker::new(
            project_store,
            sync_engine,
            file_watcher,
            file_events_rx,
            debouncer,
            flushed_rx,
            sync_queue,
            WorkerConfig {
                poll_interval: Duration::from_secs(3600),
                periodic_sync_interval: Duration::from_secs(3600),
                heartbeat_interval: Duration::from_millis(20),
            },
        ))
    }

    #[tokio::test]
    async fn start_marks_running_and_begins_heartbeating() {
        let worker = test_worker();
        assert!(!worker.is_running());

        worker.start().await.unwrap();
        assert!(worker.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(worker.last_heartbeat().is_some());

        worker.stop().await.unwrap();
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let worker = test_worker();
        worker.stop().await.unwrap();
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn starting_twice_is_idempotent() {
        let worker = test_worker();
        worker.start().await.unwrap();
        worker.start().await.unwrap();
        assert!(worker.is_running());
        worker.stop().await.unwrap();
    }
}
