// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Sync Queue
//!
//! Per-project priority queue (manual before auto, FIFO within a priority)
//! plus a global semaphore capping concurrent [`SyncEngine`](super::sync_engine::SyncEngine)
//! invocations. At most one job executes per project at a time; the rest
//! wait their turn.

use chrono::Utc;
use codesync_domain::{SyncJob, SyncPriority};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SyncQueueConfig {
    pub max_concurrent: usize,
}

impl Default for SyncQueueConfig {
    fn default() -> Self {
        Self { max_concurrent: 3 }
    }
}

#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub total_queued: usize,
    pub active_syncs: usize,
    pub max_concurrent: usize,
    pub available_slots: usize,
}

#[derive(Debug, Clone)]
pub struct ProjectQueueStatus {
    pub project_id: String,
    pub queued: usize,
    pub active: bool,
}

/// Orders by priority first (manual before auto), then FIFO by enqueue time.
/// Wrapped in `Reverse` in the heap so `BinaryHeap::pop` (a max-heap) yields
/// the smallest `(priority, enqueued_at)` pair.
#[derive(Debug, Clone)]
struct QueuedJob(SyncJob);

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.enqueued_at == other.0.enqueued_at
    }
}
impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.priority.cmp(&other.0.priority).then_with(|| self.0.enqueued_at.cmp(&other.0.enqueued_at))
    }
}

#[derive(Default)]
struct State {
    queues: HashMap<String, BinaryHeap<Reverse<QueuedJob>>>,
    active: HashSet<String>,
    operations: HashMap<String, String>, // operation_id -> project_id
    operation_counter: u64,
}

pub struct SyncQueue {
    config: SyncQueueConfig,
    semaphore: Arc<Semaphore>,
    state: Mutex<State>,
}

impl SyncQueue {
    pub fn new(config: SyncQueueConfig) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))), config, state: Mutex::new(State::default()) }
    }

    pub fn enqueue(&self, project_id: &str, changed_files: Option<Vec<PathBuf>>, priority: SyncPriority) -> String {
        let mut state = self.state.lock();
        state.operation_counter += 1;
        let operation_id = format!("sync_{project_id}_{}", state.operation_counter);
        let job = SyncJob {
            operation_id: operation_id.clone(),
            project_id: project_id.to_string(),
            changed_files,
            priority,
            enqueued_at: Utc::now(),
        };
        state.queues.entry(project_id.to_string()).or_default().push(Reverse(QueuedJob(job)));
        state.operations.insert(operation_id.clone(), project_id.to_string());
        info!(project_id, operation_id, ?priority, "enqueued sync operation");
        operation_id
    }

    /// No-op if `project_id` has nothing queued or is already active.
    /// Otherwise acquires the global semaphore, dequeues the
    /// highest-priority job, marks the project active for the duration of
    /// `sync_fn`, and clears the active flag on any outcome.
    pub async fn execute_next<F, Fut, T, E>(&self, project_id: &str, sync_fn: F) -> Option<Result<T, E>>
    where
        F: FnOnce(String, Option<Vec<String>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let state = self.state.lock();
            let has_work = state.queues.get(project_id).map(|q| !q.is_empty()).unwrap_or(false);
            if !has_work || state.active.contains(project_id) {
                return None;
            }
        }

        let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");

        let job = {
            let mut state = self.state.lock();
            if state.active.contains(project_id) {
                return None;
            }
            let Reverse(QueuedJob(job)) = state.queues.get_mut(project_id)?.pop()?;
            state.active.insert(project_id.to_string());
            state.operations.remove(&job.operation_id);
            job
        };

        info!(project_id, operation_id = job.operation_id, "executing sync operation");
        let changed_files =
            job.changed_files.map(|paths| paths.into_iter().map(|p| p.to_string_lossy().into_owned()).collect());
        let result = sync_fn(job.project_id.clone(), changed_files).await;

        self.state.lock().active.remove(project_id);
        Some(result)
    }

    /// Removes a still-queued operation. Returns `false` if unknown or
    /// already executing.
    pub fn cancel(&self, operation_id: &str) -> bool {
        let mut state = self.state.lock();
        let Some(project_id) = state.operations.get(operation_id).cloned() else {
            warn!(operation_id, "cancel: operation not found");
            return false;
        };
        if state.active.contains(&project_id) {
            warn!(operation_id, "cancel: operation already executing");
            return false;
        }

        if let Some(queue) = state.queues.get_mut(&project_id) {
            let remaining: BinaryHeap<Reverse<QueuedJob>> =
                queue.drain().filter(|Reverse(job)| job.0.operation_id != operation_id).collect();
            *queue = remaining;
        }
        state.operations.remove(operation_id);
        info!(operation_id, "cancelled sync operation");
        true
    }

    pub fn is_active(&self, project_id: &str) -> bool {
        self.state.lock().active.contains(project_id)
    }

    pub fn queue_size(&self, project_id: &str) -> usize {
        self.state.lock().queues.get(project_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn status_for(&self, project_id: &str) -> ProjectQueueStatus {
        let state = self.state.lock();
        ProjectQueueStatus {
            project_id: project_id.to_string(),
            queued: state.queues.get(project_id).map(|q| q.len()).unwrap_or(0),
            active: state.active.contains(project_id),
        }
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.state.lock();
        let total_queued: usize = state.queues.values().map(|q| q.len()).sum();
        QueueStatus {
            total_queued,
            active_syncs: state.active.len(),
            max_concurrent: self.config.max_concurrent,
            available_slots: self.config.max_concurrent.saturating_sub(state.active.len()),
        }
    }

    /// Waits up to 30s for active syncs to finish; logs and gives up
    /// otherwise, leaving any in-flight job to be recovered by its
    /// checkpoint.
    pub async fn shutdown(&self) {
        info!("shutting down sync queue");
        let max_wait = Duration::from_secs(30);
        let poll = Duration::from_secs(1);
        let mut waited = Duration::ZERO;

        while waited < max_wait {
            if self.state.lock().active.is_empty() {
                break;
            }
            tokio::time::sleep(poll).await;
            waited += poll;
        }

        let remaining = self.state.lock().active.len();
        if remaining > 0 {
            warn!(remaining, "sync queue shutdown: active syncs still running after 30s");
        }
        info!("sync queue shutdown complete");
    }
}
