// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Debouncer
//!
//! Groups rapid file-change events per project so a burst of saves doesn't
//! trigger a sync per keystroke. Keeps only the latest event per file path;
//! flushes after a quiet period, or immediately once a project's pending
//! batch hits `max_batch_size`. Flushed batches are delivered over an
//! unbounded channel rather than a callback, so the consumer (the worker's
//! event-consume loop) drives its own backpressure.

use codesync_domain::FileEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct DebouncerConfig {
    pub debounce: Duration,
    pub max_batch_size: usize,
}

impl Default for DebouncerConfig {
    fn default() -> Self {
        Self { debounce: Duration::from_secs(2), max_batch_size: 50 }
    }
}

struct ProjectState {
    pending: HashMap<PathBuf, FileEvent>,
    timer: Option<JoinHandle<()>>,
}

pub struct Debouncer {
    config: DebouncerConfig,
    projects: Mutex<HashMap<String, ProjectState>>,
    flushed: mpsc::UnboundedSender<(String, Vec<FileEvent>)>,
}

impl Debouncer {
    pub fn new(config: DebouncerConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, Vec<FileEvent>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { config, projects: Mutex::new(HashMap::new()), flushed: tx }), rx)
    }

    /// Records `event`, overwriting any pending event for the same file, and
    /// (re)starts the project's debounce timer. Flushes immediately instead
    /// if the batch has reached `max_batch_size`.
    pub fn add_event(self: &Arc<Self>, event: FileEvent) {
        let project_id = event.project_id.clone();
        let should_flush_now = {
            let mut projects = self.projects.lock();
            let state = projects
                .entry(project_id.clone())
                .or_insert_with(|| ProjectState { pending: HashMap::new(), timer: None });
            state.pending.insert(event.file_path.clone(), event);
            if let Some(handle) = state.timer.take() {
                handle.abort();
            }
            state.pending.len() >= self.config.max_batch_size
        };

        if should_flush_now {
            info!(project_id, "max batch size reached, flushing immediately");
            self.flush(&project_id);
            return;
        }

        let this = Arc::clone(self);
        let debounce = self.config.debounce;
        let timer_project = project_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            this.flush(&timer_project);
        });

        if let Some(state) = self.projects.lock().get_mut(&project_id) {
            state.timer = Some(handle);
        }
    }

    /// Flushes pending events for one project. Returns how many were sent.
    pub fn flush(&self, project_id: &str) -> usize {
        let events = {
            let mut projects = self.projects.lock();
            let Some(mut state) = projects.remove(project_id) else {
                return 0;
            };
            if let Some(handle) = state.timer.take() {
                handle.abort();
            }
            state.pending.into_values().collect::<Vec<_>>()
        };

        if events.is_empty() {
            return 0;
        }

        let count = events.len();
        info!(project_id, count, "flushed debounced events");
        if self.flushed.send((project_id.to_string(), events)).is_err() {
            warn!(project_id, "debounce flush receiver has been dropped");
        }
        count
    }

    pub fn flush_all(&self) -> usize {
        let project_ids: Vec<String> = self.projects.lock().keys().cloned().collect();
        project_ids.iter().map(|id| self.flush(id)).sum()
    }

    pub fn pending_count(&self, project_id: Option<&str>) -> usize {
        let projects = self.projects.lock();
        match project_id {
            Some(id) => projects.get(id).map(|s| s.pending.len()).unwrap_or(0),
            None => projects.values().map(|s| s.pending.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_domain::FileEventKind;
    use std::time::Instant;

    fn event(project_id: &str, path: &str, kind: FileEventKind) -> FileEvent {
        FileEvent::new(kind, project_id, PathBuf::from(path), chrono::Utc::now())
    }

    #[tokio::test]
    async fn repeated_events_for_same_file_coalesce_into_one() {
        let (debouncer, mut rx) = Debouncer::new(DebouncerConfig { debounce: Duration::from_millis(20), max_batch_size: 50 });

        debouncer.add_event(event("p1", "a.py", FileEventKind::Modified));
        debouncer.add_event(event("p1", "a.py", FileEventKind::Modified));
        debouncer.add_event(event("p1", "a.py", FileEventKind::Modified));

        let (project_id, events) = rx.recv().await.unwrap();
        assert_eq!(project_id, "p1");
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn max_batch_size_flushes_without_waiting_for_timer() {
        let (debouncer, mut rx) =
            Debouncer::new(DebouncerConfig { debounce: Duration::from_secs(60), max_batch_size: 3 });

        let start = Instant::now();
        debouncer.add_event(event("p1", "a.py", FileEventKind::Created));
        debouncer.add_event(event("p1", "b.py", FileEventKind::Created));
        debouncer.add_event(event("p1", "c.py", FileEventKind::Created));

        let (_project_id, events) = rx.recv().await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn distinct_projects_debounce_independently() {
        let (debouncer, mut rx) = Debouncer::new(DebouncerConfig { debounce: Duration::from_millis(20), max_batch_size: 50 });

        debouncer.add_event(event("p1", "a.py", FileEventKind::Created));
        debouncer.add_event(event("p2", "b.py", FileEventKind::Created));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let project_ids: Vec<&str> = vec![first.0.as_str(), second.0.as_str()];
        assert!(project_ids.contains(&"p1"));
        assert!(project_ids.contains(&"p2"));
    }

    #[tokio::test]
    async fn manual_flush_returns_pending_events_immediately() {
        let (debouncer, mut rx) = Debouncer::new(DebouncerConfig { debounce: Duration::from_secs(60), max_batch_size: 50 });
        debouncer.add_event(event("p1", "a.py", FileEventKind::Created));
        assert_eq!(debouncer.pending_count(Some("p1")), 1);

        let flushed = debouncer.flush("p1");
        assert_eq!(flushed, 1);
        assert_eq!(debouncer.pending_count(Some("p1")), 0);

        let (project_id, events) = rx.recv().await.unwrap();
        assert_eq!(project_id, "p1");
        assert_eq!(events.len(), 1);
    }
}
