// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # File Watcher
//!
//! One `notify` watcher per project directory, filtering out common
//! development artifacts (VCS metadata, build output, editor swap files)
//! before forwarding a [`FileEvent`] onto a bounded shared channel. `notify`
//! delivers events from its own OS-thread callback, so events are
//! `try_send`'d rather than awaited — a full channel drops the event with a
//! warning instead of blocking the watcher thread.

use chrono::Utc;
use codesync_domain::{FileEvent, FileEventKind, SyncError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const EXCLUDE_DIR_NAMES: &[&str] = &[
    "node_modules",
    "__pycache__",
    ".git",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "venv",
    "env",
    ".venv",
    ".pytest_cache",
    "coverage",
    ".coverage",
    ".mypy_cache",
    ".idea",
    ".vscode",
];

const EXCLUDE_EXTENSIONS: &[&str] = &["pyc", "pyo", "swp", "log", "tmp", "temp"];

#[derive(Debug, Clone, Copy)]
pub struct FileWatcherConfig {
    pub channel_capacity: usize,
}

impl Default for FileWatcherConfig {
    fn default() -> Self {
        Self { channel_capacity: 1000 }
    }
}

pub struct FileWatcher {
    sender: mpsc::Sender<FileEvent>,
    watchers: Mutex<HashMap<String, RecommendedWatcher>>,
}

impl FileWatcher {
    pub fn new(config: FileWatcherConfig) -> (Arc<Self>, mpsc::Receiver<FileEvent>) {
        let (sender, receiver) = mpsc::channel(config.channel_capacity);
        (Arc::new(Self { sender, watchers: Mutex::new(HashMap::new()) }), receiver)
    }

    pub fn start_watching(&self, project_id: &str, local_path: &Path) -> Result<(), SyncError> {
        if self.watchers.lock().contains_key(project_id) {
            warn!(project_id, "already watching project");
            return Ok(());
        }
        if !local_path.exists() {
            return Err(SyncError::InvalidPath(format!("path does not exist: {}", local_path.display())));
        }
        if !local_path.is_dir() {
            return Err(SyncError::InvalidPath(format!("path is not a directory: {}", local_path.display())));
        }

        let project_id_owned = project_id.to_string();
        let sender = self.sender.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => forward_event(&project_id_owned, event, &sender),
            Err(err) => warn!(project_id = project_id_owned, %err, "file watch error"),
        })
        .map_err(|err| SyncError::Unknown(format!("failed to create watcher: {err}")))?;

        watcher
            .watch(local_path, RecursiveMode::Recursive)
            .map_err(|err| SyncError::InvalidPath(format!("failed to watch {}: {err}", local_path.display())))?;

        info!(project_id, path = %local_path.display(), "started watching project");
        self.watchers.lock().insert(project_id.to_string(), watcher);
        Ok(())
    }

    pub fn stop_watching(&self, project_id: &str) -> bool {
        let removed = self.watchers.lock().remove(project_id).is_some();
        if removed {
            info!(project_id, "stopped watching project");
        }
        removed
    }

    pub fn is_watching(&self, project_id: &str) -> bool {
        self.watchers.lock().contains_key(project_id)
    }

    pub fn watched_projects(&self) -> Vec<String> {
        self.watchers.lock().keys().cloned().collect()
    }
}

fn forward_event(project_id: &str, event: Event, sender: &mpsc::Sender<FileEvent>) {
    let Some(kind) = map_event_kind(event.kind) else { return };

    for path in event.paths {
        if should_ignore(&path) {
            continue;
        }
        let file_event = FileEvent::new(kind, project_id, path.clone(), Utc::now());
        if sender.try_send(file_event).is_err() {
            warn!(project_id, path = %path.display(), "event channel full or closed, dropping event");
        }
    }
}

fn map_event_kind(kind: EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Created),
        EventKind::Modify(_) => Some(FileEventKind::Modified),
        EventKind::Remove(_) => Some(FileEventKind::Deleted),
        _ => None,
    }
}

/// Skips dot-directories, build/vendor dirs, and non-text extensions.
fn should_ignore(path: &Path) -> bool {
    if path.file_name().and_then(|name| name.to_str()) == Some(".DS_Store") {
        return true;
    }
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        if EXCLUDE_EXTENSIONS.contains(&ext) {
            return true;
        }
    }
    path.components().any(|component| {
        component.as_os_str().to_str().map(|name| EXCLUDE_DIR_NAMES.contains(&name)).unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn ignores_vendored_directories_and_noisy_extensions() {
        assert!(should_ignore(Path::new("/repo/node_modules/pkg/index.js")));
        assert!(should_ignore(Path::new("/repo/.git/HEAD")));
        assert!(should_ignore(Path::new("/repo/src/main.py.swp")));
        assert!(should_ignore(Path::new("/repo/.DS_Store")));
        assert!(!should_ignore(Path::new("/repo/src/main.py")));
    }

    #[test]
    fn start_watching_rejects_missing_or_non_directory_paths() {
        let (watcher, _rx) = FileWatcher::new(FileWatcherConfig::default());
        assert!(watcher.start_watching("p1", Path::new("/does/not/exist")).is_err());

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        std::fs::write(&file_path, "x").unwrap();
        assert!(watcher.start_watching("p1", &file_path).is_err());
    }

    #[test]
    fn start_watching_is_idempotent_per_project() {
        let dir = tempdir().unwrap();
        let (watcher, _rx) = FileWatcher::new(FileWatcherConfig::default());
        assert!(watcher.start_watching("p1", dir.path()).is_ok());
        assert!(watcher.start_watching("p1", dir.path()).is_ok());
        assert!(watcher.is_watching("p1"));
        assert_eq!(watcher.watched_projects(), vec!["p1".to_string()]);
    }

    #[test]
    fn stop_watching_removes_the_project() {
        let dir = tempdir().unwrap();
        let (watcher, _rx) = FileWatcher::new(FileWatcherConfig::default());
        watcher.start_watching("p1", dir.path()).unwrap();
        assert!(watcher.stop_watching("p1"));
        assert!(!watcher.is_watching("p1"));
        assert!(!watcher.stop_watching("p1"));
    }

    #[tokio::test]
    async fn writing_a_file_emits_a_modified_or_created_event() {
        let dir = tempdir().unwrap();
        let (watcher, mut rx) = FileWatcher::new(FileWatcherConfig::default());
        watcher.start_watching("p1", dir.path()).unwrap();

        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(event.is_ok(), "expected a file event within 5s");
        assert!(event.unwrap().is_some());
    }
}
