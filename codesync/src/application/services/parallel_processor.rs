// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Parallel Processor
//!
//! Bounded-concurrency fan-out over file paths. A `tokio::sync::Semaphore`
//! caps the number of in-flight per-file operations; a failure on one file is
//! captured in its [`FileResult`] rather than cancelling the others.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct ParallelProcessorConfig {
    pub max_workers: usize,
}

impl Default for ParallelProcessorConfig {
    fn default() -> Self {
        Self { max_workers: 5 }
    }
}

/// Outcome of processing a single file.
pub struct FileResult<T> {
    pub file_path: String,
    pub success: bool,
    pub result: Option<T>,
    pub error: Option<String>,
    pub duration: Duration,
}

/// A point-in-time snapshot emitted after each file completes.
#[derive(Debug, Clone)]
pub struct Progress {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub current: String,
    pub start_time: DateTime<Utc>,
    pub rate_per_second: f64,
    pub eta: Option<Duration>,
}

struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Runs `op` over `file_paths` with at most `max_workers` concurrent calls,
/// invoking `on_progress` after each file completes.
pub async fn process_files<T, F, Fut>(
    config: ParallelProcessorConfig,
    file_paths: Vec<String>,
    op: F,
    on_progress: impl Fn(Progress) + Send + Sync + 'static,
) -> Vec<FileResult<T>>
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
{
    if file_paths.is_empty() {
        return Vec::new();
    }

    let total = file_paths.len();
    info!(total, max_workers = config.max_workers, "starting parallel processing");

    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
    let op = Arc::new(op);
    let on_progress = Arc::new(on_progress);
    let start_time = Utc::now();
    let start_instant = Instant::now();
    let counters = Arc::new(Counters { processed: AtomicU64::new(0), failed: AtomicU64::new(0) });

    let tasks = file_paths.into_iter().map(|file_path| {
        let semaphore = Arc::clone(&semaphore);
        let op = Arc::clone(&op);
        let on_progress = Arc::clone(&on_progress);
        let counters = Arc::clone(&counters);

        async move {
            let _permit = semaphore.acquire().await.expect("semaphore is never closed");
            let file_started = Instant::now();
            let outcome = op(file_path.clone()).await;
            let duration = file_started.elapsed();

            let processed = counters.processed.fetch_add(1, Ordering::SeqCst) + 1;
            let failed_total = if outcome.is_err() {
                counters.failed.fetch_add(1, Ordering::SeqCst) + 1
            } else {
                counters.failed.load(Ordering::SeqCst)
            };

            let elapsed = start_instant.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 { processed as f64 / elapsed } else { 0.0 };
            let remaining = total.saturating_sub(processed as usize);
            let eta = if rate > 0.0 { Some(Duration::from_secs_f64(remaining as f64 / rate)) } else { None };

            on_progress(Progress {
                total,
                processed: processed as usize,
                failed: failed_total as usize,
                current: file_path.clone(),
                start_time,
                rate_per_second: rate,
                eta,
            });

            match outcome {
                Ok(result) => FileResult { file_path, success: true, result: Some(result), error: None, duration },
                Err(error) => {
                    FileResult { file_path, success: false, result: None, error: Some(error), duration }
                }
            }
        }
    });

    let results = join_all(tasks).await;

    let successful = results.iter().filter(|r| r.success).count();
    info!(
        successful,
        failed = results.len() - successful,
        elapsed_secs = start_instant.elapsed().as_secs_f64(),
        "parallel processing complete"
    );

    results
}
