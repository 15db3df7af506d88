// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Health Monitor
//!
//! Watches a worker's heartbeat and restarts it on staleness. Depends only
//! on [`WorkerHandle`] rather than the concrete `Worker`, so `Worker` can
//! depend on `HealthMonitor` without a cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codesync_domain::SyncError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{error, info, warn};

/// What `HealthMonitor` needs from the worker it supervises.
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    fn is_running(&self) -> bool;
    fn last_heartbeat(&self) -> Option<DateTime<Utc>>;
    async fn start(&self) -> Result<(), SyncError>;
    async fn stop(&self) -> Result<(), SyncError>;
    fn watched_projects(&self) -> usize;
    fn pending_events(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    pub heartbeat_timeout: Duration,
    pub check_interval: Duration,
    pub max_failures: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self { heartbeat_timeout: Duration::from_secs(30), check_interval: Duration::from_secs(10), max_failures: 3 }
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    running: bool,
    failure_count: u32,
    restart_count: u32,
}

#[derive(Debug, Clone)]
pub struct HealthMonitorStatus {
    pub running: bool,
    pub restart_count: u32,
    pub failure_count: u32,
    pub max_failures: u32,
}

#[derive(Debug, Clone)]
pub struct HealthMetrics {
    pub healthy: bool,
    pub running: bool,
    pub restart_count: u32,
    pub failure_count: u32,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub watched_projects: usize,
    pub pending_events: usize,
    pub time_since_heartbeat: Option<f64>,
}

pub struct HealthMonitor<W: WorkerHandle> {
    worker: Arc<W>,
    config: HealthMonitorConfig,
    state: Mutex<State>,
}

impl<W: WorkerHandle> HealthMonitor<W> {
    pub fn new(worker: Arc<W>, config: HealthMonitorConfig) -> Self {
        Self { worker, config, state: Mutex::new(State::default()) }
    }

    pub fn check_health(&self) -> bool {
        if !self.worker.is_running() {
            warn!("worker not running");
            return false;
        }
        let Some(last_heartbeat) = self.worker.last_heartbeat() else {
            warn!("no heartbeat recorded");
            return false;
        };
        let elapsed = (Utc::now() - last_heartbeat).to_std().unwrap_or(Duration::ZERO);
        if elapsed > self.config.heartbeat_timeout {
            warn!(elapsed_secs = elapsed.as_secs_f64(), "heartbeat stale");
            return false;
        }
        true
    }

    pub async fn restart_worker(&self) -> bool {
        info!("restarting sync worker");
        if let Err(err) = self.worker.stop().await {
            warn!(%err, "error stopping worker during restart");
        }
        tokio::time::sleep(Duration::from_secs(2)).await;

        if let Err(err) = self.worker.start().await {
            error!(%err, "error starting worker during restart");
            return false;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;

        let healthy = self.check_health();
        if healthy {
            let restart_count = {
                let mut state = self.state.lock();
                state.restart_count += 1;
                state.restart_count
            };
            info!(restart_count, "worker restart successful");
        } else {
            warn!("worker restart failed health check");
        }
        healthy
    }

    /// One check-and-maybe-restart cycle, as run by `monitor_loop`'s body.
    pub async fn tick(&self) {
        if self.check_health() {
            return;
        }
        warn!("worker unhealthy, attempting restart");

        if self.restart_worker().await {
            self.state.lock().failure_count = 0;
            return;
        }

        let failure_count = {
            let mut state = self.state.lock();
            state.failure_count += 1;
            state.failure_count
        };
        error!(attempt = failure_count, max_failures = self.config.max_failures, "worker restart failed");
        if failure_count >= self.config.max_failures {
            self.alert_max_failures();
        }
    }

    fn alert_max_failures(&self) {
        error!(
            max_failures = self.config.max_failures,
            "ALERT: maximum restart failures reached, manual intervention required"
        );
    }

    /// Runs `tick` every `check_interval` until `shutdown` fires.
    pub async fn monitor_loop(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!("starting health monitoring loop");
        self.state.lock().running = true;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.check_interval) => {
                    self.tick().await;
                }
            }
        }

        self.state.lock().running = false;
        info!("health monitoring loop stopped");
    }

    pub fn status(&self) -> HealthMonitorStatus {
        let state = self.state.lock();
        HealthMonitorStatus {
            running: state.running,
            restart_count: state.restart_count,
            failure_count: state.failure_count,
            max_failures: self.config.max_failures,
        }
    }

    pub fn metrics(&self) -> HealthMetrics {
        let (cpu_percent, memory_mb) = process_resource_usage();
        let time_since_heartbeat =
            self.worker.last_heartbeat().map(|last| (Utc::now() - last).to_std().unwrap_or(Duration::ZERO).as_secs_f64());
        let state = self.state.lock();
        HealthMetrics {
            healthy: self.check_health(),
            running: self.worker.is_running(),
            restart_count: state.restart_count,
            failure_count: state.failure_count,
            cpu_percent,
            memory_mb,
            watched_projects: self.worker.watched_projects(),
            pending_events: self.worker.pending_events(),
            time_since_heartbeat,
        }
    }
}

fn process_resource_usage() -> (f32, f64) {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    match system.process(pid) {
        Some(process) => (process.cpu_usage(), process.memory() as f64 / 1024.0 / 1024.0),
        None => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FakeWorker {
        running: AtomicBool,
        heartbeat: Mutex<Option<DateTime<Utc>>>,
        start_calls: AtomicU32,
        start_should_fail: bool,
    }

    impl FakeWorker {
        fn new(running: bool, heartbeat: Option<DateTime<Utc>>) -> Self {
            Self {
                running: AtomicBool::new(running),
                heartbeat: Mutex::new(heartbeat),
                start_calls: AtomicU32::new(0),
                start_should_fail: false,
            }
        }
    }

    #[async_trait]
    impl WorkerHandle for FakeWorker {
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
            *self.heartbeat.lock()
        }

        async fn start(&self) -> Result<(), SyncError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.start_should_fail {
                return Err(SyncError::Unknown("boom".into()));
            }
            self.running.store(true, Ordering::SeqCst);
            *self.heartbeat.lock() = Some(Utc::now());
            Ok(())
        }

        async fn stop(&self) -> Result<(), SyncError> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn watched_projects(&self) -> usize {
            2
        }

        fn pending_events(&self) -> usize {
            0
        }
    }

    #[test]
    fn healthy_when_running_with_fresh_heartbeat() {
        let worker = Arc::new(FakeWorker::new(true, Some(Utc::now())));
        let monitor = HealthMonitor::new(worker, HealthMonitorConfig::default());
        assert!(monitor.check_health());
    }

    #[test]
    fn unhealthy_when_not_running() {
        let worker = Arc::new(FakeWorker::new(false, Some(Utc::now())));
        let monitor = HealthMonitor::new(worker, HealthMonitorConfig::default());
        assert!(!monitor.check_health());
    }

    #[test]
    fn unhealthy_when_heartbeat_stale() {
        let stale = Utc::now() - chrono::Duration::seconds(60);
        let worker = Arc::new(FakeWorker::new(true, Some(stale)));
        let monitor = HealthMonitor::new(
            worker,
            HealthMonitorConfig { heartbeat_timeout: Duration::from_secs(30), ..Default::default() },
        );
        assert!(!monitor.check_health());
    }

    #[tokio::test]
    async fn tick_restarts_an_unhealthy_worker_and_resets_failure_count() {
        let worker = Arc::new(FakeWorker::new(false, None));
        let monitor = HealthMonitor::new(
            worker.clone(),
            HealthMonitorConfig {
                heartbeat_timeout: Duration::from_secs(30),
                check_interval: Duration::from_millis(1),
                max_failures: 3,
            },
        );

        monitor.tick().await;

        assert_eq!(worker.start_calls.load(Ordering::SeqCst), 1);
        assert!(worker.is_running());
        assert_eq!(monitor.status().failure_count, 0);
        assert_eq!(monitor.status().restart_count, 1);
    }
}
