// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! A cancellation token propagated to worker tasks, plus a grace period
//! enforced against a shutdown-complete notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

/// Lightweight clone-able token passed to async tasks to signal shutdown.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Coordinates graceful shutdown with a grace period and timeout enforcement.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace_period: Duration,
    shutdown_initiated: Arc<AtomicBool>,
    shutdown_complete: Arc<Notify>,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(Notify::new()),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("initiating graceful shutdown (grace period: {:?})", self.grace_period);
            self.token.cancel();
        }
    }

    /// Returns `true` if shutdown completed within the grace period, `false` on timeout.
    pub async fn wait_for_shutdown(&self) -> bool {
        if !self.is_shutting_down() {
            tracing::warn!("wait_for_shutdown called but shutdown not initiated");
            return true;
        }

        tokio::select! {
            _ = self.shutdown_complete.notified() => {
                tracing::info!("shutdown completed gracefully");
                true
            }
            _ = tokio::time::sleep(self.grace_period) => {
                tracing::warn!("shutdown grace period expired, forcing shutdown");
                false
            }
        }
    }

    pub fn complete_shutdown(&self) {
        self.shutdown_complete.notify_waiters();
    }

    pub async fn wait_with_timeout(&self, timeout: Duration) -> bool {
        if !self.is_shutting_down() {
            return true;
        }

        tokio::select! {
            _ = self.shutdown_complete.notified() => true,
            _ = tokio::time::sleep(timeout) => false,
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_starts_uncancelled() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        assert!(!coordinator.token().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_token_resolves_immediately() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        coordinator.initiate_shutdown();
        coordinator.token().cancelled().await;
        assert!(coordinator.token().is_cancelled());
    }

    #[tokio::test]
    async fn cloned_token_observes_cancellation() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let token = coordinator.token();

        tokio::spawn({
            let coordinator = coordinator.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                coordinator.initiate_shutdown();
            }
        });

        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_true_when_completed_in_time() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        coordinator.initiate_shutdown();

        tokio::spawn({
            let coordinator = coordinator.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                coordinator.complete_shutdown();
            }
        });

        let result = tokio::time::timeout(Duration::from_millis(500), coordinator.wait_for_shutdown()).await;
        assert!(result.is_ok());
        assert!(result.unwrap());
    }

    #[tokio::test]
    async fn wait_for_shutdown_times_out_without_completion() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(20));
        coordinator.initiate_shutdown();
        assert!(!coordinator.wait_for_shutdown().await);
    }

    #[tokio::test]
    async fn wait_with_timeout_honours_custom_duration() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(10));
        coordinator.initiate_shutdown();
        assert!(!coordinator.wait_with_timeout(Duration::from_millis(20)).await);
    }
}
