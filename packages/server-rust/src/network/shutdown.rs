//! Gateway lifecycle: whether new invocations are accepted, and how many
//! are still waiting on a remote service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;

/// Where the gateway is in its lifecycle. Only `Ready` accepts invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    /// False once draining has begun.
    #[must_use]
    pub fn accepts_invocations(self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }
}

#[derive(Debug, Default)]
struct Running {
    count: AtomicU64,
    idle: Notify,
}

/// Shared by the listener and every handler.
#[derive(Debug)]
pub struct ShutdownController {
    running: Arc<Running>,
    state: ArcSwap<HealthState>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(Running::default()),
            state: ArcSwap::from_pointee(HealthState::Starting),
        }
    }

    pub fn mark_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    pub fn begin_drain(&self) {
        self.state.store(Arc::new(HealthState::Draining));
    }

    #[must_use]
    pub fn state(&self) -> HealthState {
        **self.state.load()
    }

    /// Registers one invocation; it counts as running until the guard drops.
    #[must_use]
    pub fn track_invocation(&self) -> InvocationGuard {
        self.running.count.fetch_add(1, Ordering::AcqRel);
        InvocationGuard {
            running: Arc::clone(&self.running),
        }
    }

    #[must_use]
    pub fn running(&self) -> u64 {
        self.running.count.load(Ordering::Acquire)
    }

    /// Waits up to `limit` for every tracked invocation to finish. On success
    /// the state becomes `Stopped`.
    pub async fn drained_within(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let idle = self.running.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.running() == 0 {
                self.state.store(Arc::new(HealthState::Stopped));
                return true;
            }
            if tokio::time::timeout_at(deadline, idle).await.is_err() {
                return false;
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// One running invocation. Dropping the last guard wakes a pending drain.
#[derive(Debug)]
pub struct InvocationGuard {
    running: Arc<Running>,
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        if self.running.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.running.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward() {
        let controller = ShutdownController::new();
        assert_eq!(controller.state(), HealthState::Starting);
        controller.mark_ready();
        assert_eq!(controller.state(), HealthState::Ready);
        assert!(controller.state().accepts_invocations());
        controller.begin_drain();
        assert_eq!(controller.state(), HealthState::Draining);
        assert!(!controller.state().accepts_invocations());
    }

    #[test]
    fn guards_count_running_invocations() {
        let controller = ShutdownController::new();
        let first = controller.track_invocation();
        let second = controller.track_invocation();
        assert_eq!(controller.running(), 2);
        drop(first);
        assert_eq!(controller.running(), 1);
        drop(second);
        assert_eq!(controller.running(), 0);
    }

    #[tokio::test]
    async fn idle_gateway_drains_immediately() {
        let controller = ShutdownController::new();
        controller.begin_drain();
        assert!(controller.drained_within(Duration::from_millis(50)).await);
        assert_eq!(controller.state(), HealthState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_while_a_call_is_outstanding() {
        let controller = ShutdownController::new();
        let _guard = controller.track_invocation();
        controller.begin_drain();
        assert!(!controller.drained_within(Duration::from_millis(50)).await);
        assert_eq!(controller.state(), HealthState::Draining);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_wakes_when_last_call_finishes() {
        let controller = Arc::new(ShutdownController::new());
        let guard = controller.track_invocation();
        controller.begin_drain();

        let finisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(guard);
        });

        assert!(controller.drained_within(Duration::from_secs(60)).await);
        assert_eq!(controller.state(), HealthState::Stopped);
        finisher.await.unwrap();
    }
}
