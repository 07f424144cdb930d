//! Transient badge state machine for the toolbar icon

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::host::{HostCommand, HostShell};

/// Badge rendering states.
///
/// `Idle` is both the initial and the resting state; `Pending`, `Success`
/// and `Error` are transient and fall back to `Idle` on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeState {
    Idle,
    Pending,
    Success,
    Error,
}

impl BadgeState {
    pub fn text(self) -> &'static str {
        match self {
            BadgeState::Idle => "",
            BadgeState::Pending => "…",
            BadgeState::Success => "✓",
            BadgeState::Error => "!",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            BadgeState::Idle => "#9CA3AF",
            BadgeState::Pending => "#F59E0B",
            BadgeState::Success => "#22C55E",
            BadgeState::Error => "#EF4444",
        }
    }
}

/// Owns the badge state and its auto-reset timer.
///
/// Reset timers are cancellable: applying a new state aborts any pending
/// reset first, so a fresh capture can never be clobbered by an older
/// capture's timer.
#[derive(Clone)]
pub struct BadgeController {
    inner: Arc<BadgeInner>,
}

struct BadgeInner {
    host: Arc<dyn HostShell>,
    reset_after: Duration,
    state: Mutex<BadgeState>,
    reset_task: Mutex<Option<JoinHandle<()>>>,
}

impl BadgeController {
    pub fn new(host: Arc<dyn HostShell>, reset_after: Duration) -> Self {
        Self {
            inner: Arc::new(BadgeInner {
                host,
                reset_after,
                state: Mutex::new(BadgeState::Idle),
                reset_task: Mutex::new(None),
            }),
        }
    }

    pub async fn state(&self) -> BadgeState {
        *self.inner.state.lock().await
    }

    /// Apply a state, cancelling any pending auto-reset.
    pub async fn set(&self, state: BadgeState) {
        self.inner.cancel_reset().await;
        self.inner.apply(state).await;
    }

    /// Apply a state and schedule the fall-back to `Idle`.
    pub async fn set_transient(&self, state: BadgeState) {
        self.inner.cancel_reset().await;
        self.inner.apply(state).await;

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.reset_after).await;
            inner.apply(BadgeState::Idle).await;
        });
        *self.inner.reset_task.lock().await = Some(handle);
    }
}

impl BadgeInner {
    async fn apply(&self, state: BadgeState) {
        *self.state.lock().await = state;
        let command = HostCommand::SetBadge {
            text: state.text().to_string(),
            color: state.color().to_string(),
        };
        if let Err(err) = self.host.dispatch(command).await {
            tracing::warn!("Failed to update badge: {err}");
        }
    }

    async fn cancel_reset(&self) {
        if let Some(handle) = self.reset_task.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingHost;

    fn controller(reset_ms: u64) -> (BadgeController, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::new());
        let badge = BadgeController::new(host.clone(), Duration::from_millis(reset_ms));
        (badge, host)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_state_resets_after_deadline_and_not_before() {
        let (badge, _host) = controller(2_000);

        badge.set_transient(BadgeState::Success).await;
        assert_eq!(badge.state().await, BadgeState::Success);

        tokio::time::sleep(Duration::from_millis(1_999)).await;
        assert_eq!(badge.state().await, BadgeState::Success);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(badge.state().await, BadgeState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn new_state_cancels_pending_reset() {
        let (badge, _host) = controller(2_000);

        badge.set_transient(BadgeState::Error).await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        // A fresh capture takes over the badge; the old timer must not
        // yank it back to idle half a second later.
        badge.set(BadgeState::Pending).await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(badge.state().await, BadgeState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn badge_updates_are_dispatched_to_the_host() {
        let (badge, host) = controller(2_000);

        badge.set_transient(BadgeState::Pending).await;
        badge.set_transient(BadgeState::Success).await;
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        let commands = host.commands().await;
        assert_eq!(
            commands,
            vec![
                HostCommand::SetBadge {
                    text: "…".to_string(),
                    color: BadgeState::Pending.color().to_string(),
                },
                HostCommand::SetBadge {
                    text: "✓".to_string(),
                    color: BadgeState::Success.color().to_string(),
                },
                HostCommand::SetBadge {
                    text: String::new(),
                    color: BadgeState::Idle.color().to_string(),
                },
            ]
        );
    }
}
