use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Finish time of the latest remote call made through one service, shared by
/// its clones.
#[derive(Debug, Clone, Default)]
pub(super) struct CallClock {
    last_call_finished: Arc<Mutex<Option<Instant>>>,
}

/// Enforces a fixed floor between the end of one remote call and the start
/// of the next. There is no bursting.
#[derive(Debug)]
pub(super) struct Pacer {
    delay: Duration,
    clock: CallClock,
}

impl Pacer {
    pub(super) fn new(delay: Duration, clock: CallClock) -> Self {
        Self { delay, clock }
    }

    pub(super) async fn mark_call_finished(&self) {
        *self.clock.last_call_finished.lock().await = Some(Instant::now());
    }

    /// Waits until the next call may start. Returns `false` when cancellation
    /// was requested before or during the wait.
    pub(super) async fn wait(&self, cancel: &CancellationToken) -> bool {
        let last_call_finished = *self.clock.last_call_finished.lock().await;
        let Some(last_call_finished) = last_call_finished else {
            return !cancel.is_cancelled();
        };
        if self.delay.is_zero() {
            return !cancel.is_cancelled();
        }

        tokio::select! {
            () = cancel.cancelled() => false,
            () = sleep_until(last_call_finished + self.delay) => !cancel.is_cancelled(),
        }
    }

    /// Waits out the floor without honoring cancellation.
    pub(super) async fn settle(&self) {
        let _ = self.wait(&CancellationToken::new()).await;
    }
}
