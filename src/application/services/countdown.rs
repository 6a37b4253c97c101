use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A confirmation countdown running on its own task.
///
/// Ticks report the remaining time; when it reaches zero without being
/// cancelled, `on_fire` runs once. Dropping the handle does not stop it,
/// call [`Countdown::cancel`].
#[derive(Debug)]
pub struct Countdown {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Countdown {
    /// Spawn a countdown of `duration`, calling `on_tick` every `tick`.
    pub fn start<T, F, Fut>(duration: Duration, tick: Duration, mut on_tick: T, on_fire: F) -> Self
    where
        T: FnMut(Duration) + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let tick = if tick.is_zero() { duration } else { tick };

        let task = tokio::spawn(async move {
            let mut remaining = duration;
            while !remaining.is_zero() {
                let step = tick.min(remaining);
                tokio::select! {
                    biased;
                    () = child.cancelled() => return,
                    () = tokio::time::sleep(step) => {}
                }
                remaining = remaining.saturating_sub(step);
                if !remaining.is_zero() {
                    on_tick(remaining);
                }
            }
            if child.is_cancelled() {
                return;
            }
            on_fire().await;
        });

        Self { token, task }
    }

    /// Stop the countdown. Has no effect once `on_fire` has started.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
