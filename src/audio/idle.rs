use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Cancellable delayed action backing the auto-leave countdown.
///
/// Dropping the timer cancels it. Expiry only invokes the callback; the
/// receiver still has to check the id against the timer it has armed,
/// since the callback may already be in flight when a cancel happens.
#[derive(Debug)]
pub struct IdleTimer {
    id: u64,
    _guard: DropGuard,
}

impl IdleTimer {
    pub fn start<F>(id: u64, after: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!("⏱️ Idle timer {} cancelled", id);
                }
                _ = tokio::time::sleep(after) => {
                    debug!("⏱️ Idle timer {} expired", id);
                    on_expire();
                }
            }
        });

        Self {
            id,
            _guard: token.drop_guard(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(self) {
        debug!("⏱️ Cancelling idle timer {}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = fired.clone();
        (fired, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (fired, on_expire) = counter();
        let timer = IdleTimer::start(1, Duration::from_secs(300), on_expire);

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        drop(timer);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (fired, on_expire) = counter();
        let timer = IdleTimer::start(2, Duration::from_secs(300), on_expire);

        tokio::time::sleep(Duration::from_secs(10)).await;
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
