use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

type Callback<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Trailing-edge debouncer.
///
/// Each `call` throws away the pending timer and starts a new one, so a
/// burst of calls collapses into one invocation with the last argument,
/// fired once the burst has been quiet for `delay`. Nothing fires on the
/// leading edge.
///
/// Once the timer fires, the callback runs as its own task. Later calls only
/// ever cancel timers, never work that has already started.
///
/// Must be used from inside a Tokio runtime.
pub struct Debouncer<T> {
    delay: Duration,
    callback: Callback<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F, Fut>(delay: Duration, callback: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            callback: Arc::new(move |arg: T| -> BoxFuture<'static, ()> { Box::pin(callback(arg)) }),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Schedule `arg`, replacing anything still waiting
    pub fn call(&self, arg: T) {
        let mut pending = self.lock();
        if let Some(timer) = pending.take() {
            timer.abort();
        }

        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(callback(arg));
        }));
    }

    /// Drop the pending call, if there is one. Returns whether it was still waiting.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(timer) => {
                let waiting = !timer.is_finished();
                timer.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(timer) = pending.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn recording_debouncer(delay: Duration) -> (Debouncer<String>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(delay, move |value: String| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(value);
            }
        });
        (debouncer, rx)
    }

    /// Let spawned tasks run without moving the (paused) clock
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_last_value() {
        let (debouncer, mut rx) = recording_debouncer(Duration::from_millis(500));

        for partial in ["a", "ai", "air", "air ", "air m", "air ma", "air max"] {
            debouncer.call(partial.to_string());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;

        assert_eq!(rx.try_recv().unwrap(), "air max");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_leading_edge_call() {
        let (debouncer, mut rx) = recording_debouncer(Duration::from_millis(500));

        debouncer.call("jordan".to_string());
        settle().await;
        assert!(rx.try_recv().is_err());
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(499)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(rx.try_recv().unwrap(), "jordan");
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_gaps_fire_separately() {
        let (debouncer, mut rx) = recording_debouncer(Duration::from_millis(500));

        debouncer.call("yeezy".to_string());
        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;
        debouncer.call("dunk".to_string());
        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;

        assert_eq!(rx.try_recv().unwrap(), "yeezy");
        assert_eq!(rx.try_recv().unwrap(), "dunk");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_call() {
        let (debouncer, mut rx) = recording_debouncer(Duration::from_millis(500));

        debouncer.call("samba".to_string());
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }
}
