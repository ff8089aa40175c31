//! Trailing-edge debouncer with an owned timer handle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Quiet window applied to amount edits.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Pending<T> {
    timer: JoinHandle<()>,
    value: Arc<Mutex<Option<T>>>,
}

/// Collapses bursts of calls into one delayed delivery of the last value.
///
/// Every [`call`](Debouncer::call) restarts the window. The timer task is
/// owned by the debouncer and aborted on supersession, [`cancel`](Debouncer::cancel)
/// and drop, so nothing is delivered after teardown.
pub struct Debouncer<T> {
    window: Duration,
    sink: Sink<T>,
    pending: Option<Pending<T>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(window: Duration, sink: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            window,
            sink: Arc::new(sink),
            pending: None,
        }
    }

    /// Schedules `value`, replacing whatever was pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call(&mut self, value: T) {
        self.cancel();

        let slot = Arc::new(Mutex::new(Some(value)));
        let timer = {
            let slot = slot.clone();
            let sink = self.sink.clone();
            let window = self.window;
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                if let Some(value) = take(&slot) {
                    sink(value);
                }
            })
        };

        self.pending = Some(Pending { timer, value: slot });
    }

    /// Delivers the pending value now instead of waiting for the window.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
            if let Some(value) = take(&pending.value) {
                (self.sink)(value);
            }
        }
    }

    /// Drops the pending value without delivering it.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
            take(&pending.value);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.value.lock().map(|v| v.is_some()).unwrap_or(false))
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
        }
    }
}

// Whoever takes the value delivers it; the timer and flush never both fire.
fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}
