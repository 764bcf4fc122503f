//! Scheduling primitives used to guard how often an operation gets triggered
//!
//! `debounce` collapses a burst of calls into the last one, `throttle` lets the
//! first call of a window through and drops the rest. Both run on tokio's clock,
//! so they behave deterministically under a paused test runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

type BoxedCall = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Suspend the current task for `duration`.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Wrap `f` so that only the last call of a burst runs, `wait` after that call.
///
/// The callback returns a future which is spawned once the quiet period has
/// elapsed; nothing is propagated back to the caller. Must be called from
/// within a tokio runtime.
pub fn debounce<A, F, Fut>(f: F, wait: Duration) -> Debounced<A>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Debounced {
        callback: Arc::new(move |args: A| Box::pin(f(args)) as BoxedCall),
        wait,
        pending: Mutex::new(None),
    }
}

/// Wrap `f` so that at most one call goes through per `limit` window.
pub fn throttle<F>(f: F, limit: Duration) -> Throttled<F> {
    Throttled {
        callback: f,
        limit,
        window_started: Mutex::new(None),
    }
}

/// A debounced callback, see [`debounce`]
pub struct Debounced<A> {
    callback: Arc<dyn Fn(A) -> BoxedCall + Send + Sync>,
    wait: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<A: Send + 'static> Debounced<A> {
    /// Schedule a call with `args`, replacing any call still waiting.
    pub fn call(&self, args: A) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
            trace!("Debounced call superseded");
        }

        let callback = Arc::clone(&self.callback);
        let wait = self.wait;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            // Detach the call itself so a later `call` can't abort it mid-flight.
            tokio::spawn(callback(args));
        }));
    }

    /// Drop the scheduled call, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            previous.abort();
        }
    }

    /// Whether a call is waiting for its quiet period to elapse
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl<A> Drop for Debounced<A> {
    fn drop(&mut self) {
        if let Some(previous) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            previous.abort();
        }
    }
}

/// A throttled callback, see [`throttle`]
pub struct Throttled<F> {
    callback: F,
    limit: Duration,
    window_started: Mutex<Option<Instant>>,
}

impl<F> Throttled<F> {
    /// Invoke the callback unless a window opened by an earlier call is still
    /// running. Dropped calls return `None` and are not queued.
    pub fn call<A, R>(&self, args: A) -> Option<R>
    where
        F: Fn(A) -> R,
    {
        let now = Instant::now();
        {
            let mut window = self
                .window_started
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(started) = *window {
                if now.duration_since(started) < self.limit {
                    trace!("Throttled call dropped");
                    return None;
                }
            }
            *window = Some(now);
        }

        Some((self.callback)(args))
    }

    /// Reopen the window so the next call goes through immediately.
    pub fn reset(&self) {
        *self
            .window_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}
