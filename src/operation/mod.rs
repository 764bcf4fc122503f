//! The operation state machine
//!
//! An [`Operation`] owns one operation slot: a single published
//! [`OperationState`] plus a generation counter. Every run started on the
//! slot bumps the generation, and every deferred effect (the minimum-duration
//! finalize, the success and overlay timers, progress reported through a
//! [`ProgressController`]) remembers the generation it was created under.
//! Effects whose generation is no longer current are dropped silently, so a
//! slow run that was reset or superseded can never overwrite a newer one.
//!
//! Cancellation is cooperative: `reset` and `cancel` stop the slot from
//! reacting to a run, they do not stop the run's future from completing.

mod callbacks;
pub mod progress;
mod state;

pub use callbacks::OperationCallbacks;
pub use progress::ProgressController;
pub use state::{OperationState, OperationStatus};

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::OperationConfig;
use crate::error::Result;

/// Handle to an operation slot
///
/// Cloning the handle shares the slot. Timers still pending when the last
/// handle is dropped are aborted.
pub struct Operation<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Operation<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T> {
    config: OperationConfig,
    callbacks: OperationCallbacks<T>,
    control: Mutex<Control>,
    state: watch::Sender<OperationState<T>>,
}

#[derive(Default)]
struct Control {
    generation: u64,
    started_at: Option<Instant>,
    success_timer: Option<JoinHandle<()>>,
    overlay_timer: Option<JoinHandle<()>>,
}

impl Control {
    fn cancel_timers(&mut self) {
        for timer in [self.success_timer.take(), self.overlay_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Timer {
    /// Lowers the success flag
    Success,
    /// Hides the overlay
    Overlay,
}

impl<T> Shared<T> {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.control().generation == generation
    }

    /// Apply `update` to the published state.
    ///
    /// With `Some(generation)` the update only lands if that generation is
    /// still current; `None` is returned otherwise.
    fn mutate<R>(
        &self,
        generation: Option<u64>,
        update: impl FnOnce(&mut OperationState<T>) -> R,
    ) -> Option<R> {
        let control = self.control();
        if let Some(generation) = generation {
            if control.generation != generation {
                trace!(
                    "Dropping update from generation {} (current {})",
                    generation,
                    control.generation
                );
                return None;
            }
        }

        let mut output = None;
        self.state.send_modify(|state| output = Some(update(state)));
        drop(control);
        output
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        self.control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel_timers();
    }
}

impl<T> Operation<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Fails when the configured step ids are empty or repeated.
    pub fn new(config: OperationConfig) -> Result<Self> {
        Self::with_callbacks(config, OperationCallbacks::default())
    }

    pub fn with_callbacks(
        config: OperationConfig,
        callbacks: OperationCallbacks<T>,
    ) -> Result<Self> {
        let (state, _) = watch::channel(OperationState::idle(config.step_list()?));
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                callbacks,
                control: Mutex::new(Control::default()),
                state,
            }),
        })
    }

    pub fn config(&self) -> &OperationConfig {
        &self.shared.config
    }

    /// Receiver that observes every published state change
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> OperationState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.borrow().is_running()
    }

    /// Begin a new run. A run already in flight is superseded.
    pub fn start(&self, message: Option<&str>) {
        self.begin(message, self.shared.config.show_progress_overlay);
    }

    /// Run `operation` on this slot.
    ///
    /// A success is published no sooner than `min_loading_time` after the
    /// start; a failure is published as soon as it happens. The outcome is
    /// returned unchanged, even when the run was superseded and its outcome
    /// therefore left the state untouched.
    pub async fn execute<F, Fut, E>(&self, operation: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let generation = self.begin(None, self.shared.config.show_progress_overlay);
        let outcome = operation().await;
        self.settle(generation, outcome).await
    }

    /// Like [`execute`](Self::execute), but hands `operation` a
    /// [`ProgressController`] and keeps the overlay up for the configured
    /// grace period after a success.
    pub async fn execute_with_steps<F, Fut, E>(&self, operation: F) -> std::result::Result<T, E>
    where
        F: FnOnce(ProgressController<T>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let generation = self.begin(None, true);
        let controller = ProgressController::new(Arc::downgrade(&self.shared), generation);
        let outcome = operation(controller.clone()).await;
        controller.close();
        self.settle(generation, outcome).await
    }

    /// Return to `Idle`, discarding whatever the current run produces later.
    pub fn reset(&self) {
        let mut control = self.shared.control();
        control.generation += 1;
        control.started_at = None;
        control.cancel_timers();
        debug!("Operation reset (generation {})", control.generation);
        self.shared
            .state
            .send_modify(|state| *state = OperationState::idle(state.steps.clone()));
    }

    /// Reset the slot, firing `on_cancel` if a run was in flight.
    ///
    /// Returns whether a running operation was cancelled.
    pub fn cancel(&self) -> bool {
        let was_running = self.is_running();
        self.reset();
        if was_running {
            self.shared.callbacks.cancelled();
        }
        was_running
    }

    pub fn set_data(&self, data: T) {
        self.shared.mutate(None, |state| state.data = Some(data));
    }

    pub fn clear_error(&self) {
        self.shared.mutate(None, OperationState::clear_error);
    }

    pub fn hide_overlay(&self) {
        self.shared.mutate(None, |state| state.show_overlay = false);
    }

    /// Applies to whichever run is current.
    pub fn update_message(&self, message: &str) {
        self.shared
            .mutate(None, |state| state.update_message(Some(message)));
    }

    /// Applies to whichever run is current. Use the [`ProgressController`]
    /// handed to a stepped run for updates that must not outlive that run.
    pub fn set_progress(&self, value: f64, message: Option<&str>) {
        self.shared
            .mutate(None, |state| state.set_progress(value, message));
    }

    /// Point the slot at `step_id`, reopening that step.
    ///
    /// Applies to whichever run is current, with no generation check. An
    /// unknown id leaves the steps alone but still applies `message`.
    pub fn set_current_step(&self, step_id: &str, message: Option<&str>) -> Result<()> {
        self.shared
            .mutate(None, |state| state.set_current_step(step_id, message))
            .unwrap_or(Ok(()))
    }

    /// Complete `step_id`, move to the following step and recompute progress.
    ///
    /// Applies to whichever run is current, with no generation check. An
    /// unknown id leaves the steps alone but still applies `message`.
    pub fn complete_step(&self, step_id: &str, message: Option<&str>) -> Result<()> {
        self.shared
            .mutate(None, |state| state.complete_step(step_id, message))
            .unwrap_or(Ok(()))
    }

    fn begin(&self, message: Option<&str>, show_overlay: bool) -> u64 {
        let mut control = self.shared.control();
        control.generation += 1;
        control.started_at = Some(Instant::now());
        control.cancel_timers();
        let generation = control.generation;

        let mut superseded = false;
        self.shared.state.send_modify(|state| {
            superseded = state.is_running();
            state.begin(message, show_overlay);
        });
        drop(control);

        if superseded {
            debug!(
                "Operation restarted while running, generation {} supersedes the previous run",
                generation
            );
        } else {
            debug!("Operation started (generation {})", generation);
        }
        generation
    }

    async fn settle<E: Display>(
        &self,
        generation: u64,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        match outcome {
            Ok(data) => {
                if let Some(remaining) = self.remaining_min_duration(generation) {
                    trace!("Holding success for {:?}", remaining);
                    tokio::time::sleep(remaining).await;
                }
                self.finish_success(generation, &data);
                Ok(data)
            }
            Err(err) => {
                self.finish_failure(generation, err.to_string());
                Err(err)
            }
        }
    }

    /// Time left before a success may be published, `None` when the run is
    /// already past the minimum or no longer current
    fn remaining_min_duration(&self, generation: u64) -> Option<Duration> {
        let control = self.shared.control();
        if control.generation != generation {
            return None;
        }
        let elapsed = control.started_at?.elapsed();
        self.shared
            .config
            .min_loading_time
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    fn finish_success(&self, generation: u64, data: &T) {
        let overlay_up = self.shared.mutate(Some(generation), |state| {
            state.succeed(data.clone());
            state.show_overlay
        });
        let Some(overlay_up) = overlay_up else {
            debug!("Discarding success of superseded run (generation {})", generation);
            return;
        };
        debug!("Operation succeeded (generation {})", generation);

        self.shared.callbacks.succeeded(data);

        let config = &self.shared.config;
        if !config.show_success_for.is_zero() {
            self.schedule(generation, Timer::Success, config.show_success_for);
        }
        if overlay_up {
            self.schedule(generation, Timer::Overlay, config.overlay_grace_period);
        }
    }

    fn finish_failure(&self, generation: u64, message: String) {
        let applied = self
            .shared
            .mutate(Some(generation), |state| state.fail(message.clone()));
        if applied.is_none() {
            debug!("Discarding failure of superseded run (generation {})", generation);
            return;
        }
        debug!("Operation failed (generation {}): {}", generation, message);
        self.shared.callbacks.failed(&message);
    }

    fn schedule(&self, generation: u64, timer: Timer, delay: Duration) {
        let shared = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(fire_timer(shared, generation, timer, delay));

        let mut control = self.shared.control();
        if control.generation != generation {
            handle.abort();
            return;
        }
        trace!("Scheduled {:?} timer in {:?}", timer, delay);
        let slot = match timer {
            Timer::Success => &mut control.success_timer,
            Timer::Overlay => &mut control.overlay_timer,
        };
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }
}

async fn fire_timer<T>(shared: Weak<Shared<T>>, generation: u64, timer: Timer, delay: Duration) {
    tokio::time::sleep(delay).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let applied = shared.mutate(Some(generation), |state| match timer {
        Timer::Success => state.success = false,
        Timer::Overlay => state.show_overlay = false,
    });
    if applied.is_some() {
        trace!("{:?} timer fired (generation {})", timer, generation);
    }
}

impl<T> std::fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Operation")
            .field("status", &state.status)
            .field("progress", &state.progress)
            .field("config", &self.shared.config)
            .finish()
    }
}
