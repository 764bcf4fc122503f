//! Progress reporting handle passed to a stepped run

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::Shared;
use crate::error::Result;

/// Narrow view of an operation given to the body of
/// [`execute_with_steps`](super::Operation::execute_with_steps).
///
/// Every update is tied to the run the controller was created for. Once that
/// run is reset, superseded or has resolved, updates are ignored.
pub struct ProgressController<T> {
    shared: Weak<Shared<T>>,
    generation: u64,
    closed: Arc<AtomicBool>,
}

impl<T> Clone for ProgressController<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
            generation: self.generation,
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<T> ProgressController<T> {
    pub(super) fn new(shared: Weak<Shared<T>>, generation: u64) -> Self {
        Self {
            shared,
            generation,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether updates sent through this controller still reach the operation
    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
            && self
                .shared
                .upgrade()
                .is_some_and(|shared| shared.is_current(self.generation))
    }

    /// Returns `false` when the update was ignored.
    pub fn set_progress(&self, value: f64, message: Option<&str>) -> bool {
        self.apply(|state| state.set_progress(value, message))
            .is_some()
    }

    pub fn set_current_step(&self, step_id: &str, message: Option<&str>) -> Result<()> {
        self.apply(|state| state.set_current_step(step_id, message))
            .unwrap_or(Ok(()))
    }

    pub fn complete_step(&self, step_id: &str, message: Option<&str>) -> Result<()> {
        self.apply(|state| state.complete_step(step_id, message))
            .unwrap_or(Ok(()))
    }

    /// Returns `false` when the update was ignored.
    pub fn update_message(&self, message: &str) -> bool {
        self.apply(|state| state.update_message(Some(message)))
            .is_some()
    }

    fn apply<R>(&self, update: impl FnOnce(&mut super::OperationState<T>) -> R) -> Option<R> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let shared = self.shared.upgrade()?;
        shared.mutate(Some(self.generation), update)
    }
}

impl<T> std::fmt::Debug for ProgressController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressController")
            .field("generation", &self.generation)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
