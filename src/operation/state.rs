//! Published state of an operation slot

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::error::Result;
use crate::steps::StepList;

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot observed by the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationState<T> {
    pub status: OperationStatus,
    /// Percentage in `[0, 100]`
    pub progress: f64,
    pub current_step_id: Option<String>,
    pub steps: StepList,
    /// Set only while `Failed`
    pub error: Option<String>,
    pub message: Option<String>,
    pub show_overlay: bool,
    /// Raised by a successful run, lowered again once the success display
    /// period elapses
    pub success: bool,
    pub data: Option<T>,
}

impl<T> OperationState<T> {
    pub(crate) fn idle(mut steps: StepList) -> Self {
        steps.reset();
        Self {
            status: OperationStatus::Idle,
            progress: 0.0,
            current_step_id: None,
            steps,
            error: None,
            message: None,
            show_overlay: false,
            success: false,
            data: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == OperationStatus::Running
    }

    pub fn is_failed(&self) -> bool {
        self.status == OperationStatus::Failed
    }

    pub fn current_step(&self) -> Option<&crate::steps::Step> {
        self.current_step_id
            .as_deref()
            .and_then(|id| self.steps.get(id))
    }

    pub(crate) fn begin(&mut self, message: Option<&str>, show_overlay: bool) {
        self.status = OperationStatus::Running;
        self.progress = 0.0;
        self.error = None;
        self.success = false;
        self.message = message.map(str::to_string);
        self.show_overlay = show_overlay;
        self.steps.reset();
        self.current_step_id = self.steps.first().map(|step| step.id().to_string());
    }

    pub(crate) fn update_message(&mut self, message: Option<&str>) {
        if let Some(message) = message {
            self.message = Some(message.to_string());
        }
    }

    pub(crate) fn set_progress(&mut self, value: f64, message: Option<&str>) {
        self.progress = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        };
        self.update_message(message);
    }

    pub(crate) fn set_current_step(
        &mut self,
        step_id: &str,
        message: Option<&str>,
    ) -> Result<()> {
        self.update_message(message);
        if let Err(err) = self.steps.reopen(step_id) {
            warn!("Ignoring move to unknown step `{}`", step_id);
            return Err(err);
        }
        self.current_step_id = Some(step_id.to_string());
        Ok(())
    }

    pub(crate) fn complete_step(
        &mut self,
        step_id: &str,
        message: Option<&str>,
    ) -> Result<()> {
        self.update_message(message);
        let advance = match self.steps.complete(step_id) {
            Ok(advance) => advance,
            Err(err) => {
                warn!("Ignoring completion of unknown step `{}`", step_id);
                return Err(err);
            }
        };
        if let Some(next) = advance.next {
            self.current_step_id = Some(next);
        }
        self.progress = advance.progress;
        Ok(())
    }

    pub(crate) fn succeed(&mut self, data: T) {
        self.status = OperationStatus::Succeeded;
        self.progress = 100.0;
        self.steps.complete_all();
        self.error = None;
        self.success = true;
        self.data = Some(data);
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.status = OperationStatus::Failed;
        self.error = Some(error);
        self.show_overlay = false;
        self.success = false;
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
        if self.status == OperationStatus::Failed {
            self.status = OperationStatus::Idle;
        }
    }
}
