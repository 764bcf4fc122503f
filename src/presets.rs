//! Ready-made step lists for common task shapes
//!
//! These only fix the step list and raise the overlay; everything else comes
//! from the [`OperationConfig`] passed in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::OperationConfig;
use crate::error::{OperationError, Result};
use crate::operation::{Operation, OperationCallbacks};
use crate::steps::StepSpec;

/// Known task shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// validate → upload → process → complete
    FileUpload,
    /// prepare → format → generate → download
    DataExport,
}

impl Preset {
    pub fn steps(self) -> Vec<StepSpec> {
        match self {
            Self::FileUpload => file_upload_steps(),
            Self::DataExport => data_export_steps(),
        }
    }

    /// `base` with this preset's steps and the progress overlay enabled
    pub fn config(self, base: OperationConfig) -> OperationConfig {
        base.with_steps(self.steps()).with_progress_overlay(true)
    }

    pub fn build<T>(
        self,
        base: OperationConfig,
        callbacks: OperationCallbacks<T>,
    ) -> Result<Operation<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        Operation::with_callbacks(self.config(base), callbacks)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileUpload => f.write_str("file_upload"),
            Self::DataExport => f.write_str("data_export"),
        }
    }
}

impl FromStr for Preset {
    type Err = OperationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "file_upload" | "upload" => Ok(Self::FileUpload),
            "data_export" | "export" => Ok(Self::DataExport),
            other => Err(OperationError::invalid_config(
                "preset",
                format!("unknown preset `{}`", other),
            )),
        }
    }
}

pub fn file_upload_steps() -> Vec<StepSpec> {
    vec![
        StepSpec::new("validate", "Validating file"),
        StepSpec::new("upload", "Uploading"),
        StepSpec::new("process", "Processing"),
        StepSpec::new("complete", "Complete"),
    ]
}

pub fn data_export_steps() -> Vec<StepSpec> {
    vec![
        StepSpec::new("prepare", "Preparing data"),
        StepSpec::new("format", "Formatting"),
        StepSpec::new("generate", "Generating file"),
        StepSpec::new("download", "Downloading"),
    ]
}

/// Operation slot for file uploads
pub fn file_operation<T>(config: OperationConfig) -> Result<Operation<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Preset::FileUpload.build(config, OperationCallbacks::default())
}

/// Operation slot for data exports
pub fn data_export<T>(config: OperationConfig) -> Result<Operation<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Preset::DataExport.build(config, OperationCallbacks::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationStatus;

    #[test]
    fn test_step_orders() {
        let ids: Vec<_> = file_upload_steps().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["validate", "upload", "process", "complete"]);

        let ids: Vec<_> = data_export_steps().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["prepare", "format", "generate", "download"]);
    }

    #[test]
    fn test_preset_config_overrides_steps_and_overlay() {
        let base = OperationConfig::default().with_steps([StepSpec::new("x", "X")]);
        let config = Preset::DataExport.config(base);
        assert!(config.show_progress_overlay);
        assert_eq!(config.progress_steps, data_export_steps());
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("upload".parse::<Preset>().unwrap(), Preset::FileUpload);
        assert_eq!("data_export".parse::<Preset>().unwrap(), Preset::DataExport);
        assert!("archive".parse::<Preset>().is_err());
        assert_eq!(Preset::FileUpload.to_string(), "file_upload");
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_operation_starts_on_validate() {
        let op: Operation<()> = file_operation(OperationConfig::default()).unwrap();
        op.start(None);

        let state = op.snapshot();
        assert_eq!(state.status, OperationStatus::Running);
        assert_eq!(state.current_step_id.as_deref(), Some("validate"));
        assert!(state.show_overlay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_export_completes_all_steps() {
        let op: Operation<String> = data_export(OperationConfig::default()).unwrap();

        let path = op
            .execute_with_steps(|progress| async move {
                for step in data_export_steps() {
                    progress.complete_step(&step.id, Some(&step.label))?;
                }
                Ok::<_, OperationError>("report.csv".to_string())
            })
            .await
            .unwrap();

        assert_eq!(path, "report.csv");
        let state = op.snapshot();
        assert!(state.steps.is_complete());
        assert_eq!(state.message.as_deref(), Some("Downloading"));
    }
}
