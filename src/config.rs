//! Construction-time configuration for an operation slot
//!
//! Durations are written in human-readable form (`300ms`, `1.5s`), the same
//! way retry settings are:
//!
//! ```yaml
//! min_loading_time: 300ms
//! show_success_for: 3s
//! overlay_grace_period: 1500ms
//! show_progress_overlay: true
//! progress_steps:
//!   - id: validate
//!     label: Validating file
//!   - id: upload
//!     label: Uploading
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{OperationError, Result};
use crate::steps::{StepList, StepSpec};

/// Configuration recognized by [`crate::Operation`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// Shortest time a successful run stays `Running`
    #[serde(default = "default_min_loading_time", with = "humantime_serde")]
    pub min_loading_time: Duration,

    /// How long the success flag stays raised; zero keeps it until the next start
    #[serde(default = "default_show_success_for", with = "humantime_serde")]
    pub show_success_for: Duration,

    /// How long the overlay stays up after a stepped run succeeds
    #[serde(default = "default_overlay_grace_period", with = "humantime_serde")]
    pub overlay_grace_period: Duration,

    #[serde(default)]
    pub progress_steps: Vec<StepSpec>,

    /// Raise the overlay for plain `execute` runs too
    #[serde(default)]
    pub show_progress_overlay: bool,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            min_loading_time: default_min_loading_time(),
            show_success_for: default_show_success_for(),
            overlay_grace_period: default_overlay_grace_period(),
            progress_steps: Vec::new(),
            show_progress_overlay: false,
        }
    }
}

impl OperationConfig {
    pub fn with_steps<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = StepSpec>,
    {
        self.progress_steps = steps.into_iter().collect();
        self
    }

    pub fn with_min_loading_time(mut self, duration: Duration) -> Self {
        self.min_loading_time = duration;
        self
    }

    pub fn with_show_success_for(mut self, duration: Duration) -> Self {
        self.show_success_for = duration;
        self
    }

    pub fn with_overlay_grace_period(mut self, duration: Duration) -> Self {
        self.overlay_grace_period = duration;
        self
    }

    pub fn with_progress_overlay(mut self, show: bool) -> Self {
        self.show_progress_overlay = show;
        self
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading operation config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|source| {
            OperationError::ConfigRead {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Step ids must be non-empty and unique within the list
    pub fn validate(&self) -> Result<()> {
        self.step_list().map(|_| ())
    }

    pub fn step_list(&self) -> Result<StepList> {
        StepList::new(self.progress_steps.iter().cloned())
    }
}

fn default_min_loading_time() -> Duration {
    Duration::from_millis(300)
}

fn default_show_success_for() -> Duration {
    Duration::from_millis(3000)
}

fn default_overlay_grace_period() -> Duration {
    Duration::from_millis(1500)
}
