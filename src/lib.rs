//! # opslot
//!
//! An orchestrator for single user-triggered async tasks (save, upload, verify,
//! export). It wraps the task in a progress/success/error/cancel lifecycle and
//! publishes one observable state per operation slot.
//!
//! ## Usage
//!
//! ```no_run
//! use opslot::{Operation, OperationConfig};
//!
//! # async fn save() -> Result<u64, std::io::Error> { Ok(1) }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let op: Operation<u64> = Operation::new(OperationConfig::default())?;
//! let mut state = op.subscribe();
//!
//! let id = op.execute(|| save()).await?;
//! assert_eq!(state.borrow_and_update().data, Some(id));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `operation` - The state machine, its published state and the progress controller
//! - `steps` - Ordered step lists with completion tracking
//! - `retry` - Bounded retries with exponential backoff
//! - `timing` - `sleep`, `debounce` and `throttle`
//! - `presets` - Step lists for file uploads and data exports
//! - `config` - Construction-time configuration and its YAML loader
pub mod config;
pub mod error;
pub mod operation;
pub mod presets;
pub mod retry;
pub mod steps;
pub mod timing;

pub use config::OperationConfig;
pub use error::OperationError;
pub use operation::{
    Operation, OperationCallbacks, OperationState, OperationStatus, ProgressController,
};
pub use presets::Preset;
pub use retry::{retry, RetryOptions};
pub use steps::{Step, StepList, StepSpec};
pub use timing::{debounce, sleep, throttle, Debounced, Throttled};
