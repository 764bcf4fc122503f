//! Ordered, named milestones of a multi-phase operation
//!
//! A [`StepList`] keeps the steps in insertion order, which is also the order
//! in which `complete` advances the current pointer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{OperationError, Result};

/// Description of a step, as given in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: String,
    pub label: String,
}

impl StepSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A step and its completion flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    id: String,
    label: String,
    pub completed: bool,
}

impl Step {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl From<StepSpec> for Step {
    fn from(spec: StepSpec) -> Self {
        Self {
            id: spec.id,
            label: spec.label,
            completed: false,
        }
    }
}

/// Outcome of completing a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepAdvance {
    /// Percentage of the list covered up to and including the completed step
    pub progress: f64,
    /// Step the pointer moved to, `None` when the completed step was the last one
    pub next: Option<String>,
}

/// Ordered list of steps with completion tracking
///
/// Step ids are non-empty and unique within a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepList {
    steps: Vec<Step>,
}

impl StepList {
    pub fn new<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = StepSpec>,
    {
        let mut seen = HashSet::new();
        let mut steps = Vec::new();
        for spec in specs {
            if spec.id.trim().is_empty() {
                return Err(OperationError::invalid_config(
                    "progress_steps",
                    "step ids must not be empty",
                ));
            }
            if !seen.insert(spec.id.clone()) {
                return Err(OperationError::invalid_config(
                    "progress_steps",
                    format!("duplicate step id `{}`", spec.id),
                ));
            }
            steps.push(Step::from(spec));
        }
        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn first(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == id)
    }

    /// Re-enter a step: clears its completion flag, leaves the others alone.
    pub fn reopen(&mut self, id: &str) -> Result<()> {
        let index = self
            .position(id)
            .ok_or_else(|| OperationError::unknown_step(id))?;
        self.steps[index].completed = false;
        Ok(())
    }

    /// Mark a step completed and report where the pointer should go next.
    pub fn complete(&mut self, id: &str) -> Result<StepAdvance> {
        let index = self
            .position(id)
            .ok_or_else(|| OperationError::unknown_step(id))?;
        self.steps[index].completed = true;

        let total = self.steps.len();
        Ok(StepAdvance {
            progress: (index + 1) as f64 / total as f64 * 100.0,
            next: self.steps.get(index + 1).map(|step| step.id.clone()),
        })
    }

    pub fn complete_all(&mut self) {
        for step in &mut self.steps {
            step.completed = true;
        }
    }

    /// Clear every completion flag
    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.completed = false;
        }
    }

    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|step| step.completed).count()
    }

    pub fn is_complete(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|step| step.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_steps() -> StepList {
        StepList::new([
            StepSpec::new("a", "First"),
            StepSpec::new("b", "Second"),
            StepSpec::new("c", "Third"),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_list_starts_uncompleted() {
        let list = three_steps();
        assert_eq!(list.len(), 3);
        assert_eq!(list.completed_count(), 0);
        assert_eq!(list.first().map(Step::id), Some("a"));
        assert_eq!(list.get("b").map(Step::label), Some("Second"));
    }

    #[test]
    fn test_complete_advances_in_order() {
        let mut list = three_steps();

        let advance = list.complete("a").unwrap();
        assert_eq!(advance.next.as_deref(), Some("b"));
        assert!((advance.progress - 100.0 / 3.0).abs() < 1e-9);

        let advance = list.complete("b").unwrap();
        assert_eq!(advance.next.as_deref(), Some("c"));
        assert!((advance.progress - 200.0 / 3.0).abs() < 1e-9);

        let advance = list.complete("c").unwrap();
        assert_eq!(advance.next, None);
        assert_eq!(advance.progress, 100.0);
        assert!(list.is_complete());
    }

    #[test]
    fn test_reopen_only_touches_named_step() {
        let mut list = three_steps();
        list.complete_all();

        list.reopen("b").unwrap();
        assert!(list.get("a").unwrap().completed);
        assert!(!list.get("b").unwrap().completed);
        assert!(list.get("c").unwrap().completed);
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let mut list = three_steps();
        let err = list.complete("missing").unwrap_err();
        assert!(err.is_unknown_step());
        assert!(list.reopen("missing").is_err());
        assert_eq!(list.completed_count(), 0);
    }

    #[test]
    fn test_reset_clears_flags() {
        let mut list = three_steps();
        list.complete_all();
        list.reset();
        assert_eq!(list.completed_count(), 0);
        assert!(!list.is_complete());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = StepList::new([
            StepSpec::new("a", "First"),
            StepSpec::new("a", "Again"),
            StepSpec::new("b", "Second"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate step id `a`"));
    }

    #[test]
    fn test_blank_id_is_rejected() {
        assert!(StepList::new([StepSpec::new("  ", "Blank")]).is_err());
    }

    #[test]
    fn test_empty_list_is_never_complete() {
        let list = StepList::default();
        assert!(list.is_empty());
        assert!(!list.is_complete());
    }
}
