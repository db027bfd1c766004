use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::step::{MigrationStep, StepBody};
use crate::error::{Result, UpgradeError};

/// Validated, version-ordered set of upgrade steps.
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: Vec<MigrationStep>,
}

impl StepRegistry {
    /// Validate and order the steps.
    ///
    /// Registration order is irrelevant; duplicate versions and chunked
    /// steps with a zero chunk size are rejected.
    pub fn new(mut steps: Vec<MigrationStep>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(steps.len());
        for step in &steps {
            if !seen.insert(step.version) {
                return Err(UpgradeError::Configuration(format!(
                    "Duplicate upgrade version {}",
                    step.version
                )));
            }
            if let StepBody::Chunked(plan) = &step.body {
                if plan.chunk_size == Some(0) {
                    return Err(UpgradeError::Configuration(format!(
                        "Upgrade {} has a chunk size of 0",
                        step.version
                    )));
                }
            }
        }

        steps.sort_by_key(|s| s.version);
        Ok(Self { steps })
    }

    /// Steps newer than `current`, ascending. `None` means nothing applied.
    pub fn pending(&self, current: Option<i64>) -> impl Iterator<Item = &MigrationStep> {
        self.steps
            .iter()
            .filter(move |s| current.map_or(true, |c| s.version > c))
    }

    pub fn get(&self, version: i64) -> Option<&MigrationStep> {
        self.steps
            .binary_search_by_key(&version, |s| s.version)
            .ok()
            .map(|idx| &self.steps[idx])
    }

    /// Highest registered version.
    pub fn latest(&self) -> Option<i64> {
        self.steps.last().map(|s| s.version)
    }

    /// Applied/pending state of every step.
    pub fn status(&self, current: Option<i64>) -> Vec<StepStatus> {
        self.steps
            .iter()
            .map(|s| StepStatus {
                version: s.version,
                description: s.description.clone(),
                state: match current {
                    Some(c) if s.version <= c => StepState::Applied,
                    _ => StepState::Pending,
                },
            })
            .collect()
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Persisted state of a step relative to the applied version.
///
/// While a run is in progress a step is also running, and a step can fail;
/// neither is persisted. They are reported through `MigrationEvent`s, and a
/// failed step stays `Pending` so the next run selects it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Applied,
}

/// A step and its state relative to the applied version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub version: i64,
    pub description: String,
    pub state: StepState,
}
