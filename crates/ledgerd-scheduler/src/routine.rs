use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RunStatus;

/// Aggregate result of one routine invocation, copied into the run log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub total: u32,
    pub success: u32,
    pub failure: u32,
    /// Newline-joined failure details; empty when `failure == 0`.
    pub failure_reason: String,
}

impl RunOutcome {
    /// A run that produced nothing but a single failure, e.g. a read error.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            total: 0,
            success: 0,
            failure: 1,
            failure_reason: reason.into(),
        }
    }

    /// Terminal run status implied by the counters.
    pub fn status(&self) -> RunStatus {
        if self.failure > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Success
        }
    }
}

/// Business work driven by a job.
///
/// Row-level problems belong in the returned [`RunOutcome`]; an `Err` means
/// the routine could not run at all and is recorded as a single failure.
#[async_trait]
pub trait BatchRoutine: Send + Sync {
    async fn run(&self) -> anyhow::Result<RunOutcome>;
}

/// Static job-name → routine mapping, built once at startup.
#[derive(Clone, Default)]
pub struct RoutineTable {
    routines: HashMap<String, Arc<dyn BatchRoutine>>,
}

impl RoutineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `routine` under `name`, replacing any earlier entry.
    pub fn with(mut self, name: impl Into<String>, routine: Arc<dyn BatchRoutine>) -> Self {
        self.routines.insert(name.into(), routine);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn BatchRoutine>> {
        self.routines.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routines.keys().cloned().collect();
        names.sort();
        names
    }
}
