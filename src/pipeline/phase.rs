//! Pipeline phases and their failure policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six fixed pipeline stages, in run order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Preflight,
    Before,
    Execute,
    After,
    Emit,
    Finalize,
}

/// What a hook failure does to the rest of the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the run; only `finalize` still executes, then the error propagates.
    FailFast,
    /// Record the error and keep going.
    ContinueOnError,
}

impl PipelinePhase {
    pub const ALL: [PipelinePhase; 6] = [
        Self::Preflight,
        Self::Before,
        Self::Execute,
        Self::After,
        Self::Emit,
        Self::Finalize,
    ];

    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            Self::Preflight | Self::Before | Self::Execute => FailurePolicy::FailFast,
            Self::After | Self::Emit | Self::Finalize => FailurePolicy::ContinueOnError,
        }
    }

    pub fn is_fail_fast(&self) -> bool {
        self.failure_policy() == FailurePolicy::FailFast
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Before => "before",
            Self::Execute => "execute",
            Self::After => "after",
            Self::Emit => "emit",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
