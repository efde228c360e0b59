//! Error types for hook registration, planning and execution.

use super::phase::PipelinePhase;
use thiserror::Error;

/// Error type hooks return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Hook '{0}' is already registered")]
    DuplicateHook(String),

    #[error("Hook ids must not be empty")]
    EmptyHookId,
}

/// Structural problems found while building an execution plan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Hook '{hook_id}' depends on unknown hook '{unknown_dependency}'")]
    UnknownDependency {
        hook_id: String,
        unknown_dependency: String,
    },

    #[error("Dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Hook '{hook_id}' has handler category '{actual}' but the contract requires '{expected}'")]
    HookTypeMismatch {
        hook_id: String,
        expected: String,
        actual: String,
    },
}

/// Failure of a single hook invocation.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook '{hook_id}' failed in {phase} phase: {source}")]
    Failed {
        hook_id: String,
        phase: PipelinePhase,
        #[source]
        source: BoxError,
    },

    #[error("Hook '{hook_id}' exceeded its timeout of {timeout_seconds}s")]
    Timeout {
        hook_id: String,
        phase: PipelinePhase,
        timeout_seconds: f64,
    },

    #[error("Hook '{hook_id}' panicked in {phase} phase: {message}")]
    Panicked {
        hook_id: String,
        phase: PipelinePhase,
        message: String,
    },
}

impl HookError {
    pub fn hook_id(&self) -> &str {
        match self {
            Self::Failed { hook_id, .. }
            | Self::Timeout { hook_id, .. }
            | Self::Panicked { hook_id, .. } => hook_id,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        match self {
            Self::Failed { phase, .. }
            | Self::Timeout { phase, .. }
            | Self::Panicked { phase, .. } => *phase,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Hook '{hook_id}' references unknown callable '{callable_ref}'")]
    UnresolvedCallable {
        hook_id: String,
        callable_ref: String,
    },
}
