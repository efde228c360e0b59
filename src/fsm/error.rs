//! Error types for FSM definition, execution and snapshots.

use thiserror::Error;

/// Structural errors in an FSM definition.
///
/// These are raised when a [`FsmSubcontract`](super::FsmSubcontract) is
/// constructed and indicate a bug in the definition itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FsmDefinitionError {
    #[error("FSM '{fsm}' declares no states")]
    NoStates { fsm: String },

    #[error("State names must not be empty")]
    EmptyStateName,

    #[error("State '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("Transition '{0}' is declared more than once")]
    DuplicateTransition(String),

    #[error("Initial state '{0}' is not a declared state")]
    UnknownInitialState(String),

    #[error("Transition '{transition}' references undeclared state '{state}'")]
    UnknownStateReference { transition: String, state: String },

    #[error("{list} entry '{state}' is not a declared state")]
    UnknownStateInList { list: &'static str, state: String },

    #[error("Terminal state '{0}' must not be recoverable")]
    RecoverableTerminalState(String),

    #[error("Terminal state '{state}' is the source of transition '{transition}'")]
    TerminalStateHasTransition { state: String, transition: String },

    #[error("States unreachable from '{initial}': {}", .states.join(", "))]
    UnreachableStates { initial: String, states: Vec<String> },
}

/// Runtime errors raised synchronously by
/// [`execute_transition`](super::execute_transition).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("State '{state}' is not declared in FSM '{fsm}'")]
    InvalidState { fsm: String, state: String },

    #[error("No transition for trigger '{trigger}' from state '{state}'")]
    NoTransition { state: String, trigger: String },
}

/// Reasons a condition expression cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,

    #[error("Expression '{0}' must be '<field>' or '<field> <operator> <value>'")]
    Malformed(String),

    #[error("Field path '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("Field path '{0}' accesses a private segment")]
    PrivateField(String),

    #[error("Unsupported operator '{0}'")]
    UnknownOperator(String),
}

/// Errors that can occur while saving or restoring execution snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported snapshot version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Snapshot of FSM '{found}' cannot be restored into FSM '{expected}'")]
    FsmMismatch { expected: String, found: String },

    #[error("Snapshot state '{0}' is not declared in the FSM")]
    UnknownState(String),
}
