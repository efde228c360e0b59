//! Declarative finite state machines with intent-based side effects.
//!
//! An FSM is defined as data ([`FsmDefinition`]), validated once into an
//! immutable [`FsmSubcontract`], and driven by the pure
//! [`execute_transition`] function. The executor never performs I/O: entry
//! and exit actions, transition actions, persistence and metrics come back as
//! [`Intent`] values for the caller to dispatch.
//!
//! # Key Concepts
//!
//! - **Definition**: states, transitions, conditions and actions as plain data
//! - **Construction invariants**: checked eagerly, so a `FsmSubcontract` is
//!   always well formed
//! - **Conditions**: small expressions over a JSON context (see [`expression`])
//! - **Execution state**: owned by the caller and updated with
//!   [`FsmExecutionState::apply`]

mod builder;
mod error;
mod executor;
pub mod expression;
mod intent;
mod model;
mod snapshot;
mod validate;

pub use builder::FsmBuilder;
pub use error::{ExecutorError, ExpressionError, FsmDefinitionError, SnapshotError};
pub use executor::{
    available_triggers, execute_transition, get_initial_state, is_terminal_state,
    FsmExecutionState, TransitionResult, CONDITIONS_NOT_MET,
};
pub use expression::{evaluate_expression, parse_expression, Expression, Operator};
pub use intent::{ActionDirection, Intent, IntentType, LogLevel};
pub use model::{
    FsmDefinition, FsmState, FsmSubcontract, FsmTransition, TransitionAction,
    TransitionCondition, FIELD_CHECK, WILDCARD_STATE,
};
pub use snapshot::{FsmSnapshot, SNAPSHOT_VERSION};
pub use validate::validate_fsm_contract;
