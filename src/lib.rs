//! ONEX engine: declarative state machines and phased hook pipelines.
//!
//! The crate follows a "pure core, imperative shell" split. Nothing in here
//! performs I/O on behalf of the caller:
//!
//! - The [`fsm`] executor computes the next state of a declaratively defined
//!   finite state machine and returns the side effects it wants as
//!   [`fsm::Intent`] values. Dispatching them is the host's job.
//! - The [`pipeline`] runner executes host-supplied hooks in a fixed sequence
//!   of phases, honoring priorities, dependencies, per-hook timeouts and the
//!   failure policy of each phase.
//!
//! # Example
//!
//! ```rust
//! use onex_engine::fsm::{execute_transition, get_initial_state, FsmBuilder, FsmState, FsmTransition};
//! use serde_json::json;
//!
//! let fsm = FsmBuilder::new("job")
//!     .state(FsmState::new("idle").exit_action("log_idle_exit"))
//!     .state(FsmState::new("running").entry_action("log_running_entry"))
//!     .state(FsmState::new("completed").terminal())
//!     .initial("idle")
//!     .transition(FsmTransition::new("start", "idle", "running", "start_event"))
//!     .transition(FsmTransition::new("complete", "running", "completed", "complete_event"))
//!     .build()
//!     .unwrap();
//!
//! let mut state = get_initial_state(&fsm);
//! let result = execute_transition(&fsm, &state.current_state, "start_event", &json!({})).unwrap();
//! assert!(result.success);
//! state.apply(&result);
//! assert_eq!(state.current_state, "running");
//! ```

pub mod fsm;
pub mod pipeline;

// Re-export commonly used types
pub use fsm::{
    execute_transition, get_initial_state, validate_fsm_contract, FsmExecutionState,
    FsmSubcontract, Intent, TransitionResult,
};
pub use pipeline::{
    ExecutionPlan, HookRegistry, MiddlewareComposer, PipelineContext, PipelineHook, PipelinePhase,
    PipelineResult, PipelineRunner, PlanBuilder,
};
