//! Pure transition execution.
//!
//! [`execute_transition`] computes the outcome of firing a trigger and the
//! intents that go with it. It reads the FSM and the context and writes
//! nothing; applying the result is the caller's decision.

use super::error::ExecutorError;
use super::expression::evaluate_expression;
use super::intent::{ActionDirection, Intent, LogLevel};
use super::model::{FsmSubcontract, FsmTransition, TransitionCondition, FIELD_CHECK};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Error text of a result blocked by an unmet required condition.
pub const CONDITIONS_NOT_MET: &str = "Transition conditions not met";

/// Runtime state of one FSM instance, owned by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FsmExecutionState {
    pub current_state: String,
    pub context: Value,
    pub history: Vec<String>,
}

impl FsmExecutionState {
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Apply a successful result: move to the new state and record the old
    /// one in history. Failed results leave the state untouched.
    pub fn apply(&mut self, result: &TransitionResult) -> bool {
        if !result.success || result.old_state != self.current_state {
            return false;
        }
        let previous = std::mem::replace(&mut self.current_state, result.new_state.clone());
        self.history.push(previous);
        true
    }
}

/// Outcome of [`execute_transition`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub success: bool,
    pub old_state: String,
    pub new_state: String,
    pub transition_name: Option<String>,
    pub intents: Vec<Intent>,
    pub error: Option<String>,
}

/// Fresh execution state positioned at the FSM's initial state.
pub fn get_initial_state(fsm: &FsmSubcontract) -> FsmExecutionState {
    FsmExecutionState {
        current_state: fsm.initial_state().to_string(),
        context: Value::Object(Default::default()),
        history: Vec::new(),
    }
}

pub fn is_terminal_state(fsm: &FsmSubcontract, state: &str) -> bool {
    fsm.is_terminal(state)
}

/// Triggers that have at least one transition from `state`, in declaration
/// order, without duplicates. Conditions are not evaluated.
pub fn available_triggers<'a>(fsm: &'a FsmSubcontract, state: &str) -> Vec<&'a str> {
    let mut triggers: Vec<&str> = Vec::new();
    for transition in fsm.transitions() {
        if matches_source(transition, state) && !triggers.contains(&transition.trigger.as_str()) {
            triggers.push(&transition.trigger);
        }
    }
    triggers
}

/// Fire `trigger` from `current_state`.
///
/// Unknown states and unmatched triggers are errors. Unmet required
/// conditions are not: they produce a result with `success == false`, the
/// state unchanged, and a single warning-level `LogEvent` intent.
///
/// On success the intents are ordered: exit actions, transition actions (by
/// `execution_order`), entry actions, persistence (if enabled), metric.
///
/// # Example
///
/// ```rust
/// use onex_engine::fsm::{execute_transition, FsmBuilder, FsmState, FsmTransition, TransitionCondition};
/// use serde_json::json;
///
/// let fsm = FsmBuilder::new("loader")
///     .state(FsmState::new("waiting"))
///     .state(FsmState::new("loaded"))
///     .initial("waiting")
///     .transition(
///         FsmTransition::new("load", "waiting", "loaded", "data_ready")
///             .condition(TransitionCondition::new("has_data", "data_count_len >= 1")),
///     )
///     .build()
///     .unwrap();
///
/// let blocked = execute_transition(&fsm, "waiting", "data_ready", &json!({"data_count_len": 0})).unwrap();
/// assert!(!blocked.success);
/// assert_eq!(blocked.new_state, "waiting");
///
/// let fired = execute_transition(&fsm, "waiting", "data_ready", &json!({"data_count_len": 4})).unwrap();
/// assert_eq!(fired.new_state, "loaded");
/// ```
pub fn execute_transition(
    fsm: &FsmSubcontract,
    current_state: &str,
    trigger: &str,
    context: &Value,
) -> Result<TransitionResult, ExecutorError> {
    let Some(source) = fsm.state(current_state) else {
        return Err(ExecutorError::InvalidState {
            fsm: fsm.fsm_name().to_string(),
            state: current_state.to_string(),
        });
    };

    // min_by_key keeps the first of equal keys, so ties go to declaration order.
    let transition = fsm
        .transitions()
        .iter()
        .filter(|t| t.trigger == trigger && matches_source(t, current_state))
        .min_by_key(|t| t.priority)
        .ok_or_else(|| ExecutorError::NoTransition {
            state: current_state.to_string(),
            trigger: trigger.to_string(),
        })?;

    if let Some(failed) = first_unmet_condition(transition, context) {
        tracing::warn!(
            fsm = fsm.fsm_name(),
            transition = %transition.transition_name,
            condition = %failed.condition_name,
            "transition blocked by unmet condition"
        );
        return Ok(TransitionResult {
            success: false,
            old_state: current_state.to_string(),
            new_state: current_state.to_string(),
            transition_name: Some(transition.transition_name.clone()),
            intents: vec![Intent::LogEvent {
                level: LogLevel::Warning,
                message: format!(
                    "Condition '{}' not met for transition '{}'",
                    failed.condition_name, transition.transition_name
                ),
                fields: json!({
                    "fsm": fsm.fsm_name(),
                    "transition": transition.transition_name,
                    "condition": failed.condition_name,
                    "expression": failed.expression,
                    "state": current_state,
                }),
            }],
            error: Some(CONDITIONS_NOT_MET.to_string()),
        });
    }

    let target = &transition.to_state;
    let mut intents = Vec::new();

    intents.extend(source.exit_actions.iter().map(|action| Intent::StateAction {
        action_name: action.clone(),
        state: current_state.to_string(),
        direction: ActionDirection::Exit,
    }));

    let mut actions: Vec<_> = transition.actions.iter().collect();
    actions.sort_by_key(|a| a.execution_order);
    intents.extend(actions.into_iter().map(|action| Intent::TransitionAction {
        action_name: action.action_name.clone(),
        action_type: action.action_type.clone(),
        transition: transition.transition_name.clone(),
        execution_order: action.execution_order,
        is_critical: action.is_critical,
        timeout_ms: action.timeout_ms,
    }));

    if let Some(destination) = fsm.state(target) {
        intents.extend(
            destination
                .entry_actions
                .iter()
                .map(|action| Intent::StateAction {
                    action_name: action.clone(),
                    state: target.clone(),
                    direction: ActionDirection::Entry,
                }),
        );
    }

    if fsm.persistence_enabled() {
        intents.push(Intent::PersistState {
            fsm_name: fsm.fsm_name().to_string(),
            state: target.clone(),
            previous_state: current_state.to_string(),
        });
    }

    intents.push(Intent::RecordMetric {
        fsm: fsm.fsm_name().to_string(),
        from_state: current_state.to_string(),
        to_state: target.clone(),
    });

    tracing::debug!(
        fsm = fsm.fsm_name(),
        from = current_state,
        to = %target,
        transition = %transition.transition_name,
        intents = intents.len(),
        "transition computed"
    );

    Ok(TransitionResult {
        success: true,
        old_state: current_state.to_string(),
        new_state: target.clone(),
        transition_name: Some(transition.transition_name.clone()),
        intents,
        error: None,
    })
}

fn matches_source(transition: &FsmTransition, state: &str) -> bool {
    transition.is_wildcard() || transition.from_state == state
}

fn first_unmet_condition<'a>(
    transition: &'a FsmTransition,
    context: &Value,
) -> Option<&'a TransitionCondition> {
    for condition in &transition.conditions {
        if condition.condition_type != FIELD_CHECK {
            continue;
        }
        let met = evaluate_expression(&condition.expression, context);
        if met {
            continue;
        }
        if condition.required {
            return Some(condition);
        }
        tracing::debug!(
            transition = %transition.transition_name,
            condition = %condition.condition_name,
            "optional condition not met"
        );
    }
    None
}
