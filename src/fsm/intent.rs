//! Declarative side-effect requests emitted by the executor.
//!
//! Intents are plain values. The executor never dispatches them; a host
//! collaborator (action runner, persistence layer, metrics sink, logger)
//! interprets each one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Whether a state action runs on the way out of or into a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionDirection {
    Exit,
    Entry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Tag identifying the kind of an [`Intent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    FsmStateAction,
    FsmTransitionAction,
    PersistState,
    RecordMetric,
    LogEvent,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FsmStateAction => "fsm_state_action",
            Self::FsmTransitionAction => "fsm_transition_action",
            Self::PersistState => "persist_state",
            Self::RecordMetric => "record_metric",
            Self::LogEvent => "log_event",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested side effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent_type", rename_all = "snake_case")]
pub enum Intent {
    /// Run a state's entry or exit action.
    #[serde(rename = "fsm_state_action")]
    StateAction {
        action_name: String,
        state: String,
        direction: ActionDirection,
    },

    /// Run an action attached to the fired transition.
    #[serde(rename = "fsm_transition_action")]
    TransitionAction {
        action_name: String,
        action_type: String,
        transition: String,
        execution_order: i32,
        is_critical: bool,
        timeout_ms: Option<u64>,
    },

    PersistState {
        fsm_name: String,
        state: String,
        previous_state: String,
    },

    RecordMetric {
        fsm: String,
        from_state: String,
        to_state: String,
    },

    LogEvent {
        level: LogLevel,
        message: String,
        fields: Value,
    },
}

impl Intent {
    pub fn intent_type(&self) -> IntentType {
        match self {
            Self::StateAction { .. } => IntentType::FsmStateAction,
            Self::TransitionAction { .. } => IntentType::FsmTransitionAction,
            Self::PersistState { .. } => IntentType::PersistState,
            Self::RecordMetric { .. } => IntentType::RecordMetric,
            Self::LogEvent { .. } => IntentType::LogEvent,
        }
    }

    /// Logical name of the collaborator expected to act on this intent.
    pub fn target(&self) -> &'static str {
        match self {
            Self::StateAction { .. } | Self::TransitionAction { .. } => "action_executor",
            Self::PersistState { .. } => "state_persistence",
            Self::RecordMetric { .. } => "metrics",
            Self::LogEvent { .. } => "logger",
        }
    }

    /// Structured payload for the target, without the type tag.
    pub fn payload(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove("intent_type");
        }
        value
    }

    /// Action name for state and transition actions.
    pub fn action_name(&self) -> Option<&str> {
        match self {
            Self::StateAction { action_name, .. } | Self::TransitionAction { action_name, .. } => {
                Some(action_name)
            }
            _ => None,
        }
    }
}
