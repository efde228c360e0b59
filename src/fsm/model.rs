//! Declarative FSM definition types.
//!
//! [`FsmDefinition`] is the raw, unchecked shape of a state machine (what a
//! contract loader produces). [`FsmSubcontract`] is the validated form: it can
//! only be obtained through `TryFrom<FsmDefinition>` (or [`FsmBuilder`]), which
//! enforces every structural invariant up front, and it is immutable afterwards.
//!
//! [`FsmBuilder`]: super::FsmBuilder

use super::error::FsmDefinitionError;
use super::validate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// `from_state` value that matches every state.
pub const WILDCARD_STATE: &str = "*";

/// The only condition type whose expression is interpreted.
pub const FIELD_CHECK: &str = "field_check";

/// A single state of the machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmState {
    pub state_name: String,
    #[serde(default = "default_state_type")]
    pub state_type: String,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    pub is_recoverable: bool,
    #[serde(default)]
    pub entry_actions: Vec<String>,
    #[serde(default)]
    pub exit_actions: Vec<String>,
}

fn default_state_type() -> String {
    "operational".to_string()
}

impl FsmState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state_name: name.into(),
            state_type: default_state_type(),
            is_terminal: false,
            is_recoverable: false,
            entry_actions: Vec::new(),
            exit_actions: Vec::new(),
        }
    }

    pub fn state_type(mut self, state_type: impl Into<String>) -> Self {
        self.state_type = state_type.into();
        self
    }

    /// Mark the state terminal. Terminal states are never recoverable.
    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self.is_recoverable = false;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.is_recoverable = true;
        self
    }

    pub fn entry_action(mut self, action: impl Into<String>) -> Self {
        self.entry_actions.push(action.into());
        self
    }

    pub fn exit_action(mut self, action: impl Into<String>) -> Self {
        self.exit_actions.push(action.into());
        self
    }
}

/// Guard evaluated against the execution context before a transition fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCondition {
    pub condition_name: String,
    #[serde(default = "default_condition_type")]
    pub condition_type: String,
    pub expression: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_condition_type() -> String {
    FIELD_CHECK.to_string()
}

fn default_required() -> bool {
    true
}

impl TransitionCondition {
    /// A required `field_check` condition.
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            condition_name: name.into(),
            condition_type: default_condition_type(),
            expression: expression.into(),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn condition_type(mut self, condition_type: impl Into<String>) -> Self {
        self.condition_type = condition_type.into();
        self
    }
}

/// Action requested when a transition fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAction {
    pub action_name: String,
    #[serde(default = "default_action_type")]
    pub action_type: String,
    #[serde(default)]
    pub execution_order: i32,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_action_type() -> String {
    "custom".to_string()
}

impl TransitionAction {
    pub fn new(name: impl Into<String>, execution_order: i32) -> Self {
        Self {
            action_name: name.into(),
            action_type: default_action_type(),
            execution_order,
            is_critical: false,
            timeout_ms: None,
        }
    }

    pub fn action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = action_type.into();
        self
    }

    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Edge of the machine, fired by `trigger` from `from_state` (or any state).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmTransition {
    pub transition_name: String,
    pub from_state: String,
    pub to_state: String,
    pub trigger: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<TransitionCondition>,
    #[serde(default)]
    pub actions: Vec<TransitionAction>,
}

impl FsmTransition {
    pub fn new(
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        trigger: impl Into<String>,
    ) -> Self {
        Self {
            transition_name: name.into(),
            from_state: from.into(),
            to_state: to.into(),
            trigger: trigger.into(),
            priority: 0,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Lower values win when several transitions match a trigger.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn condition(mut self, condition: TransitionCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn action(mut self, action: TransitionAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.from_state == WILDCARD_STATE
    }
}

/// Unchecked FSM definition, as loaded from a contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmDefinition {
    pub fsm_name: String,
    pub states: Vec<FsmState>,
    pub initial_state: String,
    #[serde(default)]
    pub terminal_states: Vec<String>,
    #[serde(default)]
    pub error_states: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<FsmTransition>,
    #[serde(default)]
    pub persistence_enabled: bool,
}

/// Validated, immutable FSM definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "FsmDefinition", into = "FsmDefinition")]
pub struct FsmSubcontract {
    definition: FsmDefinition,
    index: HashMap<String, usize>,
}

impl FsmSubcontract {
    pub fn fsm_name(&self) -> &str {
        &self.definition.fsm_name
    }

    pub fn states(&self) -> &[FsmState] {
        &self.definition.states
    }

    pub fn initial_state(&self) -> &str {
        &self.definition.initial_state
    }

    pub fn terminal_states(&self) -> &[String] {
        &self.definition.terminal_states
    }

    pub fn error_states(&self) -> &[String] {
        &self.definition.error_states
    }

    pub fn transitions(&self) -> &[FsmTransition] {
        &self.definition.transitions
    }

    pub fn persistence_enabled(&self) -> bool {
        self.definition.persistence_enabled
    }

    /// Look up a declared state by name.
    pub fn state(&self, name: &str) -> Option<&FsmState> {
        self.index.get(name).map(|&i| &self.definition.states[i])
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// True if the state is flagged terminal or listed in `terminal_states`.
    pub fn is_terminal(&self, name: &str) -> bool {
        is_terminal_in(&self.definition, name)
    }

    pub fn definition(&self) -> &FsmDefinition {
        &self.definition
    }
}

fn is_terminal_in(definition: &FsmDefinition, name: &str) -> bool {
    definition.terminal_states.iter().any(|s| s == name)
        || definition
            .states
            .iter()
            .any(|s| s.state_name == name && s.is_terminal)
}

impl TryFrom<FsmDefinition> for FsmSubcontract {
    type Error = FsmDefinitionError;

    fn try_from(definition: FsmDefinition) -> Result<Self, Self::Error> {
        if definition.states.is_empty() {
            return Err(FsmDefinitionError::NoStates {
                fsm: definition.fsm_name,
            });
        }

        let mut index = HashMap::with_capacity(definition.states.len());
        for (i, state) in definition.states.iter().enumerate() {
            if state.state_name.is_empty() {
                return Err(FsmDefinitionError::EmptyStateName);
            }
            if index.insert(state.state_name.clone(), i).is_some() {
                return Err(FsmDefinitionError::DuplicateState(state.state_name.clone()));
            }
        }

        let mut transition_names = HashSet::new();
        for transition in &definition.transitions {
            if !transition_names.insert(transition.transition_name.as_str()) {
                return Err(FsmDefinitionError::DuplicateTransition(
                    transition.transition_name.clone(),
                ));
            }
        }

        if !index.contains_key(&definition.initial_state) {
            return Err(FsmDefinitionError::UnknownInitialState(
                definition.initial_state.clone(),
            ));
        }

        for transition in &definition.transitions {
            let endpoints = [
                (!transition.is_wildcard()).then_some(&transition.from_state),
                Some(&transition.to_state),
            ];
            for state in endpoints.into_iter().flatten() {
                if !index.contains_key(state) {
                    return Err(FsmDefinitionError::UnknownStateReference {
                        transition: transition.transition_name.clone(),
                        state: state.clone(),
                    });
                }
            }
        }

        for (list, names) in [
            ("terminal_states", &definition.terminal_states),
            ("error_states", &definition.error_states),
        ] {
            if let Some(unknown) = names.iter().find(|n| !index.contains_key(*n)) {
                return Err(FsmDefinitionError::UnknownStateInList {
                    list,
                    state: unknown.clone(),
                });
            }
        }

        for state in &definition.states {
            if is_terminal_in(&definition, &state.state_name) && state.is_recoverable {
                return Err(FsmDefinitionError::RecoverableTerminalState(
                    state.state_name.clone(),
                ));
            }
        }

        if let Some(transition) = definition
            .transitions
            .iter()
            .find(|t| !t.is_wildcard() && is_terminal_in(&definition, &t.from_state))
        {
            return Err(FsmDefinitionError::TerminalStateHasTransition {
                state: transition.from_state.clone(),
                transition: transition.transition_name.clone(),
            });
        }

        let unreachable = validate::unreachable_states(&definition);
        if !unreachable.is_empty() {
            return Err(FsmDefinitionError::UnreachableStates {
                initial: definition.initial_state.clone(),
                states: unreachable,
            });
        }

        Ok(Self { definition, index })
    }
}

impl From<FsmSubcontract> for FsmDefinition {
    fn from(fsm: FsmSubcontract) -> Self {
        fsm.definition
    }
}
