//! Builder for constructing FSM definitions.

use super::error::FsmDefinitionError;
use super::model::{FsmDefinition, FsmState, FsmSubcontract, FsmTransition};

/// Builder for constructing validated FSMs with a fluent API.
///
/// If no initial state is given, the first declared state is used.
pub struct FsmBuilder {
    fsm_name: String,
    states: Vec<FsmState>,
    initial: Option<String>,
    terminal_states: Vec<String>,
    error_states: Vec<String>,
    transitions: Vec<FsmTransition>,
    persistence_enabled: bool,
}

impl FsmBuilder {
    pub fn new(fsm_name: impl Into<String>) -> Self {
        Self {
            fsm_name: fsm_name.into(),
            states: Vec::new(),
            initial: None,
            terminal_states: Vec::new(),
            error_states: Vec::new(),
            transitions: Vec::new(),
            persistence_enabled: false,
        }
    }

    pub fn state(mut self, state: FsmState) -> Self {
        self.states.push(state);
        self
    }

    pub fn initial(mut self, state: impl Into<String>) -> Self {
        self.initial = Some(state.into());
        self
    }

    /// List a state as terminal in addition to any `is_terminal` flag.
    pub fn terminal_state(mut self, state: impl Into<String>) -> Self {
        self.terminal_states.push(state.into());
        self
    }

    pub fn error_state(mut self, state: impl Into<String>) -> Self {
        self.error_states.push(state.into());
        self
    }

    pub fn transition(mut self, transition: FsmTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Emit a persistence intent on every successful transition.
    pub fn persistence(mut self, enabled: bool) -> Self {
        self.persistence_enabled = enabled;
        self
    }

    /// Build the FSM, enforcing every structural invariant.
    pub fn build(self) -> Result<FsmSubcontract, FsmDefinitionError> {
        FsmSubcontract::try_from(self.into_definition())
    }

    /// The unchecked definition, e.g. for [`validate_fsm_contract`].
    ///
    /// [`validate_fsm_contract`]: super::validate_fsm_contract
    pub fn into_definition(self) -> FsmDefinition {
        let initial_state = self
            .initial
            .or_else(|| self.states.first().map(|s| s.state_name.clone()))
            .unwrap_or_default();

        FsmDefinition {
            fsm_name: self.fsm_name,
            states: self.states,
            initial_state,
            terminal_states: self.terminal_states,
            error_states: self.error_states,
            transitions: self.transitions,
            persistence_enabled: self.persistence_enabled,
        }
    }
}
