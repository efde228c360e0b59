//! Graph-level validation of FSM definitions.

use super::model::FsmDefinition;
use std::collections::{HashMap, VecDeque};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<String>>;

/// Validate an FSM definition, returning every problem found.
///
/// An empty list means the definition is valid. Unlike construction of a
/// [`FsmSubcontract`](super::FsmSubcontract), which stops at the first
/// problem, this accumulates all of them:
///
/// 1. the initial state is declared
/// 2. every transition endpoint is declared (`"*"` is allowed as a source)
/// 3. every declared state is reachable from the initial state
///
/// # Example
///
/// ```rust
/// use onex_engine::fsm::{validate_fsm_contract, FsmDefinition, FsmState, FsmTransition};
///
/// let definition = FsmDefinition {
///     fsm_name: "door".to_string(),
///     states: vec![FsmState::new("open"), FsmState::new("closed"), FsmState::new("locked")],
///     initial_state: "open".to_string(),
///     terminal_states: vec![],
///     error_states: vec![],
///     transitions: vec![FsmTransition::new("close", "open", "closed", "close")],
///     persistence_enabled: false,
/// };
///
/// let errors = validate_fsm_contract(&definition);
/// assert_eq!(errors.len(), 1);
/// assert!(errors[0].contains("locked"));
/// ```
pub fn validate_fsm_contract(definition: &FsmDefinition) -> Vec<String> {
    let declared: HashMap<&str, usize> = state_index(definition);
    let mut checks: Vec<Check> = Vec::new();

    let initial_known = declared.contains_key(definition.initial_state.as_str());
    checks.push(if initial_known {
        Validation::success(())
    } else {
        Validation::fail(format!(
            "Initial state '{}' is not a declared state",
            definition.initial_state
        ))
    });

    for transition in &definition.transitions {
        if !transition.is_wildcard() && !declared.contains_key(transition.from_state.as_str()) {
            checks.push(Validation::fail(format!(
                "Transition '{}' has undeclared from_state '{}'",
                transition.transition_name, transition.from_state
            )));
        }
        if !declared.contains_key(transition.to_state.as_str()) {
            checks.push(Validation::fail(format!(
                "Transition '{}' has undeclared to_state '{}'",
                transition.transition_name, transition.to_state
            )));
        }
    }

    // Reachability is meaningless without a known starting point.
    if initial_known {
        for state in unreachable_states(definition) {
            checks.push(Validation::fail(format!(
                "State '{}' is unreachable from initial state '{}'",
                state, definition.initial_state
            )));
        }
    }

    match Validation::all_vec(checks) {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errors) => errors.iter().cloned().collect(),
    }
}

/// Declared states that cannot be reached from the initial state.
///
/// Wildcard transitions count as edges from every state. Returned in
/// declaration order. Transitions naming undeclared states are ignored.
pub(crate) fn unreachable_states(definition: &FsmDefinition) -> Vec<String> {
    let index = state_index(definition);
    let Some(&start) = index.get(definition.initial_state.as_str()) else {
        return definition
            .states
            .iter()
            .map(|s| s.state_name.clone())
            .collect();
    };

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); definition.states.len()];
    let mut from_anywhere: Vec<usize> = Vec::new();
    for transition in &definition.transitions {
        let Some(&to) = index.get(transition.to_state.as_str()) else {
            continue;
        };
        if transition.is_wildcard() {
            from_anywhere.push(to);
        } else if let Some(&from) = index.get(transition.from_state.as_str()) {
            edges[from].push(to);
        }
    }

    let mut visited = vec![false; definition.states.len()];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;
    while let Some(node) = queue.pop_front() {
        for &next in edges[node].iter().chain(from_anywhere.iter()) {
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }

    definition
        .states
        .iter()
        .zip(visited)
        .filter(|(_, seen)| !seen)
        .map(|(state, _)| state.state_name.clone())
        .collect()
}

fn state_index(definition: &FsmDefinition) -> HashMap<&str, usize> {
    definition
        .states
        .iter()
        .enumerate()
        .map(|(i, s)| (s.state_name.as_str(), i))
        .collect()
}
