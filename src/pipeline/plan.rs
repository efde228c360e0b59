//! Execution plan construction.
//!
//! Hooks are translated to small integer indices once; dependency validation,
//! cycle detection and ordering then run over index-based adjacency lists.

use super::config::PipelineConfig;
use super::error::PlanError;
use super::hook::PipelineHook;
use super::phase::PipelinePhase;
use super::registry::FrozenHookRegistry;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

/// Non-fatal finding recorded while planning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanWarning {
    pub hook_id: String,
    pub message: String,
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.hook_id, self.message)
    }
}

/// Validated per-phase ordering of hooks.
#[derive(Clone, Debug)]
pub struct ExecutionPlan {
    phases: [Vec<PipelineHook>; 6],
    total_hooks: usize,
    warnings: Vec<PlanWarning>,
    config: PipelineConfig,
}

impl ExecutionPlan {
    /// Hooks of one phase in execution order.
    pub fn hooks_for(&self, phase: PipelinePhase) -> &[PipelineHook] {
        &self.phases[phase as usize]
    }

    pub fn total_hooks(&self) -> usize {
        self.total_hooks
    }

    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Every hook id in the order a full run would execute them.
    pub fn execution_order(&self) -> Vec<&str> {
        self.phases
            .iter()
            .flatten()
            .map(|h| h.hook_id.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PipelinePhase, &[PipelineHook])> {
        PipelinePhase::ALL
            .into_iter()
            .map(move |phase| (phase, self.hooks_for(phase)))
    }
}

/// Builds an [`ExecutionPlan`] from a frozen registry.
pub struct PlanBuilder<'a> {
    registry: &'a FrozenHookRegistry,
    config: PipelineConfig,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(registry: &'a FrozenHookRegistry) -> Self {
        Self {
            registry,
            config: PipelineConfig::default(),
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate dependencies, reject cycles, check handler categories and
    /// order each phase topologically, breaking ties by ascending priority
    /// and then registration order.
    pub fn build(self) -> Result<ExecutionPlan, PlanError> {
        let hooks = self.registry.get_all_hooks();
        let index: HashMap<&str, usize> = hooks
            .iter()
            .enumerate()
            .map(|(i, h)| (h.hook_id.as_str(), i))
            .collect();

        // deps[i] lists the hooks that hook i depends on.
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(hooks.len());
        for hook in hooks {
            let mut resolved = Vec::with_capacity(hook.dependencies.len());
            for dependency in &hook.dependencies {
                let Some(&d) = index.get(dependency.as_str()) else {
                    return Err(PlanError::UnknownDependency {
                        hook_id: hook.hook_id.clone(),
                        unknown_dependency: dependency.clone(),
                    });
                };
                resolved.push(d);
            }
            deps.push(resolved);
        }

        if let Some(cycle) = find_cycle(&deps) {
            return Err(PlanError::DependencyCycle {
                cycle: cycle.into_iter().map(|i| hooks[i].hook_id.clone()).collect(),
            });
        }

        let mut warnings = self.check_categories(hooks)?;

        let mut phases: [Vec<PipelineHook>; 6] = Default::default();
        for phase in PipelinePhase::ALL {
            let (ordered, phase_warnings) = order_phase(hooks, &deps, phase);
            phases[phase as usize] = ordered.into_iter().map(|i| hooks[i].clone()).collect();
            warnings.extend(phase_warnings);
        }

        for warning in &warnings {
            tracing::warn!(hook_id = %warning.hook_id, "{}", warning.message);
        }

        Ok(ExecutionPlan {
            phases,
            total_hooks: hooks.len(),
            warnings,
            config: self.config,
        })
    }

    fn check_categories(&self, hooks: &[PipelineHook]) -> Result<Vec<PlanWarning>, PlanError> {
        let mut warnings = Vec::new();
        let Some(expected) = self.config.contract_category.as_deref() else {
            return Ok(warnings);
        };
        for hook in hooks {
            let Some(actual) = hook.handler_type_category.as_deref() else {
                continue;
            };
            if actual == expected {
                continue;
            }
            if self.config.enforce_hook_typing {
                return Err(PlanError::HookTypeMismatch {
                    hook_id: hook.hook_id.clone(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            warnings.push(PlanWarning {
                hook_id: hook.hook_id.clone(),
                message: format!(
                    "handler category '{actual}' does not match contract category '{expected}'"
                ),
            });
        }
        Ok(warnings)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// DFS cycle detection. Returns the hooks on the first cycle found, starting
/// at the hook that closes it, in dependency order.
fn find_cycle(deps: &[Vec<usize>]) -> Option<Vec<usize>> {
    fn visit(
        node: usize,
        deps: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::InProgress;
        path.push(node);
        for &next in &deps[node] {
            match marks[next] {
                Mark::InProgress => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    return Some(path[start..].to_vec());
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(next, deps, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        path.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; deps.len()];
    let mut path = Vec::new();
    for node in 0..deps.len() {
        if marks[node] == Mark::Unvisited {
            if let Some(cycle) = visit(node, deps, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Kahn's algorithm over one phase. Only same-phase dependencies constrain
/// the order; earlier phases always run first anyway, and dependencies on
/// later phases are reported as warnings.
fn order_phase(
    hooks: &[PipelineHook],
    deps: &[Vec<usize>],
    phase: PipelinePhase,
) -> (Vec<usize>, Vec<PlanWarning>) {
    let mut warnings = Vec::new();
    let mut pending = vec![0usize; hooks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); hooks.len()];

    let members: Vec<usize> = (0..hooks.len()).filter(|&i| hooks[i].phase == phase).collect();
    for &i in &members {
        for &d in &deps[i] {
            let dependency_phase = hooks[d].phase;
            if dependency_phase == phase {
                pending[i] += 1;
                dependents[d].push(i);
            } else if dependency_phase > phase {
                warnings.push(PlanWarning {
                    hook_id: hooks[i].hook_id.clone(),
                    message: format!(
                        "depends on '{}' which runs later, in the {} phase",
                        hooks[d].hook_id, dependency_phase
                    ),
                });
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<(i32, usize)>> = members
        .iter()
        .filter(|&&i| pending[i] == 0)
        .map(|&i| Reverse((hooks[i].priority, i)))
        .collect();

    let mut ordered = Vec::with_capacity(members.len());
    while let Some(Reverse((_, i))) = ready.pop() {
        ordered.push(i);
        for &dependent in &dependents[i] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse((hooks[dependent].priority, dependent)));
            }
        }
    }

    (ordered, warnings)
}
