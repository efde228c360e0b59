//! Hook registry: mutable while collecting hooks, immutable once frozen.

use super::error::RegistryError;
use super::hook::PipelineHook;
use super::phase::PipelinePhase;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
struct HookTable {
    hooks: Vec<PipelineHook>,
    index: HashMap<String, usize>,
}

impl HookTable {
    fn by_phase(&self, phase: PipelinePhase) -> Vec<&PipelineHook> {
        self.hooks.iter().filter(|h| h.phase == phase).collect()
    }

    fn by_id(&self, hook_id: &str) -> Option<&PipelineHook> {
        self.index.get(hook_id).map(|&i| &self.hooks[i])
    }
}

/// Collects hooks in registration order.
///
/// Registration is only possible on this type. [`freeze`](Self::freeze)
/// consumes it and yields a [`FrozenHookRegistry`], which has no mutating
/// methods at all.
#[derive(Clone, Debug, Default)]
pub struct HookRegistry {
    table: HookTable,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: PipelineHook) -> Result<(), RegistryError> {
        if hook.hook_id.is_empty() {
            return Err(RegistryError::EmptyHookId);
        }
        if self.table.index.contains_key(&hook.hook_id) {
            return Err(RegistryError::DuplicateHook(hook.hook_id));
        }
        tracing::debug!(hook_id = %hook.hook_id, phase = %hook.phase, "registering hook");
        self.table
            .index
            .insert(hook.hook_id.clone(), self.table.hooks.len());
        self.table.hooks.push(hook);
        Ok(())
    }

    /// Chaining form of [`register`](Self::register).
    pub fn with_hook(mut self, hook: PipelineHook) -> Result<Self, RegistryError> {
        self.register(hook)?;
        Ok(self)
    }

    pub fn freeze(self) -> FrozenHookRegistry {
        FrozenHookRegistry { table: self.table }
    }

    pub fn get_hooks_by_phase(&self, phase: PipelinePhase) -> Vec<&PipelineHook> {
        self.table.by_phase(phase)
    }

    pub fn get_all_hooks(&self) -> &[PipelineHook] {
        &self.table.hooks
    }

    pub fn get_hook_by_id(&self, hook_id: &str) -> Option<&PipelineHook> {
        self.table.by_id(hook_id)
    }

    pub fn len(&self) -> usize {
        self.table.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.hooks.is_empty()
    }
}

/// Immutable set of hooks, ready for planning.
#[derive(Clone, Debug, Default)]
pub struct FrozenHookRegistry {
    table: HookTable,
}

impl FrozenHookRegistry {
    pub fn get_hooks_by_phase(&self, phase: PipelinePhase) -> Vec<&PipelineHook> {
        self.table.by_phase(phase)
    }

    /// All hooks in registration order.
    pub fn get_all_hooks(&self) -> &[PipelineHook] {
        &self.table.hooks
    }

    pub fn get_hook_by_id(&self, hook_id: &str) -> Option<&PipelineHook> {
        self.table.by_id(hook_id)
    }

    pub fn len(&self) -> usize {
        self.table.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.hooks.is_empty()
    }
}
