//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by the plan builder and the runner.
///
/// Every field has a default, so a partial document deserializes cleanly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Handler category the contract expects from every hook that declares one.
    pub contract_category: Option<String>,

    /// Fail plan construction on a category mismatch instead of warning.
    pub enforce_hook_typing: bool,

    /// Deadline for hooks that do not set `timeout_seconds`.
    pub default_hook_timeout_seconds: Option<f64>,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract_category(mut self, category: impl Into<String>) -> Self {
        self.contract_category = Some(category.into());
        self
    }

    pub fn enforce_hook_typing(mut self, enforce: bool) -> Self {
        self.enforce_hook_typing = enforce;
        self
    }

    pub fn default_hook_timeout_seconds(mut self, seconds: f64) -> Self {
        self.default_hook_timeout_seconds = Some(seconds);
        self
    }
}
