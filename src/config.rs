//! Optimizer configuration.

use serde::{Deserialize, Serialize};

/// Settings for the rule driver and the interpreter it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of passes over the plan before stopping.
    pub max_iterations: usize,
    /// Whether interpreters build hashed sets for constant IN lists.
    pub enable_in_list_cache: bool,
    /// Whether to record a before/after trace of every rule that fires.
    pub enable_trace: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            enable_in_list_cache: true,
            enable_trace: false,
        }
    }
}

impl OptimizerConfig {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_in_list_cache(mut self, enable: bool) -> Self {
        self.enable_in_list_cache = enable;
        self
    }

    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }
}
