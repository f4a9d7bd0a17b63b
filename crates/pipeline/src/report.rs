//! Load report collected while a pack is discovered and compiled.
//!
//! Types:
//! - [LoadReport]: per-load record of errors and fallback substitutions

use std::collections::BTreeMap;

use serde::Serialize;

use crate::registry::ShaderKey;

/// One fallback substitution: the requested program resolved to another
/// program's sources instead of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackRecord {
    pub requested: String,
    pub actual: String,
}

/// Everything worth telling the user about one load attempt. Serializes to
/// JSON for tooling; [LoadReport::log_summary] prints the human version.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Programs whose sources existed but failed preprocessing or compilation.
    pub errored: Vec<String>,
    /// Programs that fell back to an ancestor in the fallback forest.
    pub fallbacks: Vec<FallbackRecord>,
    /// Programs resolved from the internal pack because the shaderpack had
    /// nothing for them even after the fallback walk.
    pub internal: Vec<String>,
    /// Config values that did not match any discovered option.
    pub unknown_config: BTreeMap<String, String>,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, key: &ShaderKey) {
        self.errored.push(key.name().to_owned());
    }

    pub fn record_fallback(&mut self, requested: &ShaderKey, actual: &ShaderKey) {
        self.fallbacks.push(FallbackRecord {
            requested: requested.name().to_owned(),
            actual: actual.name().to_owned(),
        });
    }

    pub fn record_internal(&mut self, key: &ShaderKey) {
        self.internal.push(key.name().to_owned());
    }

    pub fn record_unknown_config(&mut self, name: &str, value: &str) {
        self.unknown_config
            .insert(name.to_owned(), value.to_owned());
    }

    pub fn is_clean(&self) -> bool {
        self.errored.is_empty() && self.unknown_config.is_empty()
    }

    pub fn log_summary(&self) {
        if !self.errored.is_empty() {
            tracing::error!(count = self.errored.len(), "shaders failed to load");
            for name in &self.errored {
                tracing::error!(shader = %name, "load failed");
            }
        }
        for fb in &self.fallbacks {
            tracing::debug!(requested = %fb.requested, actual = %fb.actual, "shader fell back");
        }
        for name in &self.internal {
            tracing::debug!(shader = %name, "using internal shader");
        }
        for (name, value) in &self.unknown_config {
            tracing::warn!(option = %name, value = %value, "config value matches no option");
        }
    }
}
