//! Engine-level configuration loaded from YAML.
//!
//! Externalizes the tunables the specification calls out by name (probe
//! depth, discovery retry cooldown, debounce intervals, per-tab log
//! capacity) so they can be adjusted without recompiling.
//!
//! # File format
//!
//! ```yaml
//! # vdd-engine config.yaml
//! probe_max_depth: 2
//! discovery_cooldown_seconds: 300
//! vdd_debounce_millis: 2000
//! request_log_debounce_millis: 1000
//! request_log_capacity: 50
//! ```

use std::path::Path;

use serde::Deserialize;

/// Engine-wide tunables.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting depth for schema probing (§4.4).
    pub probe_max_depth: u32,

    /// Minimum time between retrying a `not_found` discovery-document
    /// fetch for the same service, in seconds.
    pub discovery_cooldown_seconds: u64,

    /// Debounce window for coalescing VDD storage writes, in milliseconds.
    pub vdd_debounce_millis: u64,

    /// Debounce window for coalescing per-tab request-log writes, in
    /// milliseconds.
    pub request_log_debounce_millis: u64,

    /// Maximum number of raw request entries retained per tab (oldest
    /// evicted).
    pub request_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_max_depth: 2,
            discovery_cooldown_seconds: 300,
            vdd_debounce_millis: 2_000,
            request_log_debounce_millis: 1_000,
            request_log_capacity: 50,
        }
    }
}

impl EngineConfig {
    /// Load config from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_defaults() {
        let config: EngineConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config.probe_max_depth, 2);
        assert_eq!(config.discovery_cooldown_seconds, 300);
        assert_eq!(config.request_log_capacity, 50);
    }

    #[test]
    fn deserialize_partial_override() {
        let yaml = "probe_max_depth: 4\n";
        let config: EngineConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.probe_max_depth, 4);
        assert_eq!(config.discovery_cooldown_seconds, 300);
    }

    #[test]
    fn load_nonexistent_file_errors() {
        let result = EngineConfig::load(Path::new("/nonexistent/vdd-engine.yaml"));
        assert!(result.is_err());
    }
}
