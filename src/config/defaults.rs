//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Families the integrator handles unless configured otherwise
pub const DEFAULT_ACCEPTED_FAMILIES: &[&str] = &["model", "rig", "animation", "lookdev"];

/// Built-in default configuration values
///
/// There is no default repository root or silo: both must come from a
/// config file, the environment or the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Families accepted by the integrator (empty accepts all)
    pub accepted_families: Vec<String>,

    /// Progress output on stderr (default: false)
    pub verbose: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            accepted_families: DEFAULT_ACCEPTED_FAMILIES
                .iter()
                .map(|f| f.to_string())
                .collect(),
            verbose: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "accepted_families": self.accepted_families,
            "verbose": self.verbose,
        })
    }
}
