//! Publish configuration
//!
//! Settings are merged from four layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (TOML)
//! 3. Environment (`PUBLISH_ROOT`, `PUBLISH_SILO`)
//! 4. CLI flags
//!
//! The merged value is turned into a typed [`PublishConfig`]. Required
//! settings are only enforced when a publish actually runs.

mod defaults;
mod effective;
mod merge;
mod publish;

pub use defaults::{BuiltinDefaults, DEFAULT_ACCEPTED_FAMILIES};
pub use effective::{
    env_layer, env_layer_from, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    ENV_ROOT, ENV_SILO,
};
pub use merge::{deep_merge, merge_layers};
pub use publish::PublishConfig;
