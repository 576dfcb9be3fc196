//! Typed publish configuration handed to the integrator

use std::path::{Path, PathBuf};

use super::defaults::BuiltinDefaults;
use crate::error::{IntegrateError, IntegrateResult};

const LAUNCH_HINT: &str = "this can happen when an application was launched \
     manually, outside of the pipeline";

/// Settings the integrator needs from its environment
#[derive(Debug, Clone, PartialEq)]
pub struct PublishConfig {
    /// Repository root; versions land under `<root>/publish/<subset>`
    pub root: Option<PathBuf>,

    /// Namespace the asset was authored under
    pub silo: Option<String>,

    /// Families the integrator handles (empty accepts all)
    pub accepted_families: Vec<String>,

    /// Progress output on stderr
    pub verbose: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            root: None,
            silo: None,
            accepted_families: defaults.accepted_families,
            verbose: defaults.verbose,
        }
    }
}

impl PublishConfig {
    /// Configuration with both required settings present
    pub fn new(root: impl Into<PathBuf>, silo: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            silo: Some(silo.into()),
            ..Self::default()
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_accepted_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_families = families.into_iter().map(Into::into).collect();
        self
    }

    /// Repository root, or a configuration error naming `root`
    pub fn require_root(&self) -> IntegrateResult<&Path> {
        match self.root.as_deref() {
            Some(root) if !root.as_os_str().is_empty() => Ok(root),
            _ => Err(IntegrateError::Configuration {
                setting: "root",
                hint: format!("set {} or pass --root; {}", super::ENV_ROOT, LAUNCH_HINT),
            }),
        }
    }

    /// Silo name, or a configuration error naming `silo`
    pub fn require_silo(&self) -> IntegrateResult<&str> {
        match self.silo.as_deref() {
            Some(silo) if !silo.trim().is_empty() => Ok(silo),
            _ => Err(IntegrateError::Configuration {
                setting: "silo",
                hint: format!("set {} or pass --silo; {}", super::ENV_SILO, LAUNCH_HINT),
            }),
        }
    }

    /// Whether `family` is handled by the integrator
    pub fn accepts_family(&self, family: &str) -> bool {
        self.accepted_families.is_empty() || self.accepted_families.iter().any(|f| f == family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_require_root_missing() {
        let config = PublishConfig {
            silo: Some("assets".to_string()),
            ..PublishConfig::default()
        };
        let err = config.require_root().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_require_silo_blank() {
        let config = PublishConfig::new("/repo", "  ");
        let err = config.require_silo().unwrap_err();
        assert!(err.to_string().contains("silo"));
    }

    #[test]
    fn test_require_present() {
        let config = PublishConfig::new("/repo", "assets");
        assert_eq!(config.require_root().unwrap(), Path::new("/repo"));
        assert_eq!(config.require_silo().unwrap(), "assets");
    }

    #[test]
    fn test_accepts_family() {
        let config = PublishConfig::new("/repo", "assets");
        assert!(config.accepts_family("model"));
        assert!(!config.accepts_family("camera"));

        let open = config.with_accepted_families(Vec::<String>::new());
        assert!(open.accepts_family("camera"));
    }
}
