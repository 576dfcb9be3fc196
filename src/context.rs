//! Inputs supplied by the surrounding publish pipeline
//!
//! The integrator never looks anything up on its own: what is published
//! ([`Instance`]) and the facts about the session ([`PublishContext`]) are
//! passed in explicitly.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IntegrateError, IntegrateResult};

/// Timestamp format of a publish session (`20261018T093000Z`)
pub const SESSION_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Format a session timestamp
pub fn session_timestamp(at: DateTime<Utc>) -> String {
    at.format(SESSION_TIME_FORMAT).to_string()
}

/// Outcome of one step that ran before integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name
    pub step: String,

    pub success: bool,

    /// Failure message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    /// Load step results from a JSON array file
    pub fn load_all(path: &Path) -> IntegrateResult<Vec<StepResult>> {
        let bytes = fs::read(path).map_err(|e| IntegrateError::io(path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Session facts for one publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishContext {
    /// Every step before integration succeeded
    pub all_prior_steps_succeeded: bool,

    /// Session timestamp, recorded verbatim as the version's `time`
    pub timestamp: String,

    /// Publishing user, recorded as `author`
    pub user: String,

    /// Working file the output was produced from
    pub current_source_file: PathBuf,
}

impl PublishContext {
    /// Context whose success flag is derived from prior step results
    pub fn from_results(
        results: &[StepResult],
        timestamp: impl Into<String>,
        user: impl Into<String>,
        current_source_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            all_prior_steps_succeeded: results.iter().all(|r| r.success),
            timestamp: timestamp.into(),
            user: user.into(),
            current_source_file: current_source_file.into(),
        }
    }
}

/// A subset name is a single plain path component, so its directory stays
/// directly under `<root>/publish`
pub fn is_valid_subset_name(subset: &str) -> bool {
    let mut components = Path::new(subset).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    single_normal && !subset.contains(['/', '\\'])
}

/// One unit of output to publish as a new version of `subset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Display name used in diagnostics
    pub name: String,

    /// Subset the output belongs to (`model`, `rig`, ...)
    pub subset: String,

    /// Primary family of this publish
    pub family: String,

    /// Additional declared families
    #[serde(default)]
    pub families: Vec<String>,

    /// Directory holding the staged output
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Output filenames, relative to the staging directory
    #[serde(default)]
    pub files: Vec<String>,
}

impl Instance {
    pub fn new(name: impl Into<String>, subset: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subset: subset.into(),
            family: family.into(),
            families: Vec::new(),
            staging_dir: None,
            files: Vec::new(),
        }
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.families = families.into_iter().map(Into::into).collect();
        self
    }

    /// Declared families followed by the primary family
    pub fn all_families(&self) -> Vec<String> {
        let mut families = self.families.clone();
        families.push(self.family.clone());
        families
    }

    /// Existing staging directory, or an incomplete-instance error
    pub fn require_staging_dir(&self) -> IntegrateResult<&Path> {
        let dir = match self.staging_dir.as_deref() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => return Err(self.incomplete("missing reference to staging area")),
        };

        if !dir.is_dir() {
            return Err(self.incomplete(format!(
                "staging area {} does not exist",
                dir.display()
            )));
        }

        Ok(dir)
    }

    /// Subset name, checked with [`is_valid_subset_name`]
    pub fn require_subset(&self) -> IntegrateResult<&str> {
        if !is_valid_subset_name(&self.subset) {
            return Err(self.incomplete(format!("invalid subset name {:?}", self.subset)));
        }

        Ok(&self.subset)
    }

    fn incomplete(&self, reason: impl Into<String>) -> IntegrateError {
        IntegrateError::IncompleteInstance {
            instance: self.name.clone(),
            reason: reason.into(),
        }
    }
}
