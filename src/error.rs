//! Error surface of the publish integrator

use std::io;
use std::path::{Path, PathBuf};

use publish_version::AllocateError;
use thiserror::Error;

/// Result type for integration
pub type IntegrateResult<T> = Result<T, IntegrateError>;

/// Coarse classification of [`IntegrateError`], for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Atomicity,
    IncompleteInstance,
    SchemaValidation,
    VersionConflict,
    Allocation,
    Io,
}

/// Errors returned by [`crate::Integrator::integrate`]
#[derive(Debug, Error)]
pub enum IntegrateError {
    #[error("missing configuration setting `{setting}`: {hint}")]
    Configuration { setting: &'static str, hint: String },

    #[error("atomicity not held for \"{instance}\": a prior step failed, aborting")]
    Atomicity { instance: String },

    #[error("incomplete instance \"{instance}\": {reason}")]
    IncompleteInstance { instance: String, reason: String },

    #[error("invalid subset name {subset:?}: expected a single directory name")]
    InvalidSubset { subset: String },

    #[error(
        "metadata for {subset} v{version} failed schema \"{schema}\" ({}): {}",
        .path.display(),
        .violations.join("; ")
    )]
    SchemaValidation {
        subset: String,
        version: u32,
        schema: String,
        path: PathBuf,
        violations: Vec<String>,
    },

    #[error("version {version} of {subset} already exists at {}; allocate again", .path.display())]
    VersionConflict {
        subset: String,
        version: u32,
        path: PathBuf,
    },

    #[error("cannot allocate a version for {subset}: {source}")]
    Allocation {
        subset: String,
        #[source]
        source: AllocateError,
    },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntegrateError {
    /// Wrap an I/O error with the path it occurred at
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        IntegrateError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrateError::Configuration { .. } => ErrorKind::Configuration,
            IntegrateError::Atomicity { .. } => ErrorKind::Atomicity,
            IntegrateError::IncompleteInstance { .. } | IntegrateError::InvalidSubset { .. } => {
                ErrorKind::IncompleteInstance
            }
            IntegrateError::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            IntegrateError::VersionConflict { .. } => ErrorKind::VersionConflict,
            IntegrateError::Allocation { .. } => ErrorKind::Allocation,
            IntegrateError::Io { .. } | IntegrateError::Serialization(_) => ErrorKind::Io,
        }
    }

    /// Only a lost allocation race can succeed by simply calling again
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::VersionConflict
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Atomicity => 10,
            ErrorKind::IncompleteInstance => 11,
            ErrorKind::SchemaValidation => 20,
            ErrorKind::VersionConflict => 75,
            ErrorKind::Allocation => 30,
            ErrorKind::Io => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflict_is_retryable() {
        let conflict = IntegrateError::VersionConflict {
            subset: "model".to_string(),
            version: 3,
            path: PathBuf::from("/repo/publish/model/003"),
        };
        assert!(conflict.is_retryable());
        assert_eq!(conflict.exit_code(), 75);

        let atomicity = IntegrateError::Atomicity {
            instance: "hero".to_string(),
        };
        assert!(!atomicity.is_retryable());
    }

    #[test]
    fn test_schema_error_lists_violations() {
        let err = IntegrateError::SchemaValidation {
            subset: "rig".to_string(),
            version: 2,
            schema: "version".to_string(),
            path: PathBuf::from("/stage/.metadata.json"),
            violations: vec!["missing `silo`".to_string(), "`version` must be >= 1".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("rig v2"));
        assert!(msg.contains("missing `silo`; `version` must be >= 1"));
    }

    #[test]
    fn test_io_error_kind() {
        let err = IntegrateError::io("/repo", io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/repo"));
    }
}
