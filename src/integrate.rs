//! The publish integrator
//!
//! Turns a staging directory into the next numbered version of a subset:
//!
//! 1. Check configuration, prior step results and the instance
//! 2. Ensure `<root>/publish/<subset>` exists
//! 3. Allocate the next version number from the existing entries
//! 4. Load or create the metadata document and append representations
//! 5. Write the document into the staging directory
//! 6. Validate the written document against the `version` schema
//! 7. Materialize the staging tree as the version directory, atomically
//!
//! The document is written before validation so a rejected publish can be
//! inspected by hand in the staging area. Nothing in the repository changes
//! until step 7, and step 7 either fully succeeds or leaves no trace.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use publish_version::{allocate_next, format_version, parse_version};
use serde::Serialize;
use serde_json::Value;

use crate::commit::{self, CommitError};
use crate::config::PublishConfig;
use crate::context::{is_valid_subset_name, Instance, PublishContext};
use crate::error::{IntegrateError, IntegrateResult};
use crate::metadata::{
    absolutize, load_or_create, root_template, MetadataOrigin, VersionMetadata, VersionSeed,
};
use crate::schema::{BuiltinValidator, SchemaValidator, VERSION_SCHEMA};

/// Directory under the repository root holding all subsets
pub const PUBLISH_DIR: &str = "publish";

/// `<root>/publish/<subset>`
pub fn subset_dir(root: &Path, subset: &str) -> PathBuf {
    root.join(PUBLISH_DIR).join(subset)
}

/// [`subset_dir`] for a name accepted by [`is_valid_subset_name`]
pub fn checked_subset_dir(root: &Path, subset: &str) -> IntegrateResult<PathBuf> {
    if !is_valid_subset_name(subset) {
        return Err(IntegrateError::InvalidSubset {
            subset: subset.to_string(),
        });
    }
    Ok(subset_dir(root, subset))
}

/// Published version numbers under `subset_dir`, ascending.
///
/// A missing directory has no versions.
pub fn list_versions(subset_dir: &Path) -> IntegrateResult<Vec<u32>> {
    if !subset_dir.exists() {
        return Ok(Vec::new());
    }

    let mut versions: Vec<u32> = entry_names(subset_dir)?
        .iter()
        .filter_map(|name| parse_version(name))
        .collect();
    versions.sort_unstable();
    Ok(versions)
}

fn entry_names(dir: &Path) -> IntegrateResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| IntegrateError::io(dir, e))? {
        let entry = entry.map_err(|e| IntegrateError::io(dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// A successfully published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedVersion {
    pub subset: String,
    pub number: u32,
    /// Final version directory
    pub path: PathBuf,
    pub metadata: VersionMetadata,
}

/// Publishes staged instances into the repository
pub struct Integrator<V = BuiltinValidator> {
    config: PublishConfig,
    validator: V,
}

impl Integrator<BuiltinValidator> {
    /// Integrator using the built-in schema validator
    pub fn new(config: PublishConfig) -> Self {
        Self::with_validator(config, BuiltinValidator)
    }
}

impl<V: SchemaValidator> Integrator<V> {
    pub fn with_validator(config: PublishConfig, validator: V) -> Self {
        Self { config, validator }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Whether this integrator handles the instance's families
    pub fn accepts(&self, instance: &Instance) -> bool {
        instance
            .all_families()
            .iter()
            .any(|family| self.config.accepts_family(family))
    }

    /// Number the next publish of `subset` would get right now
    pub fn next_version(&self, subset: &str) -> IntegrateResult<u32> {
        let root = self.config.require_root()?;
        let dir = checked_subset_dir(root, subset)?;
        let names = if dir.exists() {
            entry_names(&dir)?
        } else {
            Vec::new()
        };
        allocate_next(names).map_err(|source| {
            IntegrateError::Allocation {
                subset: subset.to_string(),
                source,
            }
        })
    }

    /// Publish `instance` as a new version of its subset
    pub fn integrate(
        &self,
        instance: &Instance,
        context: &PublishContext,
    ) -> IntegrateResult<PublishedVersion> {
        let root = self.config.require_root()?;
        let silo = self.config.require_silo()?;
        let root = &absolutize(root).map_err(|e| IntegrateError::io(root, e))?;

        if !context.all_prior_steps_succeeded {
            return Err(IntegrateError::Atomicity {
                instance: instance.name.clone(),
            });
        }

        let staging_dir = instance.require_staging_dir()?;
        let subset = instance.require_subset()?;

        if self.config.verbose {
            eprintln!("Establishing staging directory @ {}", staging_dir.display());
        }

        let subset_dir = subset_dir(root, subset);
        fs::create_dir_all(&subset_dir).map_err(|e| IntegrateError::io(&subset_dir, e))?;

        let number = allocate_next(entry_names(&subset_dir)?).map_err(|source| {
            IntegrateError::Allocation {
                subset: subset.to_string(),
                source,
            }
        })?;
        let version_dir = subset_dir.join(format_version(number));

        if self.config.verbose {
            eprintln!("New version: {}", number);
        }

        let source_file = absolutize(&context.current_source_file)
            .map_err(|e| IntegrateError::io(&context.current_source_file, e))?;
        let seed = VersionSeed {
            version: number,
            path: root_template(&version_dir, root),
            families: instance.all_families(),
            time: context.timestamp.clone(),
            author: context.user.clone(),
            silo: silo.to_string(),
            source: root_template(&source_file, root),
        };
        let (mut metadata, origin) = load_or_create(staging_dir, seed);
        self.report_origin(&origin);

        let appended = metadata.append_representations(&instance.files);
        if self.config.verbose {
            eprintln!(
                "Catalogued {} new representation(s), {} total",
                appended,
                metadata.representations.len()
            );
        }

        let metadata_path = VersionMetadata::path_in(staging_dir);
        let written = metadata
            .write_to(staging_dir)
            .map_err(|e| IntegrateError::io(&metadata_path, e))?;

        let document: Value = serde_json::from_slice(&written)?;
        self.validator
            .validate(&document, VERSION_SCHEMA)
            .map_err(|v| IntegrateError::SchemaValidation {
                subset: subset.to_string(),
                version: number,
                schema: v.schema,
                path: metadata_path.clone(),
                violations: v.violations,
            })?;

        commit::materialize(staging_dir, &version_dir).map_err(|e| match e {
            CommitError::AlreadyExists { path } => IntegrateError::VersionConflict {
                subset: subset.to_string(),
                version: number,
                path,
            },
            CommitError::Io { path, source } => IntegrateError::Io { path, source },
            CommitError::Walk(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| staging_dir.to_path_buf());
                IntegrateError::Io {
                    path,
                    source: e.into(),
                }
            }
            CommitError::Nested { .. } => IntegrateError::IncompleteInstance {
                instance: instance.name.clone(),
                reason: e.to_string(),
            },
            CommitError::Mismatch { path } => IntegrateError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidData, "copied file does not match its source"),
            ),
        })?;

        if self.config.verbose {
            eprintln!(
                "Successfully integrated \"{}\" to \"{}\"",
                instance.name,
                version_dir.display()
            );
        }

        Ok(PublishedVersion {
            subset: subset.to_string(),
            number,
            path: version_dir,
            metadata,
        })
    }

    fn report_origin(&self, origin: &MetadataOrigin) {
        match origin {
            MetadataOrigin::Fresh => {
                if self.config.verbose {
                    eprintln!("Generated fresh metadata");
                }
            }
            MetadataOrigin::Resumed { previous_version } => {
                if self.config.verbose {
                    eprintln!("Resuming metadata of earlier attempt (was v{})", previous_version);
                }
            }
            // discarding an earlier document is always worth mentioning
            MetadataOrigin::Stale { previous_path } => {
                eprintln!("WARN: Discarding staged metadata for another subset: {}", previous_path);
            }
            MetadataOrigin::Unreadable { reason } => {
                eprintln!("WARN: Discarding unreadable staged metadata: {}", reason);
            }
        }
    }
}
