//! Asset Publish - versioned integration of staged output
//!
//! This crate takes the output of a publish pipeline from its staging
//! directory and commits it as the next numbered version of a subset in a
//! shared repository, together with a metadata document describing where it
//! came from and which files it contains.

pub mod commit;
pub mod config;
pub mod context;
pub mod error;
pub mod integrate;
pub mod metadata;
pub mod schema;

pub use config::{EffectiveConfig, PublishConfig};
pub use context::{Instance, PublishContext, StepResult};
pub use error::{ErrorKind, IntegrateError, IntegrateResult};
pub use integrate::{checked_subset_dir, list_versions, subset_dir, Integrator, PublishedVersion, PUBLISH_DIR};
pub use metadata::{Representation, VersionMetadata, METADATA_FILENAME};
pub use publish_version::{allocate_next, format_version, parse_version};
pub use schema::{BuiltinValidator, SchemaValidator, SchemaViolations};
