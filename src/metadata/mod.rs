//! Version metadata: document model, path templates and load-or-create
//!
//! A staging directory may already carry a metadata document from an
//! earlier, failed attempt. [`load_or_create`] decides whether to resume
//! from it or start over.

mod document;
mod template;

use std::io;
use std::path::Path;

pub use document::{
    Representation, VersionMetadata, METADATA_FILENAME, REPRESENTATION_SCHEMA_ID,
    VERSION_SCHEMA_ID,
};
pub use template::{
    absolutize, normalize_separators, relative_path, root_template, split_format, DIRNAME_PLACEHOLDER,
    FORMAT_PLACEHOLDER, ROOT_PLACEHOLDER,
};

/// Fields of a fresh document for the current allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSeed {
    pub version: u32,
    pub path: String,
    pub families: Vec<String>,
    pub time: String,
    pub author: String,
    pub silo: String,
    pub source: String,
}

impl VersionSeed {
    pub fn into_metadata(self) -> VersionMetadata {
        VersionMetadata {
            schema: VERSION_SCHEMA_ID.to_string(),
            version: self.version,
            path: self.path,
            representations: Vec::new(),
            families: self.families,
            time: self.time,
            author: self.author,
            silo: self.silo,
            source: self.source,
        }
    }
}

/// Where the assembled document came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOrigin {
    /// No document in staging
    Fresh,

    /// Existing document for the same subset, rebased onto the new version
    Resumed { previous_version: u32 },

    /// Existing document belonged to another subset and was discarded
    Stale { previous_path: String },

    /// Existing document could not be read and was discarded
    Unreadable { reason: String },
}

/// Parent template of a version path (`{root}/publish/model/003` -> `{root}/publish/model`)
fn subset_template(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Load the staging document or build a fresh one from `seed`
pub fn load_or_create(staging_dir: &Path, seed: VersionSeed) -> (VersionMetadata, MetadataOrigin) {
    match VersionMetadata::read_from(staging_dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            (seed.into_metadata(), MetadataOrigin::Fresh)
        }
        Err(e) => (
            seed.into_metadata(),
            MetadataOrigin::Unreadable {
                reason: e.to_string(),
            },
        ),
        Ok(existing) if subset_template(&existing.path) != subset_template(&seed.path) => (
            seed.into_metadata(),
            MetadataOrigin::Stale {
                previous_path: existing.path,
            },
        ),
        Ok(mut existing) => {
            let previous_version = existing.version;
            existing.rebase(seed.version, seed.path);
            (existing, MetadataOrigin::Resumed { previous_version })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn seed(version: u32, subset: &str) -> VersionSeed {
        VersionSeed {
            version,
            path: format!("{{root}}/publish/{}/{:03}", subset, version),
            families: vec!["model".to_string()],
            time: "20261018T093000Z".to_string(),
            author: "alice".to_string(),
            silo: "assets".to_string(),
            source: "{root}/work/hero.ma".to_string(),
        }
    }

    #[test]
    fn test_fresh_when_missing() {
        let dir = TempDir::new().unwrap();
        let (doc, origin) = load_or_create(dir.path(), seed(1, "model"));
        assert_eq!(origin, MetadataOrigin::Fresh);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.schema, VERSION_SCHEMA_ID);
        assert!(doc.representations.is_empty());
    }

    #[test]
    fn test_resume_rebases_version() {
        let dir = TempDir::new().unwrap();
        let mut earlier = seed(2, "model").into_metadata();
        earlier.author = "bob".to_string();
        earlier.append_representations(&["mesh.abc"]);
        earlier.write_to(dir.path()).unwrap();

        let (doc, origin) = load_or_create(dir.path(), seed(3, "model"));
        assert_eq!(origin, MetadataOrigin::Resumed { previous_version: 2 });
        assert_eq!(doc.version, 3);
        assert_eq!(doc.path, "{root}/publish/model/003");
        assert_eq!(doc.author, "bob");
        assert_eq!(doc.representations.len(), 1);
    }

    #[test]
    fn test_other_subset_is_stale() {
        let dir = TempDir::new().unwrap();
        let mut earlier = seed(7, "rig").into_metadata();
        earlier.append_representations(&["rig.ma"]);
        earlier.write_to(dir.path()).unwrap();

        let (doc, origin) = load_or_create(dir.path(), seed(1, "model"));
        assert_eq!(
            origin,
            MetadataOrigin::Stale {
                previous_path: "{root}/publish/rig/007".to_string()
            }
        );
        assert!(doc.representations.is_empty());
        assert_eq!(doc.path, "{root}/publish/model/001");
    }

    #[test]
    fn test_unreadable_is_replaced() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(METADATA_FILENAME), "[1, 2").unwrap();

        let (doc, origin) = load_or_create(dir.path(), seed(1, "model"));
        assert!(matches!(origin, MetadataOrigin::Unreadable { .. }));
        assert_eq!(doc.version, 1);
    }

    #[test]
    fn test_subset_template() {
        assert_eq!(subset_template("{root}/publish/model/003"), "{root}/publish/model");
        assert_eq!(subset_template("nothing"), "");
    }
}
