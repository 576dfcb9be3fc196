//! The per-version metadata document (`.metadata.json`)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::template::{split_format, DIRNAME_PLACEHOLDER, FORMAT_PLACEHOLDER};

/// Filename of the metadata document inside staging and version directories
pub const METADATA_FILENAME: &str = ".metadata.json";

/// Schema identifier of the version document
pub const VERSION_SCHEMA_ID: &str = "asset-core:version-1.0";

/// Schema identifier of a representation record
pub const REPRESENTATION_SCHEMA_ID: &str = "asset-core:representation-1.0";

/// One published output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub schema: String,

    /// Extension including the leading dot, empty when there is none
    pub format: String,

    /// `{dirname}/<name>{format}`
    pub path: String,
}

impl Representation {
    /// Representation of a staging-relative output filename
    pub fn from_filename(filename: &str) -> Self {
        let (name, format) = split_format(filename);
        Self {
            schema: REPRESENTATION_SCHEMA_ID.to_string(),
            format,
            path: format!("{}/{}{}", DIRNAME_PLACEHOLDER, name, FORMAT_PLACEHOLDER),
        }
    }
}

/// Metadata of one published version
///
/// Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub schema: String,

    pub version: u32,

    /// Root template of the version directory
    pub path: String,

    pub representations: Vec<Representation>,

    /// Declared families followed by the primary family
    pub families: Vec<String>,

    /// Session timestamp
    pub time: String,

    pub author: String,

    pub silo: String,

    /// Root template of the working file the output came from
    pub source: String,
}

impl VersionMetadata {
    /// Path of the metadata document inside `dir`
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILENAME)
    }

    /// Read the document from `dir`
    pub fn read_from(dir: &Path) -> io::Result<Self> {
        let bytes = fs::read(Self::path_in(dir))?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Point the document at another allocation of the same subset
    pub fn rebase(&mut self, version: u32, path: String) {
        self.version = version;
        self.path = path;
    }

    /// Append one representation per filename, in order.
    ///
    /// A representation identical to one the document already carried
    /// before this call is skipped. Returns how many were appended.
    pub fn append_representations<S: AsRef<str>>(&mut self, filenames: &[S]) -> usize {
        let carried = self.representations.len();
        let mut appended = 0;

        for filename in filenames {
            let representation = Representation::from_filename(filename.as_ref());
            if self.representations[..carried].contains(&representation) {
                continue;
            }
            self.representations.push(representation);
            appended += 1;
        }

        appended
    }

    /// Pretty-printed JSON bytes
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Write the document into `dir`, replacing any previous one.
    ///
    /// Written via a temporary file and rename. Returns the bytes written.
    pub fn write_to(&self, dir: &Path) -> io::Result<Vec<u8>> {
        let bytes = self
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let final_path = Self::path_in(dir);
        let temp_path = dir.join(format!("{}.tmp", METADATA_FILENAME));

        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, &final_path)?;

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> VersionMetadata {
        VersionMetadata {
            schema: VERSION_SCHEMA_ID.to_string(),
            version: 1,
            path: "{root}/publish/model/001".to_string(),
            representations: Vec::new(),
            families: vec!["model".to_string()],
            time: "20261018T093000Z".to_string(),
            author: "alice".to_string(),
            silo: "assets".to_string(),
            source: "{root}/work/hero.ma".to_string(),
        }
    }

    #[test]
    fn test_representation_from_filename() {
        let rep = Representation::from_filename("mesh.abc");
        assert_eq!(rep.schema, REPRESENTATION_SCHEMA_ID);
        assert_eq!(rep.format, ".abc");
        assert_eq!(rep.path, "{dirname}/mesh{format}");
    }

    #[test]
    fn test_append_keeps_input_order_and_duplicates() {
        let mut doc = sample();
        let added = doc.append_representations(&["b.json", "a.abc", "b.json"]);
        assert_eq!(added, 3);
        let formats: Vec<_> = doc.representations.iter().map(|r| r.format.as_str()).collect();
        assert_eq!(formats, vec![".json", ".abc", ".json"]);
    }

    #[test]
    fn test_append_skips_carried_representations() {
        let mut doc = sample();
        doc.append_representations(&["mesh.abc", "mesh.json"]);

        let added = doc.append_representations(&["mesh.abc", "mesh.json", "mesh.usd"]);
        assert_eq!(added, 1);
        assert_eq!(doc.representations.len(), 3);
    }

    #[test]
    fn test_field_order_is_stable() {
        let text = String::from_utf8(sample().to_bytes().unwrap()).unwrap();
        let keys = [
            "\"schema\"",
            "\"version\"",
            "\"path\"",
            "\"representations\"",
            "\"families\"",
            "\"time\"",
            "\"author\"",
            "\"silo\"",
            "\"source\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut doc = sample();
        doc.append_representations(&["mesh.abc"]);

        let bytes = doc.write_to(dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join(METADATA_FILENAME)).unwrap(), bytes);
        assert!(!dir.path().join(".metadata.json.tmp").exists());
        assert_eq!(VersionMetadata::read_from(dir.path()).unwrap(), doc);
    }

    #[test]
    fn test_write_overwrites() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(METADATA_FILENAME), "x".repeat(4096)).unwrap();

        let doc = sample();
        doc.write_to(dir.path()).unwrap();
        assert_eq!(VersionMetadata::read_from(dir.path()).unwrap(), doc);
    }

    #[test]
    fn test_read_garbage_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(METADATA_FILENAME), "{not json").unwrap();
        let err = VersionMetadata::read_from(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
