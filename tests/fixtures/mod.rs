//! Shared fixtures for integration tests
//!
//! Lays out a throwaway repository with the staging area inside it:
//! `<tmp>/repo` is the root and `<tmp>/repo/work/stage` the staging directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use asset_publish::{Instance, PublishConfig, PublishContext};
use tempfile::TempDir;

pub struct Repo {
    _dir: TempDir,
    pub root: PathBuf,
    pub staging: PathBuf,
}

impl Repo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("repo");
        let staging = root.join("work").join("stage");
        fs::create_dir_all(&staging).unwrap();
        Self {
            _dir: dir,
            root,
            staging,
        }
    }

    pub fn config(&self) -> PublishConfig {
        PublishConfig::new(&self.root, "assets")
    }

    pub fn subset_dir(&self, subset: &str) -> PathBuf {
        self.root.join("publish").join(subset)
    }

    /// Write files into the staging directory
    pub fn stage(&self, files: &[(&str, &str)]) {
        stage_into(&self.staging, files);
    }

    /// A second, independent staging directory
    pub fn other_staging(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.root.join("work").join(name);
        fs::create_dir_all(&dir).unwrap();
        stage_into(&dir, files);
        dir
    }

    pub fn context(&self, user: &str) -> PublishContext {
        PublishContext {
            all_prior_steps_succeeded: true,
            timestamp: "20261018T093000Z".to_string(),
            user: user.to_string(),
            current_source_file: self.root.join("work").join("hero.ma"),
        }
    }

    /// The `model` instance used across scenarios
    pub fn model_instance(&self) -> Instance {
        Instance::new("hero", "model", "model")
            .with_families(["asset"])
            .with_staging_dir(&self.staging)
            .with_files(["mesh.abc", "mesh.json"])
    }
}

pub fn stage_into(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

/// Sorted entry names of a directory (empty if it does not exist)
pub fn listing(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}
