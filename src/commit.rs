//! Atomic materialization of a staging directory as a version directory
//!
//! The staging tree is copied into a hidden sibling of the version
//! directory, verified, and renamed into place. Readers listing the subset
//! directory see either no version directory or a complete one.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

/// Prefix of in-progress copies; never parses as a version name
pub const INCOMING_PREFIX: &str = ".incoming-";

/// Errors from materializing a version directory
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("{} already exists", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("copy of {} does not match its source", .path.display())]
    Mismatch { path: PathBuf },

    #[error("{} lies inside the staging directory {}", .version_dir.display(), .staging_dir.display())]
    Nested {
        staging_dir: PathBuf,
        version_dir: PathBuf,
    },
}

impl CommitError {
    fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        CommitError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type for commit operations
pub type CommitResult<T> = Result<T, CommitError>;

/// Copy `staging_dir` to `version_dir` so that it appears all at once.
///
/// Fails with [`CommitError::AlreadyExists`] instead of replacing an
/// existing `version_dir`. On any failure `version_dir` is left absent and
/// the in-progress copy is removed.
pub fn materialize(staging_dir: &Path, version_dir: &Path) -> CommitResult<()> {
    let parent = version_dir.parent().ok_or_else(|| {
        CommitError::io(
            version_dir,
            io::Error::new(io::ErrorKind::InvalidInput, "version directory has no parent"),
        )
    })?;

    if exists(version_dir) {
        return Err(CommitError::AlreadyExists {
            path: version_dir.to_path_buf(),
        });
    }

    let staging_real = fs::canonicalize(staging_dir).map_err(|e| CommitError::io(staging_dir, e))?;
    let parent_real = fs::canonicalize(parent).map_err(|e| CommitError::io(parent, e))?;
    if parent_real.starts_with(&staging_real) {
        return Err(CommitError::Nested {
            staging_dir: staging_dir.to_path_buf(),
            version_dir: version_dir.to_path_buf(),
        });
    }

    let incoming = tempfile::Builder::new()
        .prefix(INCOMING_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| CommitError::io(parent, e))?;

    copy_tree(staging_dir, incoming.path())?;
    verify_copy(staging_dir, incoming.path())?;

    let permissions = fs::metadata(staging_dir)
        .map_err(|e| CommitError::io(staging_dir, e))?
        .permissions();
    fs::set_permissions(incoming.path(), permissions)
        .map_err(|e| CommitError::io(incoming.path(), e))?;

    let renamed = rename_no_replace(incoming.path(), version_dir);
    drop(incoming);

    match renamed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists || exists(version_dir) => {
            Err(CommitError::AlreadyExists {
                path: version_dir.to_path_buf(),
            })
        }
        Err(e) => Err(CommitError::io(version_dir, e)),
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Recursively copy `src` into the existing directory `dst`, following symlinks
fn copy_tree(src: &Path, dst: &Path) -> CommitResult<()> {
    for entry in WalkDir::new(src)
        .min_depth(1)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| CommitError::io(entry.path(), io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| CommitError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| CommitError::io(entry.path(), e))?;
        }
    }

    Ok(())
}

/// SHA-256 of every regular file under `dir`, keyed by relative path
pub fn tree_digests(dir: &Path) -> CommitResult<BTreeMap<PathBuf, String>> {
    let mut digests = BTreeMap::new();

    for entry in WalkDir::new(dir).min_depth(1).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let mut file = File::open(entry.path()).map_err(|e| CommitError::io(entry.path(), e))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(|e| CommitError::io(entry.path(), e))?;

        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| CommitError::io(entry.path(), io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        digests.insert(rel.to_path_buf(), hex::encode(hasher.finalize()));
    }

    Ok(digests)
}

/// Every file of `src` must be present in `dst` with identical content
fn verify_copy(src: &Path, dst: &Path) -> CommitResult<()> {
    let expected = tree_digests(src)?;
    let actual = tree_digests(dst)?;

    for (rel, digest) in &expected {
        if actual.get(rel) != Some(digest) {
            return Err(CommitError::Mismatch { path: dst.join(rel) });
        }
    }

    Ok(())
}

/// Rename `from` to `to`, failing if `to` exists
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_from = CString::new(from.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let c_to = CString::new(to.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: both pointers come from live CStrings
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            c_from.as_ptr(),
            libc::AT_FDCWD,
            c_to.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // filesystem or kernel without RENAME_NOREPLACE
        Some(libc::EINVAL) | Some(libc::ENOSYS) => rename_checked(from, to),
        _ => Err(err),
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    rename_checked(from, to)
}

/// Existence check followed by a plain rename.
///
/// Not atomic: a directory created between the check and the rename can
/// still be replaced if it is empty.
fn rename_checked(from: &Path, to: &Path) -> io::Result<()> {
    if exists(to) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    fs::rename(from, to)
}
