//! Portable path templates
//!
//! Paths recorded in metadata never contain the repository root or the
//! version directory literally. They are written relative to a placeholder
//! and always use `/` as the separator.

use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Placeholder for the repository root
pub const ROOT_PLACEHOLDER: &str = "{root}";

/// Placeholder for the version directory
pub const DIRNAME_PLACEHOLDER: &str = "{dirname}";

/// Placeholder for a representation's format
pub const FORMAT_PLACEHOLDER: &str = "{format}";

/// Replace backslashes with `/`
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Resolve `.` and `..` without touching the filesystem
fn lexical_components(path: &Path) -> Vec<Component<'_>> {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// `path` joined onto the current directory when it is relative
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// `path` expressed relative to `base`, computed lexically.
///
/// Paths outside `base` climb out with `..`. Both paths must be absolute
/// or both relative to the same directory; [`absolutize`] them otherwise.
/// Root and prefix components are never carried into the result.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path = lexical_components(path);
    let base = lexical_components(base);

    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for component in &base[common..] {
        if matches!(component, Component::Normal(_)) {
            rel.push("..");
        }
    }
    for component in &path[common..] {
        if matches!(component, Component::Normal(_) | Component::ParentDir) {
            rel.push(component.as_os_str());
        }
    }
    rel
}

/// Template of `path` rooted at [`ROOT_PLACEHOLDER`]
///
/// `/repo/publish/model/001` under `/repo` -> `{root}/publish/model/001`
pub fn root_template(path: &Path, root: &Path) -> String {
    let rel = relative_path(path, root);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        ROOT_PLACEHOLDER.to_string()
    } else {
        normalize_separators(&format!("{}/{}", ROOT_PLACEHOLDER, parts.join("/")))
    }
}

/// Split a staging-relative filename into name and format
///
/// `mesh.abc` -> (`mesh`, `.abc`), `sub/a.tar.gz` -> (`sub/a.tar`, `.gz`),
/// `README` -> (`README`, ``).
pub fn split_format(filename: &str) -> (String, String) {
    let normalized = normalize_separators(filename);
    let extension = Path::new(&normalized)
        .extension()
        .map(|ext| ext.to_string_lossy().len());

    match extension {
        Some(len) => {
            let dot = normalized.len() - len - 1;
            (
                normalized[..dot].to_string(),
                normalized[dot..].to_string(),
            )
        }
        None => (normalized, String::new()),
    }
}
