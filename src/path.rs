// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevant path information for files that the deployer needs to
//! interact with, and provide the lexical path arithmetic used to compute
//! relative symlink targets and ownership checks.

use std::{
    env::VarError,
    path::{Component, Path, PathBuf},
};

/// Name of the framework whose workspace gets deployed.
pub const FRAMEWORK: &str = "testadura";

/// Determine default absolute path to the deployer's state file.
///
/// Uses XDG Base Directory path `$XDG_STATE_HOME/testadura/deploy-workspace.state`
/// as the default, falling back to the data directory on platforms without a
/// state directory. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`Error::NoWayHome`] if no user directory can be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_state_file() -> Result<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_dir)
        .map(|path| path.join(FRAMEWORK).join("deploy-workspace.state"))
        .ok_or(Error::NoWayHome)
}

/// Library root whose executables get linked, relative to a target root.
pub fn library_root(target_root: impl AsRef<Path>) -> PathBuf {
    target_root
        .as_ref()
        .join("usr")
        .join("local")
        .join("lib")
        .join(FRAMEWORK)
}

/// Shared binary directory, relative to a target root.
pub fn bin_dir(target_root: impl AsRef<Path>) -> PathBuf {
    target_root.as_ref().join("usr").join("local").join("bin")
}

/// Perform shell expansion on user supplied path, and make it absolute.
///
/// Expands `~` and environment variables the same way a shell would, then
/// anchors the result at the current working directory if it is relative.
///
/// # Errors
///
/// - Return [`Error::ShellExpansion`] if a variable cannot be looked up.
/// - Return [`Error::Absolute`] if the current directory cannot be read.
pub fn expand(raw: impl AsRef<str>) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw.as_ref())?.into_owned();
    std::path::absolute(&expanded).map_err(|err| Error::Absolute {
        source: err,
        path: PathBuf::from(expanded),
    })
}

/// Normalize path without touching the file system.
///
/// Drops `.` components and folds `..` into its parent. A `..` at the root
/// stays at the root.
pub fn normalize_lexically(path: impl AsRef<Path>) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }

    result
}

/// Canonicalize path, or as much of it as exists.
///
/// Dangling symlinks and not-yet-deployed trees still need a stable absolute
/// form for prefix comparison. The path is normalized lexically, its deepest
/// existing ancestor is canonicalized, and the missing remainder appended.
pub fn canonical_or_lexical(path: impl AsRef<Path>) -> PathBuf {
    if let Ok(canonical) = path.as_ref().canonicalize() {
        return canonical;
    }

    let normalized = normalize_lexically(path);
    let mut missing = Vec::new();
    let mut current = normalized.as_path();
    while let (Some(parent), Some(name)) = (current.parent(), current.file_name()) {
        missing.push(name);
        current = parent;
        if let Ok(mut canonical) = current.canonicalize() {
            canonical.extend(missing.iter().rev());
            return canonical;
        }
    }

    normalized
}

/// Calculate a relative path from directory `from` to path `to`.
///
/// Both paths are normalized lexically first, so they should share the same
/// anchor (both absolute, or both relative to the same base).
pub fn relative_path(from: impl AsRef<Path>, to: impl AsRef<Path>) -> PathBuf {
    let from = normalize_lexically(from);
    let to = normalize_lexically(to);
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from_parts.len() {
        result.push("..");
    }
    for part in &to_parts[common..] {
        result.push(part);
    }

    result
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No way to determine user's home or state directory.
    #[error("cannot determine absolute path to user's state directory")]
    NoWayHome,

    /// Shell expansion of a user supplied path failed.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<VarError>),

    /// Path cannot be made absolute.
    #[error("failed to make {:?} absolute", path.display())]
    Absolute {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
