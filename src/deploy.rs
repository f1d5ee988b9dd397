// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace deployment logic.
//!
//! A __workspace__ is a staging tree laid out exactly like the live file
//! system it targets, e.g., `etc/testadura/app.cfg` in the workspace lands at
//! `<target>/etc/testadura/app.cfg`. Deployment mirrors the eligible files of
//! a workspace onto a target root, and undeployment removes them again.
//!
//! # Deployment Units
//!
//! Both directions start from the same walk over the workspace. Every regular
//! file found becomes a [`DeploymentUnit`] identified by its path relative to
//! the workspace root. Units are sorted by relative path so that dry runs and
//! real runs report decisions in the same order. Symlinks inside the
//! workspace are never followed.
//!
//! Paths rejected by [`is_eligible`](crate::filter::is_eligible) are recorded
//! as ignored and never touched on the target side.
//!
//! # Failure Semantics
//!
//! A missing workspace root is fatal and aborts before anything is touched.
//! Everything else is decided per file: a file that cannot be inspected,
//! copied, or removed is recorded as a failure in the run's report and the
//! walk continues with the next file.

pub mod install;
pub mod uninstall;

pub use install::{DeployAction, DeployEngine, DeployEntry, DeployReport};
pub use uninstall::{UndeployAction, UndeployEngine, UndeployEntry, UndeployReport};

use crate::{
    filter::is_eligible,
    permission::{NodeKind, PermissionTable},
};

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, error};
use walkdir::WalkDir;

/// Source file discovered in a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentUnit {
    /// Absolute path of the file inside the workspace.
    pub source: PathBuf,

    /// Path relative to the workspace root.
    pub relative: PathBuf,

    /// Base name of the file.
    pub name: OsString,

    /// Modification time of the source file.
    pub modified: SystemTime,
}

/// Where, and with which modes, a unit gets deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// Absolute destination path.
    pub destination: PathBuf,

    /// Resolved mode of the destination file.
    pub file_mode: u32,

    /// Resolved mode of the destination's parent directory.
    pub dir_mode: u32,
}

impl DeploymentTarget {
    /// Resolve destination and modes for a unit under target root.
    ///
    /// Modes are resolved against the path the unit will have on the live
    /// file system, not against the target root it is staged into.
    pub fn resolve(
        unit: &DeploymentUnit,
        target_root: impl AsRef<Path>,
        table: &PermissionTable,
    ) -> Self {
        let parent = unit.relative.parent().unwrap_or_else(|| Path::new(""));

        Self {
            destination: target_root.as_ref().join(&unit.relative),
            file_mode: table.resolve_relative(&unit.relative, NodeKind::File),
            dir_mode: table.resolve_relative(parent, NodeKind::Directory),
        }
    }
}

/// File that could not be processed during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Offending path.
    pub path: PathBuf,

    /// What went wrong.
    pub reason: String,
}

impl Display for Failure {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.path.display(), self.reason)
    }
}

/// Outcome of walking a workspace.
#[derive(Debug, Default)]
pub(crate) struct Discovery {
    pub(crate) units: Vec<DeploymentUnit>,
    pub(crate) ignored: Vec<PathBuf>,
    pub(crate) failures: Vec<Failure>,
}

/// Walk workspace and split its regular files into eligible units and
/// ignored paths.
///
/// # Errors
///
/// - Return [`DeployError::MissingSource`] if workspace root is not a
///   directory.
pub(crate) fn discover(source_root: &Path) -> Result<Discovery> {
    if !source_root.is_dir() {
        return Err(DeployError::MissingSource {
            path: source_root.to_path_buf(),
        });
    }

    let mut discovery = Discovery::default();
    for entry in WalkDir::new(source_root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(source_root).to_path_buf();
                error!("cannot read {:?}: {err}", path.display());
                discovery.failures.push(Failure {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(source_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                error!(
                    "{:?} escapes workspace root {:?}",
                    entry.path().display(),
                    source_root.display()
                );
                discovery.failures.push(Failure {
                    path: entry.path().to_path_buf(),
                    reason: "path escapes workspace root".into(),
                });
                continue;
            }
        };

        if !is_eligible(&relative) {
            debug!("ignore {:?}", relative.display());
            discovery.ignored.push(relative);
            continue;
        }

        let modified = match entry
            .metadata()
            .map_err(std::io::Error::from)
            .and_then(|meta| meta.modified())
        {
            Ok(modified) => modified,
            Err(err) => {
                error!("cannot stat {:?}: {err}", entry.path().display());
                discovery.failures.push(Failure {
                    path: entry.path().to_path_buf(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        discovery.units.push(DeploymentUnit {
            source: entry.path().to_path_buf(),
            name: entry.file_name().to_os_string(),
            relative,
            modified,
        });
    }

    discovery.units.sort_by(|a, b| a.relative.cmp(&b.relative));
    discovery.ignored.sort();

    Ok(discovery)
}

/// Deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Workspace root does not exist or is not a directory.
    #[error("workspace root {:?} does not exist or is not a directory", path.display())]
    MissingSource { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
