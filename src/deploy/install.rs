// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Install-if-newer deployment.
//!
//! A unit is installed when its destination does not exist yet, or when the
//! source was modified strictly after the destination. Anything else is left
//! alone as up-to-date, which makes a second deployment of an unchanged
//! workspace a no-op.

use crate::{
    deploy::{discover, DeploymentTarget, DeploymentUnit, Failure, Result},
    permission::{NodeKind, PermissionTable},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, DirBuilder, Permissions},
    io::ErrorKind,
    os::unix::fs::{DirBuilderExt, PermissionsExt},
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument};

/// Decision taken for a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployAction {
    /// Unit was copied to its destination.
    Installed,

    /// Unit would have been copied, but this is a dry run.
    WouldInstall,

    /// Destination is at least as new as the unit.
    UpToDate,

    /// Unit could not be inspected or copied.
    Failed(String),
}

impl DeployAction {
    /// Check if action installs, or would install, the unit.
    pub fn is_install(&self) -> bool {
        matches!(self, Self::Installed | Self::WouldInstall)
    }
}

impl Display for DeployAction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Installed => fmt.write_str("install"),
            Self::WouldInstall => fmt.write_str("would install"),
            Self::UpToDate => fmt.write_str("skip, up-to-date"),
            Self::Failed(reason) => write!(fmt, "failed: {reason}"),
        }
    }
}

/// Record of one unit's deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployEntry {
    pub relative: PathBuf,
    pub target: DeploymentTarget,
    pub action: DeployAction,
}

/// Report of a deployment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    /// Whether the run was a dry run.
    pub dry_run: bool,

    /// Decision for every eligible unit, in relative path order.
    pub entries: Vec<DeployEntry>,

    /// Paths skipped as ineligible.
    pub ignored: Vec<PathBuf>,

    /// Files that could not be walked.
    pub failures: Vec<Failure>,
}

impl DeployReport {
    /// Relative paths that were, or would have been, installed.
    pub fn installed(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|entry| entry.action.is_install())
            .map(|entry| entry.relative.as_path())
            .collect()
    }

    /// Relative paths skipped as up-to-date.
    pub fn up_to_date(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|entry| entry.action == DeployAction::UpToDate)
            .map(|entry| entry.relative.as_path())
            .collect()
    }

    /// Entries that failed.
    pub fn failed(&self) -> Vec<&DeployEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.action, DeployAction::Failed(_)))
            .collect()
    }

    /// A run succeeds when at least one eligible unit was processed.
    pub fn is_success(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Workspace deployer.
///
/// Copies eligible units onto a target root, creating parent directories and
/// applying the modes resolved from its permission table.
#[derive(Debug, Clone)]
pub struct DeployEngine<'a> {
    table: &'a PermissionTable,
}

impl<'a> DeployEngine<'a> {
    /// Construct new deployer over permission table.
    pub fn new(table: &'a PermissionTable) -> Self {
        Self { table }
    }

    /// Deploy workspace at source root onto target root.
    ///
    /// With `dry_run` set, nothing on the file system is touched, but the
    /// report carries the same decisions a real run would take.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::MissingSource`](crate::deploy::DeployError)
    ///   if the workspace root does not exist.
    #[instrument(skip(self, source_root, target_root), level = "debug")]
    pub fn run(
        &self,
        source_root: impl AsRef<Path>,
        target_root: impl AsRef<Path>,
        dry_run: bool,
    ) -> Result<DeployReport> {
        let discovery = discover(source_root.as_ref())?;
        info!(
            "deploy {:?} to {:?}",
            source_root.as_ref().display(),
            target_root.as_ref().display()
        );

        let entries = discovery
            .units
            .iter()
            .map(|unit| {
                let target = DeploymentTarget::resolve(unit, target_root.as_ref(), self.table);
                let action = self.apply(unit, &target, target_root.as_ref(), dry_run);
                DeployEntry {
                    relative: unit.relative.clone(),
                    target,
                    action,
                }
            })
            .collect();

        Ok(DeployReport {
            dry_run,
            entries,
            ignored: discovery.ignored,
            failures: discovery.failures,
        })
    }

    fn apply(
        &self,
        unit: &DeploymentUnit,
        target: &DeploymentTarget,
        target_root: &Path,
        dry_run: bool,
    ) -> DeployAction {
        let destination = target.destination.display();
        let action = match needs_install(unit, &target.destination) {
            Ok(false) => DeployAction::UpToDate,
            Ok(true) if dry_run => DeployAction::WouldInstall,
            Ok(true) => match self.install(unit, target, target_root) {
                Ok(()) => DeployAction::Installed,
                Err(err) => DeployAction::Failed(err.to_string()),
            },
            Err(err) => DeployAction::Failed(err.to_string()),
        };

        match &action {
            DeployAction::Installed | DeployAction::WouldInstall => info!(
                "{action} {:?} (mode {:o}, dir mode {:o})",
                destination, target.file_mode, target.dir_mode
            ),
            DeployAction::UpToDate => info!("{action} {:?}", destination),
            DeployAction::Failed(_) => error!("{:?} {action}", destination),
        }

        action
    }

    fn install(
        &self,
        unit: &DeploymentUnit,
        target: &DeploymentTarget,
        target_root: &Path,
    ) -> Result<(), InstallError> {
        let parent = unit
            .relative
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            self.create_parents(parent, target_root)?;
            let parent = target_root.join(parent);
            fs::set_permissions(&parent, Permissions::from_mode(target.dir_mode)).map_err(
                |err| InstallError::CreateDir {
                    source: err,
                    path: parent.clone(),
                },
            )?;
        }

        // INVARIANT: Never write through an existing entry, replace it.
        match fs::symlink_metadata(&target.destination) {
            Ok(metadata) if !metadata.is_dir() => {
                fs::remove_file(&target.destination).map_err(|err| InstallError::Copy {
                    source: err,
                    path: target.destination.clone(),
                })?
            }
            _ => {}
        }

        fs::copy(&unit.source, &target.destination)
            .and_then(|_| {
                fs::set_permissions(
                    &target.destination,
                    Permissions::from_mode(target.file_mode),
                )
            })
            .map_err(|err| InstallError::Copy {
                source: err,
                path: target.destination.clone(),
            })?;

        Ok(())
    }

    /// Create missing directories leading to relative parent under target root.
    ///
    /// Each directory gets the mode resolved for its own live path, not the
    /// mode of the deepest one.
    fn create_parents(&self, parent: &Path, target_root: &Path) -> Result<(), InstallError> {
        fs::create_dir_all(target_root).map_err(|err| InstallError::CreateDir {
            source: err,
            path: target_root.to_path_buf(),
        })?;

        let mut relative = PathBuf::new();
        for component in parent.components() {
            relative.push(component);
            let path = target_root.join(&relative);
            if fs::symlink_metadata(&path).is_ok() {
                continue;
            }

            let mode = self.table.resolve_relative(&relative, NodeKind::Directory);
            DirBuilder::new()
                .mode(mode)
                .create(&path)
                .and_then(|_| fs::set_permissions(&path, Permissions::from_mode(mode)))
                .map_err(|err| InstallError::CreateDir {
                    source: err,
                    path: path.clone(),
                })?;
        }

        Ok(())
    }
}

fn needs_install(unit: &DeploymentUnit, destination: &Path) -> Result<bool, InstallError> {
    let metadata = match fs::symlink_metadata(destination) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
        Err(err) => {
            return Err(InstallError::Inspect {
                source: err,
                path: destination.to_path_buf(),
            })
        }
    };

    // INVARIANT: A symlink at the destination is always replaced, never compared.
    if metadata.file_type().is_symlink() {
        return Ok(true);
    }

    let modified = metadata.modified().map_err(|err| InstallError::Inspect {
        source: err,
        path: destination.to_path_buf(),
    })?;

    // INVARIANT: Only a strictly newer source replaces the destination.
    Ok(unit.modified > modified)
}

#[derive(Debug, thiserror::Error)]
enum InstallError {
    #[error("cannot inspect {:?}: {source}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("cannot create directory {:?}: {source}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("cannot copy to {:?}: {source}", path.display())]
    Copy {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}
