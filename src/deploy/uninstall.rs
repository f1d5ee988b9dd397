// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Undeployment of a workspace.
//!
//! Walks the workspace the same way deployment does and removes each eligible
//! unit's destination file. Directories are never removed, and modification
//! times are never compared.

use crate::deploy::{discover, Failure, Result};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument};

/// Decision taken for a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndeployAction {
    Removed,
    WouldRemove,
    Missing,
    Failed(String),
}

impl UndeployAction {
    /// Check if action removes, or would remove, the destination.
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Removed | Self::WouldRemove)
    }
}

impl Display for UndeployAction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Removed => fmt.write_str("remove"),
            Self::WouldRemove => fmt.write_str("would remove"),
            Self::Missing => fmt.write_str("does not exist, skipping"),
            Self::Failed(reason) => write!(fmt, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeployEntry {
    pub relative: PathBuf,
    pub destination: PathBuf,
    pub action: UndeployAction,
}

/// Report of an undeployment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndeployReport {
    pub dry_run: bool,
    pub entries: Vec<UndeployEntry>,
    pub ignored: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

impl UndeployReport {
    /// Relative paths that were, or would have been, removed.
    pub fn removed(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|entry| entry.action.is_removal())
            .map(|entry| entry.relative.as_path())
            .collect()
    }

    /// A run succeeds when at least one eligible unit was processed.
    pub fn is_success(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Workspace undeployer.
#[derive(Debug, Default, Clone, Copy)]
pub struct UndeployEngine;

impl UndeployEngine {
    pub fn new() -> Self {
        Self
    }

    /// Remove files deployed from workspace at source root out of target root.
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
    ) -> Result<UndeployReport> {
        let discovery = discover(source_root.as_ref())?;
        info!(
            "undeploy {:?} from {:?}",
            source_root.as_ref().display(),
            target_root.as_ref().display()
        );

        let entries = discovery
            .units
            .into_iter()
            .map(|unit| {
                let destination = target_root.as_ref().join(&unit.relative);
                let action = remove(&destination, dry_run);
                UndeployEntry {
                    relative: unit.relative,
                    destination,
                    action,
                }
            })
            .collect();

        Ok(UndeployReport {
            dry_run,
            entries,
            ignored: discovery.ignored,
            failures: discovery.failures,
        })
    }
}

fn remove(destination: &Path, dry_run: bool) -> UndeployAction {
    // INVARIANT: A dangling symlink at the destination still counts as present.
    let action = match fs::symlink_metadata(destination) {
        Err(err) if err.kind() == ErrorKind::NotFound => UndeployAction::Missing,
        Err(err) => UndeployAction::Failed(err.to_string()),
        Ok(_) if dry_run => UndeployAction::WouldRemove,
        Ok(_) => match fs::remove_file(destination) {
            Ok(()) => UndeployAction::Removed,
            Err(err) => UndeployAction::Failed(err.to_string()),
        },
    };

    match &action {
        UndeployAction::Failed(_) => error!("{:?} {action}", destination.display()),
        _ => info!("{action} {:?}", destination.display()),
    }

    action
}
