// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Executable symlink management.
//!
//! Executables shipped in the deployed framework library are exposed in a
//! shared binary directory through prefixed symlinks, e.g., the library file
//! `common/tools/deploy-workspace.sh` becomes `td-deploy-workspace` in the
//! binary directory.
//!
//! # Relative Links
//!
//! Links always point at their executable through a relative path, so a
//! binary directory and library tree that are relocated together, like under
//! a staging prefix or a chroot, stay consistent.
//!
//! # Ownership
//!
//! Unlinking only considers `td-*` entries of the binary directory that are
//! symlinks resolving into the library root. A user's own `td-` symlink that
//! points anywhere else is left alone.

use crate::{
    deploy::Failure,
    path::{canonical_or_lexical, relative_path},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::ErrorKind,
    os::unix::fs::{symlink, PermissionsExt},
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;

/// Prefix of every managed link name.
pub const LINK_PREFIX: &str = "td-";

/// Library subtree that is never linked.
pub const TEMPLATES_DIR: &str = "templates";

/// Symlink in the shared binary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkEntry {
    /// Absolute path of the link itself.
    pub link_path: PathBuf,

    /// Target of the link, relative to the binary directory.
    pub target: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Linked,
    WouldLink,
    /// Derived name marks a private executable.
    Private,
    Failed(String),
}

impl Display for LinkAction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Linked => fmt.write_str("link"),
            Self::WouldLink => fmt.write_str("would link"),
            Self::Private => fmt.write_str("skip private"),
            Self::Failed(reason) => write!(fmt, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub source: PathBuf,
    pub link: SymlinkEntry,
    pub action: LinkAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub dry_run: bool,
    pub entries: Vec<LinkEntry>,
    pub failures: Vec<Failure>,
}

impl LinkReport {
    /// Names of links that were, or would have been, created.
    pub fn linked(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.action, LinkAction::Linked | LinkAction::WouldLink))
            .filter_map(|entry| entry.link.link_path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlinkAction {
    Unlinked,
    WouldUnlink,
    /// Link resolves outside of the library root.
    Foreign,
    NotSymlink,
    Failed(String),
}

impl Display for UnlinkAction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unlinked => fmt.write_str("unlink"),
            Self::WouldUnlink => fmt.write_str("would unlink"),
            Self::Foreign => fmt.write_str("skip foreign symlink"),
            Self::NotSymlink => fmt.write_str("skip, not a symlink"),
            Self::Failed(reason) => write!(fmt, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkEntry {
    pub link_path: PathBuf,

    /// Absolute, canonical target of the link if it is a symlink.
    pub resolved: Option<PathBuf>,

    pub action: UnlinkAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlinkReport {
    pub dry_run: bool,
    pub entries: Vec<UnlinkEntry>,
    pub failures: Vec<Failure>,
}

impl UnlinkReport {
    /// Names of links that were, or would have been, removed.
    pub fn unlinked(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| {
                matches!(
                    entry.action,
                    UnlinkAction::Unlinked | UnlinkAction::WouldUnlink
                )
            })
            .filter_map(|entry| entry.link_path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

/// Manage `td-` symlinks between a library root and a binary directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkManager;

impl SymlinkManager {
    pub fn new() -> Self {
        Self
    }

    /// Link every executable of library root into binary directory.
    ///
    /// The `templates` subtree of the library root is pruned from the walk.
    /// An existing entry at a link path is replaced unless it is a directory.
    ///
    /// # Errors
    ///
    /// - Return [`LinkError::CreateBinDir`] if binary directory cannot be
    ///   created.
    #[instrument(skip(self, library_root, bin_dir), level = "debug")]
    pub fn link(
        &self,
        library_root: impl AsRef<Path>,
        bin_dir: impl AsRef<Path>,
        dry_run: bool,
    ) -> Result<LinkReport> {
        let (library_root, bin_dir) = (library_root.as_ref(), bin_dir.as_ref());
        let mut report = LinkReport {
            dry_run,
            ..Default::default()
        };

        if !dry_run {
            fs::create_dir_all(bin_dir).map_err(|err| LinkError::CreateBinDir {
                source: err,
                path: bin_dir.to_path_buf(),
            })?;
        }

        if !library_root.is_dir() {
            warn!("library root {:?} does not exist, nothing to link", library_root.display());
            return Ok(report);
        }

        let walker = WalkDir::new(library_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() == 1
                    && entry.file_type().is_dir()
                    && entry.file_name() == TEMPLATES_DIR)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(library_root).to_path_buf();
                    error!("cannot read {:?}: {err}", path.display());
                    report.failures.push(Failure {
                        path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_executable(entry.path()) {
                continue;
            }

            let Some(stem) = entry.path().file_stem() else {
                continue;
            };
            let stem = stem.to_string_lossy();
            let link = SymlinkEntry {
                link_path: bin_dir.join(format!("{LINK_PREFIX}{stem}")),
                target: relative_path(bin_dir, entry.path()),
            };

            let action = if stem.starts_with('_') || stem.starts_with('.') {
                LinkAction::Private
            } else if dry_run {
                LinkAction::WouldLink
            } else {
                match replace_link(&link) {
                    Ok(()) => LinkAction::Linked,
                    Err(err) => LinkAction::Failed(err.to_string()),
                }
            };

            match &action {
                LinkAction::Failed(_) => error!("{:?} {action}", link.link_path.display()),
                _ => info!(
                    "{action} {:?} -> {:?}",
                    link.link_path.display(),
                    link.target.display()
                ),
            }

            report.entries.push(LinkEntry {
                source: entry.path().to_path_buf(),
                link,
                action,
            });
        }

        Ok(report)
    }

    /// Remove every `td-` symlink of binary directory that resolves into
    /// library root.
    ///
    /// # Errors
    ///
    /// - Return [`LinkError::Pattern`] if binary directory cannot be turned
    ///   into a glob pattern.
    #[instrument(skip(self, library_root, bin_dir), level = "debug")]
    pub fn unlink(
        &self,
        library_root: impl AsRef<Path>,
        bin_dir: impl AsRef<Path>,
        dry_run: bool,
    ) -> Result<UnlinkReport> {
        let (library_root, bin_dir) = (library_root.as_ref(), bin_dir.as_ref());
        let mut report = UnlinkReport {
            dry_run,
            ..Default::default()
        };

        let owner = canonical_or_lexical(library_root);
        let pattern = format!(
            "{}/{LINK_PREFIX}*",
            glob::Pattern::escape(bin_dir.to_string_lossy().as_ref())
        );

        for path in glob::glob(&pattern)? {
            let link_path = match path {
                Ok(path) => path,
                Err(err) => {
                    error!("cannot read {:?}: {err}", err.path().display());
                    report.failures.push(Failure {
                        path: err.path().to_path_buf(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let (resolved, action) = match resolve_link(&link_path, bin_dir) {
                Ok(None) => (None, UnlinkAction::NotSymlink),
                Ok(Some(resolved)) if !resolved.starts_with(&owner) => {
                    (Some(resolved), UnlinkAction::Foreign)
                }
                Ok(Some(resolved)) if dry_run => (Some(resolved), UnlinkAction::WouldUnlink),
                Ok(Some(resolved)) => match fs::remove_file(&link_path) {
                    Ok(()) => (Some(resolved), UnlinkAction::Unlinked),
                    Err(err) => (Some(resolved), UnlinkAction::Failed(err.to_string())),
                },
                Err(err) => (None, UnlinkAction::Failed(err.to_string())),
            };

            match &action {
                UnlinkAction::Failed(_) => error!("{:?} {action}", link_path.display()),
                UnlinkAction::Foreign => warn!(
                    "{action} {:?} -> {:?}",
                    link_path.display(),
                    resolved.as_deref().unwrap_or(Path::new("?")).display()
                ),
                _ => info!("{action} {:?}", link_path.display()),
            }

            report.entries.push(UnlinkEntry {
                link_path,
                resolved,
                action,
            });
        }

        Ok(report)
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn replace_link(link: &SymlinkEntry) -> std::io::Result<()> {
    match fs::symlink_metadata(&link.link_path) {
        Ok(metadata) if metadata.is_dir() => {
            return Err(std::io::Error::other("a directory is in the way"));
        }
        Ok(_) => fs::remove_file(&link.link_path)?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    symlink(&link.target, &link.link_path)
}

/// Resolve link to absolute canonical target, or `None` if it is no symlink.
fn resolve_link(link_path: &Path, bin_dir: &Path) -> std::io::Result<Option<PathBuf>> {
    if !fs::symlink_metadata(link_path)?.file_type().is_symlink() {
        return Ok(None);
    }

    let target = fs::read_link(link_path)?;
    let absolute = if target.is_absolute() {
        target
    } else {
        bin_dir.join(target)
    };

    Ok(Some(canonical_or_lexical(absolute)))
}

/// Symlink management error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Binary directory cannot be created.
    #[error("failed to create binary directory {:?}", path.display())]
    CreateBinDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Binary directory cannot be expressed as glob pattern.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;
