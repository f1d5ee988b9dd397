// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted session state.
//!
//! The deployer remembers the parameters of its last confirmed run, and
//! offers them as defaults on the next one. State is kept as plain
//! `KEY=VALUE` lines in a single file.
//!
//! # State File Layout
//!
//! Each line holds one key and its value. Keys must match
//! `[A-Za-z_][A-Za-z0-9_]*`. Everything after the first `=` is the value,
//! stored literally without quoting or escaping. Blank lines and lines that
//! start with `#` are ignored.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, warn};

/// Key of last confirmed run's timestamp.
pub const LAST_DEPLOY_RUN: &str = "last_deploy_run";

/// Key of last confirmed run's workspace root.
pub const LAST_DEPLOY_SOURCE: &str = "last_deploy_source";

/// Key of last confirmed run's target root.
pub const LAST_DEPLOY_TARGET: &str = "last_deploy_target";

/// Key of last confirmed run's link-exes choice.
pub const LAST_DEPLOY_LINK_EXES: &str = "last_deploy_link_exes";

/// Get and set persisted string key-value pairs.
pub trait StateStore {
    /// Get value of key, if any.
    fn get(&self, key: &str) -> Option<&str>;

    /// Set value of key.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Write pending changes out.
    fn persist(&self) -> Result<()>;
}

/// Key-value pairs of a state file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StateEntries {
    entries: BTreeMap<String, String>,
}

impl StateEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert value under key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// - Return [`Error::InvalidKey`] if key is not a valid identifier.
    /// - Return [`Error::InvalidValue`] if value spans more than one line.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        if !is_valid_key(&key) {
            return Err(Error::InvalidKey(key));
        }

        // INVARIANT: One entry per line, values are stored without escaping.
        if value.contains(['\n', '\r']) {
            return Err(Error::InvalidValue { key, value });
        }

        self.entries.insert(key, value);
        Ok(())
    }
}

impl FromStr for StateEntries {
    type Err = Error;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut entries = BTreeMap::new();
        for line in data.lines() {
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) if is_valid_key(key) => {
                    entries.insert(key.to_string(), value.to_string());
                }
                _ => warn!("ignore malformed state line {line:?}"),
            }
        }

        Ok(Self { entries })
    }
}

impl Display for StateEntries {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (key, value) in &self.entries {
            writeln!(fmt, "{key}={value}")?;
        }

        Ok(())
    }
}

/// State store backed by a `KEY=VALUE` file.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
    entries: StateEntries,
}

impl StateFile {
    /// Open state file at target path.
    ///
    /// A missing file is treated as empty state. It is only created once
    /// state gets persisted.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if state file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => content.parse()?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no state file at {:?} yet", path.display());
                StateEntries::new()
            }
            Err(err) => {
                return Err(Error::Read {
                    source: err,
                    path,
                })
            }
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for StateFile {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key, value)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::Write {
                source: err,
                path: self.path.clone(),
            })?;
        }

        fs::write(&self.path, self.entries.to_string()).map_err(|err| Error::Write {
            source: err,
            path: self.path.clone(),
        })
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// State store error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key is not a valid identifier.
    #[error("invalid state key {0:?}")]
    InvalidKey(String),

    /// Value contains a line break.
    #[error("value {value:?} of state key {key:?} contains a line break")]
    InvalidValue { key: String, value: String },

    /// State file cannot be read.
    #[error("failed to read state file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file cannot be written.
    #[error("failed to write state file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
