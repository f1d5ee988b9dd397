// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the permission rule table file to simplify the
//! process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! A rule table is a list of `[[rule]]` entries. Each entry names an absolute
//! path prefix, the octal mode for files and for directories beneath it, and
//! a short description:
//!
//! ```toml
//! [[rule]]
//! prefix = "/etc/testadura"
//! file_mode = "640"
//! dir_mode = "750"
//! description = "framework configuration"
//! ```
//!
//! Entries are validated when the table is parsed, so a loaded table never
//! carries a malformed mode or a relative prefix.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Permission rule table layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RuleTable {
    /// Ordered listing of permission rules.
    #[serde(rename = "rule", default)]
    pub rules: Vec<PermissionRule>,
}

impl FromStr for RuleTable {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut table: RuleTable = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Prefixes are absolute, carry no trailing slash, and are unique.
        let mut seen = HashSet::new();
        for rule in &mut table.rules {
            if !rule.prefix.starts_with('/') {
                return Err(ConfigError::RelativePrefix(rule.prefix.clone()));
            }

            let trimmed = rule.prefix.trim_end_matches('/');
            rule.prefix = if trimmed.is_empty() { "/".into() } else { trimmed.into() };

            if !seen.insert(rule.prefix.clone()) {
                return Err(ConfigError::DuplicatePrefix(rule.prefix.clone()));
            }
        }

        Ok(table)
    }
}

impl Display for RuleTable {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Single permission rule.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PermissionRule {
    /// Absolute path prefix the rule applies to.
    pub prefix: String,

    /// Mode for files at or beneath the prefix.
    pub file_mode: Mode,

    /// Mode for directories at or beneath the prefix.
    pub dir_mode: Mode,

    /// Brief description of what lives under the prefix.
    #[serde(default)]
    pub description: String,
}

impl PermissionRule {
    /// Construct new permission rule.
    pub fn new(
        prefix: impl Into<String>,
        file_mode: u32,
        dir_mode: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            file_mode: Mode(file_mode),
            dir_mode: Mode(dir_mode),
            description: description.into(),
        }
    }

    /// Check if rule applies to target absolute path.
    ///
    /// A rule applies when the path equals its prefix, or continues it with a
    /// path separator. The root prefix applies to every absolute path.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }

        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Unix permission bits, written as an octal string in configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mode(u32);

impl Mode {
    /// Construct new mode from raw permission bits.
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw permission bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let bits = u32::from_str_radix(data.trim(), 8)
            .map_err(|_| ConfigError::InvalidMode(data.into()))?;
        if bits > 0o7777 {
            return Err(ConfigError::InvalidMode(data.into()));
        }

        Ok(Self(bits))
    }
}

impl TryFrom<String> for Mode {
    type Error = ConfigError;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        data.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

impl Display for Mode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{:o}", self.0)
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Mode is not an octal number within permission range.
    #[error("invalid octal mode {0:?}")]
    InvalidMode(String),

    /// Rule prefix is not an absolute path.
    #[error("rule prefix {0:?} is not absolute")]
    RelativePrefix(String),

    /// Two rules share the same prefix.
    #[error("rule prefix {0:?} defined more than once")]
    DuplicatePrefix(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}
