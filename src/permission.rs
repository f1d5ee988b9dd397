// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Permission mode resolution.
//!
//! Every deployed file, and the directory that holds it, gets its mode from
//! a static table of path prefix rules. The table is consulted with the
//! destination path as seen from the live filesystem root, e.g.
//! `/etc/testadura/app.cfg`, regardless of the target root the workspace is
//! actually deployed into.
//!
//! # Longest-Prefix Match
//!
//! Several rules can match one path. The rule with the longest prefix wins,
//! which lets a narrow subtree like `/usr/local/lib/testadura/common/tools`
//! override the broader `/usr/local/lib/testadura` rule. When two matching
//! prefixes have the same length, the rule defined first wins.

use crate::config::{ConfigError, PermissionRule, RuleTable};

use std::path::Path;

/// File mode used when no rule matches.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Directory mode used when no rule matches.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

const DEFAULT_RULES: &[(&str, u32, u32, &str)] = &[
    ("/usr/local/bin", 0o755, 0o755, "user executables"),
    ("/usr/local/sbin", 0o755, 0o755, "administrative executables"),
    ("/etc/update-motd.d", 0o755, 0o755, "message-of-the-day scripts"),
    ("/usr/local/lib/testadura", 0o644, 0o755, "framework library"),
    ("/usr/local/lib/testadura/common/tools", 0o755, 0o755, "framework tools"),
    ("/etc/testadura", 0o640, 0o750, "framework configuration"),
    ("/var/lib/testadura", 0o600, 0o700, "framework state"),
];

/// Kind of file system node a mode is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// Read-only longest-prefix rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    rules: Vec<PermissionRule>,
}

impl PermissionTable {
    /// Construct new table from an ordered listing of rules.
    pub fn new(rules: impl IntoIterator<Item = PermissionRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Load table from rule table file contents.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if the rule table fails to parse or validate.
    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        let table: RuleTable = data.parse()?;
        Ok(Self::new(table.rules))
    }

    /// Listing of rules in definition order.
    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    /// Find the most specific rule for target absolute path.
    pub fn lookup(&self, path: &str) -> Option<&PermissionRule> {
        let mut best: Option<&PermissionRule> = None;
        for rule in self.rules.iter().filter(|rule| rule.matches(path)) {
            // INVARIANT: Only a strictly longer prefix replaces, so first defined wins ties.
            if best.is_none_or(|current| rule.prefix.len() > current.prefix.len()) {
                best = Some(rule);
            }
        }

        best
    }

    /// Resolve mode for target absolute path.
    pub fn resolve(&self, path: &str, kind: NodeKind) -> u32 {
        match (self.lookup(path), kind) {
            (Some(rule), NodeKind::File) => rule.file_mode.bits(),
            (Some(rule), NodeKind::Directory) => rule.dir_mode.bits(),
            (None, NodeKind::File) => DEFAULT_FILE_MODE,
            (None, NodeKind::Directory) => DEFAULT_DIR_MODE,
        }
    }

    /// Resolve mode for a path relative to the live file system root.
    pub fn resolve_relative(&self, relative: impl AsRef<Path>, kind: NodeKind) -> u32 {
        let absolute = Path::new("/").join(relative.as_ref());
        self.resolve(absolute.to_string_lossy().as_ref(), kind)
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_RULES
                .iter()
                .map(|(prefix, file, dir, description)| {
                    PermissionRule::new(*prefix, *file, *dir, *description)
                }),
        )
    }
}
