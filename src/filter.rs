// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment eligibility.
//!
//! Keeps drafts, backups, private files and bare top-level scratch files in
//! the workspace out of a production deployment without a separate ignore
//! file. Deploy and undeploy consult the same predicate, so undeploy never
//! removes something deploy would not have installed.

use std::path::{Component, Path};

/// Check if a path relative to the source root may be deployed.
///
/// A path is excluded when:
///
/// - It has no directory component, i.e., it is a top-level file.
/// - Any of its segments start with `.` (hidden) or `_` (private).
/// - Its base name ends with `.old` (backup).
pub fn is_eligible(relative: impl AsRef<Path>) -> bool {
    let relative = relative.as_ref();
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy()),
            // INVARIANT: Only plain relative paths can be eligible.
            _ => return false,
        }
    }

    let Some(basename) = segments.last() else {
        return false;
    };

    if segments.len() < 2 || basename.ends_with(".old") {
        return false;
    }

    !segments
        .iter()
        .any(|segment| segment.starts_with('.') || segment.starts_with('_'))
}
