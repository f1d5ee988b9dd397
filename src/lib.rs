// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace deployment for the testadura shell framework.
//!
//! A __workspace__ is a staging tree that mirrors the live file system, e.g.,
//! `etc/`, `usr/local/bin/`, `usr/local/lib/testadura/`. Deploying a
//! workspace copies its eligible files onto a target root with modes taken
//! from a longest-prefix permission table, installing only what is missing or
//! out of date. Executables of the deployed framework library can be exposed
//! through `td-` prefixed symlinks in the shared binary directory.
//! Undeploying removes the same files and symlinks again.
//!
//! # See Also
//!
//! 1. [`session`] for the interactive flow of one invocation.
//! 2. [`deploy`] for the deploy and undeploy engines.
//! 3. [`permission`] for mode resolution.

pub mod config;
pub mod deploy;
pub mod filter;
pub mod link;
pub mod path;
pub mod permission;
pub mod prompt;
pub mod session;
pub mod store;

pub use deploy::{DeployEngine, DeployReport, UndeployEngine, UndeployReport};
pub use link::{LinkReport, SymlinkManager, UnlinkReport};
pub use permission::{NodeKind, PermissionTable};
pub use session::{DeploymentSession, Direction, SessionOptions};
