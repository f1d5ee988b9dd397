// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use td_deploy::{
    path::{default_state_file, expand},
    prompt::InquirePrompter,
    store::StateFile,
    DeploymentSession, Direction, PermissionTable, SessionOptions,
};

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs, path::PathBuf, process::exit};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Deploy a testadura workspace onto a live file system.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "deploy-workspace",
    about,
    override_usage = "deploy-workspace [options] [args]...",
    version
)]
struct Cli {
    /// Remove deployed files and symlinks instead of deploying them.
    #[arg(short, long)]
    pub undeploy: bool,

    /// Workspace root to deploy from.
    #[arg(short, long, value_name = "dir")]
    pub source: Option<String>,

    /// Target root to deploy into.
    #[arg(short, long, value_name = "dir")]
    pub target: Option<String>,

    /// Report every action without touching the file system.
    #[arg(short, long = "dryrun", visible_alias = "dry-run")]
    pub dry_run: bool,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Permission rule table to use instead of the built-in one.
    #[arg(long, value_name = "file")]
    pub rules: Option<PathBuf>,

    /// State file to remember the last run in.
    #[arg(long, value_name = "file")]
    pub state_file: Option<PathBuf>,

    /// Extra arguments, currently unused.
    #[arg(value_name = "args")]
    pub args: Vec<String>,
}

impl Cli {
    fn run(self) -> Result<()> {
        if !self.args.is_empty() {
            debug!("ignore positional arguments {:?}", self.args);
        }

        let table = match &self.rules {
            Some(path) => {
                let data = fs::read_to_string(path)
                    .with_context(|| format!("failed to read rule table {:?}", path.display()))?;
                PermissionTable::parse(&data)?
            }
            None => PermissionTable::default(),
        };

        let state_path = match self.state_file {
            Some(path) => path,
            None => default_state_file()?,
        };
        let state = StateFile::open(state_path)?;

        let options = SessionOptions {
            direction: if self.undeploy {
                Direction::Undeploy
            } else {
                Direction::Deploy
            },
            source: self.source.map(expand).transpose()?,
            target: self.target.map(expand).transpose()?,
            dry_run: self.dry_run,
        };

        DeploymentSession::new(options, table, InquirePrompter::new(), state).run()?;

        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}
