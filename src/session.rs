// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment session orchestration.
//!
//! A session is one invocation of the deployer. It moves through a fixed
//! sequence of states:
//!
//! 1. __Check privilege__: the mutating phase needs elevated privileges, so
//!    their absence is fatal before any question is asked.
//! 2. __Collect parameters__: workspace root, target root, and whether to
//!    manage executable symlinks. Values come from flags, from the state of
//!    the last confirmed run, or from prompts.
//! 3. __Confirm__: a summary is shown followed by Continue/Redo/Quit. Redo
//!    starts collection over with the previous answers as defaults.
//! 4. __Persist__: the confirmed parameters become the new last-run state.
//! 5. __Deploy or undeploy__, then __link or unlink__ if requested.
//!
//! Every Continue/Redo/Quit loop is bounded by [`MAX_ROUNDS`]. Running out of
//! rounds is treated like Quit.

use crate::{
    deploy::{DeployEngine, DeployError, DeployReport, UndeployEngine, UndeployReport},
    link::{LinkError, LinkReport, SymlinkManager, UnlinkReport},
    path::{self, bin_dir, library_root},
    permission::PermissionTable,
    prompt::{Choice, PromptError, Prompter},
    store::{
        self, StateStore, LAST_DEPLOY_LINK_EXES, LAST_DEPLOY_RUN, LAST_DEPLOY_SOURCE,
        LAST_DEPLOY_TARGET,
    },
};

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Upper bound of Continue/Redo/Quit rounds before a session gives up.
pub const MAX_ROUNDS: usize = 8;

/// Subtrees at least one of which a workspace root is expected to hold.
const WORKSPACE_MARKERS: [&str; 2] = ["etc", "usr"];

/// Direction of a session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Deploy,
    Undeploy,
}

/// Options a session starts from, usually parsed from the command line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub direction: Direction,
    pub source: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub dry_run: bool,
}

/// Confirmed parameters of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub source: PathBuf,
    pub target: PathBuf,
    pub link_exes: bool,
}

/// What a completed session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Deployed {
        deploy: DeployReport,
        link: Option<LinkReport>,
    },
    Undeployed {
        unlink: Option<UnlinkReport>,
        undeploy: UndeployReport,
    },
}

/// Report of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub parameters: Parameters,
    pub outcome: Outcome,
}

/// Parameters collected so far in a round.
#[derive(Debug, Default, Clone)]
struct Draft {
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    link_exes: Option<bool>,
}

/// Defaults offered by prompts.
#[derive(Debug, Default, Clone)]
struct Defaults {
    source: Option<String>,
    target: Option<String>,
    link_exes: bool,
}

/// One invocation of the deployer.
pub struct DeploymentSession<P, S>
where
    P: Prompter,
    S: StateStore,
{
    options: SessionOptions,
    table: PermissionTable,
    prompter: P,
    state: S,
    elevated: bool,
}

impl<P, S> DeploymentSession<P, S>
where
    P: Prompter,
    S: StateStore,
{
    /// Construct new session.
    ///
    /// Elevation is taken from the effective user of the current process.
    pub fn new(options: SessionOptions, table: PermissionTable, prompter: P, state: S) -> Self {
        Self {
            options,
            table,
            prompter,
            state,
            elevated: is_elevated(),
        }
    }

    /// Override whether the session counts as running elevated.
    pub fn with_elevation(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// State store of the session.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Run session to completion.
    ///
    /// # Errors
    ///
    /// - Return [`SessionError::NotElevated`] if not running elevated.
    /// - Return [`SessionError::Aborted`] if the user quits at any point.
    /// - Return [`SessionError::MissingSource`] if the confirmed workspace
    ///   root is not a directory.
    /// - Return [`SessionError::NothingProcessed`] if the workspace holds no
    ///   eligible file.
    /// - Return any fatal error of the underlying engines or state store.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&mut self) -> Result<SessionReport> {
        if !self.elevated {
            return Err(SessionError::NotElevated);
        }

        let parameters = self.collect_and_confirm()?;

        // INVARIANT: A missing workspace aborts before state or target is touched.
        if !parameters.source.is_dir() {
            return Err(SessionError::MissingSource {
                path: parameters.source,
            });
        }

        if self.options.dry_run {
            info!("dry run, last deploy state left untouched");
        } else {
            self.persist(&parameters)?;
        }

        let outcome = match self.options.direction {
            Direction::Deploy => self.deploy(&parameters)?,
            Direction::Undeploy => self.undeploy(&parameters)?,
        };

        Ok(SessionReport {
            parameters,
            outcome,
        })
    }

    fn collect_and_confirm(&mut self) -> Result<Parameters> {
        let mut draft = Draft {
            source: self.options.source.clone(),
            target: self.options.target.clone(),
            link_exes: self.state.get(LAST_DEPLOY_LINK_EXES).and_then(parse_bool),
        };
        let mut defaults = Defaults {
            source: self.state.get(LAST_DEPLOY_SOURCE).map(str::to_owned),
            target: self.state.get(LAST_DEPLOY_TARGET).map(str::to_owned),
            link_exes: true,
        };

        for _ in 0..MAX_ROUNDS {
            let parameters = self.collect(draft, &defaults)?;
            self.summarize(&parameters);

            match self.prompter.choose("Proceed with these settings?")? {
                Choice::Continue => return Ok(parameters),
                Choice::Redo => {
                    defaults = Defaults {
                        source: Some(parameters.source.display().to_string()),
                        target: Some(parameters.target.display().to_string()),
                        link_exes: parameters.link_exes,
                    };
                    draft = Draft::default();
                }
                Choice::Quit => return Err(SessionError::Aborted),
            }
        }

        warn!("no decision after {MAX_ROUNDS} rounds");
        Err(SessionError::Aborted)
    }

    fn collect(&mut self, draft: Draft, defaults: &Defaults) -> Result<Parameters> {
        let source = match draft.source {
            Some(source) => source,
            None => self.ask_source(defaults.source.as_deref())?,
        };

        let target = match draft.target {
            Some(target) => target,
            None => self.ask_path("Target root", defaults.target.as_deref().or(Some("/")))?,
        };

        let link_exes = match draft.link_exes {
            Some(link_exes) => link_exes,
            None => self.prompter.confirm(
                "Create or remove td- symlinks for framework executables?",
                defaults.link_exes,
            )?,
        };

        Ok(Parameters {
            source,
            target,
            link_exes,
        })
    }

    fn ask_source(&mut self, default: Option<&str>) -> Result<PathBuf> {
        let mut default = default.map(str::to_owned);
        for _ in 0..MAX_ROUNDS {
            let source = self.ask_path("Workspace root", default.as_deref())?;
            if is_workspace(&source) {
                return Ok(source);
            }

            warn!(
                "{:?} contains neither etc/ nor usr/, this does not look like a workspace",
                source.display()
            );
            match self.prompter.choose("Use it anyway?")? {
                Choice::Continue => return Ok(source),
                Choice::Redo => default = None,
                Choice::Quit => return Err(SessionError::Aborted),
            }
        }

        Err(SessionError::Aborted)
    }

    fn ask_path(&mut self, message: &str, default: Option<&str>) -> Result<PathBuf> {
        for _ in 0..MAX_ROUNDS {
            let answer = self.prompter.text(message, default)?;
            if answer.trim().is_empty() {
                warn!("an answer is required");
                continue;
            }

            return Ok(path::expand(answer.trim())?);
        }

        Err(SessionError::Aborted)
    }

    fn summarize(&self, parameters: &Parameters) {
        let direction = match self.options.direction {
            Direction::Deploy => "deploy",
            Direction::Undeploy => "undeploy",
        };
        info!("mode:      {direction}");
        info!("source:    {}", parameters.source.display());
        info!("target:    {}", parameters.target.display());
        info!("link exes: {}", parameters.link_exes);
        info!("dry run:   {}", self.options.dry_run);
    }

    fn persist(&mut self, parameters: &Parameters) -> Result<()> {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.state.set(LAST_DEPLOY_RUN, &now)?;
        self.state
            .set(LAST_DEPLOY_SOURCE, &parameters.source.display().to_string())?;
        self.state
            .set(LAST_DEPLOY_TARGET, &parameters.target.display().to_string())?;
        self.state
            .set(LAST_DEPLOY_LINK_EXES, &parameters.link_exes.to_string())?;
        self.state.persist()?;

        Ok(())
    }

    fn deploy(&self, parameters: &Parameters) -> Result<Outcome> {
        let dry_run = self.options.dry_run;
        let deploy = DeployEngine::new(&self.table).run(
            &parameters.source,
            &parameters.target,
            dry_run,
        )?;
        info!(
            "{} installed, {} up-to-date, {} failed, {} ignored",
            deploy.installed().len(),
            deploy.up_to_date().len(),
            deploy.failed().len() + deploy.failures.len(),
            deploy.ignored.len()
        );

        if !deploy.is_success() {
            return Err(SessionError::NothingProcessed {
                path: parameters.source.clone(),
            });
        }

        let link = if parameters.link_exes {
            let report = SymlinkManager::new().link(
                library_root(&parameters.target),
                bin_dir(&parameters.target),
                dry_run,
            )?;
            info!("{} executables linked", report.linked().len());
            Some(report)
        } else {
            None
        };

        Ok(Outcome::Deployed { deploy, link })
    }

    fn undeploy(&self, parameters: &Parameters) -> Result<Outcome> {
        let dry_run = self.options.dry_run;

        // INVARIANT: Unlink before undeploy, ownership checks need the library files.
        let unlink = if parameters.link_exes {
            let report = SymlinkManager::new().unlink(
                library_root(&parameters.target),
                bin_dir(&parameters.target),
                dry_run,
            )?;
            info!("{} executables unlinked", report.unlinked().len());
            Some(report)
        } else {
            None
        };

        let undeploy = UndeployEngine::new().run(&parameters.source, &parameters.target, dry_run)?;
        info!("{} removed", undeploy.removed().len());

        if !undeploy.is_success() {
            return Err(SessionError::NothingProcessed {
                path: parameters.source.clone(),
            });
        }

        Ok(Outcome::Undeployed { unlink, undeploy })
    }
}

/// Check if current process runs with elevated privileges.
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Check if path looks like a workspace root.
pub fn is_workspace(path: impl AsRef<Path>) -> bool {
    WORKSPACE_MARKERS
        .iter()
        .any(|marker| path.as_ref().join(marker).is_dir())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Session error types.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Process lacks elevated privileges.
    #[error("elevated privileges are required, run again as root")]
    NotElevated,

    /// User chose to quit.
    #[error("aborted by user")]
    Aborted,

    /// Confirmed workspace root does not exist or is not a directory.
    #[error("workspace root {:?} does not exist or is not a directory", path.display())]
    MissingSource { path: PathBuf },

    /// Workspace holds no eligible file.
    #[error("no eligible files found in workspace {:?}", path.display())]
    NothingProcessed { path: PathBuf },

    /// Terminal interaction failed.
    #[error(transparent)]
    Prompt(PromptError),

    /// User supplied path cannot be resolved.
    #[error(transparent)]
    Path(#[from] path::Error),

    /// Deployment logic fails.
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// Symlink management fails.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Persisted state cannot be read or written.
    #[error(transparent)]
    Store(#[from] store::Error),
}

impl From<PromptError> for SessionError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Cancelled => Self::Aborted,
            err => Self::Prompt(err),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
