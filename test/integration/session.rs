// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{Answer, ScriptedPrompter, TreeFixture};

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use td_deploy::{
    session::{Outcome, SessionError},
    store::{
        StateFile, StateStore, LAST_DEPLOY_LINK_EXES, LAST_DEPLOY_RUN, LAST_DEPLOY_SOURCE,
        LAST_DEPLOY_TARGET,
    },
    DeploymentSession, Direction, PermissionTable, SessionOptions,
};

fn workspace() -> Result<TreeFixture> {
    let workspace = TreeFixture::new()?;
    workspace.write("etc/testadura/app.cfg", "key=value\n")?;
    workspace.write("usr/local/lib/testadura/common/core.sh", "core() { :; }\n")?;
    workspace.write("usr/local/lib/testadura/common/tools/deploy-workspace.sh", "#!/bin/sh\n")?;
    Ok(workspace)
}

fn text(answer: &str) -> Answer {
    Answer::Text(answer.into())
}

fn choose(answer: &str) -> Answer {
    Answer::Choose(answer.into())
}

fn options(direction: Direction, source: Option<&Path>, target: Option<&Path>) -> SessionOptions {
    SessionOptions {
        direction,
        source: source.map(Path::to_path_buf),
        target: target.map(Path::to_path_buf),
        dry_run: false,
    }
}

fn state_with(path: &Path, pairs: &[(&str, &str)]) -> Result<StateFile> {
    let mut state = StateFile::open(path)?;
    for (key, value) in pairs {
        state.set(key, value)?;
    }
    state.persist()?;
    Ok(StateFile::open(path)?)
}

#[test]
fn missing_privilege_fails_before_any_prompt() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state = StateFile::open(target.path().join("state"))?;
    let mut prompter = ScriptedPrompter::default();

    let result = DeploymentSession::new(
        options(Direction::Deploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(false)
    .run();

    assert!(matches!(result, Err(SessionError::NotElevated)));
    assert!(prompter.asked.is_empty());
    assert_eq!(target.snapshot()?.len(), 1);

    Ok(())
}

#[test]
fn deploy_with_flags_links_and_persists() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state_dir = TreeFixture::new()?;
    let state_path = state_dir.path().join("deploy-workspace.state");
    let state = state_with(&state_path, &[(LAST_DEPLOY_LINK_EXES, "true")])?;
    let mut prompter = ScriptedPrompter::new([choose("c")]);

    let report = DeploymentSession::new(
        options(Direction::Deploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run()?;

    assert_eq!(prompter.asked, vec!["Proceed with these settings?".to_string()]);
    match &report.outcome {
        Outcome::Deployed { deploy, link } => {
            assert_eq!(deploy.installed().len(), 3);
            let linked = link.as_ref().map(|link| link.linked()).unwrap_or_default();
            assert_eq!(linked, vec!["td-deploy-workspace".to_string()]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(target.path().join("usr/local/bin/td-deploy-workspace").exists());

    let state = StateFile::open(&state_path)?;
    let source_text = source.path().display().to_string();
    let target_text = target.path().display().to_string();
    assert_eq!(state.get(LAST_DEPLOY_SOURCE), Some(source_text.as_str()));
    assert_eq!(state.get(LAST_DEPLOY_TARGET), Some(target_text.as_str()));
    assert_eq!(state.get(LAST_DEPLOY_LINK_EXES), Some("true"));
    assert!(state.get(LAST_DEPLOY_RUN).is_some());

    Ok(())
}

#[test]
fn quit_at_confirmation_aborts_without_state() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state_path = target.path().join("state");
    let state = StateFile::open(&state_path)?;
    let mut prompter = ScriptedPrompter::new([Answer::Confirm(false), choose("q")]);

    let result = DeploymentSession::new(
        options(Direction::Deploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run();

    assert!(matches!(result, Err(SessionError::Aborted)));
    assert!(!state_path.exists());
    assert_eq!(target.snapshot()?.len(), 1);

    Ok(())
}

#[test]
fn unexpected_response_counts_as_quit() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state = StateFile::open(target.path().join("state"))?;
    let mut prompter = ScriptedPrompter::new([Answer::Confirm(true), choose("sure, why not")]);

    let result = DeploymentSession::new(
        options(Direction::Deploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run();

    assert!(matches!(result, Err(SessionError::Aborted)));
    assert!(!target.path().join("etc").exists());

    Ok(())
}

#[test]
fn questionable_source_can_be_redone() -> Result<()> {
    let source = workspace()?;
    let bogus = TreeFixture::new()?;
    bogus.write("notes/todo.txt", "not a workspace\n")?;
    let target = TreeFixture::new()?;
    let state = StateFile::open(target.path().join("state"))?;
    let mut prompter = ScriptedPrompter::new([
        text(&bogus.path().display().to_string()),
        choose("r"),
        text(&source.path().display().to_string()),
        Answer::Confirm(false),
        choose("continue"),
    ]);

    let report = DeploymentSession::new(
        options(Direction::Deploy, None, Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run()?;

    assert_eq!(report.parameters.source, source.path().to_path_buf());
    assert!(!report.parameters.link_exes);
    assert_eq!(
        prompter.asked,
        vec![
            "Workspace root".to_string(),
            "Use it anyway?".to_string(),
            "Workspace root".to_string(),
            "Create or remove td- symlinks for framework executables?".to_string(),
            "Proceed with these settings?".to_string(),
        ]
    );
    assert!(target.path().join("etc/testadura/app.cfg").is_file());
    assert!(!target.path().join("usr/local/bin").exists());

    Ok(())
}

#[test]
fn questionable_source_quit_aborts() -> Result<()> {
    let bogus = TreeFixture::new()?;
    let target = TreeFixture::new()?;
    let state_path = target.path().join("state");
    let state = StateFile::open(&state_path)?;
    let mut prompter =
        ScriptedPrompter::new([text(&bogus.path().display().to_string()), choose("q")]);

    let result = DeploymentSession::new(
        options(Direction::Deploy, None, Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run();

    assert!(matches!(result, Err(SessionError::Aborted)));
    assert!(!state_path.exists());

    Ok(())
}

#[test]
fn persisted_state_supplies_defaults() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state_dir = TreeFixture::new()?;
    let source_text = source.path().display().to_string();
    let target_text = target.path().display().to_string();
    let state = state_with(
        &state_dir.path().join("state"),
        &[
            (LAST_DEPLOY_SOURCE, source_text.as_str()),
            (LAST_DEPLOY_TARGET, target_text.as_str()),
            (LAST_DEPLOY_LINK_EXES, "false"),
        ],
    )?;
    let mut prompter = ScriptedPrompter::new([text(""), text(""), choose("c")]);

    let report = DeploymentSession::new(
        options(Direction::Deploy, None, None),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run()?;

    assert_eq!(report.parameters.source, source.path().to_path_buf());
    assert_eq!(report.parameters.target, target.path().to_path_buf());
    assert!(!report.parameters.link_exes);

    Ok(())
}

#[test]
fn redo_at_confirmation_asks_everything_again() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let other_target = TreeFixture::new()?;
    let state = StateFile::open(target.path().join("state"))?;
    let mut prompter = ScriptedPrompter::new([
        Answer::Confirm(true),
        choose("r"),
        text(""),
        text(&other_target.path().display().to_string()),
        Answer::Confirm(false),
        choose("c"),
    ]);

    let report = DeploymentSession::new(
        options(Direction::Deploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run()?;

    assert_eq!(report.parameters.source, source.path().to_path_buf());
    assert_eq!(report.parameters.target, other_target.path().to_path_buf());
    assert!(!report.parameters.link_exes);
    assert!(other_target.path().join("etc/testadura/app.cfg").is_file());
    assert!(!target.path().join("etc").exists());

    Ok(())
}

#[test]
fn endless_redo_gives_up() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state = StateFile::open(target.path().join("state"))?;
    let mut answers = vec![Answer::Confirm(true)];
    for _ in 0..td_deploy::session::MAX_ROUNDS {
        answers.extend([choose("r"), text(""), text(""), Answer::Confirm(true)]);
    }
    let mut prompter = ScriptedPrompter::new(answers);

    let result = DeploymentSession::new(
        options(Direction::Deploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        state,
    )
    .with_elevation(true)
    .run();

    assert!(matches!(result, Err(SessionError::Aborted)));
    assert!(!target.path().join("etc").exists());

    Ok(())
}

#[test]
fn dry_run_neither_persists_nor_mutates() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state_dir = TreeFixture::new()?;
    let state_path = state_dir.path().join("state");
    let state = StateFile::open(&state_path)?;
    let mut prompter = ScriptedPrompter::new([Answer::Confirm(true), choose("c")]);

    let mut dry = options(Direction::Deploy, Some(source.path()), Some(target.path()));
    dry.dry_run = true;

    let before = target.snapshot()?;
    let report = DeploymentSession::new(dry, PermissionTable::default(), &mut prompter, state)
        .with_elevation(true)
        .run()?;

    assert_eq!(target.snapshot()?, before);
    assert!(!state_path.exists());
    match report.outcome {
        Outcome::Deployed { deploy, link } => {
            assert!(deploy.dry_run);
            assert_eq!(deploy.installed().len(), 3);
            assert!(link.is_some_and(|link| link.dry_run && link.entries.is_empty()));
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    Ok(())
}

#[test]
fn undeploy_unlinks_then_removes() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let state_dir = TreeFixture::new()?;
    let state_path: PathBuf = state_dir.path().join("state");

    let mut prompter = ScriptedPrompter::new([Answer::Confirm(true), choose("c")]);
    DeploymentSession::new(
        options(Direction::Deploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        StateFile::open(&state_path)?,
    )
    .with_elevation(true)
    .run()?;
    assert!(target
        .path()
        .join("usr/local/bin/td-deploy-workspace")
        .symlink_metadata()
        .is_ok());

    // Link choice now comes from persisted state, so only confirmation is asked.
    let mut prompter = ScriptedPrompter::new([choose("c")]);
    let report = DeploymentSession::new(
        options(Direction::Undeploy, Some(source.path()), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        StateFile::open(&state_path)?,
    )
    .with_elevation(true)
    .run()?;

    match report.outcome {
        Outcome::Undeployed { unlink, undeploy } => {
            let unlinked = unlink.map(|unlink| unlink.unlinked()).unwrap_or_default();
            assert_eq!(unlinked, vec!["td-deploy-workspace".to_string()]);
            assert_eq!(undeploy.removed().len(), 3);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(target
        .path()
        .join("usr/local/bin/td-deploy-workspace")
        .symlink_metadata()
        .is_err());
    assert!(!target.path().join("etc/testadura/app.cfg").exists());

    Ok(())
}

#[test]
fn missing_workspace_aborts_before_persisting() -> Result<()> {
    let target = TreeFixture::new()?;
    let state_dir = TreeFixture::new()?;
    let state_path = state_dir.path().join("state");
    let missing = target.path().join("nope");
    let mut prompter = ScriptedPrompter::new([Answer::Confirm(false), choose("c")]);

    let result = DeploymentSession::new(
        options(Direction::Deploy, Some(&missing), Some(target.path())),
        PermissionTable::default(),
        &mut prompter,
        StateFile::open(&state_path)?,
    )
    .with_elevation(true)
    .run();

    assert!(matches!(result, Err(SessionError::MissingSource { .. })));
    assert!(!state_path.exists());
    assert_eq!(target.snapshot()?.len(), 1);

    Ok(())
}
