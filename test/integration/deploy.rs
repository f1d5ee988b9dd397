// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::TreeFixture;

use anyhow::Result;
use filetime::{set_file_mtime, FileTime};
use pretty_assertions::assert_eq;
use std::{fs, path::Path, time::SystemTime};
use td_deploy::{
    deploy::{DeployAction, DeployError, UndeployAction},
    DeployEngine, PermissionTable, UndeployEngine,
};

fn workspace() -> Result<TreeFixture> {
    let workspace = TreeFixture::new()?;
    workspace.write("usr/local/bin/tool", "#!/bin/sh\necho tool\n")?;
    workspace.write("etc/testadura/app.cfg", "key=value\n")?;
    workspace.write("usr/local/lib/testadura/common/lib.sh", "lib() { :; }\n")?;
    workspace.write("README", "scratch notes\n")?;
    workspace.write(".git/config", "[core]\n")?;
    workspace.write("etc/testadura/app.cfg.old", "old=value\n")?;
    workspace.write("etc/_draft.cfg", "draft\n")?;
    Ok(workspace)
}

#[test]
fn deploy_applies_resolved_modes() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let table = PermissionTable::default();

    let report = DeployEngine::new(&table).run(source.path(), target.path(), false)?;
    assert_eq!(
        report.installed(),
        vec![
            Path::new("etc/testadura/app.cfg"),
            Path::new("usr/local/bin/tool"),
            Path::new("usr/local/lib/testadura/common/lib.sh"),
        ]
    );

    assert_eq!(target.mode("usr/local/bin/tool")?, 0o755);
    assert_eq!(target.mode("etc/testadura/app.cfg")?, 0o640);
    assert_eq!(target.mode("etc/testadura")?, 0o750);
    assert_eq!(target.mode("usr/local/lib/testadura/common/lib.sh")?, 0o644);
    assert_eq!(
        fs::read_to_string(target.path().join("etc/testadura/app.cfg"))?,
        "key=value\n"
    );

    Ok(())
}

#[test]
fn ineligible_paths_are_never_touched() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    target.write("README", "target readme\n")?;
    target.write(".git/config", "target git\n")?;
    target.write("etc/_draft.cfg", "target draft\n")?;
    target.write("etc/testadura/app.cfg.old", "target backup\n")?;
    let table = PermissionTable::default();

    let report = DeployEngine::new(&table).run(source.path(), target.path(), false)?;
    assert_eq!(report.ignored.len(), 4);
    assert_eq!(fs::read_to_string(target.path().join("README"))?, "target readme\n");
    assert_eq!(fs::read_to_string(target.path().join(".git/config"))?, "target git\n");
    assert_eq!(fs::read_to_string(target.path().join("etc/_draft.cfg"))?, "target draft\n");

    let report = UndeployEngine::new().run(source.path(), target.path(), false)?;
    assert_eq!(report.ignored.len(), 4);
    assert!(target.path().join("README").exists());
    assert!(target.path().join(".git/config").exists());
    assert!(target.path().join("etc/_draft.cfg").exists());
    assert!(target.path().join("etc/testadura/app.cfg.old").exists());

    Ok(())
}

#[test]
fn second_deploy_is_a_no_op() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let table = PermissionTable::default();
    let engine = DeployEngine::new(&table);

    engine.run(source.path(), target.path(), false)?;
    let before = target.snapshot()?;

    let report = engine.run(source.path(), target.path(), false)?;
    assert!(report.installed().is_empty());
    assert_eq!(report.up_to_date().len(), report.entries.len());
    assert!(report
        .entries
        .iter()
        .all(|entry| entry.action == DeployAction::UpToDate));
    assert_eq!(target.snapshot()?, before);

    Ok(())
}

#[test]
fn newer_source_is_reinstalled() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let table = PermissionTable::default();
    let engine = DeployEngine::new(&table);
    engine.run(source.path(), target.path(), false)?;

    let path = source.write("etc/testadura/app.cfg", "key=changed\n")?;
    let future = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_secs() as i64
        + 3600;
    set_file_mtime(&path, FileTime::from_unix_time(future, 0))?;

    let report = engine.run(source.path(), target.path(), false)?;
    assert_eq!(report.installed(), vec![Path::new("etc/testadura/app.cfg")]);
    assert_eq!(
        fs::read_to_string(target.path().join("etc/testadura/app.cfg"))?,
        "key=changed\n"
    );

    Ok(())
}

#[test]
fn older_source_keeps_newer_destination() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let path = source.path().join("usr/local/bin/tool");
    set_file_mtime(&path, FileTime::from_unix_time(100, 0))?;
    target.write("usr/local/bin/tool", "hand edited\n")?;

    let table = PermissionTable::default();
    let report = DeployEngine::new(&table).run(source.path(), target.path(), false)?;
    assert!(report.up_to_date().contains(&Path::new("usr/local/bin/tool")));
    assert_eq!(
        fs::read_to_string(target.path().join("usr/local/bin/tool"))?,
        "hand edited\n"
    );

    Ok(())
}

#[test]
fn deploy_then_undeploy_round_trip() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    let table = PermissionTable::default();

    let deployed = DeployEngine::new(&table).run(source.path(), target.path(), false)?;
    let removed = UndeployEngine::new().run(source.path(), target.path(), false)?;

    assert_eq!(deployed.installed(), removed.removed());
    for relative in deployed.installed() {
        assert!(!target.path().join(relative).exists());
    }
    let leftovers = target
        .snapshot()?
        .into_iter()
        .filter(|entry| !matches!(entry, crate::Snapshot::Dir { .. }))
        .collect::<Vec<_>>();
    assert!(leftovers.is_empty(), "left behind {leftovers:?}");

    let again = UndeployEngine::new().run(source.path(), target.path(), false)?;
    assert!(again
        .entries
        .iter()
        .all(|entry| entry.action == UndeployAction::Missing));

    Ok(())
}

#[test]
fn dry_run_decides_like_real_run_without_mutation() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;
    target.write("etc/testadura/app.cfg", "already newer\n")?;
    let table = PermissionTable::default();
    let engine = DeployEngine::new(&table);

    let before = target.snapshot()?;
    let dry = engine.run(source.path(), target.path(), true)?;
    assert_eq!(target.snapshot()?, before);
    assert!(dry.dry_run);
    assert!(dry
        .entries
        .iter()
        .all(|entry| entry.action != DeployAction::Installed));

    let real = engine.run(source.path(), target.path(), false)?;
    let decisions = |report: &td_deploy::DeployReport| {
        report
            .entries
            .iter()
            .map(|entry| (entry.relative.clone(), entry.action.is_install()))
            .collect::<Vec<_>>()
    };
    assert_eq!(decisions(&dry), decisions(&real));

    let before = target.snapshot()?;
    let dry = UndeployEngine::new().run(source.path(), target.path(), true)?;
    assert_eq!(dry.removed().len(), 3);
    assert!(dry
        .entries
        .iter()
        .all(|entry| entry.action == UndeployAction::WouldRemove));
    assert_eq!(target.snapshot()?, before);

    Ok(())
}

#[test]
fn missing_workspace_is_fatal() -> Result<()> {
    let target = TreeFixture::new()?;
    let missing = target.path().join("no-such-workspace");
    let table = PermissionTable::default();

    let result = DeployEngine::new(&table).run(&missing, target.path(), false);
    assert!(matches!(result, Err(DeployError::MissingSource { .. })));

    let result = UndeployEngine::new().run(&missing, target.path(), false);
    assert!(matches!(result, Err(DeployError::MissingSource { .. })));
    assert_eq!(target.snapshot()?.len(), 1);

    Ok(())
}

#[test]
fn failed_copy_does_not_abort_walk() -> Result<()> {
    let source = workspace()?;
    let target = TreeFixture::new()?;

    // A directory sitting where a file should go makes that single copy fail.
    fs::create_dir_all(target.path().join("etc/testadura/app.cfg"))?;
    let future = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_secs() as i64
        + 3600;
    set_file_mtime(
        source.path().join("etc/testadura/app.cfg"),
        FileTime::from_unix_time(future, 0),
    )?;
    let table = PermissionTable::default();

    let report = DeployEngine::new(&table).run(source.path(), target.path(), false)?;
    assert!(report.is_success());
    assert_eq!(report.failed().len(), 1);
    assert_eq!(report.failed()[0].relative, Path::new("etc/testadura/app.cfg"));
    assert!(target.path().join("usr/local/bin/tool").is_file());

    Ok(())
}
