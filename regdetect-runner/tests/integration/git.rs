// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exercises `GitVcs` against a scratch repository.

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::Result;
use duct::cmd;
use pretty_assertions::assert_eq;
use regdetect_runner::{
    outcome::TestId,
    vcs::{GitVcs, Revision, WorkingTree},
};

fn git(dir: &Utf8Path, args: &[&str]) -> Result<String> {
    let output = cmd("git", args.iter().copied())
        .dir(dir.as_std_path())
        .env("GIT_AUTHOR_NAME", "regdetect")
        .env("GIT_AUTHOR_EMAIL", "regdetect@example.com")
        .env("GIT_COMMITTER_NAME", "regdetect")
        .env("GIT_COMMITTER_EMAIL", "regdetect@example.com")
        .stderr_null()
        .read()?;
    Ok(output)
}

fn commit_state(dir: &Utf8Path, state: &str) -> Result<String> {
    std::fs::write(dir.join("state"), format!("{state}\n"))?;
    git(dir, &["add", "state"])?;
    git(dir, &["commit", "--quiet", "-m", state])?;
    git(dir, &["rev-parse", "HEAD"])
}

/// Creates a repository with four commits, the third of which breaks things.
fn scratch_repo() -> Result<Option<(Utf8TempDir, Vec<String>)>> {
    if cmd!("git", "--version").stdout_null().run().is_err() {
        eprintln!("git not found, skipping");
        return Ok(None);
    }
    let dir = Utf8TempDir::new()?;
    git(dir.path(), &["init", "--quiet"])?;
    let commits = ["good 1", "good 2", "bad 1", "bad 2"]
        .into_iter()
        .map(|state| commit_state(dir.path(), state))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some((dir, commits)))
}

#[test]
fn checkout_moves_working_tree() -> Result<()> {
    let Some((dir, commits)) = scratch_repo()? else {
        return Ok(());
    };
    let mut tree = WorkingTree::new(GitVcs::new(dir.path()));

    tree.checkout(&Revision::new(&commits[0]))?;
    assert_eq!(std::fs::read_to_string(dir.path().join("state"))?, "good 1\n");

    let tip = Revision::new(&commits[3]);
    tree.checkout(&tip.parent())?;
    assert_eq!(std::fs::read_to_string(dir.path().join("state"))?, "bad 1\n");
    assert_eq!(tree.current(), Some(&tip.parent()));

    tree.checkout(&Revision::new("no-such-revision"))
        .expect_err("unknown revision fails");
    assert_eq!(tree.current(), None);
    Ok(())
}

#[test]
fn bisect_finds_first_bad_commit() -> Result<()> {
    let Some((dir, commits)) = scratch_repo()? else {
        return Ok(());
    };
    let mut tree = WorkingTree::new(GitVcs::new(dir.path()));
    let test: TestId = "test.test_state:TestState.test_good".parse()?;
    let command = vec![
        "grep".to_owned(),
        "-q".to_owned(),
        "good".to_owned(),
        "state".to_owned(),
    ];

    let outcome = tree.bisect(
        &Revision::new(&commits[0]),
        &Revision::new(&commits[3]),
        &test,
        &command,
    )?;
    assert_eq!(outcome.first_bad_commit.as_ref(), Some(&commits[2]));
    assert_eq!(tree.current(), None, "bisection leaves the revision unknown");

    // The bisection session was reset, so a new one can start.
    git(dir.path(), &["bisect", "start", &commits[3], &commits[0]])?;
    git(dir.path(), &["bisect", "reset"])?;
    Ok(())
}
