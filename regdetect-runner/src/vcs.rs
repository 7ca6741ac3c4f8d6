// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Version control: checking out revisions and bisecting.
//!
//! The working tree is a single process-wide resource. [`WorkingTree`] is the handle through
//! which every checkout happens, and it remembers which revision it last checked out so that
//! nothing has to assume an ambient "current revision".

use crate::{errors::VcsError, outcome::TestId, test_tool::display_command};
use camino::Utf8PathBuf;
use std::fmt;
use tracing::{debug, info, warn};

/// A point in version control history: a branch, tag, or commit hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Creates a new revision reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the revision as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first parent of this revision, `<rev>^`.
    pub fn parent(&self) -> Self {
        Self(format!("{}^", self.0))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// The version control operations regdetect needs.
pub trait Vcs {
    /// Checks out `revision` in the working tree.
    fn checkout(&mut self, revision: &Revision) -> Result<(), VcsError>;

    /// Starts a bisection session between a known-bad and a known-good revision.
    fn bisect_start(&mut self, bad: &Revision, good: &Revision) -> Result<(), VcsError>;

    /// Runs `command` at each step of the bisection, using its exit status as the oracle.
    ///
    /// Returns the combined output of the bisection.
    fn bisect_run(&mut self, command: &[String]) -> Result<String, VcsError>;

    /// Ends the bisection session, restoring the tree to where it was before it started.
    fn bisect_reset(&mut self) -> Result<(), VcsError>;
}

/// [`Vcs`] implemented by shelling out to `git`.
#[derive(Clone, Debug)]
pub struct GitVcs {
    git: String,
    dir: Utf8PathBuf,
}

impl GitVcs {
    /// Creates a new `GitVcs` operating on the repository at `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            git: "git".to_owned(),
            dir: dir.into(),
        }
    }

    fn expression(&self, args: &[&str]) -> (String, duct::Expression) {
        let command = display_command(&self.git, args);
        debug!("executing `{command}` in {}", self.dir);
        let expression =
            duct::cmd(self.git.as_str(), args.iter().copied()).dir(self.dir.as_std_path());
        (command, expression)
    }

    fn run(&self, args: &[&str]) -> Result<(), VcsError> {
        let (command, expression) = self.expression(args);
        let output = expression
            .unchecked()
            .run()
            .map_err(|err| VcsError::Exec {
                command: command.clone(),
                err,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(VcsError::Failed {
                command,
                exit_code: output.status.code(),
            })
        }
    }
}

impl Vcs for GitVcs {
    fn checkout(&mut self, revision: &Revision) -> Result<(), VcsError> {
        self.run(&["checkout", "--quiet", revision.as_str()])
    }

    fn bisect_start(&mut self, bad: &Revision, good: &Revision) -> Result<(), VcsError> {
        self.run(&["bisect", "start", bad.as_str(), good.as_str()])
    }

    fn bisect_run(&mut self, command: &[String]) -> Result<String, VcsError> {
        let mut args = vec!["bisect", "run"];
        args.extend(command.iter().map(|s| s.as_str()));
        let (command, expression) = self.expression(&args);
        let output = expression
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .map_err(|err| VcsError::Exec {
                command: command.clone(),
                err,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(VcsError::Failed {
                command,
                exit_code: output.status.code(),
            })
        }
    }

    fn bisect_reset(&mut self) -> Result<(), VcsError> {
        self.run(&["bisect", "reset"])
    }
}

/// The result of bisecting a single test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BisectOutcome {
    /// The first commit at which the test fails, if bisection could name one.
    pub first_bad_commit: Option<String>,

    /// The full output of the bisection.
    pub log: String,
}

/// Exclusive handle to the working tree.
///
/// All checkouts go through this handle, which tracks the revision it last checked out.
#[derive(Debug)]
pub struct WorkingTree<V> {
    vcs: V,
    current: Option<Revision>,
}

impl<V: Vcs> WorkingTree<V> {
    /// Creates a new handle. The current revision is unknown until the first checkout.
    pub fn new(vcs: V) -> Self {
        Self { vcs, current: None }
    }

    /// Returns the revision this handle last checked out, if any.
    pub fn current(&self) -> Option<&Revision> {
        self.current.as_ref()
    }

    /// Returns a reference to the underlying version control implementation.
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Checks out `revision`.
    ///
    /// On failure the current revision becomes unknown.
    pub fn checkout(&mut self, revision: &Revision) -> Result<(), VcsError> {
        self.current = None;
        self.vcs.checkout(revision)?;
        self.current = Some(revision.clone());
        Ok(())
    }

    /// Bisects between `good` and `bad` using `command` as the oracle for `test`.
    ///
    /// The bisection session is always reset afterwards, even if starting or running it failed.
    /// The current revision is unknown after this returns; callers must check out the revision
    /// they need next.
    pub fn bisect(
        &mut self,
        good: &Revision,
        bad: &Revision,
        test: &TestId,
        command: &[String],
    ) -> Result<BisectOutcome, VcsError> {
        info!("bisecting {test} between {good} and {bad}");
        self.current = None;

        let res = self
            .vcs
            .bisect_start(bad, good)
            .and_then(|()| self.vcs.bisect_run(command));
        let reset_res = self.vcs.bisect_reset();
        if let Err(error) = &reset_res {
            warn!("failed to reset bisection after bisecting {test}: {error}");
        }

        let log = res?;
        reset_res?;

        Ok(BisectOutcome {
            first_bad_commit: first_bad_commit(&log),
            log,
        })
    }
}

/// Extracts the commit hash from git's `<hash> is the first bad commit` line.
fn first_bad_commit(log: &str) -> Option<String> {
    log.lines().find_map(|line| {
        line.trim()
            .strip_suffix(" is the first bad commit")
            .map(|hash| hash.to_owned())
    })
}
