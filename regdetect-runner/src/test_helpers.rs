// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fakes for the process-spawning seams, used by unit tests.

use crate::{
    convergence::Sleeper,
    errors::{TestToolError, VcsError},
    outcome::{Outcome, ResultMap, TestId},
    test_tool::TestTool,
    vcs::{Revision, Vcs},
};
use std::{collections::VecDeque, io, time::Duration};

/// Builds a result map from `(method, outcome)` pairs in a fixed test class.
pub(crate) fn results(entries: &[(&str, Outcome)]) -> ResultMap {
    entries
        .iter()
        .map(|(method, outcome)| (test_id(method), *outcome))
        .collect()
}

/// Returns the identifier of `method` in a fixed test class.
pub(crate) fn test_id(method: &str) -> TestId {
    TestId::new("test", "test_utils", "TestUtil", method)
}

/// A test tool which replays scripted runs in order.
///
/// Each scripted run lists the outcome of every test the tool knows about. A run only reports
/// the tests its selectors name, or everything if no selector names a test.
#[derive(Debug, Default)]
pub(crate) struct FakeTool {
    runs: VecDeque<Option<ResultMap>>,
    collection: Vec<TestId>,
    calls: Vec<Vec<String>>,
}

impl FakeTool {
    pub(crate) fn push_run(&mut self, results: ResultMap) -> &mut Self {
        self.runs.push_back(Some(results));
        self
    }

    pub(crate) fn set_collection(&mut self, collection: Vec<TestId>) -> &mut Self {
        self.collection = collection;
        self
    }

    /// Scripts a run in which the tool cannot be started.
    pub(crate) fn push_failure(&mut self) -> &mut Self {
        self.runs.push_back(None);
        self
    }

    /// The selectors passed to every call to `run`, in order.
    pub(crate) fn calls(&self) -> &[Vec<String>] {
        &self.calls
    }

    pub(crate) fn remaining_runs(&self) -> usize {
        self.runs.len()
    }
}

impl TestTool for FakeTool {
    fn run(&mut self, selectors: &[String]) -> Result<ResultMap, TestToolError> {
        self.calls.push(selectors.to_vec());
        let Some(results) = self
            .runs
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected test run with selectors {selectors:?}"))
        else {
            return Err(TestToolError::Exec {
                command: "fake-tool".to_owned(),
                err: io::Error::new(io::ErrorKind::NotFound, "fake-tool not found"),
            });
        };
        let named: Vec<TestId> = selectors
            .iter()
            .filter_map(|selector| selector.parse().ok())
            .collect();
        if named.is_empty() {
            return Ok(results);
        }
        Ok(results
            .iter()
            .filter(|(test, _)| named.contains(test))
            .map(|(test, outcome)| (test.clone(), *outcome))
            .collect())
    }

    fn collect(&mut self, _selectors: &[String]) -> Result<Vec<TestId>, TestToolError> {
        Ok(self.collection.clone())
    }

    fn bisect_command(&self, test: &TestId) -> Vec<String> {
        vec!["fake-tool".to_owned(), test.to_string()]
    }
}

/// A version control operation performed on a [`FakeVcs`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum VcsCall {
    Checkout(Revision),
    BisectStart { bad: Revision, good: Revision },
    BisectRun { command: Vec<String> },
    BisectReset,
}

/// A version control fake which records every operation.
#[derive(Debug, Default)]
pub(crate) struct FakeVcs {
    calls: Vec<VcsCall>,
    failing_checkouts: Vec<Revision>,
    fail_bisect_run: bool,
    bisect_log: String,
}

impl FakeVcs {
    pub(crate) fn fail_checkout_of(&mut self, revision: Revision) {
        self.failing_checkouts.push(revision);
    }

    pub(crate) fn fail_bisect_run(&mut self) {
        self.fail_bisect_run = true;
    }

    pub(crate) fn set_bisect_log(&mut self, log: impl Into<String>) {
        self.bisect_log = log.into();
    }

    pub(crate) fn calls(&self) -> &[VcsCall] {
        &self.calls
    }

    /// Returns the revisions checked out, in order.
    pub(crate) fn checkouts(&self) -> Vec<&Revision> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                VcsCall::Checkout(revision) => Some(revision),
                _ => None,
            })
            .collect()
    }
}

impl Vcs for FakeVcs {
    fn checkout(&mut self, revision: &Revision) -> Result<(), VcsError> {
        self.calls.push(VcsCall::Checkout(revision.clone()));
        if self.failing_checkouts.contains(revision) {
            return Err(VcsError::Failed {
                command: format!("git checkout --quiet {revision}"),
                exit_code: Some(1),
            });
        }
        Ok(())
    }

    fn bisect_start(&mut self, bad: &Revision, good: &Revision) -> Result<(), VcsError> {
        self.calls.push(VcsCall::BisectStart {
            bad: bad.clone(),
            good: good.clone(),
        });
        Ok(())
    }

    fn bisect_run(&mut self, command: &[String]) -> Result<String, VcsError> {
        self.calls.push(VcsCall::BisectRun {
            command: command.to_vec(),
        });
        if self.fail_bisect_run {
            return Err(VcsError::Failed {
                command: "git bisect run".to_owned(),
                exit_code: Some(128),
            });
        }
        Ok(self.bisect_log.clone())
    }

    fn bisect_reset(&mut self) -> Result<(), VcsError> {
        self.calls.push(VcsCall::BisectReset);
        Ok(())
    }
}

/// A [`Sleeper`] which records requested durations instead of waiting.
#[derive(Debug, Default)]
pub(crate) struct NoSleep {
    pub(crate) slept: Vec<Duration>,
}

impl Sleeper for NoSleep {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}
