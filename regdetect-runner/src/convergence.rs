// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrying failing tests until the set of failures stops changing.
//!
//! Tests that hit the network fail intermittently, so a single failure is not trusted. The loop
//! re-runs whatever is still failing, with a cooldown between runs. Once the set has been small
//! for a while, the remaining tests are also tried at the reference revision: a test that fails
//! there too is unreliable and cannot be blamed on the candidate.

use crate::{
    errors::RunError,
    outcome::{ResultMap, TestId},
    reporter::Reporter,
    revisions::RevisionPair,
    test_tool::TestTool,
    vcs::{Vcs, WorkingTree},
};
use serde::Deserialize;
use std::{collections::BTreeSet, thread, time::Duration};
use tracing::{debug, info};

/// Controls how long the loop keeps retrying.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConvergencePolicy {
    /// The maximum number of runs.
    #[serde(rename = "iterations")]
    pub max_iterations: usize,

    /// How long to wait between runs.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,

    /// The number of runs after which the stability check may happen.
    pub stability_after: usize,

    /// The stability check only happens once fewer than this many tests are failing.
    pub stability_below: usize,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            max_iterations: 7,
            cooldown: Duration::from_secs(30),
            stability_after: 3,
            stability_below: 5,
        }
    }
}

/// Waits out the cooldown between runs.
pub trait Sleeper {
    /// Blocks for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// A [`Sleeper`] which blocks the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// The result of [`FlakeConvergence::run`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// The results of the last run. Only the non-passing entries are meaningful.
    pub results: ResultMap,

    /// Tests that were still failing when the loop stopped, excluding unreliable ones.
    pub still_failing: Vec<TestId>,

    /// Tests that also failed at the reference revision during the stability check.
    pub unreliable: BTreeSet<TestId>,

    /// The number of runs performed.
    pub iterations: usize,
}

/// The flake-convergence loop.
///
/// The working tree must be at the candidate revision when [`run`](Self::run) is called, and it
/// is left there when it returns.
pub struct FlakeConvergence<'a, 'r, T, V, S> {
    tool: &'a mut T,
    tree: &'a mut WorkingTree<V>,
    revisions: &'a RevisionPair,
    policy: &'a ConvergencePolicy,
    sleeper: &'a mut S,
    reporter: &'a mut Reporter<'r>,
}

impl<'a, 'r, T, V, S> FlakeConvergence<'a, 'r, T, V, S>
where
    T: TestTool,
    V: Vcs,
    S: Sleeper,
{
    /// Creates a new loop.
    pub fn new(
        tool: &'a mut T,
        tree: &'a mut WorkingTree<V>,
        revisions: &'a RevisionPair,
        policy: &'a ConvergencePolicy,
        sleeper: &'a mut S,
        reporter: &'a mut Reporter<'r>,
    ) -> Self {
        Self {
            tool,
            tree,
            revisions,
            policy,
            sleeper,
            reporter,
        }
    }

    /// Runs `selectors` until nothing fails or the iteration budget runs out. An empty selector
    /// list starts with every test.
    pub fn run(mut self, selectors: Vec<String>) -> Result<ConvergenceReport, RunError> {
        let max_iterations = self.policy.max_iterations.max(1);
        let mut selectors = selectors;
        let mut report = ConvergenceReport::default();
        let mut stability_checked = false;

        for iteration in 0..max_iterations {
            debug!(
                "convergence run {} with {} selectors",
                iteration + 1,
                selectors.len()
            );
            let results = self.tool.run(&selectors)?;
            report.iterations = iteration + 1;
            report.still_failing.clear();

            let mut failing: Vec<TestId> = results
                .non_passing()
                .into_iter()
                .filter(|test| !report.unreliable.contains(test))
                .collect();
            self.reporter
                .convergence_run_done(iteration + 1, failing.len(), results.len())?;
            report.results = results;

            if failing.is_empty() {
                info!("all tests passed after {} runs", report.iterations);
                break;
            }

            if !stability_checked
                && report.iterations >= self.policy.stability_after
                && failing.len() < self.policy.stability_below
            {
                stability_checked = true;
                let unreliable = self.stability_check(&failing)?;
                failing.retain(|test| !unreliable.contains(test));
                report.unreliable.extend(unreliable);
                if failing.is_empty() {
                    info!("every remaining failure is unreliable at the reference revision");
                    break;
                }
            }

            report.still_failing = failing;
            if report.iterations == max_iterations {
                break;
            }

            selectors = report
                .still_failing
                .iter()
                .map(|test| test.to_string())
                .collect();
            debug!(
                "cooling down for {}",
                humantime::format_duration(self.policy.cooldown)
            );
            self.sleeper.sleep(self.policy.cooldown);
        }

        Ok(report)
    }

    /// Runs `failing` at the reference revision and returns the tests that do not pass there.
    ///
    /// The candidate revision is checked out again afterwards, even if the run failed.
    fn stability_check(&mut self, failing: &[TestId]) -> Result<BTreeSet<TestId>, RunError> {
        let revisions = self.revisions;
        let reference = &revisions.reference;
        self.reporter.stability_check_started(failing.len(), reference)?;

        let res = self
            .tree
            .checkout(reference)
            .map_err(|err| RunError::Checkout {
                revision: reference.clone(),
                err,
            })
            .and_then(|()| {
                let selectors: Vec<String> = failing.iter().map(|test| test.to_string()).collect();
                Ok(self.tool.run(&selectors)?)
            });

        let candidate = &revisions.candidate;
        let restore_res = self
            .tree
            .checkout(candidate)
            .map_err(|err| RunError::Checkout {
                revision: candidate.clone(),
                err,
            });
        let results = res?;
        restore_res?;

        let mut unreliable = BTreeSet::new();
        for test in failing {
            if results.get(test).is_some_and(|outcome| !outcome.is_passed()) {
                self.reporter.unreliable(test, reference)?;
                unreliable.insert(test.clone());
            }
        }
        Ok(unreliable)
    }
}
