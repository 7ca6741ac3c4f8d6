// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driving a complete regression detection run.
//!
//! A run goes through these phases in order, stopping early as soon as there is nothing left to
//! look at:
//!
//! 1. **Setup**: check out the candidate revision and work out which tests to run.
//! 2. **Baseline**: run them at the candidate revision.
//! 3. **Reference**: re-run the failures at the reference revision, and keep the ones that passed
//!    there.
//! 4. **Triage**: retry those until they stop failing or the retry budget runs out.
//! 5. **Report**: print what is left and bisect each regression.
//!
//! Whatever happens, the working tree is put back on the candidate revision before
//! [`Orchestrator::run`] returns.

use crate::{
    config::RegdetectConfig,
    convergence::{ConvergencePolicy, FlakeConvergence, Sleeper},
    errors::{RunError, UnknownSubsetError},
    exit_codes::RegdetectExitCode,
    outcome::{Outcome, TestId},
    regression::regressions,
    reporter::Reporter,
    revisions::RevisionPair,
    slice::TestSlice,
    test_tool::TestTool,
    vcs::{Vcs, WorkingTree},
};
use itertools::Itertools;
use tracing::{debug, info, warn};

/// Options for an [`Orchestrator`].
#[derive(Clone, Debug, Default)]
pub struct OrchestratorOptions {
    selectors: Vec<String>,
    slice: Option<ResolvedSlice>,
    policy: ConvergencePolicy,
    bisect: bool,
}

#[derive(Clone, Debug)]
enum ResolvedSlice {
    Count(TestSlice),
    Subset { name: String, args: Vec<String> },
}

impl OrchestratorOptions {
    /// Creates options from the config. No selectors or slice are set.
    pub fn from_config(config: &RegdetectConfig) -> Self {
        Self {
            selectors: Vec::new(),
            slice: None,
            policy: config.convergence().clone(),
            bisect: config.bisect(),
        }
    }

    /// Sets the selectors passed to the test tool for the baseline run. Empty means all tests.
    pub fn set_selectors(&mut self, selectors: Vec<String>) -> &mut Self {
        self.selectors = selectors;
        self
    }

    /// Restricts the run to a slice of the test collection.
    ///
    /// Named subsets are looked up in `config`.
    pub fn set_slice(
        &mut self,
        slice: TestSlice,
        config: &RegdetectConfig,
    ) -> Result<&mut Self, UnknownSubsetError> {
        self.slice = Some(match slice {
            TestSlice::Count { .. } => ResolvedSlice::Count(slice),
            TestSlice::Subset(name) => {
                let args = config.subset_args(&name)?.to_vec();
                ResolvedSlice::Subset { name, args }
            }
        });
        Ok(self)
    }

    /// Returns the flake-convergence policy, for overriding.
    pub fn policy_mut(&mut self) -> &mut ConvergencePolicy {
        &mut self.policy
    }

    /// Enables or disables bisection of confirmed regressions.
    pub fn set_bisect(&mut self, bisect: bool) -> &mut Self {
        self.bisect = bisect;
        self
    }
}

/// A confirmed regression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Regression {
    /// The test that regressed.
    pub test: TestId,

    /// The outcome at the reference revision.
    pub reference_outcome: Option<Outcome>,

    /// The outcome in the last run at the candidate revision.
    pub candidate_outcome: Option<Outcome>,

    /// The commit that introduced the regression, if bisection ran and named one.
    pub first_bad_commit: Option<String>,
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every test passed at the candidate revision.
    NoFailures,

    /// Every failure at the candidate revision also fails at the reference revision.
    NoRegressions,

    /// Every potential regression was a flake.
    AllFlaky,

    /// Some regressions were confirmed.
    Regressions(Vec<Regression>),
}

impl RunOutcome {
    /// Returns the process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NoFailures | RunOutcome::NoRegressions | RunOutcome::AllFlaky => {
                RegdetectExitCode::OK
            }
            RunOutcome::Regressions(_) => RegdetectExitCode::REGRESSIONS_FOUND,
        }
    }
}

/// Owns the test tool and the working tree for the duration of a run.
pub struct Orchestrator<T, V, S> {
    tool: T,
    tree: WorkingTree<V>,
    sleeper: S,
    revisions: RevisionPair,
    options: OrchestratorOptions,
}

impl<T, V, S> Orchestrator<T, V, S>
where
    T: TestTool,
    V: Vcs,
    S: Sleeper,
{
    /// Creates a new orchestrator.
    pub fn new(
        tool: T,
        tree: WorkingTree<V>,
        sleeper: S,
        revisions: RevisionPair,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            tool,
            tree,
            sleeper,
            revisions,
            options,
        }
    }

    /// Runs every phase, writing progress and the report to `reporter`.
    ///
    /// The working tree is left on the candidate revision. If a phase fails, restoring the
    /// candidate is still attempted and the phase's error is returned.
    pub fn run(&mut self, reporter: &mut Reporter<'_>) -> Result<RunOutcome, RunError> {
        let res = self.run_phases(reporter);
        if res.is_err() && self.tree.current() != Some(&self.revisions.candidate) {
            let candidate = &self.revisions.candidate;
            if let Err(error) = self.tree.checkout(candidate) {
                warn!("failed to restore working tree to {candidate}: {error}");
            }
        }
        let flush_res = reporter.flush();
        let outcome = res?;
        flush_res?;
        Ok(outcome)
    }

    fn run_phases(&mut self, reporter: &mut Reporter<'_>) -> Result<RunOutcome, RunError> {
        reporter.run_started(&self.revisions)?;
        self.checkout_candidate()?;

        // Setup.
        let Some(selectors) = self.baseline_selectors(reporter)? else {
            info!("slice selected no tests");
            reporter.no_failures()?;
            return Ok(RunOutcome::NoFailures);
        };

        // Baseline.
        let baseline = self.tool.run(&selectors)?;
        let failing = baseline.non_passing();
        debug!(
            "baseline run: {} of {} tests not passing",
            failing.len(),
            baseline.len()
        );
        if failing.is_empty() {
            reporter.no_failures()?;
            return Ok(RunOutcome::NoFailures);
        }

        // Reference.
        reporter.failing_at_candidate(failing.len(), &self.revisions)?;
        let reference_res = self.checkout_reference().and_then(|()| {
            let selectors = to_selectors(&failing);
            Ok(self.tool.run(&selectors)?)
        });
        let restore_res = self.checkout_candidate();
        let reference_results = reference_res?;
        restore_res?;
        reporter.reference_run_done(failing.len())?;

        let potential = regressions(&reference_results, &baseline);
        if potential.is_empty() {
            reporter.no_regressions()?;
            return Ok(RunOutcome::NoRegressions);
        }

        // Triage.
        reporter.potential_regressions(potential.len())?;
        let potential: Vec<TestId> = potential.into_iter().collect();
        let report = FlakeConvergence::new(
            &mut self.tool,
            &mut self.tree,
            &self.revisions,
            &self.options.policy,
            &mut self.sleeper,
            reporter,
        )
        .run(to_selectors(&potential))?;
        if !report.unreliable.is_empty() {
            info!(
                "ignored tests unreliable at {}: {}",
                self.revisions.reference,
                report.unreliable.iter().join(", ")
            );
        }
        if report.still_failing.is_empty() {
            reporter.all_flaky()?;
            return Ok(RunOutcome::AllFlaky);
        }

        // Report.
        reporter.regressions_found(report.still_failing.len())?;
        let mut confirmed: Vec<Regression> = report
            .still_failing
            .iter()
            .map(|test| Regression {
                test: test.clone(),
                reference_outcome: reference_results.get(test),
                candidate_outcome: report.results.get(test),
                first_bad_commit: None,
            })
            .collect();
        for regression in &confirmed {
            reporter.regression(
                &regression.test,
                regression.reference_outcome,
                &self.revisions,
                regression.candidate_outcome,
            )?;
        }

        if self.options.bisect {
            for regression in &mut confirmed {
                let command = self.tool.bisect_command(&regression.test);
                let outcome = self
                    .tree
                    .bisect(
                        &self.revisions.reference,
                        &self.revisions.candidate,
                        &regression.test,
                        &command,
                    )
                    .map_err(|err| RunError::Bisect {
                        test: regression.test.clone(),
                        err,
                    })?;
                reporter.bisected(&regression.test, &outcome)?;
                regression.first_bad_commit = outcome.first_bad_commit;
            }
            self.checkout_candidate()?;
        }

        Ok(RunOutcome::Regressions(confirmed))
    }

    /// Returns the selectors for the baseline run, or `None` if the slice selected nothing.
    fn baseline_selectors(
        &mut self,
        reporter: &mut Reporter<'_>,
    ) -> Result<Option<Vec<String>>, RunError> {
        let selectors = &self.options.selectors;
        match &self.options.slice {
            None => Ok(Some(selectors.clone())),
            Some(ResolvedSlice::Subset { name, args }) => {
                debug!("selecting subset {name}");
                Ok(Some(args.iter().chain(selectors).cloned().collect()))
            }
            Some(ResolvedSlice::Count(slice)) => {
                let mut collection = self.tool.collect(selectors)?;
                collection.sort_unstable();
                collection.dedup();
                let selected = slice.select(&collection).unwrap_or_default();
                reporter.slice_selected(slice, selected.len(), collection.len())?;
                if selected.is_empty() {
                    return Ok(None);
                }
                Ok(Some(selected.iter().map(|test| test.to_string()).collect()))
            }
        }
    }

    fn checkout_candidate(&mut self) -> Result<(), RunError> {
        let candidate = &self.revisions.candidate;
        self.tree
            .checkout(candidate)
            .map_err(|err| RunError::Checkout {
                revision: candidate.clone(),
                err,
            })
    }

    fn checkout_reference(&mut self) -> Result<(), RunError> {
        let reference = &self.revisions.reference;
        self.tree
            .checkout(reference)
            .map_err(|err| RunError::Checkout {
                revision: reference.clone(),
                err,
            })
    }
}

fn to_selectors(tests: &[TestId]) -> Vec<String> {
    tests.iter().map(|test| test.to_string()).collect()
}
