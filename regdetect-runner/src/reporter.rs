// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable progress and report lines.

use crate::{
    helpers::plural,
    outcome::{Outcome, TestId},
    revisions::RevisionPair,
    slice::TestSlice,
    vcs::{BisectOutcome, Revision},
};
use owo_colors::{OwoColorize, Style};
use std::{
    fmt,
    io::{self, Write},
};

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    revision: Style,
    test: Style,
    pass: Style,
    fail: Style,
    flaky: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.revision = Style::new().cyan().bold();
        self.test = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.flaky = Style::new().magenta().bold();
    }

    fn outcome(&self, outcome: Option<Outcome>) -> Style {
        match outcome {
            Some(Outcome::Passed) => self.pass,
            Some(Outcome::Warned) => self.flaky,
            Some(Outcome::Failed | Outcome::Errored) | None => self.fail,
        }
    }
}

/// Writes progress and the final report for a run.
pub struct Reporter<'a> {
    out: &'a mut (dyn Write + Send),
    styles: Styles,
}

impl<'a> Reporter<'a> {
    /// Creates a new reporter writing to `out`.
    pub fn new(out: &'a mut (dyn Write + Send)) -> Self {
        Self {
            out,
            styles: Styles::default(),
        }
    }

    /// Enables colored output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    pub(crate) fn run_started(&mut self, revisions: &RevisionPair) -> io::Result<()> {
        writeln!(
            self.out,
            "Testing if commit-ish {} introduced regressions compared to {}",
            revisions.candidate.style(self.styles.revision),
            revisions.reference.style(self.styles.revision),
        )
    }

    pub(crate) fn slice_selected(
        &mut self,
        slice: &TestSlice,
        selected: usize,
        total: usize,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "Selected {} out of {} {} for slice {slice}",
            selected.style(self.styles.count),
            total.style(self.styles.count),
            plural::tests_str(total),
        )
    }

    pub(crate) fn no_failures(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", "No failure, exiting".style(self.styles.pass))
    }

    pub(crate) fn failing_at_candidate(
        &mut self,
        failing: usize,
        revisions: &RevisionPair,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} failing at {}, now testing if they are regressions from {}",
            failing.style(self.styles.count),
            if failing == 1 { "test is" } else { "tests are" },
            revisions.candidate.style(self.styles.revision),
            revisions.reference.style(self.styles.revision),
        )
    }

    pub(crate) fn reference_run_done(&mut self, count: usize) -> io::Result<()> {
        writeln!(
            self.out,
            "Second run of {} {} done",
            count.style(self.styles.count),
            plural::tests_str(count),
        )
    }

    pub(crate) fn no_regressions(&mut self) -> io::Result<()> {
        writeln!(
            self.out,
            "{}",
            "There was no detected regression".style(self.styles.pass)
        )
    }

    pub(crate) fn potential_regressions(&mut self, count: usize) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} {} a potential regression. Retrying them a few times to be sure",
            count.style(self.styles.count),
            plural::tests_str(count),
            plural::has_str(count),
        )
    }

    pub(crate) fn convergence_run_done(
        &mut self,
        iteration: usize,
        non_passing: usize,
        total: usize,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "Run {iteration} done. Has {} out of {} non-ok {}",
            non_passing.style(self.styles.count),
            total.style(self.styles.count),
            plural::tests_str(total),
        )
    }

    pub(crate) fn stability_check_started(
        &mut self,
        count: usize,
        reference: &Revision,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "Checking whether {} remaining {} also fail at {}",
            count.style(self.styles.count),
            plural::tests_str(count),
            reference.style(self.styles.revision),
        )
    }

    pub(crate) fn unreliable(&mut self, test: &TestId, reference: &Revision) -> io::Result<()> {
        writeln!(
            self.out,
            "Test {} is {} at {}, ignoring it",
            test.style(self.styles.test),
            "unreliable".style(self.styles.flaky),
            reference.style(self.styles.revision),
        )
    }

    pub(crate) fn all_flaky(&mut self) -> io::Result<()> {
        writeln!(
            self.out,
            "{}",
            "All false alarms, exiting".style(self.styles.pass)
        )
    }

    pub(crate) fn regressions_found(&mut self, count: usize) -> io::Result<()> {
        writeln!(
            self.out,
            "We have {} {}",
            count.style(self.styles.fail),
            plural::regressions_str(count),
        )
    }

    pub(crate) fn regression(
        &mut self,
        test: &TestId,
        previous: Option<Outcome>,
        revisions: &RevisionPair,
        now: Option<Outcome>,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "Test {} was {} in {}, is now {} at {}",
            test.style(self.styles.test),
            DisplayOutcome(previous).style(self.styles.outcome(previous)),
            revisions.reference.style(self.styles.revision),
            DisplayOutcome(now).style(self.styles.outcome(now)),
            revisions.candidate.style(self.styles.revision),
        )
    }

    pub(crate) fn bisected(&mut self, test: &TestId, outcome: &BisectOutcome) -> io::Result<()> {
        match &outcome.first_bad_commit {
            Some(commit) => writeln!(
                self.out,
                "Test {} was broken by {}",
                test.style(self.styles.test),
                commit.style(self.styles.revision),
            ),
            None => {
                writeln!(
                    self.out,
                    "Bisection of {} did not name a commit, full output:",
                    test.style(self.styles.test),
                )?;
                self.out.write_all(outcome.log.as_bytes())
            }
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

struct DisplayOutcome(Option<Outcome>);

impl fmt::Display for DisplayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(outcome) => fmt::Display::fmt(&outcome, f),
            None => f.pad("missing"),
        }
    }
}
