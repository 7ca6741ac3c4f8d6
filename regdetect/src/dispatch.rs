// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::Result,
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::Utf8PathBuf;
use clap::Parser;
use regdetect_runner::{
    config::RegdetectConfig,
    convergence::ThreadSleeper,
    orchestrator::{Orchestrator, OrchestratorOptions},
    parser::EchoLevel,
    reporter::Reporter,
    revisions::{COMMIT_RANGE_ENV, RevisionPair},
    slice::{SLICE_ENV, TestSlice},
    test_tool::{NoseTool, ParallelOptions},
    vcs::{GitVcs, WorkingTree},
};
use std::{io, time::Duration};
use tracing::debug;

/// Find tests that regressed between two revisions.
///
/// Runs the test suite at the candidate revision, re-runs the failures at the reference revision,
/// retries the tests that used to pass to weed out flaky failures, and bisects whatever is left.
#[derive(Debug, Parser)]
#[command(
    name = "regdetect",
    version,
    styles = clap_styles::style(),
    after_help = "Test selectors that start with `-` must come after `--`."
)]
pub struct RegdetectApp {
    /// The revision to test [default: from the commit range, or master]
    #[arg(value_name = "CANDIDATE")]
    candidate: Option<String>,

    /// The revision to compare against [default: the candidate's parent]
    #[arg(value_name = "REFERENCE")]
    reference: Option<String>,

    /// Arguments passed through to the test tool to select tests
    #[arg(value_name = "SELECTORS", trailing_var_arg = true)]
    selectors: Vec<String>,

    /// Commit range to use if no revisions are given, as REFERENCE...CANDIDATE
    #[arg(long, value_name = "RANGE", env = COMMIT_RANGE_ENV)]
    commit_range: Option<String>,

    /// Run only part of the test collection: a shard (K/N) or a named subset
    #[arg(long, value_name = "SLICE", env = SLICE_ENV)]
    slice: Option<TestSlice>,

    /// Path to the repository under test
    #[arg(long, value_name = "PATH", default_value = ".")]
    repo: Utf8PathBuf,

    /// Config file [default: .config/regdetect.toml in the repository]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Maximum number of times to retry potential regressions
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    iterations: Option<u32>,

    /// Time to wait between retries, e.g. "30s"
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    cooldown: Option<Duration>,

    /// Let the test tool run tests in this many worker processes
    #[arg(long, short = 'j', value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    jobs: Option<u32>,

    /// How much test tool output to echo: 0 (none), 1 (records), 2 (everything)
    #[arg(
        long,
        value_name = "LEVEL",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    echo_level: u8,

    /// Do not bisect confirmed regressions
    #[arg(long)]
    no_bisect: bool,

    #[clap(flatten)]
    output: OutputOpts,
}

impl RegdetectApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let revisions = RevisionPair::resolve(
            self.candidate.as_deref(),
            self.reference.as_deref(),
            self.commit_range.as_deref(),
        )?;
        debug!(
            "candidate: {}, reference: {}",
            revisions.candidate, revisions.reference
        );

        let config =
            RegdetectConfig::from_sources(self.repo.clone(), self.config_file.as_deref())?;

        let mut options = OrchestratorOptions::from_config(&config);
        options.set_selectors(self.selectors);
        if let Some(slice) = self.slice {
            options.set_slice(slice, &config)?;
        }
        if let Some(iterations) = self.iterations {
            options.policy_mut().max_iterations = iterations as usize;
        }
        if let Some(cooldown) = self.cooldown {
            options.policy_mut().cooldown = cooldown;
        }
        if self.no_bisect {
            options.set_bisect(false);
        }

        let parallel = match self.jobs {
            Some(jobs) => Some(ParallelOptions {
                jobs: jobs as usize,
                process_timeout: config.process_timeout(),
            }),
            None => config.parallel(),
        };
        let mut tool = NoseTool::new(config.tool_command(), self.repo.clone());
        tool.set_parallel(parallel)
            .set_parser_options(config.parser_options(EchoLevel::from_level(self.echo_level)));

        let tree = WorkingTree::new(GitVcs::new(self.repo));
        let mut orchestrator = Orchestrator::new(tool, tree, ThreadSleeper, revisions, options);

        let mut stdout = io::stdout();
        let mut reporter = Reporter::new(&mut stdout);
        if output.colorize_stdout() {
            reporter.colorize();
        }

        let outcome = orchestrator.run(&mut reporter)?;
        Ok(outcome.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_app() {
        RegdetectApp::command().debug_assert();
    }

    #[test]
    fn positional_args() {
        let app = RegdetectApp::try_parse_from([
            "regdetect",
            "HEAD",
            "HEAD~3",
            "--",
            "test/test_utils.py",
            "--exclude=test_download",
        ])
        .expect("args parse");
        assert_eq!(app.candidate.as_deref(), Some("HEAD"));
        assert_eq!(app.reference.as_deref(), Some("HEAD~3"));
        assert_eq!(
            app.selectors,
            vec!["test/test_utils.py", "--exclude=test_download"]
        );
        assert_eq!(app.echo_level, 1);
        assert!(!app.no_bisect);
    }

    #[test]
    fn flags() {
        let app = RegdetectApp::try_parse_from([
            "regdetect",
            "--slice",
            "2/3",
            "--iterations",
            "4",
            "--cooldown",
            "1m",
            "-j",
            "8",
            "--echo-level",
            "0",
            "--no-bisect",
            "--color",
            "never",
        ])
        .expect("args parse");
        assert_eq!(
            app.slice,
            Some(TestSlice::Count {
                shard: 2,
                total_shards: 3
            })
        );
        assert_eq!(app.iterations, Some(4));
        assert_eq!(app.cooldown, Some(Duration::from_secs(60)));
        assert_eq!(app.jobs, Some(8));
        assert_eq!(app.echo_level, 0);
        assert!(app.no_bisect);
    }

    #[test]
    fn invalid_flags() {
        for args in [
            &["regdetect", "--slice", "4/3"][..],
            &["regdetect", "--iterations", "0"],
            &["regdetect", "--echo-level", "3"],
            &["regdetect", "--cooldown", "soon"],
        ] {
            RegdetectApp::try_parse_from(args).expect_err("args should fail to parse");
        }
    }
}
