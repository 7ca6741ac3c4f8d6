// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running the external test tool.
//!
//! The test tool is spawned as a child process and its diagnostic stream is parsed as it is
//! produced, so parsing overlaps with test execution. The caller still blocks until the child
//! exits. The tool's exit status is not inspected: outcomes come from the parsed text alone.

use crate::{
    errors::TestToolError,
    outcome::{ResultMap, TestId},
    parser::{EchoLevel, OutcomeParser, ParserOptions},
};
use camino::Utf8PathBuf;
use std::{borrow::Cow, io, time::Duration};
use tracing::debug;

/// Something that can run a selection of tests and report their outcomes.
///
/// Runs are strictly sequential: a run never starts before the previous one has completed.
pub trait TestTool {
    /// Runs the tests picked out by `selectors` and returns their outcomes. An empty selector
    /// list runs everything.
    fn run(&mut self, selectors: &[String]) -> Result<ResultMap, TestToolError>;

    /// Lists the tests picked out by `selectors` without running them, in identifier order.
    fn collect(&mut self, selectors: &[String]) -> Result<Vec<TestId>, TestToolError>;

    /// Returns a command line which runs only `test` and exits non-zero if it does not pass.
    ///
    /// This is used as the oracle for bisection.
    fn bisect_command(&self, test: &TestId) -> Vec<String>;
}

/// Options for letting the test tool fan tests out across its own worker processes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParallelOptions {
    /// The number of worker processes.
    pub jobs: usize,

    /// The per-test timeout enforced by the test tool.
    pub process_timeout: Duration,
}

/// Describes how to invoke the test tool.
#[derive(Clone, Debug)]
pub struct ToolCommand {
    /// The program to run.
    pub program: String,

    /// Arguments passed before everything else.
    pub base_args: Vec<String>,

    /// The flag which makes the tool print one record per test.
    pub verbose_arg: String,

    /// The flag which makes the tool list tests instead of running them.
    pub collect_arg: String,
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self {
            program: "nosetests".to_owned(),
            base_args: Vec::new(),
            verbose_arg: "-v".to_owned(),
            collect_arg: "--collect-only".to_owned(),
        }
    }
}

/// The production [`TestTool`]: a nose-compatible test runner.
#[derive(Clone, Debug)]
pub struct NoseTool {
    command: ToolCommand,
    dir: Utf8PathBuf,
    parallel: Option<ParallelOptions>,
    parser_options: ParserOptions,
}

impl NoseTool {
    /// Creates a new `NoseTool` which runs `command` inside `dir`.
    pub fn new(command: ToolCommand, dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            command,
            dir: dir.into(),
            parallel: None,
            parser_options: ParserOptions::default(),
        }
    }

    /// Enables parallel mode in the test tool.
    pub fn set_parallel(&mut self, parallel: Option<ParallelOptions>) -> &mut Self {
        self.parallel = parallel;
        self
    }

    /// Sets the options used to parse the tool's output.
    pub fn set_parser_options(&mut self, parser_options: ParserOptions) -> &mut Self {
        self.parser_options = parser_options;
        self
    }

    fn args<'a>(&'a self, mode_arg: &'a str, selectors: &'a [String]) -> Vec<Cow<'a, str>> {
        let mut args: Vec<Cow<'a, str>> = self
            .command
            .base_args
            .iter()
            .map(|arg| Cow::Borrowed(arg.as_str()))
            .collect();
        args.push(Cow::Borrowed(&self.command.verbose_arg));
        if !mode_arg.is_empty() {
            args.push(Cow::Borrowed(mode_arg));
        }
        if let Some(parallel) = &self.parallel {
            args.push(Cow::Owned(format!("--processes={}", parallel.jobs)));
            args.push(Cow::Owned(format!(
                "--process-timeout={}",
                parallel.process_timeout.as_secs()
            )));
        }
        args.extend(selectors.iter().map(|s| Cow::Borrowed(s.as_str())));
        args
    }

    fn run_impl(
        &self,
        mode_arg: &str,
        selectors: &[String],
        echo_level: EchoLevel,
    ) -> Result<ResultMap, TestToolError> {
        let args = self.args(mode_arg, selectors);
        let command = display_command(&self.command.program, &args);
        debug!("executing `{command}` in {}", self.dir);

        // The tool reports on stderr. Swap the streams so the reader sees stderr, and the tool's
        // stdout ends up on our stderr.
        let expression = duct::cmd(self.command.program.as_str(), args.iter().map(|a| &**a))
            .dir(self.dir.as_std_path())
            .stdout_stderr_swap()
            .unchecked();
        let reader = expression.reader().map_err(|err| TestToolError::Exec {
            command: command.clone(),
            err,
        })?;

        let options = ParserOptions {
            echo_level,
            ..self.parser_options.clone()
        };
        let results = OutcomeParser::new(options, io::stderr())
            .parse_reader(io::BufReader::new(&reader))
            .map_err(|err| TestToolError::Read {
                command: command.clone(),
                err,
            })?;

        match reader.try_wait() {
            Ok(Some(output)) => debug!("`{command}` exited with {}", output.status),
            Ok(None) => debug!("`{command}` is still running after its output closed"),
            Err(error) => debug!("failed to wait for `{command}`: {error}"),
        }

        Ok(results)
    }
}

impl TestTool for NoseTool {
    fn run(&mut self, selectors: &[String]) -> Result<ResultMap, TestToolError> {
        self.run_impl("", selectors, self.parser_options.echo_level)
    }

    fn collect(&mut self, selectors: &[String]) -> Result<Vec<TestId>, TestToolError> {
        let results = self.run_impl(&self.command.collect_arg, selectors, EchoLevel::Silent)?;
        Ok(results.iter().map(|(test, _)| test.clone()).collect())
    }

    fn bisect_command(&self, test: &TestId) -> Vec<String> {
        std::iter::once(self.command.program.clone())
            .chain(self.command.base_args.iter().cloned())
            .chain([self.command.verbose_arg.clone(), test.to_string()])
            .collect()
    }
}

pub(crate) fn display_command(program: &str, args: &[impl AsRef<str>]) -> String {
    shell_words::join(std::iter::once(program).chain(args.iter().map(|a| a.as_ref())))
}
