// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by regdetect.

use crate::{outcome::TestId, vcs::Revision};
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{borrow::Cow, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error(
    "failed to parse regdetect config{}",
    .config_file.as_ref().map(|f| format!(" at `{f}`")).unwrap_or_default()
)]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self { config_file, kind }
    }

    /// Returns the config file that failed to parse, if one was involved.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<ConfigError>),

    /// A value was out of its permitted range.
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// The key that was invalid.
        key: &'static str,

        /// A description of the problem.
        message: String,
    },
}

/// An error returned while parsing a [`TestId`] from a string.
#[derive(Clone, Debug, Error)]
#[error("invalid test identifier `{input}`: {message}")]
pub struct TestIdParseError {
    input: String,
    message: &'static str,
}

impl TestIdParseError {
    pub(crate) fn new(input: impl Into<String>, message: &'static str) -> Self {
        Self {
            input: input.into(),
            message,
        }
    }
}

/// A single record in the test tool's output could not be understood.
///
/// These are never fatal: the record is logged and skipped.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordParseError {
    /// The record had fewer whitespace-separated tokens than a well-formed record.
    #[error("expected at least 4 tokens, found {count}: {record:?}")]
    TooFewTokens {
        /// The number of tokens found.
        count: usize,

        /// The raw record.
        record: String,
    },

    /// The dotted test path did not have exactly three segments.
    #[error("test path `{path}` does not have exactly 3 dotted segments")]
    BadTestPath {
        /// The path as it appeared in the record.
        path: String,
    },

    /// The trailing status word was not one of `ok`, `FAIL` or `ERROR`.
    #[error("unknown test status `{status}`")]
    UnknownStatus {
        /// The unrecognized status word.
        status: String,
    },
}

/// An error that occurs while parsing a [`TestSlice`](crate::slice::TestSlice) input.
#[derive(Clone, Debug, Error)]
pub struct TestSliceParseError {
    expected_format: Option<&'static str>,
    message: Cow<'static, str>,
}

impl TestSliceParseError {
    pub(crate) fn new(
        expected_format: Option<&'static str>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            expected_format,
            message: message.into(),
        }
    }
}

impl fmt::Display for TestSliceParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expected_format {
            Some(format) => {
                write!(
                    f,
                    "test slice must be in the format \"{}\":\n{}",
                    format, self.message
                )
            }
            None => write!(f, "{}", self.message),
        }
    }
}

/// A named test subset was requested but is not defined in the config.
#[derive(Clone, Debug, Error)]
#[error("test subset `{name}` not found (known subsets: {})", .known.join(", "))]
pub struct UnknownSubsetError {
    name: String,
    known: Vec<String>,
}

impl UnknownSubsetError {
    pub(crate) fn new(
        name: impl Into<String>,
        known: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut known: Vec<_> = known.into_iter().map(|s| s.into()).collect();
        known.sort_unstable();
        Self {
            name: name.into(),
            known,
        }
    }
}

/// A commit range was not in the form `reference...candidate`.
#[derive(Clone, Debug, Error)]
#[error("commit range `{input}` must be in the format \"REFERENCE...CANDIDATE\"")]
pub struct CommitRangeParseError {
    input: String,
}

impl CommitRangeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while running a version control command.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The command could not be started.
    #[error("failed to execute `{command}`")]
    Exec {
        /// The command that was run.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The command ran but exited unsuccessfully.
    #[error("`{command}` failed with {}", DisplayExitCode(.exit_code))]
    Failed {
        /// The command that was run.
        command: String,

        /// The exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
    },
}

/// An error that occurred while running the test tool.
#[derive(Debug, Error)]
pub enum TestToolError {
    /// The test tool could not be started.
    #[error("failed to execute test tool `{command}`")]
    Exec {
        /// The command that was run.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Reading the test tool's output failed.
    #[error("failed to read output of test tool `{command}`")]
    Read {
        /// The command that was run.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

/// An error that aborted a regression detection run.
///
/// Every variant is fatal. The working tree is put back on the candidate revision before this is
/// returned, if at all possible.
#[derive(Debug, Error)]
pub enum RunError {
    /// Checking out a revision failed.
    #[error("failed to check out `{revision}`")]
    Checkout {
        /// The revision that could not be checked out.
        revision: Revision,

        /// The underlying error.
        #[source]
        err: VcsError,
    },

    /// Running the test tool failed.
    #[error("failed to run tests")]
    TestTool {
        /// The underlying error.
        #[from]
        err: TestToolError,
    },

    /// Bisecting a regression failed.
    #[error("failed to bisect `{test}`")]
    Bisect {
        /// The test being bisected.
        test: TestId,

        /// The underlying error.
        #[source]
        err: VcsError,
    },

    /// Writing the report failed.
    #[error("failed to write report")]
    WriteOutput {
        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        Self::WriteOutput { err }
    }
}

struct DisplayExitCode<'a>(&'a Option<i32>);

impl fmt::Display for DisplayExitCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0 {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "no exit code (terminated by signal)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vcs_failed_display() {
        let err = VcsError::Failed {
            command: "git checkout --quiet master".to_owned(),
            exit_code: Some(128),
        };
        assert_eq!(
            err.to_string(),
            "`git checkout --quiet master` failed with exit code 128"
        );

        let err = VcsError::Failed {
            command: "git bisect reset".to_owned(),
            exit_code: None,
        };
        assert_eq!(
            err.to_string(),
            "`git bisect reset` failed with no exit code (terminated by signal)"
        );
    }

    #[test]
    fn unknown_subset_sorts_known() {
        let err = UnknownSubsetError::new("nightly", ["download", "core"]);
        assert_eq!(
            err.to_string(),
            "test subset `nightly` not found (known subsets: core, download)"
        );
    }
}
