// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::NO_HEADING_TARGET;
use regdetect_runner::{errors::*, exit_codes::RegdetectExitCode};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders. Errors are meant to be printed with
// display_to_stderr, which also prints the chain of causes.

/// An error that regdetect knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("commit range parse error")]
    CommitRangeParseError {
        #[from]
        err: CommitRangeParseError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("unknown subset")]
    UnknownSubset {
        #[from]
        err: UnknownSubsetError,
    },
    #[error("run failed")]
    RunError {
        #[from]
        err: RunError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CommitRangeParseError { .. }
            | Self::ConfigParseError { .. }
            | Self::UnknownSubset { .. } => RegdetectExitCode::SETUP_ERROR,
            Self::RunError { err } => match err {
                RunError::Checkout { .. } | RunError::Bisect { .. } => {
                    RegdetectExitCode::VCS_FAILED
                }
                RunError::TestTool { .. } => RegdetectExitCode::TEST_TOOL_FAILED,
                RunError::WriteOutput { .. } => RegdetectExitCode::WRITE_OUTPUT_ERROR,
            },
        }
    }

    /// Displays this error to stderr, followed by its causes.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::CommitRangeParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ConfigParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::UnknownSubset { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunError { err } => {
                error!("{err}");
                err.source()
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
