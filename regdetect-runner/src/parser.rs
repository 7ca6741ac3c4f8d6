// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing the test tool's verbose output into a [`ResultMap`].
//!
//! With `-v`, the test tool reports one record per test on its diagnostic stream:
//!
//! ```text
//! test_opengraph (test.test_InfoExtractor.TestInfoExtractor) ... ok
//! test_download (test.test_download.TestDownload) ... [debug] fetching page
//! ERROR
//! ```
//!
//! A record starts with `test_` and may continue over several lines until the next record
//! starts. The record list ends at the first separator line, after which the tool prints
//! tracebacks and a summary that are not test data.

use crate::{
    errors::RecordParseError,
    outcome::{Outcome, ResultMap, TestId},
};
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

/// Every record line starts with this prefix.
const RECORD_PREFIX: &str = "test_";

/// Lines starting with either of these end the record list.
const TERMINAL_MARKERS: [&str; 2] = ["===========", "--------------"];

/// The warning marker used if none is configured.
pub const DEFAULT_WARNING_MARKER: &str = "WARNING:";

/// How much of the raw test tool output to echo while parsing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum EchoLevel {
    /// Echo nothing.
    Silent,

    /// Echo each line of the record list as it is parsed.
    #[default]
    Records,

    /// Also echo everything after the record list, such as tracebacks and the summary.
    Full,
}

impl EchoLevel {
    /// Converts a numeric verbosity (0, 1, 2) into an echo level. Levels above 2 are treated as 2.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Silent,
            1 => Self::Records,
            _ => Self::Full,
        }
    }
}

/// Options controlling an [`OutcomeParser`].
#[derive(Clone, Debug)]
pub struct ParserOptions {
    /// How much raw output to echo.
    pub echo_level: EchoLevel,

    /// Substrings which, found anywhere in a passing record, mark it as [`Outcome::Warned`].
    pub warning_markers: Vec<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            echo_level: EchoLevel::default(),
            warning_markers: vec![DEFAULT_WARNING_MARKER.to_owned()],
        }
    }
}

#[derive(Debug)]
enum ParserState {
    /// No record has started yet.
    Idle,

    /// A record is being accumulated. It is parsed when the next record starts, when the
    /// record list ends, or when the input ends.
    Accumulating(String),

    /// A terminal marker was seen. The remaining lines are not test data.
    Finished,
}

/// A line-at-a-time parser for the test tool's verbose output.
///
/// Malformed records never cause an error: they are logged and skipped, so one corrupt record
/// cannot abort a run.
#[derive(Debug)]
pub struct OutcomeParser<W> {
    options: ParserOptions,
    state: ParserState,
    outcomes: Vec<(TestId, Outcome)>,
    echo: W,
}

impl<W: Write> OutcomeParser<W> {
    /// Creates a new parser which echoes raw output to `echo` according to `options`.
    pub fn new(options: ParserOptions, echo: W) -> Self {
        Self {
            options,
            state: ParserState::Idle,
            outcomes: Vec::new(),
            echo,
        }
    }

    /// Returns true once the end of the record list has been seen.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ParserState::Finished)
    }

    /// Feeds a single line, without its trailing newline, into the parser.
    pub fn feed_line(&mut self, line: &str) {
        if self.is_finished() {
            if self.options.echo_level >= EchoLevel::Full {
                self.echo_line(line);
            }
            return;
        }

        if self.options.echo_level >= EchoLevel::Records {
            self.echo_line(line);
        }

        if TERMINAL_MARKERS
            .iter()
            .any(|marker| line.starts_with(marker))
        {
            self.flush();
            self.state = ParserState::Finished;
            return;
        }

        if line.starts_with(RECORD_PREFIX) {
            self.flush();
            self.state = ParserState::Accumulating(line.to_owned());
        } else if let ParserState::Accumulating(record) = &mut self.state {
            record.push('\n');
            record.push_str(line);
        }
        // Lines before the first record (e.g. banners) are ignored.
    }

    /// Reads `reader` to the end, feeding every line into the parser, then returns the results.
    ///
    /// The reader is always drained, even after the record list ends, so that a child process
    /// writing into a pipe never blocks. Invalid UTF-8 is replaced rather than rejected.
    pub fn parse_reader(mut self, mut reader: impl BufRead) -> io::Result<ResultMap> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            self.feed_line(line);
        }
        Ok(self.finish())
    }

    /// Flushes any record still being accumulated and returns the results.
    pub fn finish(mut self) -> ResultMap {
        self.flush();
        // Later records for the same test win.
        self.outcomes.into_iter().collect()
    }

    fn flush(&mut self) {
        let ParserState::Accumulating(record) =
            std::mem::replace(&mut self.state, ParserState::Idle)
        else {
            return;
        };

        match parse_record(&record, &self.options.warning_markers) {
            Ok((test, outcome)) => {
                debug!("parsed {test}: {outcome}");
                self.outcomes.push((test, outcome));
            }
            Err(error) => {
                warn!("skipping unparseable test record: {error}");
            }
        }
    }

    fn echo_line(&mut self, line: &str) {
        if let Err(error) = writeln!(self.echo, "{line}") {
            debug!("failed to echo test tool output: {error}");
        }
    }
}

/// Parses a single, possibly multi-line, record into a test identifier and outcome.
///
/// A record looks like `test_x (package.module.Class) ... [more output] STATUS`.
pub fn parse_record(
    record: &str,
    warning_markers: &[String],
) -> Result<(TestId, Outcome), RecordParseError> {
    let tokens: Vec<_> = record.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(RecordParseError::TooFewTokens {
            count: tokens.len(),
            record: record.to_owned(),
        });
    }

    let method = tokens[0];
    let path = strip_path_delimiters(tokens[1]);
    let segments: Vec<_> = path.split('.').collect();
    let [package, module, class] = segments[..] else {
        return Err(RecordParseError::BadTestPath {
            path: path.to_owned(),
        });
    };
    if [package, module, class].iter().any(|s| s.is_empty()) {
        return Err(RecordParseError::BadTestPath {
            path: path.to_owned(),
        });
    }

    // tokens has at least 4 elements.
    let status = tokens[tokens.len() - 1];
    let outcome =
        Outcome::from_status_word(status).ok_or_else(|| RecordParseError::UnknownStatus {
            status: status.to_owned(),
        })?;

    let outcome = if outcome.is_passed()
        && warning_markers
            .iter()
            .any(|marker| record.contains(marker.as_str()))
    {
        Outcome::Warned
    } else {
        outcome
    };

    Ok((TestId::new(package, module, class, method), outcome))
}

/// Accepts both `(a.b.C)` and `a.b.C:`.
fn strip_path_delimiters(token: &str) -> &str {
    if let Some(inner) = token
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        inner
    } else if let Some(inner) = token.strip_suffix(':') {
        inner
    } else {
        token
    }
}
