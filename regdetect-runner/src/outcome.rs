// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test identifiers, outcomes, and the per-run result map.

use crate::errors::TestIdParseError;
use std::{
    collections::{BTreeMap, btree_map},
    fmt,
    str::FromStr,
};

/// The canonical name of a single test case: `package.module:Class.method`.
///
/// This is the form the test tool accepts as a selector, so a `TestId` can be passed straight back
/// to it to re-run exactly one test.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestId(String);

impl TestId {
    /// Builds an identifier from its four components.
    pub fn new(package: &str, module: &str, class: &str, method: &str) -> Self {
        Self(format!("{package}.{module}:{class}.{method}"))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for TestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TestId {
    type Err = TestIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, member) = s
            .split_once(':')
            .ok_or_else(|| TestIdParseError::new(s, "missing ':' separator"))?;
        let path: Vec<_> = path.split('.').collect();
        let [package, module] = path[..] else {
            return Err(TestIdParseError::new(
                s,
                "expected exactly two dotted segments before ':'",
            ));
        };
        let (class, method) = member
            .split_once('.')
            .ok_or_else(|| TestIdParseError::new(s, "expected `Class.method` after ':'"))?;
        if [package, module, class, method].iter().any(|c| c.is_empty()) {
            return Err(TestIdParseError::new(s, "empty component"));
        }
        Ok(Self::new(package, module, class, method))
    }
}

/// The outcome of a single test case in one run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum Outcome {
    /// The test passed cleanly.
    Passed,

    /// The test failed an assertion.
    Failed,

    /// The test raised an unexpected error.
    Errored,

    /// The test passed, but its output carried a warning marker.
    ///
    /// This is not treated as a reliable pass.
    Warned,
}

impl Outcome {
    /// Parses the status word the test tool prints at the end of a record.
    ///
    /// Only `ok`, `FAIL` and `ERROR` are recognized.
    pub fn from_status_word(word: &str) -> Option<Self> {
        match word {
            "ok" => Some(Self::Passed),
            "FAIL" => Some(Self::Failed),
            "ERROR" => Some(Self::Errored),
            _ => None,
        }
    }

    /// Returns true if this is a clean pass.
    pub fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Returns true if the test failed or errored.
    ///
    /// Failures and errors are kept apart for display but are equivalent when comparing runs.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Errored)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.pad("ok"),
            Self::Failed => f.pad("FAIL"),
            Self::Errored => f.pad("ERROR"),
            Self::Warned => f.pad("ok (warning)"),
        }
    }
}

/// The outcomes of every test seen in a single run of the test tool.
///
/// A new map is produced by every run; maps are never updated in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultMap {
    outcomes: BTreeMap<TestId, Outcome>,
}

impl ResultMap {
    /// Returns the outcome of `test`, if it was seen in this run.
    pub fn get(&self, test: &TestId) -> Option<Outcome> {
        self.outcomes.get(test).copied()
    }

    /// Returns true if `test` was seen in this run.
    pub fn contains(&self, test: &TestId) -> bool {
        self.outcomes.contains_key(test)
    }

    /// Returns the number of tests seen.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no tests were seen.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Iterates over tests and their outcomes in identifier order.
    pub fn iter(&self) -> btree_map::Iter<'_, TestId, Outcome> {
        self.outcomes.iter()
    }

    /// Returns every test whose outcome is anything other than a clean pass, in identifier
    /// order.
    pub fn non_passing(&self) -> Vec<TestId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_passed())
            .map(|(test, _)| test.clone())
            .collect()
    }
}

impl FromIterator<(TestId, Outcome)> for ResultMap {
    fn from_iter<I: IntoIterator<Item = (TestId, Outcome)>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ResultMap {
    type Item = (&'a TestId, &'a Outcome);
    type IntoIter = btree_map::Iter<'a, TestId, Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}
