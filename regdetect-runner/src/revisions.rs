// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Choosing the candidate and reference revisions.

use crate::{errors::CommitRangeParseError, vcs::Revision};

/// The name of the environment variable CI systems use to describe the pushed commit range.
pub const COMMIT_RANGE_ENV: &str = "TRAVIS_COMMIT_RANGE";

/// The branch compared when nothing else is specified.
pub const DEFAULT_BRANCH: &str = "master";

/// The two revisions a run compares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionPair {
    /// The revision under test. The working tree is always left here.
    pub candidate: Revision,

    /// The revision the candidate is compared against.
    pub reference: Revision,
}

impl RevisionPair {
    /// Resolves the revisions to compare.
    ///
    /// In order of preference:
    ///
    /// 1. explicit `candidate` and `reference` revisions;
    /// 2. an explicit `candidate`, compared against its first parent;
    /// 3. a commit range of the form `reference...candidate`;
    /// 4. `master`, compared against `master^`.
    pub fn resolve(
        candidate: Option<&str>,
        reference: Option<&str>,
        commit_range: Option<&str>,
    ) -> Result<Self, CommitRangeParseError> {
        match (candidate, reference) {
            (Some(candidate), Some(reference)) => Ok(Self {
                candidate: Revision::new(candidate),
                reference: Revision::new(reference),
            }),
            (Some(candidate), None) => {
                let candidate = Revision::new(candidate);
                Ok(Self {
                    reference: candidate.parent(),
                    candidate,
                })
            }
            (None, _) => match commit_range {
                Some(range) => Self::from_commit_range(range),
                None => {
                    let candidate = Revision::new(DEFAULT_BRANCH);
                    Ok(Self {
                        reference: candidate.parent(),
                        candidate,
                    })
                }
            },
        }
    }

    /// Parses a commit range of the form `reference...candidate`.
    pub fn from_commit_range(range: &str) -> Result<Self, CommitRangeParseError> {
        match range.split_once("...") {
            Some((reference, candidate))
                if !reference.is_empty() && !candidate.is_empty() && !candidate.contains("...") =>
            {
                Ok(Self {
                    candidate: Revision::new(candidate),
                    reference: Revision::new(reference),
                })
            }
            _ => Err(CommitRangeParseError::new(range)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn pair(candidate: &str, reference: &str) -> RevisionPair {
        RevisionPair {
            candidate: Revision::new(candidate),
            reference: Revision::new(reference),
        }
    }

    #[test_case(Some("v2"), Some("v1"), Some("a...b"), pair("v2", "v1") ; "explicit wins")]
    #[test_case(Some("v2"), None, Some("a...b"), pair("v2", "v2^") ; "candidate only")]
    #[test_case(None, None, Some("6f2b1e0...9ac3d47"), pair("9ac3d47", "6f2b1e0") ; "commit range")]
    #[test_case(None, None, None, pair("master", "master^") ; "defaults")]
    fn resolve(
        candidate: Option<&str>,
        reference: Option<&str>,
        range: Option<&str>,
        expected: RevisionPair,
    ) {
        assert_eq!(
            RevisionPair::resolve(candidate, reference, range).expect("resolves"),
            expected
        );
    }

    #[test_case("abc" ; "no separator")]
    #[test_case("abc..def" ; "two dots")]
    #[test_case("...def" ; "empty reference")]
    #[test_case("abc..." ; "empty candidate")]
    #[test_case("a...b...c" ; "too many parts")]
    fn bad_commit_range(range: &str) {
        RevisionPair::from_commit_range(range).expect_err("range is rejected");
    }
}
