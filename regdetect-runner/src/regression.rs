// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comparing a reference run against a candidate run.

use crate::outcome::{ResultMap, TestId};
use std::collections::BTreeSet;

/// Returns the tests that passed in `reference` but do not pass in `candidate`.
///
/// A warned pass in the candidate counts as not passing.
///
/// # Panics
///
/// Panics if a test in `reference` is missing from `candidate`. Both runs are expected to cover
/// the same selection of tests, so a missing test means the runs were set up inconsistently.
pub fn regressions(reference: &ResultMap, candidate: &ResultMap) -> BTreeSet<TestId> {
    let mut regressed = BTreeSet::new();
    for (test, reference_outcome) in reference {
        let candidate_outcome = candidate.get(test).unwrap_or_else(|| {
            panic!("test {test} ran at the reference revision but not at the candidate revision")
        });
        if reference_outcome.is_passed() && !candidate_outcome.is_passed() {
            regressed.insert(test.clone());
        }
    }
    regressed
}
