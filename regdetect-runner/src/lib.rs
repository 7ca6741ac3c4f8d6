// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `regdetect`: find tests that started failing between two revisions,
//! weed out the ones that only fail some of the time, and bisect the rest.
//!
//! The flow of a run is:
//!
//! 1. check out the candidate revision and run the selected tests;
//! 2. re-run whatever failed at the reference revision, and keep the tests that used to pass;
//! 3. retry those a few times with a cooldown, dropping flakes and tests that are unreliable at
//!    the reference revision too;
//! 4. report what is left and bisect each test to the commit that broke it.

pub mod config;
pub mod convergence;
pub mod errors;
pub mod exit_codes;
mod helpers;
pub mod orchestrator;
pub mod outcome;
pub mod parser;
pub mod regression;
pub mod reporter;
pub mod revisions;
pub mod slice;
pub mod test_tool;
pub mod vcs;

#[cfg(test)]
mod test_helpers;
