// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for splitting the test collection across several CI jobs.
//!
//! A slice is either a count-based shard of the full collection, or a named subset whose
//! selector arguments come from the config.

use crate::{errors::TestSliceParseError, outcome::TestId};
use std::{fmt, str::FromStr};

/// The name of the environment variable used to pick a slice.
pub const SLICE_ENV: &str = "REGDETECT_SLICE";

/// A part of the test collection to run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestSlice {
    /// Run every `total_shards`-th test of the sorted collection, starting from `shard`.
    Count {
        /// The shard this is in, counting up from 1.
        shard: u64,

        /// The total number of shards.
        total_shards: u64,
    },

    /// Run a subset defined in the config, such as `core` or `download`.
    Subset(String),
}

impl TestSlice {
    /// Returns the tests in `collection` that belong to this shard, preserving order.
    ///
    /// Returns `None` for named subsets, which are selected by the test tool instead.
    pub fn select<'a>(&self, collection: &'a [TestId]) -> Option<Vec<&'a TestId>> {
        match self {
            TestSlice::Count {
                shard,
                total_shards,
            } => {
                let mut partitioner = CountPartitioner::new(*shard, *total_shards);
                Some(
                    collection
                        .iter()
                        .filter(|_| partitioner.test_matches())
                        .collect(),
                )
            }
            TestSlice::Subset(_) => None,
        }
    }
}

impl FromStr for TestSlice {
    type Err = TestSliceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            let (shard, total_shards) = parse_shards(s, "K/N")?;
            Ok(TestSlice::Count {
                shard,
                total_shards,
            })
        } else if !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            Ok(TestSlice::Subset(s.to_owned()))
        } else {
            Err(TestSliceParseError::new(
                None,
                format!("test slice '{s}' must be either K/N or the name of a test subset"),
            ))
        }
    }
}

impl fmt::Display for TestSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestSlice::Count {
                shard,
                total_shards,
            } => write!(f, "{shard}/{total_shards}"),
            TestSlice::Subset(name) => f.pad(name),
        }
    }
}

fn parse_shards(
    input: &str,
    expected_format: &'static str,
) -> Result<(u64, u64), TestSliceParseError> {
    let (shard_str, total_shards_str) = input.split_once('/').ok_or_else(|| {
        TestSliceParseError::new(
            Some(expected_format),
            format!("expected input '{input}' to be in the format K/N"),
        )
    })?;

    let shard: u64 = shard_str.parse().map_err(|err| {
        TestSliceParseError::new(
            Some(expected_format),
            format!("failed to parse shard '{shard_str}' as u64: {err}"),
        )
    })?;

    let total_shards: u64 = total_shards_str.parse().map_err(|err| {
        TestSliceParseError::new(
            Some(expected_format),
            format!("failed to parse total_shards '{total_shards_str}' as u64: {err}"),
        )
    })?;

    if !(1..=total_shards).contains(&shard) {
        return Err(TestSliceParseError::new(
            Some(expected_format),
            format!(
                "shard {shard} must be a number between 1 and total shards {total_shards}, inclusive"
            ),
        ));
    }

    Ok((shard, total_shards))
}

#[derive(Clone, Debug)]
struct CountPartitioner {
    shard_minus_one: u64,
    total_shards: u64,
    curr: u64,
}

impl CountPartitioner {
    fn new(shard: u64, total_shards: u64) -> Self {
        Self {
            shard_minus_one: shard - 1,
            total_shards,
            curr: 0,
        }
    }

    fn test_matches(&mut self) -> bool {
        let matches = self.curr == self.shard_minus_one;
        self.curr = (self.curr + 1) % self.total_shards;
        matches
    }
}
