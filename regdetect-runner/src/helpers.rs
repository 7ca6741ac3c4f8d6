// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Utilities for pluralizing various words based on count or plurality.
pub(crate) mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub(crate) fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "has" if `count` is 1, otherwise "have".
    pub(crate) fn has_str(count: usize) -> &'static str {
        if count == 1 { "has" } else { "have" }
    }

    /// Returns "regression" if `count` is 1, otherwise "regressions".
    pub(crate) fn regressions_str(count: usize) -> &'static str {
        if count == 1 {
            "regression"
        } else {
            "regressions"
        }
    }
}
