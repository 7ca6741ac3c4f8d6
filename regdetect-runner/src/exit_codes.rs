// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exit codes returned by the `regdetect` binary.

/// Documented exit codes for `regdetect`.
///
/// Confirmed regressions and fatal errors both exit non-zero. Automation that needs to tell them
/// apart can use the specific codes below.
pub enum RegdetectExitCode {}

impl RegdetectExitCode {
    /// Nothing regressed: either nothing failed, every failure was pre-existing, or every
    /// regression turned out to be a flake.
    pub const OK: i32 = 0;

    /// One or more confirmed regressions remain.
    pub const REGRESSIONS_FOUND: i32 = 1;

    /// A user issue happened while setting up a run, such as an invalid config or slice.
    pub const SETUP_ERROR: i32 = 96;

    /// A version control operation (checkout or bisection) failed.
    pub const VCS_FAILED: i32 = 97;

    /// The test tool could not be run.
    pub const TEST_TOOL_FAILED: i32 = 98;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
