// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `regdetect` command-line interface.
//!
//! The logic lives in `regdetect-runner`. This crate parses arguments, sets up logging and
//! colors, and maps errors to exit codes.

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::RegdetectApp;
#[doc(hidden)]
pub use errors::ExpectedError;
#[doc(hidden)]
pub use output::OutputContext;
