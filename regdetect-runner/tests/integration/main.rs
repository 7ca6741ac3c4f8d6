// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod config;
#[cfg(unix)]
mod git;
#[cfg(unix)]
mod nose_tool;
