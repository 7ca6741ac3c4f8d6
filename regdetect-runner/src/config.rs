// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for regdetect.
//!
//! The embedded default config is layered under `.config/regdetect.toml` in the repository root,
//! or under a file given explicitly.

use crate::{
    convergence::ConvergencePolicy,
    errors::{ConfigParseError, ConfigParseErrorKind, UnknownSubsetError},
    parser::{EchoLevel, ParserOptions},
    test_tool::{ParallelOptions, ToolCommand},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};
use tracing::warn;

/// Overall configuration for regdetect.
#[derive(Clone, Debug)]
pub struct RegdetectConfig {
    repo_root: Utf8PathBuf,
    inner: RegdetectConfigImpl,
}

impl RegdetectConfig {
    /// The default location of the config within the repository: `.config/regdetect.toml`.
    pub const CONFIG_PATH: &'static str = ".config/regdetect.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the repository root, or from `config_file` if given.
    ///
    /// A missing `.config/regdetect.toml` is fine; a missing explicit `config_file` is an error.
    /// Unknown keys are reported as warnings.
    pub fn from_sources(
        repo_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let repo_root = repo_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = repo_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(Some(config_file.clone()), kind))?;

        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in config file {config_file}: {}",
                unknown.iter().join(", ")
            );
        }

        inner
            .validate()
            .map_err(|kind| ConfigParseError::new(Some(config_file), kind))?;

        Ok(Self { repo_root, inner })
    }

    /// Returns the default config.
    pub fn default_config(repo_root: impl Into<Utf8PathBuf>) -> Result<Self, ConfigParseError> {
        let (inner, _unknown) = Self::build_and_deserialize_config(&Self::make_default_config())
            .map_err(|kind| ConfigParseError::new(None, kind))?;
        Ok(Self {
            repo_root: repo_root.into(),
            inner,
        })
    }

    /// Returns the repository root this config was read for.
    pub fn repo_root(&self) -> &Utf8Path {
        &self.repo_root
    }

    /// Returns how to invoke the test tool.
    pub fn tool_command(&self) -> ToolCommand {
        let tool = &self.inner.tool;
        ToolCommand {
            program: tool.program.clone(),
            base_args: tool.base_args.clone(),
            verbose_arg: tool.verbose_arg.clone(),
            collect_arg: tool.collect_arg.clone(),
        }
    }

    /// Returns parallel mode settings, if parallel mode is enabled.
    pub fn parallel(&self) -> Option<ParallelOptions> {
        self.inner.tool.jobs.map(|jobs| ParallelOptions {
            jobs,
            process_timeout: self.inner.tool.process_timeout,
        })
    }

    /// Returns the per-test timeout used in parallel mode.
    pub fn process_timeout(&self) -> Duration {
        self.inner.tool.process_timeout
    }

    /// Returns options for parsing the test tool's output.
    pub fn parser_options(&self, echo_level: EchoLevel) -> ParserOptions {
        ParserOptions {
            echo_level,
            warning_markers: self.inner.parser.warning_markers.clone(),
        }
    }

    /// Returns the flake-convergence policy.
    pub fn convergence(&self) -> &ConvergencePolicy {
        &self.inner.convergence
    }

    /// Returns the selector arguments for the named subset.
    pub fn subset_args(&self, name: &str) -> Result<&[String], UnknownSubsetError> {
        match self.inner.subsets.get(name) {
            Some(subset) => Ok(&subset.args),
            None => Err(UnknownSubsetError::new(
                name,
                self.inner.subsets.keys().map(|name| name.as_str()),
            )),
        }
    }

    /// Returns true if confirmed regressions should be bisected.
    pub fn bisect(&self) -> bool {
        self.inner.bisect
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(RegdetectConfigImpl, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let config: RegdetectConfigImpl =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RegdetectConfigImpl {
    bisect: bool,
    tool: ToolConfig,
    parser: ParserConfig,
    convergence: ConvergencePolicy,
    #[serde(default)]
    subsets: BTreeMap<String, SubsetConfig>,
}

impl RegdetectConfigImpl {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        if self.tool.program.is_empty() {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "tool.program",
                message: "must not be empty".to_owned(),
            });
        }
        if self.tool.jobs == Some(0) {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "tool.jobs",
                message: "must be at least 1".to_owned(),
            });
        }
        if self.convergence.max_iterations == 0 {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "convergence.iterations",
                message: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ToolConfig {
    program: String,
    #[serde(default)]
    base_args: Vec<String>,
    verbose_arg: String,
    collect_arg: String,
    #[serde(default)]
    jobs: Option<usize>,
    #[serde(with = "humantime_serde")]
    process_timeout: Duration,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ParserConfig {
    warning_markers: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SubsetConfig {
    args: Vec<String>,
}
