// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loading `.config/regdetect.toml` on top of the default config.

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use regdetect_runner::{
    config::RegdetectConfig,
    errors::ConfigParseErrorKind,
    parser::EchoLevel,
    test_tool::ParallelOptions,
};
use std::time::Duration;

fn write_repo_config(repo_root: &Utf8Path, contents: &str) -> Result<()> {
    let config_dir = repo_root.join(".config");
    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(config_dir.join("regdetect.toml"), contents)?;
    Ok(())
}

#[test]
fn missing_repo_config_uses_defaults() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = RegdetectConfig::from_sources(dir.path(), None)?;
    assert_eq!(config.convergence().max_iterations, 7);
    assert_eq!(config.convergence().cooldown, Duration::from_secs(30));
    assert_eq!(config.tool_command().program, "nosetests");
    assert_eq!(config.repo_root(), dir.path());
    Ok(())
}

#[test]
fn repo_config_overrides_defaults() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    write_repo_config(
        dir.path(),
        indoc! {r#"
            bisect = false

            [tool]
            program = "python"
            base-args = ["-m", "nose"]
            jobs = 4
            process-timeout = "2m"
            no-such-key = true

            [parser]
            warning-markers = ["WARNING:", "Retrying"]

            [convergence]
            iterations = 3
            cooldown = "1m 30s"

            [subsets.network]
            args = ["test/test_http.py"]
        "#},
    )?;

    let config = RegdetectConfig::from_sources(dir.path(), None)?;
    let command = config.tool_command();
    assert_eq!(command.program, "python");
    assert_eq!(command.base_args, vec!["-m", "nose"]);
    assert_eq!(command.verbose_arg, "-v", "unset keys keep their defaults");
    assert_eq!(
        config.parallel(),
        Some(ParallelOptions {
            jobs: 4,
            process_timeout: Duration::from_secs(120),
        })
    );
    assert_eq!(
        config.parser_options(EchoLevel::Full).warning_markers,
        vec!["WARNING:", "Retrying"]
    );

    let policy = config.convergence();
    assert_eq!(policy.max_iterations, 3);
    assert_eq!(policy.cooldown, Duration::from_secs(90));
    assert_eq!(policy.stability_after, 3);
    assert_eq!(policy.stability_below, 5);

    assert_eq!(config.subset_args("network")?, ["test/test_http.py"]);
    assert_eq!(
        config.subset_args("core")?,
        ["--exclude=test_download"],
        "default subsets are still present"
    );
    assert!(!config.bisect());
    Ok(())
}

#[test]
fn explicit_config_file_must_exist() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let missing = dir.path().join("missing.toml");
    let error = RegdetectConfig::from_sources(dir.path(), Some(&missing))
        .expect_err("missing explicit config file fails");
    assert_eq!(error.config_file(), Some(&missing));
    assert!(
        matches!(error.kind(), ConfigParseErrorKind::BuildError(_)),
        "{error:?}"
    );
    Ok(())
}

#[test]
fn invalid_values_are_rejected() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    write_repo_config(dir.path(), "[convergence]\niterations = 0\n")?;
    let error = RegdetectConfig::from_sources(dir.path(), None)
        .expect_err("zero iterations is invalid");
    assert_eq!(
        error.kind().to_string(),
        "invalid value for `convergence.iterations`: must be at least 1"
    );

    write_repo_config(dir.path(), "[convergence]\ncooldown = \"soon\"\n")?;
    let error = RegdetectConfig::from_sources(dir.path(), None)
        .expect_err("unparseable duration is invalid");
    assert!(
        matches!(error.kind(), ConfigParseErrorKind::DeserializeError(_)),
        "{error:?}"
    );
    Ok(())
}
