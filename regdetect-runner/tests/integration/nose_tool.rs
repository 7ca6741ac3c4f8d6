// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs `NoseTool` against a shell script which replays recorded test tool output.

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::Result;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use regdetect_runner::{
    outcome::{Outcome, ResultMap, TestId},
    parser::{EchoLevel, ParserOptions},
    test_tool::{NoseTool, ParallelOptions, TestTool, ToolCommand},
};
use std::time::Duration;

fn fixture_path() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/nose-output.txt")
}

/// Writes a stand-in for the test tool which records its arguments, prints noise on stdout, and
/// replays the fixture on stderr. It exits non-zero like a test tool with failures would.
fn fake_tool(dir: &Utf8Path) -> Result<NoseTool> {
    let script = dir.join("fake-nosetests.sh");
    std::fs::write(
        &script,
        format!(
            "printf '%s\\n' \"$@\" > '{dir}/args.txt'\n\
             echo 'this goes to stdout'\n\
             cat '{fixture}' >&2\n\
             exit 1\n",
            fixture = fixture_path(),
        ),
    )?;

    let command = ToolCommand {
        program: "sh".to_owned(),
        base_args: vec![script.into_string()],
        ..ToolCommand::default()
    };
    let mut tool = NoseTool::new(command, dir);
    tool.set_parser_options(ParserOptions {
        echo_level: EchoLevel::Silent,
        ..ParserOptions::default()
    });
    Ok(tool)
}

fn recorded_args(dir: &Utf8Path) -> Result<Vec<String>> {
    let args = std::fs::read_to_string(dir.join("args.txt"))?;
    Ok(args.lines().map(|line| line.to_owned()).collect())
}

fn id(s: &str) -> TestId {
    s.parse().expect("valid test id")
}

#[test]
fn run_parses_streamed_output() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let mut tool = fake_tool(dir.path())?;

    let results = tool.run(&["test/test_utils.py".to_owned()])?;
    let expected: ResultMap = btreemap! {
        id("test.test_InfoExtractor:TestInfoExtractor.test_opengraph") => Outcome::Passed,
        id("test.test_InfoExtractor:TestInfoExtractor.test_html_search_meta") => Outcome::Passed,
        id("test.test_YoutubeDL:TestFormatSelection.test_youtube_format_selection") => Outcome::Failed,
        id("test.test_download:TestDownload.test_download_generic") => Outcome::Warned,
        id("test.test_utils:TestUtil.test_unicode_path") => Outcome::Errored,
    }
    .into_iter()
    .collect();
    assert_eq!(results, expected);

    let args = recorded_args(dir.path())?;
    assert_eq!(args, vec!["-v", "test/test_utils.py"]);
    Ok(())
}

#[test]
fn parallel_args_are_passed() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let mut tool = fake_tool(dir.path())?;
    tool.set_parallel(Some(ParallelOptions {
        jobs: 3,
        process_timeout: Duration::from_secs(60),
    }));

    tool.run(&[])?;
    assert_eq!(
        recorded_args(dir.path())?,
        vec!["-v", "--processes=3", "--process-timeout=60"]
    );
    Ok(())
}

#[test]
fn collect_lists_tests_in_order() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let mut tool = fake_tool(dir.path())?;

    let tests = tool.collect(&[])?;
    assert_eq!(tests.len(), 5);
    assert!(tests.windows(2).all(|pair| pair[0] < pair[1]), "sorted");
    assert_eq!(recorded_args(dir.path())?, vec!["-v", "--collect-only"]);
    Ok(())
}

#[test]
fn missing_program_is_an_error() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let command = ToolCommand {
        program: "regdetect-no-such-test-tool".to_owned(),
        ..ToolCommand::default()
    };
    let mut tool = NoseTool::new(command, dir.path());

    let error = tool.run(&[]).expect_err("spawning a missing program fails");
    assert_eq!(
        error.to_string(),
        "failed to execute test tool `regdetect-no-such-test-tool -v`"
    );
    Ok(())
}
