use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::{TempDir, tempdir};

fn script(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).expect("write script");
    path
}

fn novascript() -> Command {
    let mut cmd = Command::cargo_bin("novascript").expect("binary exists");
    cmd.arg("--no-color");
    cmd
}

#[test]
fn parse_dumps_json_blocks() {
    let dir = tempdir().expect("create temp dir");
    let path = script(&dir, "a.nova", "[label = entry]<| show() |>\nhello\n");

    novascript()
        .arg("parse")
        .arg("--json")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"LazyExecution\""))
        .stdout(predicate::str::contains("\"label\": \"entry\""))
        .stdout(predicate::str::contains("\"content\": \"hello\""));
}

#[test]
fn bare_file_argument_means_parse() {
    let dir = tempdir().expect("create temp dir");
    let path = script(&dir, "a.nova", "hello\n");

    novascript()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Text"));
}

#[test]
fn check_reports_unterminated_block() {
    let dir = tempdir().expect("create temp dir");
    let good = script(&dir, "good.nova", "<| ok() |>\n");
    let bad = script(&dir, "bad.nova", "text\n<| never_closed()\n");

    novascript()
        .arg("check")
        .arg(&good)
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unterminated execution block"))
        .stderr(predicate::str::contains("UnterminatedBlock"))
        .stderr(predicate::str::contains("good.nova parsed successfully"));
}

#[test]
fn check_missing_file_fails() {
    let dir = tempdir().expect("create temp dir");

    novascript()
        .arg("check")
        .arg(dir.path().join("missing.nova"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn fmt_renders_blocks_back() {
    let dir = tempdir().expect("create temp dir");
    let path = script(&dir, "a.nova", "\n  @ [flag] <| x |>\nA\n\n\nB\n\n");

    novascript()
        .arg("fmt")
        .arg(&path)
        .assert()
        .success()
        .stdout("@[flag]<| x |>\nA\n\nB\n");
}

#[test]
fn strip_prints_dialogue_text_only() {
    let dir = tempdir().expect("create temp dir");
    let path = script(
        &dir,
        "a.nova",
        "@<| label('start') |>\nA\nB\n\n<| bg() |>\nC\n",
    );

    novascript()
        .arg("strip")
        .arg(&path)
        .assert()
        .success()
        .stdout("A\nB\n\nC\n");
}

#[test]
fn fixture_suite_passes() {
    novascript()
        .arg("test")
        .arg("tests/scripts")
        .assert()
        .success()
        .stderr(predicate::str::contains("test result: ok"));
}

#[test]
fn fixture_categories_can_be_filtered() {
    novascript()
        .arg("test")
        .arg("tests/scripts")
        .arg("-c")
        .arg("errors")
        .assert()
        .success()
        .stderr(predicate::str::contains("errors"))
        .stderr(predicate::str::contains("5 passed"));
}

#[test]
fn failing_fixture_is_reported() {
    let dir = tempdir().expect("create temp dir");
    script(
        &dir,
        "wrong.test.nova",
        "---\ndescription = \"wrong kind\"\nexpect_error = \"TrailingContent\"\n---\n<| open\n",
    );

    novascript()
        .arg("test")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAIL"))
        .stderr(predicate::str::contains("expected TrailingContent error, got UnterminatedBlock"));
}
