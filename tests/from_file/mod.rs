//! Integration tests running the crate binary in dry-run mode against the files in `tests/data/`: Test the full E2E path.

use std::path::PathBuf;
use std::process::{Command, Output};

#[test]
fn dry_run_logs_every_valid_record() {
    let output = run_binary(&[
        "--config",
        fixture_path("client.properties").to_str().unwrap(),
        "--data-dir",
        fixture_path("").to_str().unwrap(),
        "--dry-run",
    ]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "binary exited with non-zero status.\nstderr: {stderr}"
    );

    let sent = stderr.lines().filter(|line| line.contains("sent event")).count();
    let skipped = stderr
        .lines()
        .filter(|line| line.contains("error parsing CSV record, skipping record"))
        .count();
    assert_eq!(sent, 10, "stderr: {stderr}");
    assert_eq!(skipped, 4, "stderr: {stderr}");
}

#[test]
fn skipped_lines_name_their_line_in_the_file() {
    let output = run_binary(&[
        "--config",
        fixture_path("client.properties").to_str().unwrap(),
        "--data-dir",
        fixture_path("").to_str().unwrap(),
        "--dry-run",
    ]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    let skipped: Vec<serde_json::Value> = stderr
        .lines()
        .filter(|line| line.contains("skipping record"))
        .map(|line| serde_json::from_str(line).expect("log line is not JSON"))
        .collect();

    // the blank movie id sits on line 4 of movies_small.csv, the header being line 1
    let movie = skipped
        .iter()
        .find(|entry| entry["fields"]["error"].as_str().unwrap_or_default().contains("movieId"))
        .unwrap_or_else(|| panic!("no skipped movie line in\n{stderr}"));
    assert_eq!(movie["fields"]["line"], 4);
    assert_eq!(movie["span"]["kind"], "movies");
}

#[test]
fn missing_config_file_fails_the_run() {
    let output = run_binary(&[
        "--config",
        fixture_path("no_such.properties").to_str().unwrap(),
        "--data-dir",
        fixture_path("").to_str().unwrap(),
        "--dry-run",
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no_such.properties"));
}

#[test]
fn missing_dataset_fails_the_run() {
    let output = run_binary(&[
        "--config",
        fixture_path("client.properties").to_str().unwrap(),
        "--data-dir",
        fixture_path("").to_str().unwrap(),
        "--dataset",
        "large",
        "--dry-run",
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("movies.csv"));
}

fn run_binary(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_movie-events-rs"))
        .args(args)
        .env("RUST_LOG", "info")
        .env("LOG_FORMAT", "json")
        .env_remove("MOVIE_EVENTS_CONFIG")
        .output()
        .expect("failed to execute binary")
}

/// Returns the absolute path to a test fixture file in `tests/data/`.
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}
