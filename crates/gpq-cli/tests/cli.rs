//! End-to-end checks of the CLI surface that need no engine or network.

use assert_cmd::Command;
use predicates::prelude::*;

fn gpq() -> Command {
    Command::cargo_bin("gpq-cli").unwrap()
}

#[test]
fn test_sources_lists_catalog() {
    gpq()
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("overture"))
        .stdout(predicate::str::contains("trusted"));
}

#[test]
fn test_formats_lists_outputs() {
    gpq()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains(".parquet"))
        .stdout(predicate::str::contains("GeoJSON"))
        .stdout(predicate::str::contains("FlatGeobuf"));
}

#[test]
fn test_download_requires_bbox() {
    gpq()
        .args(["download", "--url", "https://example.com/a.parquet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--bbox"));
}

#[cfg(not(feature = "duckdb"))]
#[test]
fn test_download_without_engine_backend_fails_clearly() {
    gpq()
        .args([
            "download",
            "--url",
            "https://example.com/a.parquet",
            "--bbox",
            "0,0,1,1",
            "--output",
            "a.parquet",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("engine backend"));
}
