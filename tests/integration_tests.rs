//! Integration tests for the tgo binary.
//!
//! These run the real executable in a scratch directory and check what a
//! supervisor would see: exit codes and the log file.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a tgo Command
fn tgo() -> Command {
    cargo_bin_cmd!("tgo")
}

/// Scratch directory with a config that keeps the listener off fixed ports.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tgo.toml"), "[agent]\nlisten_port = 0\n").unwrap();
    dir
}

/// A local URL nobody is listening on.
fn dead_coordinator() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_tgo_help() {
        tgo()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("-F"))
            .stdout(predicate::str::contains("--coordinator-url"));
    }

    #[test]
    fn test_tgo_version() {
        tgo()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("tgo"));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        tgo().arg("--bogus").assert().failure();
    }
}

// =============================================================================
// Startup Failures
// =============================================================================

mod startup {
    use super::*;

    #[test]
    fn test_malformed_config_exits_with_startup_code() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tgo.toml"), "[agent\n").unwrap();

        tgo()
            .current_dir(dir.path())
            .assert()
            .code(6)
            .stderr(predicate::str::contains("Failed to parse tgo.toml"));
    }

    #[test]
    fn test_malformed_snapshot_exits_with_startup_code() {
        let dir = workspace();
        fs::write(dir.path().join("uhura_map.json"), "{ nope").unwrap();

        tgo()
            .current_dir(dir.path())
            .assert()
            .code(6)
            .stderr(predicate::str::contains("Failed to parse environment snapshot"));
    }

    #[test]
    fn test_instance_index_out_of_range() {
        let dir = workspace();
        fs::write(
            dir.path().join("uhura_map.json"),
            r#"{"ThisInst": 2, "Instances": [{"InstName": "only", "Apps": []}]}"#,
        )
        .unwrap();

        tgo().current_dir(dir.path()).assert().code(6);
    }
}

// =============================================================================
// Coordinator Failures
// =============================================================================

mod coordinator {
    use super::*;

    #[test]
    fn test_unreachable_coordinator_exits_with_transport_code() {
        let dir = workspace();

        tgo()
            .current_dir(dir.path())
            .args(["--coordinator-url", &dead_coordinator()])
            .assert()
            .code(5);

        let log = fs::read_to_string(dir.path().join("tgo.log")).unwrap();
        assert!(log.contains("assuming test mode"));
        assert!(log.contains("PostStatus returned error"));
    }

    #[test]
    fn test_functional_test_mode_against_unreachable_coordinator() {
        let dir = workspace();

        tgo()
            .current_dir(dir.path())
            .arg("-F")
            .env("TGO_COORDINATOR_URL", dead_coordinator())
            .assert()
            .code(5);
    }

    #[test]
    fn test_log_to_screen_mirrors_the_log() {
        let dir = workspace();

        tgo()
            .current_dir(dir.path())
            .args(["-D", "-d", "--coordinator-url", &dead_coordinator()])
            .assert()
            .code(5)
            .stderr(predicate::str::contains("T G O"));
    }

    #[test]
    fn test_http_500_exits_with_bad_status_code() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let url = rt.block_on(async {
            use axum::{Router, http::StatusCode, routing::post};
            let app = Router::new().route(
                "/status/",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}/", addr)
        });

        let dir = workspace();
        tgo()
            .current_dir(dir.path())
            .args(["--coordinator-url", &url])
            .assert()
            .code(3);

        let log = fs::read_to_string(dir.path().join("tgo.log")).unwrap();
        assert!(log.contains("Bad HTTP response code"));
        drop(rt);
    }
}
