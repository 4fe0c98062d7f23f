//! Integration Tests for the Waitroom CLI
//!
//! Each test drives the real binary against a SQLite file in a temporary
//! directory, so queue state carries over between invocations.

use anyhow::{ensure, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// A database shared by several CLI invocations
struct TestDb {
    #[allow(dead_code)]
    dir: TempDir,
    path: PathBuf,
}

impl TestDb {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("queue.db");
        Ok(Self { dir, path })
    }

    /// Run the CLI and parse its stdout as JSON
    fn run(&self, args: &[&str]) -> Result<Value> {
        let output = self.command(args).output()?;
        ensure!(
            output.status.success(),
            "waitroom {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Run the CLI expecting a non-zero exit
    fn run_failing(&self, args: &[&str]) -> Result<String> {
        let output = self.command(args).output()?;
        ensure!(!output.status.success(), "waitroom {:?} unexpectedly succeeded", args);
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_waitroom"));
        cmd.arg("--db").arg(&self.path).args(args).env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn test_queue_persists_between_runs() -> Result<()> {
    let db = TestDb::new()?;

    for (user, expected_rank) in [("10", 1), ("20", 2), ("30", 3)] {
        let out = db.run(&["register", user])?;
        assert_eq!(out["rank"], expected_rank);
    }

    let out = db.run(&["admit", "2"])?;
    assert_eq!(out["admitted"], 2);

    assert_eq!(db.run(&["rank", "30"])?["rank"], 1);
    assert_eq!(db.run(&["rank", "10"])?["rank"], -1);
    assert_eq!(db.run(&["status", "20"])?["admitted"], true);
    assert_eq!(db.run(&["status", "30"])?["admitted"], false);

    Ok(())
}

#[test]
fn test_duplicate_registration_fails() -> Result<()> {
    let db = TestDb::new()?;
    db.run(&["register", "5", "--queue", "concert"])?;

    let stderr = db.run_failing(&["register", "5", "--queue", "concert"])?;
    assert!(stderr.contains("already registered"), "stderr was: {}", stderr);

    // Same user, different queue
    assert_eq!(db.run(&["register", "5"])?["rank"], 1);

    Ok(())
}

#[test]
fn test_token_round_trip() -> Result<()> {
    let db = TestDb::new()?;
    db.run(&["register", "42"])?;
    db.run(&["admit", "1"])?;

    let out = db.run(&["token", "42"])?;
    let token = out["token"].as_str().unwrap_or_default().to_string();
    assert_eq!(token, "cbd7a411a4a151308aa4690d13440df06b97d8a156fa822880c4a11f54ccb34f");

    assert_eq!(db.run(&["status", "42", "--token", &token])?["admitted"], true);
    db.run_failing(&["status", "42", "--token", "0000"])?;

    Ok(())
}

#[test]
fn test_cycle_admits_every_queue() -> Result<()> {
    let db = TestDb::new()?;
    for user in 1..=4 {
        db.run(&["register", &user.to_string(), "-q", "alpha"])?;
    }
    db.run(&["register", "1", "-q", "beta"])?;

    let mut queues: Vec<String> = serde_json::from_value(db.run(&["queues"])?["queues"].clone())?;
    queues.sort();
    assert_eq!(queues, vec!["alpha", "beta"]);

    let out = db.run(&["cycle", "--batch-size", "3"])?;
    assert_eq!(out["queues_scanned"], 2);
    assert_eq!(out["admitted"], 4);

    assert_eq!(db.run(&["rank", "4", "-q", "alpha"])?["rank"], 1);
    assert_eq!(db.run(&["queues"])?["queues"], serde_json::json!(["alpha"]));

    Ok(())
}
