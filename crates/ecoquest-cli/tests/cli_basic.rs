//! Basic CLI E2E tests.
//!
//! Each test runs the built `ecoquest` binary against its own temporary
//! data directory.

use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_ecoquest"))
        .args(args)
        .env("ECOQUEST_DATA_DIR", dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(dir: &TempDir, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn register(dir: &TempDir, name: &str, email: &str) -> String {
    let user = run_json(dir, &["user", "register", name, email]);
    user["id"].as_str().unwrap().to_string()
}

#[test]
fn test_register_and_show_user() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "Ada@Example.com");

    let user = run_json(&dir, &["user", "show", &id]);
    assert_eq!(user["name"], "Ada");
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["total_points"], 0);
}

#[test]
fn test_duplicate_email_fails() {
    let dir = TempDir::new().unwrap();
    register(&dir, "Ada", "ada@example.com");

    let (_, stderr, code) = run_cli(&dir, &["user", "register", "Other", "ada@example.com"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"), "stderr: {stderr}");
}

#[test]
fn test_habit_log_credits_points() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "ada@example.com");

    let entry = run_json(
        &dir,
        &[
            "habit", "log", &id, "Biked to work", "--category", "transport", "--points", "15",
            "--co2", "2.5",
        ],
    );
    assert_eq!(entry["points"], 15);
    assert_eq!(entry["category"], "transport");

    let user = run_json(&dir, &["user", "show", &id]);
    assert_eq!(user["total_points"], 15);

    let list = run_json(&dir, &["habit", "list", &id]);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let stats = run_json(&dir, &["habit", "stats", &id]);
    assert_eq!(stats["total_habits"], 1);
    assert_eq!(stats["category_breakdown"]["transport"], 1);
}

#[test]
fn test_habit_log_with_key_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "ada@example.com");
    let args = [
        "habit", "log", &id, "Composted", "--category", "waste", "--points", "5", "--key",
        "req-1",
    ];

    let first = run_json(&dir, &args);
    let second = run_json(&dir, &args);
    assert_eq!(first["id"], second["id"]);

    let user = run_json(&dir, &["user", "show", &id]);
    assert_eq!(user["total_points"], 5);
}

#[test]
fn test_unknown_category_is_rejected() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "ada@example.com");

    let (_, _, code) = run_cli(
        &dir,
        &["habit", "log", &id, "Biked", "--category", "cycling", "--points", "5"],
    );
    assert_ne!(code, 0);
}

#[test]
fn test_challenge_completion_pays_once() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "ada@example.com");

    let challenge = run_json(
        &dir,
        &[
            "challenge", "create", &id, "Bike week", "--description", "Ride every day",
            "--category", "transport", "--points", "50", "--days", "7",
        ],
    );
    let cid = challenge["id"].as_str().unwrap().to_string();
    assert_eq!(challenge["status"], "active");

    run_json(&dir, &["challenge", "join", &cid, &id]);
    let (_, stderr, code) = run_cli(&dir, &["challenge", "join", &cid, &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let done = run_json(&dir, &["challenge", "progress", &cid, &id, "100"]);
    assert_eq!(done["completed"], true);
    run_json(&dir, &["challenge", "progress", &cid, &id, "100"]);

    let user = run_json(&dir, &["user", "show", &id]);
    assert_eq!(user["total_points"], 50);

    let shown = run_json(&dir, &["challenge", "show", &cid]);
    assert_eq!(shown["participants"].as_array().unwrap().len(), 1);
}

#[test]
fn test_progress_out_of_range_fails() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "ada@example.com");
    let challenge = run_json(
        &dir,
        &[
            "challenge", "create", &id, "Bike week", "--description", "Ride every day",
            "--category", "transport", "--points", "50", "--days", "7",
        ],
    );
    let cid = challenge["id"].as_str().unwrap().to_string();
    run_json(&dir, &["challenge", "join", &cid, &id]);

    let (_, _, code) = run_cli(&dir, &["challenge", "progress", &cid, &id, "150"]);
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(&dir, &["challenge", "progress", &cid, &id, "-5"]);
    assert_eq!(code, 1);
}

#[test]
fn test_leaderboard_and_rank() {
    let dir = TempDir::new().unwrap();
    let ada = register(&dir, "Ada", "ada@example.com");
    let bob = register(&dir, "Bob", "bob@example.com");
    run_json(
        &dir,
        &["habit", "log", &bob, "Solar", "--category", "energy", "--points", "30"],
    );
    run_json(
        &dir,
        &["habit", "log", &ada, "Bus", "--category", "transport", "--points", "10"],
    );

    let global = run_json(&dir, &["leaderboard", "global"]);
    let rows = global.as_array().unwrap();
    assert_eq!(rows[0]["name"], "Bob");
    assert_eq!(rows[0]["rank"], 1);
    assert_eq!(rows[1]["name"], "Ada");

    let rank = run_json(&dir, &["leaderboard", "rank", &ada]);
    assert_eq!(rank["rank"], 2);
    assert_eq!(rank["points"], 10);

    let limited = run_json(&dir, &["leaderboard", "global", "--limit", "1"]);
    assert_eq!(limited.as_array().unwrap().len(), 1);

    // Entries logged "now" sit on the open end of the weekly window.
    let weekly = run_json(&dir, &["leaderboard", "weekly"]);
    assert!(weekly.is_array());
}

#[test]
fn test_audit_reports_consistency() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "ada@example.com");
    run_json(
        &dir,
        &["habit", "log", &id, "Bus", "--category", "transport", "--points", "10"],
    );

    let audit = run_json(&dir, &["audit", &id]);
    assert_eq!(audit["consistent"], true);
    assert_eq!(audit["ledger_points"], 10);
}

#[test]
fn test_unknown_user_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["user", "show", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_challenge_ending_past_year_9999_is_rejected() {
    let dir = TempDir::new().unwrap();
    let id = register(&dir, "Ada", "ada@example.com");

    let (_, stderr, code) = run_cli(
        &dir,
        &[
            "challenge", "create", &id, "Forever", "--description", "Never ends",
            "--category", "waste", "--points", "10", "--days", "3000000",
        ],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("duration_days"));

    let list = run_json(&dir, &["challenge", "list"]);
    assert!(list.as_array().unwrap().is_empty());
}

#[test]
fn test_config_get_set_list() {
    let dir = TempDir::new().unwrap();

    let (stdout, _, code) = run_cli(&dir, &["config", "get", "leaderboard.window_days"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "7");

    let (_, _, code) = run_cli(&dir, &["config", "set", "leaderboard.window_days", "14"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(&dir, &["config", "get", "leaderboard.window_days"]);
    assert_eq!(stdout.trim(), "14");

    let (_, _, code) = run_cli(&dir, &["config", "set", "leaderboard.window_days", "0"]);
    assert_eq!(code, 1);
    let (_, _, code) =
        run_cli(&dir, &["config", "set", "leaderboard.window_days", "1000000000"]);
    assert_eq!(code, 1);
    let (stdout, _, _) = run_cli(&dir, &["config", "get", "leaderboard.window_days"]);
    assert_eq!(stdout.trim(), "14");
    let (_, _, code) = run_cli(&dir, &["leaderboard", "weekly"]);
    assert_eq!(code, 0);

    let (_, _, code) = run_cli(&dir, &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);

    let list = run_json(&dir, &["config", "list"]);
    assert_eq!(list["storage"]["database_file"], "ecoquest.db");
}
