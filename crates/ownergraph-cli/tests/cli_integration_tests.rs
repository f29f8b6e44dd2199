//! CLI integration tests for ownergraph
//!
//! Runs the binary end-to-end against a temporary database with no API keys,
//! so every web lookup degrades instead of touching the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config and keys
#[allow(deprecated)]
fn ownergraph_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ownergraph").unwrap();
    cmd.env("OWNERGRAPH_CONFIG_DIR", home.path().join("config"));
    cmd.env_remove("OPENROUTER_API_KEY");
    cmd.env_remove("TAVILY_API_KEY");
    cmd.env("RUST_LOG", "off");
    cmd.current_dir(home.path());
    cmd
}

fn db_arg(home: &TempDir) -> String {
    home.path().join("graph.db").display().to_string()
}

#[test]
fn test_validate_normalizes() {
    let home = TempDir::new().unwrap();
    ownergraph_cmd(&home)
        .args(["validate", "5560434200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("556043-4200"));
}

#[test]
fn test_validate_rejects_short_identifier() {
    let home = TempDir::new().unwrap();
    ownergraph_cmd(&home)
        .args(["validate", "12345"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_config_path_honours_env() {
    let home = TempDir::new().unwrap();
    ownergraph_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let home = TempDir::new().unwrap();
    ownergraph_cmd(&home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(home.path().join("config").join("config.toml").exists());

    ownergraph_cmd(&home)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    ownergraph_cmd(&home)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_stats_on_empty_database() {
    let home = TempDir::new().unwrap();
    ownergraph_cmd(&home)
        .args(["stats", "--db", &db_arg(&home)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entities: 0"));
}

#[test]
fn test_ingest_declared_holdings_offline() {
    let home = TempDir::new().unwrap();
    let db = db_arg(&home);

    ownergraph_cmd(&home)
        .args([
            "ingest",
            "556043-4200",
            "Investor AB",
            "--holding",
            "556016-0680=Ericsson@22.5",
            "--db",
            &db,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingested 556043-4200"))
        .stdout(predicate::str::contains("Ericsson"));

    ownergraph_cmd(&home)
        .args(["holdings", "556043-4200", "--db", &db])
        .assert()
        .success()
        .stdout(predicate::str::contains("556016-0680"))
        .stdout(predicate::str::contains("22.5%"));

    ownergraph_cmd(&home)
        .args(["owners", "556016-0680", "--db", &db])
        .assert()
        .success()
        .stdout(predicate::str::contains("Investor AB"));

    ownergraph_cmd(&home)
        .args(["show", "556043-4200", "--db", &db])
        .assert()
        .success()
        .stdout(predicate::str::contains("Role: fund"));
}

#[test]
fn test_ingest_json_output() {
    let home = TempDir::new().unwrap();
    let output = ownergraph_cmd(&home)
        .args([
            "--format",
            "json",
            "ingest",
            "556043-4200",
            "Investor AB",
            "--holding",
            "556016-0680=Ericsson",
            "--db",
            &db_arg(&home),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["entity_id"], "556043-4200");
    assert_eq!(json["portfolio"].as_array().unwrap().len(), 1);
}

#[test]
fn test_resolve_after_ingest() {
    let home = TempDir::new().unwrap();
    let db = db_arg(&home);

    ownergraph_cmd(&home)
        .args(["-q", "ingest", "556043-4200", "Investor AB", "--db", &db])
        .assert()
        .success();

    ownergraph_cmd(&home)
        .args(["resolve", "investor", "--db", &db])
        .assert()
        .success()
        .stdout(predicate::str::contains("556043-4200"));

    ownergraph_cmd(&home)
        .args(["resolve", "Nobody Holding", "--db", &db])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No entity matches"));
}

#[test]
fn test_show_unknown_entity_suggests_ingest() {
    let home = TempDir::new().unwrap();
    ownergraph_cmd(&home)
        .args(["show", "556043-4200", "--db", &db_arg(&home)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E200"))
        .stderr(predicate::str::contains("ownergraph ingest"));
}

#[test]
fn test_ingest_many_from_file() {
    let home = TempDir::new().unwrap();
    let batch = home.path().join("roots.csv");
    std::fs::write(&batch, "# roots\n556043-4200,Investor AB\n502032-9081,SEB\n").unwrap();

    ownergraph_cmd(&home)
        .args(["ingest-many", batch.to_str().unwrap(), "--db", &db_arg(&home)])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 ingested, 0 failed"));
}

#[test]
fn test_doctor_reports_missing_keys() {
    let home = TempDir::new().unwrap();
    ownergraph_cmd(&home)
        .args(["doctor", "--db", &db_arg(&home)])
        .assert()
        .success()
        .stdout(predicate::str::contains("[!!] LLM API key: Not configured"))
        .stdout(predicate::str::contains("[OK] Database: Connected"));
}
