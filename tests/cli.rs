//! Command-line behaviour against a temporary data directory

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn optivault(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("optivault").unwrap();
    cmd.env("OPTIVAULT_DATA_DIR", dir.path())
        .env_remove("OPTIVAULT_SNAPSHOT")
        .env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    optivault(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialization complete!"));
    dir
}

fn plan_id(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .split_whitespace()
        .find(|w| w.starts_with("plan-"))
        .expect("plan id in output")
        .to_string()
}

#[test]
fn init_is_idempotent() {
    let dir = initialized();
    optivault(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already initialized."));
}

#[test]
fn source_list_shows_demo_sources() {
    let dir = initialized();
    optivault(&dir)
        .args(["source", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("santander"))
        .stdout(predicate::str::contains("amex-gold"))
        .stdout(predicate::str::contains("Available"));
}

#[test]
fn unknown_source_fails() {
    let dir = initialized();
    optivault(&dir)
        .args(["source", "capacity", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Funding source not found: nope"));
}

#[test]
fn pay_commits_and_shows_in_ledger() {
    let dir = initialized();
    optivault(&dir)
        .args(["pay", "4.50", "--category", "dining", "--merchant", "Pret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Committed: rsv-"));

    optivault(&dir)
        .args(["ledger", "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 reservation set(s), 1 active"));

    optivault(&dir)
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("COMMIT"));
}

#[test]
fn optimize_then_explain() {
    let dir = initialized();
    let output = optivault(&dir)
        .args(["optimize", "112.40", "-g", "groceries", "-m", "Tesco"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let id = plan_id(&output);

    optivault(&dir)
        .args(["plan", "explain", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("How this was decided:"));

    optivault(&dir)
        .args(["plan", "cancel", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled plan"));

    optivault(&dir)
        .args(["plan", "commit", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is cancelled"));
}

#[test]
fn multi_options_need_confirmation() {
    let dir = initialized();
    let output = optivault(&dir)
        .args(["optimize", "60", "-g", "shopping", "--multi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pay with"))
        .get_output()
        .stdout
        .clone();
    let id = plan_id(&output);

    optivault(&dir)
        .args(["plan", "commit", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires confirmation"));

    optivault(&dir).args(["plan", "confirm", &id]).assert().success();
    optivault(&dir)
        .args(["plan", "commit", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reservation set: rsv-"));
}

#[test]
fn invalid_amount_is_rejected() {
    let dir = initialized();
    optivault(&dir)
        .args(["optimize", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid amount"));
}

#[test]
fn batch_plans_every_row() {
    let dir = initialized();
    let csv = dir.path().join("purchases.csv");
    std::fs::write(
        &csv,
        "amount,currency,category,merchant\n4.50,GBP,dining,Pret\n89.99,USD,shopping,Steam\n",
    )
    .unwrap();

    optivault(&dir)
        .arg("batch")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned 2 of 2 purchases"));
}

#[test]
fn ledger_export_json() {
    let dir = initialized();
    optivault(&dir)
        .args(["pay", "25", "-g", "dining"])
        .assert()
        .success();

    optivault(&dir)
        .args(["ledger", "export", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"schema_version\": \"1.0.0\""))
        .stdout(predicate::str::contains("\"reservation_set_count\": 1"));
}

#[test]
fn missing_snapshot_reports_engine_unavailable() {
    let dir = TempDir::new().unwrap();
    optivault(&dir)
        .args(["optimize", "4.50"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Engine unavailable"));
}
