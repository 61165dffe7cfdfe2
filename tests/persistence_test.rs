#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_finalized_token_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let catalog =
        common::write_catalog(&["coin_100, inapp, 100 Coins, Coins, 0.99, USD, true"]).unwrap();

    // 1. First run: buy and consume
    let script1 = common::write_script(&[
        "query, coin_100,",
        "purchase, coin_100,",
        "finalize, sandbox.coin_100.1, consume",
    ])
    .unwrap();

    let output1 = Command::new(cargo_bin!("purchase-bridge"))
        .arg(script1.path())
        .arg("--catalog")
        .arg(catalog.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains(r#"{"event":"finalized","token":"sandbox.coin_100.1","kind":"consume"}"#));

    // 2. Second run: the same token is rejected from the ledger
    let script2 = common::write_script(&["finalize, sandbox.coin_100.1, consume"]).unwrap();

    let output2 = Command::new(cargo_bin!("purchase-bridge"))
        .arg(script2.path())
        .arg("--catalog")
        .arg(catalog.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("purchase already finalized: sandbox.coin_100.1"));
}
