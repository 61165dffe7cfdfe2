use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_malformed_script_handling() {
    let catalog =
        common::write_catalog(&["coin_100, inapp, 100 Coins, Coins, 0.99, USD, true"]).unwrap();
    let script = common::write_script(&[
        "query, coin_100,",
        // Unknown command
        "refund, coin_100,",
        // Unknown finalize mode
        "finalize, sandbox.coin_100.1, destroy",
        "purchase, coin_100,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("purchase-bridge"));
    cmd.arg(script.path()).arg("--catalog").arg(catalog.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains(r#"{"event":"purchase_succeeded""#));
}

#[test]
fn test_purchase_before_query_is_unknown_product() {
    let catalog =
        common::write_catalog(&["coin_100, inapp, 100 Coins, Coins, 0.99, USD, true"]).unwrap();
    let script = common::write_script(&["purchase, coin_100,"]).unwrap();

    let mut cmd = Command::new(cargo_bin!("purchase-bridge"));
    cmd.arg(script.path()).arg("--catalog").arg(catalog.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("No details for purchase: coin_100"))
        .stdout(predicate::str::contains(
            r#"{"event":"purchase_failed","diagnostic":"unknown-product: coin_100"}"#,
        ));
}

#[test]
fn test_invalid_catalog_is_fatal() {
    let catalog =
        common::write_catalog(&["coin_100, inapp, 100 Coins, Coins, not_a_price, USD, true"])
            .unwrap();
    let script = common::write_script(&["query, coin_100,"]).unwrap();

    let mut cmd = Command::new(cargo_bin!("purchase-bridge"));
    cmd.arg(script.path()).arg("--catalog").arg(catalog.path());

    cmd.assert().failure();
}

#[test]
fn test_empty_query_reported() {
    let catalog =
        common::write_catalog(&["coin_100, inapp, 100 Coins, Coins, 0.99, USD, true"]).unwrap();
    let script = common::write_script(&["query, ;,"]).unwrap();

    let mut cmd = Command::new(cargo_bin!("purchase-bridge"));
    cmd.arg(script.path()).arg("--catalog").arg(catalog.path());

    cmd.assert().success().stdout(predicate::str::contains(
        r#"{"event":"products_query_failed","diagnostic":"no product identifiers to query"}"#,
    ));
}
