mod common;

use assert_cmd::Command;
use common::{TestWorkspace, fixture_path};
use predicates::prelude::*;
use predicates::str::contains;

fn bin() -> Command {
    Command::cargo_bin("pivot-workbench").expect("binary exists")
}

fn sales_csv() -> String {
    fixture_path("sales.csv").to_str().unwrap().to_string()
}

#[test]
fn probe_reports_inferred_types() {
    bin()
        .args(["probe", "-i", &sales_csv()])
        .assert()
        .success()
        .stdout(contains("Sales"))
        .stdout(contains("number"))
        .stdout(contains("boolean"))
        .stdout(contains("count"));
}

#[test]
fn pivot_csv_groups_rows_with_other_bucket() {
    let output = bin()
        .args([
            "pivot",
            "-i",
            &sales_csv(),
            "--rows",
            "Region",
            "--values",
            "Sales:sum",
            "--format",
            "csv",
        ])
        .output()
        .expect("run pivot");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(
        lines,
        vec![
            "Level,Label,Sales (sum)",
            "0,East,23",
            "0,North,3",
            "0,Other,4",
            "0,West,19.5",
        ]
    );
}

#[test]
fn pivot_filter_keeps_only_allowed_groups() {
    bin()
        .args([
            "pivot",
            "-i",
            &sales_csv(),
            "--rows",
            "Region",
            "--values",
            "Sales",
            "--filter",
            "Region=East",
            "--format",
            "csv",
        ])
        .assert()
        .success()
        .stdout(contains("0,East,23"))
        .stdout(contains("West").not());
}

#[test]
fn pivot_table_expands_requested_node() {
    bin()
        .args([
            "pivot",
            "-i",
            &sales_csv(),
            "--rows",
            "Region,Product",
            "--columns",
            "Quarter",
            "--values",
            "Units:sum",
            "--expand",
            "root:East:0",
        ])
        .assert()
        .success()
        .stdout(contains("Region › Product"))
        .stdout(contains("Q1"))
        .stdout(contains("- East"))
        .stdout(contains("+ West"));
}

#[test]
fn pivot_reads_yaml_spec_and_writes_json() {
    let workspace = TestWorkspace::new();
    let spec = workspace.write(
        "spec.yaml",
        "rows:\n  - field: Quarter\nvalues:\n  - field: Units\n    aggregation: max\n",
    );
    let output = workspace.path().join("pivot.json");
    bin()
        .args([
            "pivot",
            "-i",
            &sales_csv(),
            "--spec",
            spec.to_str().unwrap(),
            "--format",
            "json",
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["columns"][0]["kind"], "grand_total");
    assert_eq!(json["rows"][0]["label"], "Q1");
    assert_eq!(json["rows"][1]["id"], "root:Q2:0");
}

#[test]
fn unknown_value_field_fails_with_message() {
    bin()
        .args([
            "pivot",
            "-i",
            &sales_csv(),
            "--rows",
            "Region",
            "--values",
            "Sales:median",
        ])
        .assert()
        .failure()
        .stderr(contains("error:"))
        .stderr(contains("median"));
}

#[test]
fn save_list_recompute_and_remove() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("workbench.json");
    let store_arg = store.to_str().unwrap();

    let output = bin()
        .args([
            "save",
            "-i",
            &sales_csv(),
            "--store",
            store_arg,
            "--rows",
            "Region",
            "--values",
            "Sales:sum",
        ])
        .output()
        .expect("run save");
    assert!(output.status.success());
    let pivot_id = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert!(!pivot_id.is_empty());

    bin()
        .args(["list", "--store", store_arg])
        .assert()
        .success()
        .stdout(contains("Region by Sales (sum)"))
        .stdout(contains(pivot_id.as_str()));

    bin()
        .args([
            "pivot",
            "--store",
            store_arg,
            "--pivot",
            &pivot_id,
            "--format",
            "csv",
        ])
        .assert()
        .success()
        .stdout(contains("0,West,19.5"));

    bin()
        .args(["remove", "--store", store_arg, "--pivot", &pivot_id])
        .assert()
        .success();
    bin()
        .args(["list", "--store", store_arg])
        .assert()
        .success()
        .stdout(contains(pivot_id.as_str()).not());
}
