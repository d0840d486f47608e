#![cfg(feature = "sqlite")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use tempfile::{NamedTempFile, TempDir};

const SNAPSHOT: &str = r#"{
  "resources": [
    { "id": 1, "name": "Ana", "contract_hours": 40.0 }
  ],
  "projects": [
    { "id": 1, "name": "Metro", "start_date": "2024-01-01", "end_date": "2024-12-31" }
  ],
  "work_packages": [
    { "id": 1, "project_id": 1, "name": "Braking FMECA", "rams_tag": "FMECA", "standard_effort_hours": 100.0 }
  ],
  "activities": [
    { "id": 1, "work_package_id": 1, "resource_id": 1, "planned_hours": 200.0,
      "start_date": "2024-02-01", "end_date": "2024-02-29" }
  ]
}"#;

#[allow(deprecated)]
fn run_cli(database: &NamedTempFile, script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.arg(database.path())
        .write_stdin(script.to_string())
        .assert()
}

fn escaped(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

#[test]
fn cli_prints_banner_and_help() {
    let db = NamedTempFile::new().expect("create temp db");
    run_cli(&db, "help\nquit\n")
        .success()
        .stdout(str_contains("RAMS Workload (CLI)"))
        .stdout(str_contains("capacity <year> <month>"));
}

#[test]
fn cli_rejects_unknown_commands() {
    let db = NamedTempFile::new().expect("create temp db");
    run_cli(&db, "frobnicate\nquit\n")
        .success()
        .stdout(str_contains("Error: Unknown command. Type 'help'."));
}

#[test]
fn cli_exits_cleanly_on_end_of_input() {
    let db = NamedTempFile::new().expect("create temp db");
    run_cli(&db, "resources\n").success();
}

#[test]
fn cli_reports_no_warnings_for_empty_database() {
    let db = NamedTempFile::new().expect("create temp db");
    run_cli(&db, "warnings 2024 2\ncapacity 2024 13\nquit\n")
        .success()
        .stdout(str_contains("No capacity warnings."))
        .stdout(str_contains("Error: month 13 is outside 1..=12"));
}

#[test]
fn cli_import_then_inspect_and_export() {
    let db = NamedTempFile::new().expect("create temp db");
    let dir = TempDir::new().expect("create temp dir");
    let input = dir.path().join("input.json");
    let output = dir.path().join("output.json");
    std::fs::write(&input, SNAPSHOT).expect("write snapshot");

    let script = format!(
        "import {}\nresources\nwarnings 2024 2\nbudget\nrams\nexport {}\nquit\n",
        escaped(&input),
        escaped(&output)
    );
    run_cli(&db, &script)
        .success()
        .stdout(str_contains(
            "Imported 1 resource(s), 1 project(s), 1 work package(s), 1 activity(ies)",
        ))
        .stdout(str_contains("Ana"))
        .stdout(str_contains("Ana is over capacity by 32 hours in 2024-02"))
        .stdout(str_contains("OVER_BUDGET"))
        .stdout(str_contains("FMECA"))
        .stdout(str_contains("Snapshot written to"));

    let exported = std::fs::read_to_string(&output).expect("read export");
    assert!(exported.contains("\"name\": \"Braking FMECA\""));
}

#[test]
fn cli_data_survives_restart() {
    let db = NamedTempFile::new().expect("create temp db");
    let dir = TempDir::new().expect("create temp dir");
    let input = dir.path().join("input.json");
    std::fs::write(&input, SNAPSHOT).expect("write snapshot");

    run_cli(&db, &format!("import {}\nquit\n", escaped(&input))).success();
    run_cli(&db, "projects\nlog 1\nquit\n")
        .success()
        .stdout(str_contains("Metro"))
        .stdout(str_contains("2024-01-01 .. 2024-12-31"));
}

#[test]
fn cli_writes_csv_reports() {
    let db = NamedTempFile::new().expect("create temp db");
    let dir = TempDir::new().expect("create temp dir");
    let input = dir.path().join("input.json");
    let report = dir.path().join("workload.csv");
    std::fs::write(&input, SNAPSHOT).expect("write snapshot");

    let script = format!(
        "import {}\nreport workload 2024 {}\nreport nonsense\nquit\n",
        escaped(&input),
        escaped(&report)
    );
    run_cli(&db, &script)
        .success()
        .stdout(str_contains("Workload report written to"))
        .stdout(str_contains("Error: Usage: report"));

    let csv = std::fs::read_to_string(&report).expect("read report");
    assert!(csv.contains("Ana,Metro,February,200.00,Braking FMECA"));
}
