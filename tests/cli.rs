use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const EXPORT: &str = "\
Date Of Payment,Patient,Charge Desc,Calculated Payment (Line)
8/25/25,Jane Doe,Hydration,$150.00
8/26/25,Jane Doe,Semaglutide Injection (Member),$150.00
8/27/25,Amy Poe,OFFICE VISIT Membership - Family (NEW),$199.00
8/28/25,Bob Roe,B12 Injection (Member),$25.00
8/29/25,Bob Roe,Gift Card,$50.00
8/30/25,,Energy,$175.00
9/1/25,Dee Fox,Energy,$175.00
";

fn clinicboard(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("clinicboard").unwrap();
    cmd.env("HOME", home).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn initialized() -> tempfile::TempDir {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("data");
    clinicboard(home.path())
        .args(["init", "--data-dir", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized clinicboard"));
    home
}

fn import_export(home: &Path) {
    let file = home.join("export.csv");
    std::fs::write(&file, EXPORT).unwrap();
    clinicboard(home)
        .args(["import", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("7 rows read, 6 accepted, 1 rejected"))
        .stdout(predicate::str::contains("Aug 25 - Aug 31, 2025"))
        .stdout(predicate::str::contains("$574.00"));
}

#[test]
fn classify_injection() {
    let home = tempfile::tempdir().unwrap();
    clinicboard(home.path())
        .args(["classify", "B12 Injection (Member)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("standalone_injection"))
        .stdout(predicate::str::contains("Membership").not());
}

#[test]
fn classify_new_membership() {
    let home = tempfile::tempdir().unwrap();
    clinicboard(home.path())
        .args(["classify", "OFFICE VISIT Membership - Family (NEW)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("membership_or_admin"))
        .stdout(predicate::str::contains("family"))
        .stdout(predicate::str::contains("yes"));
}

#[test]
fn import_then_report_week() {
    let home = initialized();
    import_export(home.path());

    clinicboard(home.path())
        .args(["report", "week", "--week", "2025-08-31"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Aug 25 - Aug 31, 2025"))
        .stdout(predicate::str::contains("Unique customers: 3"))
        .stdout(predicate::str::contains("Weight Loss"));
}

#[test]
fn report_weeks_lists_newest_first() {
    let home = initialized();
    import_export(home.path());

    let output = clinicboard(home.path())
        .args(["report", "weeks"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let newer = stdout.find("Sep 1 - Sep 7, 2025").unwrap();
    let older = stdout.find("Aug 25 - Aug 31, 2025").unwrap();
    assert!(newer < older);
}

#[test]
fn report_unmapped_shows_gift_card() {
    let home = initialized();
    import_export(home.path());

    clinicboard(home.path())
        .args(["report", "unmapped"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gift Card"));
}

#[test]
fn report_month_folds_transactions() {
    let home = initialized();
    import_export(home.path());

    clinicboard(home.path())
        .args(["report", "month", "--month", "2025-08"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$574.00"));
}

#[test]
fn delete_week_then_report_fails() {
    let home = initialized();
    import_export(home.path());

    clinicboard(home.path())
        .args(["delete-week", "--week", "2025-08-27"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted Aug 25 - Aug 31, 2025"));

    clinicboard(home.path())
        .args(["report", "week", "--week", "2025-08-27"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No stored week starting 2025-08-25"));
}

#[test]
fn import_for_wrong_week_leaves_stored_week() {
    let home = initialized();
    import_export(home.path());

    let stray = home.path().join("stray.csv");
    std::fs::write(
        &stray,
        "Date Of Payment,Patient,Charge Desc,Calculated Payment (Line)\n9/2/25,Jane Doe,Hydration,$150.00\n",
    )
    .unwrap();
    clinicboard(home.path())
        .args(["import", stray.to_str().unwrap(), "--week", "2025-08-27"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No rows in the requested week"));

    clinicboard(home.path())
        .args(["report", "week", "--week", "2025-08-27"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$574.00"));
}

#[test]
fn import_missing_column_fails() {
    let home = initialized();
    let file = home.path().join("bad.csv");
    std::fs::write(&file, "Date,Who,Amount\n8/25/25,Jane,$10\n").unwrap();

    clinicboard(home.path())
        .args(["import", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No column found"));
}

#[test]
fn invalid_week_argument_fails() {
    let home = initialized();
    clinicboard(home.path())
        .args(["report", "week", "--week", "last tuesday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}

#[test]
fn status_before_init() {
    let home = tempfile::tempdir().unwrap();
    clinicboard(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database not found"));
}
