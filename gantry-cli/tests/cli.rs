use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn gantry_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gantry"));
    cmd.arg("-C")
        .arg(root)
        .env("GANTRY_S3_BUCKET", "lake")
        .env("GANTRY_IAM_ROLE", "arn:aws:iam::123456789012:role/glue")
        .env_remove("GANTRY_NAMESPACE")
        .env_remove("GANTRY_STORE_DIR")
        .env_remove("GANTRY_AWS_ACCOUNT")
        .env_remove("GANTRY_LOG");
    cmd
}

fn scaffold(root: &Path) {
    gantry_cmd(root)
        .args(["new", "module", "--name", "shared"])
        .assert()
        .success()
        .stdout(contains("Created module 'shared' at version 0"));
    gantry_cmd(root)
        .args(["new", "job", "--name", "daily"])
        .assert()
        .success()
        .stdout(contains("Created job 'daily' at version 0"));
}

fn status_json(root: &Path) -> serde_json::Value {
    let output = gantry_cmd(root)
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("status JSON")
}

#[test]
fn new_rejects_invalid_names_and_duplicates() {
    let tmp = TempDir::new().expect("tempdir");
    gantry_cmd(tmp.path())
        .args(["new", "job", "--name", "bad/name"])
        .assert()
        .failure()
        .stderr(contains("invalid component name"));

    scaffold(tmp.path());
    gantry_cmd(tmp.path())
        .args(["new", "job", "--name", "daily"])
        .assert()
        .failure()
        .stderr(contains("already exists"));
}

#[test]
fn deploy_requires_packaged_modules() {
    let tmp = TempDir::new().expect("tempdir");
    scaffold(tmp.path());

    gantry_cmd(tmp.path())
        .arg("check")
        .assert()
        .failure()
        .stdout(contains("module 'shared' is not packaged"));
    gantry_cmd(tmp.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(contains("refusing to deploy"));
}

#[test]
fn full_cycle_from_scaffold_to_in_sync() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    scaffold(root);

    let before = status_json(root);
    assert_eq!(before["summary"]["components"], 2);
    assert_eq!(before["summary"]["deployable"], 2);

    gantry_cmd(root).arg("package").assert().success().stdout(contains("'shared' packaged"));
    gantry_cmd(root).arg("check").assert().success();

    gantry_cmd(root)
        .args(["deploy", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"));
    assert!(!root.join(".gantry/remote/objects/lake").exists());

    gantry_cmd(root)
        .arg("deploy")
        .assert()
        .success()
        .stdout(contains("created job 'daily'"));
    assert!(root
        .join(".gantry/remote/objects/lake/gantry/gantry_job/daily/version=0/daily/.version")
        .is_file());
    assert!(root.join(".gantry/remote/jobs/daily.json").is_file());

    let after = status_json(root);
    assert_eq!(after["summary"]["in_sync"], 2);
    gantry_cmd(root)
        .arg("diff")
        .arg("daily")
        .assert()
        .success()
        .stdout(contains("No differences for 'daily'"));

    fs::write(root.join("jobs/daily/main.py"), "print('v1')\n").expect("edit");
    let edited = status_json(root);
    assert_eq!(edited["summary"]["unlocked"], 1);
    gantry_cmd(root)
        .arg("deploy")
        .assert()
        .failure()
        .stdout(contains("job 'daily' has edits in progress"));

    gantry_cmd(root)
        .arg("lock")
        .assert()
        .success()
        .stdout(contains("job 'daily' → version 1"));
    gantry_cmd(root)
        .arg("deploy")
        .assert()
        .success()
        .stdout(contains("updated job 'daily'").and(contains("is in sync at version 0")));
}

#[test]
fn status_filters_by_kind() {
    let tmp = TempDir::new().expect("tempdir");
    scaffold(tmp.path());

    gantry_cmd(tmp.path())
        .args(["status", "--modules"])
        .assert()
        .success()
        .stdout(contains("shared").and(contains("daily").not()));
}

#[test]
fn diff_unknown_job_fails() {
    let tmp = TempDir::new().expect("tempdir");
    gantry_cmd(tmp.path())
        .args(["diff", "ghost"])
        .assert()
        .failure()
        .stderr(contains("unknown job 'ghost'"));
}

#[test]
fn corrupt_manifest_does_not_block_healthy_components() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    scaffold(root);
    gantry_cmd(root).arg("package").assert().success();
    fs::create_dir_all(root.join("jobs/ghost")).expect("mkdir");
    fs::write(root.join("jobs/ghost/main.py"), "").expect("write");
    fs::write(root.join("jobs/ghost/.version"), "{corrupt").expect("write");

    gantry_cmd(root)
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("job 'ghost'").and(contains("check failed for 1 component(s)")));

    gantry_cmd(root)
        .arg("deploy")
        .assert()
        .failure()
        .stdout(contains("created job 'daily'"))
        .stderr(contains("deploy failed for 1 component(s)"));
}
