use std::fs;
use std::path::PathBuf;
use std::process::Output;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

const SCHEMA: &str = "create table t(a int, b int);\n\
                      create table p(id int, a int);\n\
                      partition table p on column id;\n";

fn write_schema(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("schema.sql");
    fs::write(&path, SCHEMA).expect("write schema");
    path
}

fn write_batch(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("batch.sql");
    fs::write(&path, contents).expect("write batch");
    path
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn plan_checker_is_silent_when_planners_agree() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let output = cargo_bin_cmd!("plan-checker")
        .arg("--ddl")
        .arg(&schema)
        .args(["--query", "select a from t where a > ? limit 2 offset ?"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(output.stdout.is_empty(), "stdout must stay unused");
    assert!(output.stderr.is_empty(), "agreement must print nothing");
}

#[test]
fn plan_checker_accepts_short_flags_and_a_terminator() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let output = cargo_bin_cmd!("plan-checker")
        .arg("-d")
        .arg(&schema)
        .args(["-q", "select a from t;"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(output.stderr.is_empty());
}

#[test]
fn plan_checker_reports_a_silent_downgrade() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let output = cargo_bin_cmd!("plan-checker")
        .arg("--ddl")
        .arg(&schema)
        .args(["--query", "select distinct a from p where 3 = id"])
        .env_remove("RUST_LOG")
        .assert()
        .code(1)
        .get_output()
        .clone();
    assert!(output.stdout.is_empty(), "stdout must stay unused");
    let stderr = stderr_text(&output);
    assert!(stderr.contains("select distinct a from p where 3 = id"));
    assert!(stderr.contains("silent single-partition downgrade"));
}

#[test]
fn query_takes_precedence_over_file() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let batch = write_batch(&dir, "select distinct a from p where 3 = id\n");
    let output = cargo_bin_cmd!("plan-checker")
        .arg("--ddl")
        .arg(&schema)
        .arg("--file")
        .arg(&batch)
        .args(["--query", "select a from t"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(
        output.stderr.is_empty(),
        "the divergent batch file must be ignored when -q is given"
    );
}

#[test]
fn plan_checker_batch_reports_only_divergent_statements() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let batch = write_batch(
        &dir,
        "CREATE TABLE T (a INT);\n\
         \n\
         select a from t;\n\
         not even sql\n\
         select distinct a from p where 3 = id\n\
         select a from t where a > ? limit 2 offset ?\n",
    );
    let output = cargo_bin_cmd!("plan-checker")
        .arg("--ddl")
        .arg(&schema)
        .arg("--file")
        .arg(&batch)
        .env_remove("RUST_LOG")
        .assert()
        .code(1)
        .get_output()
        .clone();
    assert!(output.stdout.is_empty(), "stdout must stay unused");
    let stderr = stderr_text(&output);
    assert!(stderr.contains("select distinct a from p where 3 = id"));
    assert!(stderr.contains("silent single-partition downgrade"));
    assert!(!stderr.contains("CREATE TABLE"), "skipped DDL must not be reported");
    assert!(!stderr.contains("not even sql"), "unparseable lines must not be reported");
}

#[test]
fn mp_checker_flags_a_routing_disagreement() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let output = cargo_bin_cmd!("mp-checker")
        .arg("--ddl")
        .arg(&schema)
        .args(["--query", "select a from p where 3 = id"])
        .env_remove("RUST_LOG")
        .assert()
        .code(1)
        .get_output()
        .clone();
    let stderr = stderr_text(&output);
    assert!(stderr.contains("routing disagreement"));
    assert!(stderr.contains("alder planned multi-partition"));
    assert!(stderr.contains("merlin planned single-partition"));
}

#[test]
fn mp_checker_is_silent_when_routing_agrees() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    for sql in ["select a from p", "select a from p where id = 3"] {
        let output = cargo_bin_cmd!("mp-checker")
            .arg("--ddl")
            .arg(&schema)
            .args(["--query", sql])
            .env_remove("RUST_LOG")
            .assert()
            .success()
            .get_output()
            .clone();
        assert!(output.stderr.is_empty(), "routing agreement must print nothing");
    }
}

#[test]
fn mp_checker_batch_prints_nothing_for_agreeing_lines() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let batch = write_batch(&dir, "select a from p\nselect a from p where 3 = id\n");
    let output = cargo_bin_cmd!("mp-checker")
        .arg("--ddl")
        .arg(&schema)
        .arg("--file")
        .arg(&batch)
        .env_remove("RUST_LOG")
        .assert()
        .code(1)
        .get_output()
        .clone();
    let stderr = stderr_text(&output);
    assert!(
        stderr.starts_with("select a from p where 3 = id"),
        "the agreeing first line must not appear before the report: {stderr}"
    );
}

#[test]
fn missing_input_is_a_usage_error() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir);
    let output = cargo_bin_cmd!("plan-checker")
        .arg("--ddl")
        .arg(&schema)
        .env_remove("RUST_LOG")
        .assert()
        .code(2)
        .get_output()
        .clone();
    assert!(stderr_text(&output).contains("nothing to check"));
}

#[test]
fn missing_ddl_flag_is_a_usage_error() {
    let output = cargo_bin_cmd!("plan-checker")
        .args(["--query", "select a from t"])
        .env_remove("RUST_LOG")
        .assert()
        .code(2)
        .get_output()
        .clone();
    assert!(stderr_text(&output).contains("--ddl"));
}

#[test]
fn unreadable_ddl_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("missing.sql");
    let output = cargo_bin_cmd!("plan-checker")
        .arg("--ddl")
        .arg(&missing)
        .args(["--query", "select a from t"])
        .env_remove("RUST_LOG")
        .assert()
        .code(2)
        .get_output()
        .clone();
    assert!(stderr_text(&output).contains("cannot read DDL file"));
}

#[test]
fn invalid_ddl_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let schema = dir.path().join("schema.sql");
    fs::write(&schema, "select 1;\n").expect("write schema");
    let output = cargo_bin_cmd!("mp-checker")
        .arg("--ddl")
        .arg(&schema)
        .args(["--query", "select a from t"])
        .env_remove("RUST_LOG")
        .assert()
        .code(2)
        .get_output()
        .clone();
    assert!(stderr_text(&output).contains("cannot load schema"));
}
