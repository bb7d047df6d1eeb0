use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Unpaced simulated runs so the tests finish quickly
fn write_sim_config(dir: &Path) -> PathBuf {
    let toml = r#"
[serial]
port = "/dev/null"
read_timeout_ms = 50

[acquisition]
samples = 300
warmup_ticks = 3
tick_interval_ms = 0

[dataset]
seed = 7
train_fraction = 0.8

[model]
degree = 1
method = "ordinary"

[realtime]
tick_interval_ms = 0
"#;
    let path = dir.join("ftcal.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn ftcal(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ftcal").unwrap();
    cmd.arg("--config").arg(cfg).env_remove("RUST_LOG");
    cmd
}

fn stdout_json(out: &std::process::Output) -> serde_json::Value {
    let text = String::from_utf8_lossy(&out.stdout);
    let line = text.lines().last().unwrap_or_default();
    serde_json::from_str(line).unwrap_or_else(|e| panic!("not JSON ({e}): {text}"))
}

fn data_rows(path: &Path) -> usize {
    csv::Reader::from_path(path).unwrap().records().count()
}

#[rstest]
#[case(&["--help"], 0, "Usage:")]
#[case(&["fit", "--help"], 0, "--no-split")]
#[case(&["--version"], 0, "ftcal")]
fn help_and_version(#[case] args: &[&str], #[case] code: i32, #[case] needle: &str) {
    Command::cargo_bin("ftcal")
        .unwrap()
        .args(args)
        .assert()
        .code(code)
        .stdout(predicate::str::contains(needle));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    Command::cargo_bin("ftcal")
        .unwrap()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn full_pipeline_on_the_simulated_rig() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let capture = dir.path().join("session1.csv");
    let merged = dir.path().join("merged.csv");
    let train = dir.path().join("train.csv");
    let val = dir.path().join("val.csv");
    let params = dir.path().join("params.csv");
    let errors = dir.path().join("errors.csv");

    let out = ftcal(&cfg)
        .arg("--json")
        .args(["acquire", "--out"])
        .arg(&capture)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let v = stdout_json(&out);
    assert_eq!(v["recorded"], 300);
    assert_eq!(v["ticks"], 303);
    assert_eq!(data_rows(&capture), 300);

    ftcal(&cfg)
        .arg("merge")
        .arg(&capture)
        .arg("--out")
        .arg(&merged)
        .arg("--train")
        .arg(&train)
        .arg("--validation")
        .arg(&val)
        .assert()
        .success()
        .stdout(predicate::str::contains("300 rows kept"))
        .stdout(predicate::str::contains("240 train / 60 validation"));
    assert_eq!(data_rows(&train), 240);
    assert_eq!(data_rows(&val), 60);

    ftcal(&cfg)
        .args(["fit", "--no-split", "--data"])
        .arg(&train)
        .arg("--params")
        .arg(&params)
        .assert()
        .success()
        .stdout(predicate::str::contains("train RMSE"));
    let header = fs::read_to_string(&params).unwrap();
    assert!(header.starts_with("Wrench,C,L_s0,"), "{header}");
    assert_eq!(header.lines().count(), 7);

    let out = ftcal(&cfg)
        .arg("--json")
        .args(["validate", "--params"])
        .arg(&params)
        .arg("--data")
        .arg(&val)
        .arg("--errors")
        .arg(&errors)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let v = stdout_json(&out);
    assert_eq!(v["rows"], 60);
    // Integer counts limit resolution to roughly 0.1 N / 0.01 Nm
    assert!(v["axes"]["Fx"]["rms"].as_f64().unwrap() < 0.5);
    assert!(v["axes"]["Mz"]["rms"].as_f64().unwrap() < 0.05);
    assert_eq!(data_rows(&errors), 60);

    let out = ftcal(&cfg)
        .args(["estimate", "--simulate", "--max-ticks", "20", "--params"])
        .arg(&params)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout).lines().count(), 20);
}

#[test]
fn acquire_appends_to_an_existing_session() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let capture = dir.path().join("session.csv");
    for _ in 0..2 {
        ftcal(&cfg)
            .args(["acquire", "--samples", "25", "--out"])
            .arg(&capture)
            .assert()
            .success()
            .stdout(predicate::str::contains("Recorded 25 samples"));
    }
    let text = fs::read_to_string(&capture).unwrap();
    assert_eq!(text.matches("Timestamp").count(), 1);
    assert_eq!(data_rows(&capture), 50);
}

#[test]
fn malformed_records_are_skipped_and_counted() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let capture = dir.path().join("session.csv");
    let out = ftcal(&cfg)
        .env("FTCAL_SIM_MALFORMED_EVERY", "10")
        .args(["--json", "acquire", "--samples", "50", "--warmup", "0", "--out"])
        .arg(&capture)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let v = stdout_json(&out);
    assert_eq!(v["recorded"], 50);
    assert!(v["malformed"].as_u64().unwrap() >= 5);
    assert_eq!(data_rows(&capture), 50);
}

#[test]
fn merge_reports_excluded_files() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let good = dir.path().join("good.csv");
    let bad = dir.path().join("bad.csv");
    let merged = dir.path().join("merged.csv");
    fs::write(&bad, "a,b,c\n1,2,3\n").unwrap();
    ftcal(&cfg)
        .args(["acquire", "--samples", "10", "--out"])
        .arg(&good)
        .assert()
        .success();

    ftcal(&cfg)
        .arg("merge")
        .arg(&good)
        .arg(&bad)
        .arg("--out")
        .arg(&merged)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 1 file(s)"))
        .stdout(predicate::str::contains("Excluded"));
    assert_eq!(data_rows(&merged), 10);
}

#[test]
fn merge_without_any_usable_file_fails() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    ftcal(&cfg)
        .arg("merge")
        .arg(dir.path().join("absent.csv"))
        .arg("--out")
        .arg(dir.path().join("merged.csv"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no usable session"));
    assert!(!dir.path().join("merged.csv").exists());
}

#[test]
fn too_few_rows_for_a_quadratic_fit_exit_3() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let capture = dir.path().join("session.csv");
    let params = dir.path().join("params.csv");
    ftcal(&cfg)
        .args(["acquire", "--samples", "20", "--out"])
        .arg(&capture)
        .assert()
        .success();

    ftcal(&cfg)
        .args(["fit", "--no-split", "--degree", "2", "--data"])
        .arg(&capture)
        .arg("--params")
        .arg(&params)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not enough training rows"));
    assert!(!params.exists());

    let out = ftcal(&cfg)
        .args(["--json", "fit", "--no-split", "--degree", "2", "--data"])
        .arg(&capture)
        .arg("--params")
        .arg(&params)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let line = stderr.lines().find(|l| l.contains("\"reason\"")).unwrap();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "InsufficientData");
    assert_eq!(v["details"]["features"], 44);
}

#[test]
fn validate_rejects_a_foreign_parameter_file() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let params = dir.path().join("params.csv");
    let data = dir.path().join("data.csv");
    fs::write(&params, "raw,grams\n1,2\n").unwrap();
    ftcal(&cfg)
        .args(["acquire", "--samples", "5", "--out"])
        .arg(&data)
        .assert()
        .success();

    ftcal(&cfg)
        .args(["validate", "--params"])
        .arg(&params)
        .arg("--data")
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parameter"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[acquisition]\nsamples = 0\n").unwrap();
    ftcal(&cfg)
        .args(["acquire", "--out"])
        .arg(dir.path().join("x.csv"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("acquisition.samples"));
}

#[rstest]
#[case("[model]\ndegree = 3\n")]
#[case("[serial]\nbaud_rate = 0\n")]
#[case("[model]\nmethod = \"svm\"\n")]
fn config_errors_exit_2(#[case] toml: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();
    let out = ftcal(&cfg)
        .args(["--json", "acquire", "--out"])
        .arg(dir.path().join("x.csv"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let line = stderr.lines().find(|l| l.contains("\"reason\"")).unwrap();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Config");
}

// Identity-like linear model: Fx = s0 - 500, every other axis 0.
fn write_identity_params(path: &Path) {
    let mut text = String::from("Wrench,C,L_s0,L_s1,L_s2,L_s3,L_s4,L_s5,L_s6,L_s7\n");
    for (i, axis) in ["Fx", "Fy", "Fz", "Mx", "My", "Mz"].iter().enumerate() {
        let (c, l0) = if i == 0 { (-500, 1) } else { (0, 0) };
        text.push_str(&format!("{axis},{c},{l0},0,0,0,0,0,0,0\n"));
    }
    fs::write(path, text).unwrap();
}

#[test]
fn validate_keeps_overloaded_rows_and_their_file_order() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let params = dir.path().join("params.csv");
    let data = dir.path().join("val.csv");
    let errors = dir.path().join("errors.csv");
    write_identity_params(&params);
    let header = "Timestamp,Fx,Fy,Fz,Mx,My,Mz,s0,s1,s2,s3,s4,s5,s6,s7";
    // Row 1 saturates s0 (999 > 950); Fx reference is off by 1, 2 and 3 N.
    let body = format!(
        "{header}\n\
         0.0,1,0,0,0,0,0,500,500,500,500,500,500,500,500\n\
         0.1,497,0,0,0,0,0,999,500,500,500,500,500,500,500\n\
         0.2,7,0,0,0,0,0,510,500,500,500,500,500,500,500\n"
    );
    fs::write(&data, body).unwrap();

    ftcal(&cfg)
        .args(["--log-level", "error", "validate", "--bins", "0", "--params"])
        .arg(&params)
        .arg("--data")
        .arg(&data)
        .arg("--errors")
        .arg(&errors)
        .assert()
        .success()
        .stdout(predicate::str::contains("Validated 3 rows (1 overloaded)"));

    let mut rdr = csv::Reader::from_path(&errors).unwrap();
    let rows: Vec<(usize, f64)> = rdr
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].parse().unwrap(), r[1].parse().unwrap())
        })
        .collect();
    assert_eq!(rows, vec![(0, -1.0), (1, 2.0), (2, 3.0)]);
}

#[test]
fn validate_refuses_a_non_numeric_row() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let params = dir.path().join("params.csv");
    let data = dir.path().join("val.csv");
    write_identity_params(&params);
    fs::write(
        &data,
        "Timestamp,Fx,Fy,Fz,Mx,My,Mz,s0,s1,s2,s3,s4,s5,s6,s7\n\
         0.0,x,0,0,0,0,0,500,500,500,500,500,500,500,500\n",
    )
    .unwrap();
    ftcal(&cfg)
        .args(["validate", "--params"])
        .arg(&params)
        .arg("--data")
        .arg(&data)
        .assert()
        .code(5)
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn estimate_prints_raw_channels_next_to_the_wrench() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let params = dir.path().join("params.csv");
    write_identity_params(&params);
    let out = ftcal(&cfg)
        .args(["estimate", "--simulate", "--max-ticks", "3", "--params"])
        .arg(&params)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    for line in stdout.lines() {
        let (_, raw) = line.split_once('|').unwrap();
        let channels = raw.split_whitespace().filter(|t| *t != "OVERLOAD").count();
        assert_eq!(channels, 8, "{line}");
    }

    let out = ftcal(&cfg)
        .args(["--json", "estimate", "--simulate", "--max-ticks", "1", "--params"])
        .arg(&params)
        .output()
        .unwrap();
    let v = stdout_json(&out);
    assert_eq!(v["raw"].as_array().unwrap().len(), 8);
}
