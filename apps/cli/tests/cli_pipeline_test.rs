//! Integration tests for the `crucible-cli` binary using the mock backend.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_dataset(root: &Path, texts: &[&str]) -> std::path::PathBuf {
    let lines: Vec<String> = texts.iter().map(|t| format!("{{\"text\":\"{t}\"}}")).collect();
    let path = root.join("data.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Lays out a config tree under `<root>/configs` pointing at `<root>/data.jsonl`.
fn write_config_tree(root: &Path, adversarial_enabled: bool) {
    let data = root.join("data.jsonl");
    write(root, "configs/pipeline.yml", "train:\n  dataset: demo\n  model: echo\nbackend:\n  type: mock\n");
    write(root, "configs/datasets/demo.yml", &format!("path: {}\n", data.display()));
    write(root, "configs/models/echo.yml", "model_name: echo-model\n");
    write(
        root,
        "configs/train/adversarial.yml",
        &format!(
            "adversarial:\n  enabled: {adversarial_enabled}\n  batch_size: 2\n  epochs: 2\n  output_dir: {}\n  discriminator_model: judge\n  seed: 3\n",
            root.join("adv").display()
        ),
    );
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[test]
fn test_score_numeric() {
    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.arg("score").arg("0.87").assert().success().stdout(predicate::str::diff("0.87\n"));
}

#[test]
fn test_score_fallback() {
    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.arg("score").arg("n/a").assert().success().stdout(predicate::str::diff("0.5\n"));
}

#[test]
fn test_adversarial_command_writes_batches() {
    let temp = TempDir::new().unwrap();
    let dataset = write_dataset(temp.path(), &["0.25", "0.5", "0.75", "1.0", "0"]);
    let out = temp.path().join("out");

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.arg("adversarial")
        .arg("--dataset")
        .arg(&dataset)
        .arg("--generator")
        .arg("gen")
        .arg("--discriminator")
        .arg("disc")
        .arg("--batch-size")
        .arg("2")
        .arg("--epochs")
        .arg("1")
        .arg("--output-dir")
        .arg(&out)
        .arg("--seed")
        .arg("9")
        .arg("--backend")
        .arg("mock")
        .assert()
        .success()
        .stdout(predicate::str::contains("Adversarial loop complete"))
        .stdout(predicate::str::contains("Artifacts: 3"));

    assert_eq!(count_files(&out), 3);

    // The mock backend echoes, so each reward is the prompt parsed as a number.
    for batch in 1..=3 {
        let raw = fs::read_to_string(out.join(format!("epoch1_batch{batch}.jsonl"))).unwrap();
        for line in raw.lines() {
            let sample: serde_json::Value = serde_json::from_str(line).unwrap();
            let prompt: f64 = sample["prompt"].as_str().unwrap().parse().unwrap();
            assert_eq!(sample["generated"], sample["prompt"]);
            assert!((sample["reward"].as_f64().unwrap() - prompt).abs() < f64::EPSILON);
        }
    }
}

#[test]
fn test_adversarial_missing_dataset_fails() {
    let temp = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.arg("adversarial")
        .arg("--dataset")
        .arg(temp.path().join("absent.jsonl"))
        .arg("--generator")
        .arg("gen")
        .arg("--discriminator")
        .arg("disc")
        .arg("--output-dir")
        .arg(temp.path().join("out"))
        .arg("--backend")
        .arg("mock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.jsonl"));
}

#[test]
fn test_adversarial_rejects_zero_batch_size() {
    let temp = TempDir::new().unwrap();
    let dataset = write_dataset(temp.path(), &["a"]);

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.arg("adversarial")
        .arg("--dataset")
        .arg(&dataset)
        .arg("--generator")
        .arg("gen")
        .arg("--discriminator")
        .arg("disc")
        .arg("--batch-size")
        .arg("0")
        .arg("--backend")
        .arg("mock")
        .assert()
        .failure();
}

#[test]
fn test_run_pipeline_with_mock_backend() {
    let temp = TempDir::new().unwrap();
    write_dataset(temp.path(), &["a", "b", "c"]);
    write_config_tree(temp.path(), true);

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.current_dir(temp.path())
        .arg("run")
        .arg("--config")
        .arg(temp.path().join("configs/pipeline.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline finished"))
        .stdout(predicate::str::contains("adversarial"));

    // 2 epochs * ceil(3 / 2) batches
    assert_eq!(count_files(&temp.path().join("adv")), 4);
}

#[test]
fn test_run_with_adversarial_disabled_writes_no_artifacts() {
    let temp = TempDir::new().unwrap();
    write_dataset(temp.path(), &["a", "b", "c"]);
    write_config_tree(temp.path(), false);

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.current_dir(temp.path())
        .arg("run")
        .arg("--config")
        .arg(temp.path().join("configs/pipeline.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));

    assert!(!temp.path().join("adv").exists());
}

#[test]
fn test_run_missing_config_fails() {
    let temp = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.current_dir(temp.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_run_missing_dataset_fails() {
    let temp = TempDir::new().unwrap();
    write_config_tree(temp.path(), true);

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.current_dir(temp.path())
        .arg("run")
        .arg("--config")
        .arg(temp.path().join("configs/pipeline.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipeline aborted"));

    assert!(!temp.path().join("adv").exists());
}

#[test]
fn test_log_file_receives_stage_events() {
    let temp = TempDir::new().unwrap();
    write_dataset(temp.path(), &["a"]);
    write_config_tree(temp.path(), false);
    let log = temp.path().join("logs").join("run.log");

    let mut cmd = Command::cargo_bin("crucible-cli").unwrap();
    cmd.current_dir(temp.path())
        .arg("--log-file")
        .arg(&log)
        .arg("run")
        .arg("--config")
        .arg(temp.path().join("configs/pipeline.yml"))
        .env_remove("RUST_LOG")
        .assert()
        .success();

    let contents = fs::read_to_string(&log).unwrap();
    assert!(contents.contains("stage started"));
    assert!(contents.contains("INFO"));
}
