//! Tests for `bootkit clean`.

use predicates::prelude::*;
use serde_json::Value;

use crate::common::{IMAGE, OBJECT_A, TestEnv};

#[test]
fn clean_removes_build_directory() {
  let env = TestEnv::new(&["a.s"]);
  env.cmd().arg("iso").assert().success();
  assert!(env.path(IMAGE).exists());

  env
    .cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Clean complete!"));

  assert!(!env.path("build").exists());
  // Sources are never touched
  assert!(env.path("src/arch/x86_64/a.s").exists());
  assert!(env.path("src/arch/x86_64/linker.ld").exists());
}

#[test]
fn clean_twice_has_nothing_to_do() {
  let env = TestEnv::new(&["a.s"]);
  env.cmd().arg("all").assert().success();
  env.cmd().arg("clean").assert().success();

  env
    .cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to clean"));
}

#[test]
fn clean_on_fresh_project_succeeds() {
  let env = TestEnv::new(&["a.s"]);

  env
    .cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to clean"));
}

#[test]
fn clean_removes_leftover_staging_tree() {
  let env = TestEnv::new(&["a.s"]);
  env.cmd().arg("all").assert().success();
  env.write_file("build/isofiles-abc123/boot/kernel.bin", "stale");

  env.cmd().arg("clean").assert().success();

  assert!(env.staging_dirs().is_empty());
}

#[test]
fn clean_keeps_unrelated_files_in_output_root() {
  let env = TestEnv::new(&["a.s"]);
  env.cmd().arg("all").assert().success();
  env.write_file("build/notes.txt", "keep me");

  env.cmd().arg("clean").assert().success();

  assert!(!env.path(OBJECT_A).exists());
  assert!(env.path("build/notes.txt").exists());
}

#[test]
fn rebuild_after_clean_runs_every_tool() {
  let env = TestEnv::new(&["a.s"]);
  env.cmd().arg("iso").assert().success();
  env.cmd().arg("clean").assert().success();
  env.clear_log();

  env.cmd().arg("iso").assert().success();

  let mut tools = env.tools_run();
  tools.sort();
  assert_eq!(tools, vec!["cargo", "grub-mkrescue", "ld", "nasm"]);
}

#[test]
fn json_clean_lists_removed_paths() {
  let env = TestEnv::new(&["a.s"]);
  env.cmd().arg("all").assert().success();

  let output = env.cmd().args(["-o", "json", "clean"]).output().unwrap();
  assert!(output.status.success());

  let report: Value = serde_json::from_slice(&output.stdout).unwrap();
  let removed: Vec<&str> = report["removed"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(Value::as_str)
    .collect();
  assert!(removed.iter().any(|p| p.ends_with("kernel.bin")));
}
