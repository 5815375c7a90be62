//! Tests for configuration resolution through the CLI.

use predicates::prelude::*;

use crate::common::TestEnv;

#[test]
fn unsupported_arch_is_rejected() {
  let env = TestEnv::new(&["a.s"]);

  env
    .cmd()
    .args(["--arch", "sparc", "all"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("unsupported architecture"));

  assert!(env.tool_log().is_empty());
}

#[test]
fn i686_uses_32_bit_formats() {
  let env = TestEnv::new(&[]);
  env.write_file("src/arch/i686/boot.asm", "; entry\n");
  env.write_file("src/arch/i686/linker.ld", "ENTRY(start)\n");

  env.cmd().args(["--arch", "i686", "all"]).assert().success();

  let log = env.tool_log();
  assert!(log.iter().any(|l| l.starts_with("nasm ") && l.contains("-f elf32")));
  assert!(log.iter().any(|l| l.starts_with("ld ") && l.contains("-m elf_i386")));
  assert!(env.path("build/target/i686-unknown-none/kernel.bin").exists());
}

#[test]
fn project_file_moves_output_dir() {
  let env = TestEnv::new(&["a.s"]);
  env.write_file("bootkit.toml", "[paths]\noutput_dir = \"out\"\n");

  env.cmd().arg("all").assert().success();

  assert!(env.path("out/target/x86_64-unknown-none/kernel.bin").exists());
  assert!(!env.path("build").exists());
}

#[test]
fn release_flag_selects_release_archive() {
  let env = TestEnv::new(&["a.s"]);

  env.cmd().args(["--release", "all"]).assert().success();

  let log = env.tool_log();
  let cargo = log.iter().find(|l| l.starts_with("cargo ")).unwrap();
  assert!(cargo.contains("--release"));
  assert!(env.path("build/target/x86_64-unknown-none/release/libtest_kernel.a").exists());
}

#[test]
fn malformed_project_file_is_reported() {
  let env = TestEnv::new(&["a.s"]);
  env.write_file("bootkit.toml", "arch = [\n");

  env
    .cmd()
    .arg("all")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("bootkit.toml"));
}

#[test]
fn missing_project_dir_is_reported() {
  let env = TestEnv::new(&["a.s"]);

  env
    .cmd()
    .arg("-C")
    .arg(env.temp.path().join("nope"))
    .arg("all")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Project directory not found"));
}
