//! Tests for `bootkit run`.

use predicates::prelude::*;

use crate::common::{IMAGE, TestEnv};

#[test]
fn run_builds_image_then_boots_it() {
  let env = TestEnv::new(&["a.s"]);

  env
    .cmd()
    .arg("run")
    .assert()
    .success()
    .stdout(predicate::str::contains("Booting"))
    .stdout(predicate::str::contains("Hello from the serial console"));

  assert!(env.path(IMAGE).exists());
  assert_eq!(env.tools_run().last().map(String::as_str), Some("qemu"));

  let log = env.tool_log();
  let boot = log.last().unwrap();
  assert!(boot.contains("-cdrom"));
  assert!(boot.contains("os-x86_64.iso"));
  assert!(boot.contains("-serial stdio"));
  assert!(boot.contains("-gdb tcp::1234"));
}

#[test]
fn run_returns_emulator_exit_code() {
  let env = TestEnv::new(&["a.s"]);
  env.set_emulator_exit(33);

  env.cmd().arg("run").assert().code(33);
}

#[test]
fn run_with_fresh_image_only_boots() {
  let env = TestEnv::new(&["a.s"]);
  env.cmd().arg("iso").assert().success();
  env.clear_log();

  env.cmd().arg("run").assert().success();

  assert_eq!(env.tools_run(), vec!["qemu"]);
}

#[test]
fn run_does_not_boot_after_failed_build() {
  let env = TestEnv::new(&["a.s"]);
  env.fail_tool("grub-mkrescue", 4);

  env
    .cmd()
    .arg("run")
    .assert()
    .code(4)
    .stdout(predicate::str::contains("Booting").not());

  assert!(!env.tools_run().contains(&"qemu".to_string()));
}

#[test]
fn run_uses_configured_gdb_port_and_args() {
  let env = TestEnv::new(&["a.s"]);
  env.write_file("bootkit.toml", "[run]\ngdb_port = 4321\nargs = [\"-m\", \"256M\"]\n");

  env.cmd().arg("run").assert().success();

  let log = env.tool_log();
  let boot = log.last().unwrap();
  assert!(boot.contains("-gdb tcp::4321"));
  assert!(boot.ends_with("-m 256M"));
}

#[test]
fn run_reports_build_before_booting() {
  let env = TestEnv::new(&["a.s"]);

  let output = env.cmd().arg("run").output().unwrap();
  assert!(output.status.success());

  let stdout = String::from_utf8_lossy(&output.stdout);
  let report = stdout.find("Build complete!").unwrap();
  let booting = stdout.find("Booting").unwrap();
  let console = stdout.find("Hello from the serial console").unwrap();
  assert!(report < booting);
  assert!(booting < console);
}
