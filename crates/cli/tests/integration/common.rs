//! Shared test helpers for CLI integration tests.

use std::fs::OpenOptions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Writes the file named after `-o`, logs its argv.
const OUTPUT_TOOL: &str = r#"#!/bin/sh
echo "@NAME@ $*" >> "@LOG@"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    shift
    out="$1"
  fi
  shift
done
if [ -n "$out" ]; then
  mkdir -p "$(dirname "$out")"
  echo "@NAME@" > "$out"
fi
"#;

/// Writes the archive where cargo would, logs its argv.
const CARGO_TOOL: &str = r#"#!/bin/sh
echo "cargo $*" >> "@LOG@"
profile=debug
triple=""
prev=""
for a in "$@"; do
  if [ "$prev" = "--target" ]; then triple="$a"; fi
  if [ "$a" = "--release" ]; then profile=release; fi
  prev="$a"
done
if [ -z "$RUST_TARGET_PATH" ] || [ -z "$CARGO_TARGET_DIR" ]; then
  echo "environment not set" >&2
  exit 7
fi
mkdir -p "$CARGO_TARGET_DIR/$triple/$profile"
echo archive > "$CARGO_TARGET_DIR/$triple/$profile/libtest_kernel.a"
"#;

/// `-o <image> <staging>`: checks the staged tree, then writes the image.
const MASTERING_TOOL: &str = r#"#!/bin/sh
echo "grub-mkrescue $*" >> "@LOG@"
test -f "$3/boot/kernel.bin" || exit 9
test -f "$3/boot/grub/grub.cfg" || exit 9
echo iso > "$2"
"#;

/// Prints a console line and exits with `@CODE@`.
const EMULATOR_TOOL: &str = r#"#!/bin/sh
echo "qemu $*" >> "@LOG@"
echo "Hello from the serial console"
exit @CODE@
"#;

/// Logs, complains on stderr and exits with `@CODE@`.
const FAILING_TOOL: &str = r#"#!/bin/sh
echo "@NAME@ $*" >> "@LOG@"
echo "@NAME@: error: something went wrong" >&2
exit @CODE@
"#;

/// Isolated kernel project with fake tools.
///
/// Each test gets its own temporary directory holding the project, a `bin/`
/// directory of shell-script tools, and a log every tool appends its argv to.
pub struct TestEnv {
  pub temp: TempDir,
  pub root: PathBuf,
  pub bin: PathBuf,
  pub log: PathBuf,
}

impl TestEnv {
  /// A project with the given entry-point sources under `src/arch/x86_64`.
  pub fn new(sources: &[&str]) -> Self {
    let temp = TempDir::new().unwrap();
    let base = dunce::canonicalize(temp.path()).unwrap();
    let root = base.join("kernel");
    let bin = base.join("bin");
    let log = base.join("tools.log");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::write(&log, "").unwrap();

    let env = Self { temp, root, bin, log };

    env.write_file("Cargo.toml", "[package]\nname = \"test-kernel\"\nversion = \"0.1.0\"\n");
    env.write_file("src/lib.rs", "#![no_std]\n");
    env.write_file("src/arch/x86_64/linker.ld", "ENTRY(start)\n");
    env.write_file("src/arch/x86_64/grub.cfg", "menuentry \"os\" { multiboot2 /boot/kernel.bin }\n");
    for source in sources {
      env.write_file(&format!("src/arch/x86_64/{}", source), "; entry point\n");
    }

    env.install("nasm", &template(OUTPUT_TOOL, "nasm", &env.log, 0));
    env.install("ld", &template(OUTPUT_TOOL, "ld", &env.log, 0));
    env.install("cargo", &template(CARGO_TOOL, "cargo", &env.log, 0));
    env.install("grub-mkrescue", &template(MASTERING_TOOL, "grub-mkrescue", &env.log, 0));
    env.set_emulator_exit(0);
    env
  }

  /// A bootkit command pointed at this project and its fake tools.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("bootkit");
    cmd
      .env_remove("RUST_TARGET_PATH")
      .env_remove("RUST_LOG")
      .arg("-C")
      .arg(&self.root)
      .arg("--assembler")
      .arg(self.tool("nasm"))
      .arg("--compiler")
      .arg(self.tool("cargo"))
      .arg("--linker")
      .arg(self.tool("ld"))
      .arg("--mastering-tool")
      .arg(self.tool("grub-mkrescue"))
      .arg("--emulator")
      .arg(self.tool("qemu"));
    cmd
  }

  pub fn tool(&self, name: &str) -> PathBuf {
    self.bin.join(name)
  }

  /// Replace `name` with a tool that fails with `code`.
  pub fn fail_tool(&self, name: &str, code: i32) {
    self.install(name, &template(FAILING_TOOL, name, &self.log, code));
  }

  pub fn set_emulator_exit(&self, code: i32) {
    self.install("qemu", &template(EMULATOR_TOOL, "qemu", &self.log, code));
  }

  fn install(&self, name: &str, script: &str) {
    let path = self.tool(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root.join(relative_path)
  }

  /// Mark a project file as modified well after anything built so far.
  pub fn touch(&self, relative_path: &str) {
    let file = OpenOptions::new().write(true).open(self.path(relative_path)).unwrap();
    file
      .set_modified(SystemTime::now() + Duration::from_secs(60))
      .unwrap();
  }

  pub fn mtime(&self, relative_path: &str) -> SystemTime {
    std::fs::metadata(self.path(relative_path)).unwrap().modified().unwrap()
  }

  /// Tool invocations so far, one line each: `<tool> <args...>`.
  pub fn tool_log(&self) -> Vec<String> {
    std::fs::read_to_string(&self.log)
      .unwrap()
      .lines()
      .map(str::to_string)
      .collect()
  }

  /// Tool names invoked so far, in order.
  pub fn tools_run(&self) -> Vec<String> {
    self
      .tool_log()
      .iter()
      .filter_map(|line| line.split_whitespace().next().map(str::to_string))
      .collect()
  }

  pub fn clear_log(&self) {
    std::fs::write(&self.log, "").unwrap();
  }

  /// Staging directories left in the output root.
  pub fn staging_dirs(&self) -> Vec<PathBuf> {
    let build = self.path("build");
    match std::fs::read_dir(&build) {
      Ok(entries) => entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| is_staging(p))
        .collect(),
      Err(_) => Vec::new(),
    }
  }
}

fn is_staging(path: &Path) -> bool {
  path
    .file_name()
    .is_some_and(|n| n.to_string_lossy().starts_with("isofiles-"))
}

fn template(script: &str, name: &str, log: &Path, code: i32) -> String {
  script
    .replace("@NAME@", name)
    .replace("@LOG@", &log.to_string_lossy())
    .replace("@CODE@", &code.to_string())
}

pub const OBJECT_A: &str = "build/arch/x86_64/a.o";
pub const OBJECT_B: &str = "build/arch/x86_64/b.o";
pub const ARCHIVE: &str = "build/target/x86_64-unknown-none/debug/libtest_kernel.a";
pub const BINARY: &str = "build/target/x86_64-unknown-none/kernel.bin";
pub const IMAGE: &str = "build/os-x86_64.iso";
