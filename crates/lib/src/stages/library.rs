//! Freestanding library crate to static archive.

use std::path::PathBuf;

use crate::consts::TARGET_PATH_ENV;
use crate::graph::{BuildTarget, Recipe, TargetKind};
use crate::layout::OutputLayout;
use crate::project::Project;
use crate::runner::ToolInvocation;
use crate::toolchain::{Profile, Toolchain};

/// The archive target.
///
/// `<compiler> build --target <triple> -Z build-std=<crates> [--release]`,
/// run in the library directory with the target spec search path and the
/// cargo target directory passed through the environment.
pub fn archive_target(
  project: &Project,
  toolchain: &Toolchain,
  layout: &OutputLayout,
  inputs: Vec<PathBuf>,
) -> BuildTarget {
  let mut invocation = ToolInvocation::new(&toolchain.compiler)
    .arg("build")
    .arg("--target")
    .arg(&toolchain.triple);

  if !toolchain.build_std.is_empty() {
    invocation = invocation
      .arg("-Z")
      .arg(format!("build-std={}", toolchain.build_std.join(",")));
  }
  if toolchain.profile == Profile::Release {
    invocation = invocation.arg("--release");
  }

  let invocation = invocation
    .env(TARGET_PATH_ENV, toolchain.target_spec_dir.to_string_lossy())
    .env("CARGO_TARGET_DIR", layout.cargo_target_dir.to_string_lossy())
    .cwd(&project.library_dir)
    .output(&layout.archive);

  BuildTarget::new(&layout.archive, TargetKind::Archive, inputs, Recipe::Tool(invocation))
}
