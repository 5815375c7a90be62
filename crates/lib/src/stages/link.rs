//! Objects, archive and placement script to the flat kernel binary.

use std::path::PathBuf;

use crate::graph::{BuildTarget, Recipe, TargetKind};
use crate::layout::OutputLayout;
use crate::project::Project;
use crate::runner::ToolInvocation;
use crate::toolchain::Toolchain;

/// The binary target.
///
/// Objects are passed before the archive so the linker resolves their
/// undefined symbols against it. The placement script is an input too, so
/// editing it relinks.
pub fn binary_target(
  project: &Project,
  toolchain: &Toolchain,
  layout: &OutputLayout,
  objects: &[PathBuf],
) -> BuildTarget {
  let mut invocation = ToolInvocation::new(&toolchain.linker)
    .arg("-n")
    .arg("--gc-sections")
    .arg("--strip-debug");

  if let Some(emulation) = toolchain.arch.linker_emulation() {
    invocation = invocation.arg("-m").arg(emulation);
  }

  invocation = invocation
    .arg("-T")
    .arg_path(&project.linker_script)
    .arg("-o")
    .arg_path(&layout.binary);
  for object in objects {
    invocation = invocation.arg_path(object);
  }
  let invocation = invocation.arg_path(&layout.archive).output(&layout.binary);

  let mut inputs = objects.to_vec();
  inputs.push(layout.archive.clone());
  inputs.push(project.linker_script.clone());

  BuildTarget::new(&layout.binary, TargetKind::Binary, inputs, Recipe::Tool(invocation))
}
