//! Entry-point source units to relocatable objects.

use std::path::PathBuf;

use crate::graph::{BuildTarget, Recipe, TargetKind};
use crate::layout::OutputLayout;
use crate::project::Project;
use crate::runner::ToolInvocation;
use crate::toolchain::Toolchain;

/// One object target per source unit: `<assembler> -f <format> <src> -o <obj>`.
pub fn object_targets(
  project: &Project,
  toolchain: &Toolchain,
  layout: &OutputLayout,
  sources: &[PathBuf],
) -> Vec<BuildTarget> {
  sources
    .iter()
    .map(|source| {
      let object = layout.object_for(&project.source_root, source);
      let invocation = ToolInvocation::new(&toolchain.assembler)
        .arg("-f")
        .arg(toolchain.arch.object_format())
        .arg_path(source)
        .arg("-o")
        .arg_path(&object)
        .output(&object);

      BuildTarget::new(object, TargetKind::Object, vec![source.clone()], Recipe::Tool(invocation))
    })
    .collect()
}
