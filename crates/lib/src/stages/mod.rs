//! Build stages.
//!
//! Each stage turns configuration and discovered sources into target
//! declarations. Only the image stage has behavior of its own; the others
//! are a single tool invocation per target and run through the executor.

pub mod assemble;
pub mod clean;
pub mod image;
pub mod launch;
pub mod library;
pub mod link;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::execute::BuildError;
use crate::graph::{BuildTarget, TargetId};
use crate::layout::OutputLayout;
use crate::project::Project;
use crate::toolchain::Toolchain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Assemble,
  Library,
  Link,
  Image,
  Launch,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Assemble => "assemble",
      Self::Library => "library",
      Self::Link => "link",
      Self::Image => "image",
      Self::Launch => "launch",
    };
    f.write_str(name)
  }
}

/// Every target of the project, in declaration order.
///
/// Objects first (one per source unit), then the archive, the binary and
/// the image.
pub fn declare_targets(
  project: &Project,
  toolchain: &Toolchain,
  layout: &OutputLayout,
  sources: &[PathBuf],
  library_inputs: Vec<PathBuf>,
) -> Vec<BuildTarget> {
  let mut targets = assemble::object_targets(project, toolchain, layout, sources);
  let objects: Vec<PathBuf> = targets.iter().map(|t| t.output().to_path_buf()).collect();

  targets.push(library::archive_target(project, toolchain, layout, library_inputs));
  targets.push(link::binary_target(project, toolchain, layout, &objects));
  targets.push(image::image_target(project, toolchain, layout));
  targets
}

/// Fail with `MissingInput` if any input is absent right now.
pub async fn ensure_inputs(stage: Stage, target: &TargetId, inputs: &[PathBuf]) -> Result<(), BuildError> {
  for input in inputs {
    if !tokio::fs::try_exists(input).await? {
      return Err(BuildError::MissingInput {
        stage,
        target: target.clone(),
        path: input.clone(),
      });
    }
  }
  Ok(())
}
