//! Build target declarations.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::runner::ToolInvocation;
use crate::stages::Stage;
use crate::stages::image::ImageRecipe;

/// Identity of a target: its output path, unique across the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetId(pub PathBuf);

impl TargetId {
  pub fn path(&self) -> &Path {
    &self.0
  }
}

impl fmt::Display for TargetId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.display())
  }
}

impl From<PathBuf> for TargetId {
  fn from(path: PathBuf) -> Self {
    Self(path)
  }
}

impl From<&Path> for TargetId {
  fn from(path: &Path) -> Self {
    Self(path.to_path_buf())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
  Object,
  Archive,
  Binary,
  Image,
}

impl TargetKind {
  /// The stage responsible for producing targets of this kind.
  pub fn stage(&self) -> Stage {
    match self {
      Self::Object => Stage::Assemble,
      Self::Archive => Stage::Library,
      Self::Binary => Stage::Link,
      Self::Image => Stage::Image,
    }
  }
}

impl fmt::Display for TargetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Object => "object",
      Self::Archive => "archive",
      Self::Binary => "binary",
      Self::Image => "image",
    };
    f.write_str(name)
  }
}

/// How a target's output gets produced.
#[derive(Debug, Clone)]
pub enum Recipe {
  /// A single external tool invocation.
  Tool(ToolInvocation),
  /// Stage the kernel and boot configuration, then run the mastering tool.
  MasterImage(ImageRecipe),
}

impl Recipe {
  /// The command this recipe runs. The image staging path is a placeholder.
  pub fn preview(&self) -> ToolInvocation {
    match self {
      Self::Tool(invocation) => invocation.clone(),
      Self::MasterImage(recipe) => recipe.preview(),
    }
  }
}

/// A declared build target.
#[derive(Debug, Clone)]
pub struct BuildTarget {
  pub id: TargetId,
  pub kind: TargetKind,
  /// Inputs in declaration order. Order matters to the recipe, not to staleness.
  pub inputs: Vec<PathBuf>,
  pub recipe: Recipe,
}

impl BuildTarget {
  pub fn new(output: impl Into<PathBuf>, kind: TargetKind, inputs: Vec<PathBuf>, recipe: Recipe) -> Self {
    Self {
      id: TargetId(output.into()),
      kind,
      inputs,
      recipe,
    }
  }

  pub fn output(&self) -> &Path {
    self.id.path()
  }

  pub fn stage(&self) -> Stage {
    self.kind.stage()
  }
}
