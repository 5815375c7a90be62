//! Kernel binary and boot configuration to a bootable disc image.
//!
//! The mastering tool consumes a directory tree, so the image stage stages
//! one in a temporary directory inside the output root:
//!
//! ```text
//! isofiles-XXXXXX/
//!   boot/kernel.bin
//!   boot/grub/grub.cfg
//! ```
//!
//! The tree is a [`TempDir`] and is removed when this stage returns or its
//! future is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::consts::{STAGED_KERNEL_NAME, STAGING_PREFIX};
use crate::execute::BuildError;
use crate::graph::{BuildTarget, Recipe, TargetId, TargetKind};
use crate::layout::OutputLayout;
use crate::project::Project;
use crate::runner::{ToolInvocation, ToolOutput, ToolRunner};
use crate::toolchain::Toolchain;

use super::{Stage, ensure_inputs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecipe {
  pub program: String,
  pub kernel: PathBuf,
  pub boot_config: PathBuf,
  pub image: PathBuf,
  /// Directory the staging tree is created in.
  pub staging_parent: PathBuf,
}

impl ImageRecipe {
  /// `<mastering> -o <image> <staging>`
  pub fn invocation(&self, staging: &Path) -> ToolInvocation {
    ToolInvocation::new(&self.program)
      .arg("-o")
      .arg_path(&self.image)
      .arg_path(staging)
      .output(&self.image)
  }

  /// Invocation with a placeholder staging path, for dry runs.
  pub fn preview(&self) -> ToolInvocation {
    self.invocation(&self.staging_parent.join(format!("{STAGING_PREFIX}XXXXXX")))
  }
}

pub fn image_target(project: &Project, toolchain: &Toolchain, layout: &OutputLayout) -> BuildTarget {
  let recipe = ImageRecipe {
    program: toolchain.mastering.clone(),
    kernel: layout.binary.clone(),
    boot_config: project.boot_config.clone(),
    image: layout.image.clone(),
    staging_parent: layout.root.clone(),
  };

  BuildTarget::new(
    &layout.image,
    TargetKind::Image,
    vec![layout.binary.clone(), project.boot_config.clone()],
    Recipe::MasterImage(recipe),
  )
}

/// Stage the tree and run the mastering tool.
///
/// Checks both inputs before anything is created on disk.
pub async fn master<R: ToolRunner>(
  recipe: &ImageRecipe,
  target: &TargetId,
  runner: &R,
) -> Result<ToolOutput, BuildError> {
  ensure_inputs(
    Stage::Image,
    target,
    &[recipe.kernel.clone(), recipe.boot_config.clone()],
  )
  .await?;

  tokio::fs::create_dir_all(&recipe.staging_parent).await?;
  let staging = tempfile::Builder::new()
    .prefix(STAGING_PREFIX)
    .tempdir_in(&recipe.staging_parent)?;
  populate(&staging, recipe).await?;
  debug!(staging = ?staging.path(), "staged image tree");

  let invocation = recipe.invocation(staging.path());
  runner
    .run(&invocation)
    .await
    .map_err(|source| BuildError::ToolUnavailable {
      stage: Stage::Image,
      target: target.clone(),
      source,
    })
}

async fn populate(staging: &TempDir, recipe: &ImageRecipe) -> Result<(), BuildError> {
  let boot = staging.path().join("boot");
  let grub = boot.join("grub");
  tokio::fs::create_dir_all(&grub).await?;
  tokio::fs::copy(&recipe.kernel, boot.join(STAGED_KERNEL_NAME)).await?;
  tokio::fs::copy(&recipe.boot_config, grub.join("grub.cfg")).await?;
  Ok(())
}
