mod build;
mod clean;
mod plan;
mod run;

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use bootkit_lib::Pipeline;
use bootkit_lib::execute::ExecuteConfig;
use bootkit_lib::runner::ProcessRunner;
use bootkit_lib::toolchain::{ConfigError, ToolchainOverrides};

use crate::GlobalArgs;
use crate::output::print_warning;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use plan::cmd_plan;
pub use run::cmd_run;

/// Exit status after Ctrl-C, as a shell reports SIGINT.
pub const EXIT_INTERRUPTED: i32 = 130;

type Loader = fn(&Path, &ToolchainOverrides, ProcessRunner) -> Result<Pipeline<ProcessRunner>, ConfigError>;

/// Resolve configuration and build a pipeline that spawns real tools.
fn load_pipeline(global: &GlobalArgs) -> Result<Pipeline<ProcessRunner>> {
  open_pipeline(global, Pipeline::load)
}

/// Like [`load_pipeline`], without requiring a readable library manifest.
fn load_pipeline_for_clean(global: &GlobalArgs) -> Result<Pipeline<ProcessRunner>> {
  open_pipeline(global, Pipeline::load_for_clean)
}

fn open_pipeline(global: &GlobalArgs, load: Loader) -> Result<Pipeline<ProcessRunner>> {
  let root = dunce::canonicalize(&global.project_dir)
    .with_context(|| format!("Project directory not found: {}", global.project_dir.display()))?;

  let pipeline = load(&root, &global.overrides(), ProcessRunner)
    .with_context(|| format!("Failed to load project: {}", root.display()))?;
  debug!(
    arch = %pipeline.toolchain().arch,
    triple = %pipeline.toolchain().triple,
    output = ?pipeline.layout().root,
    "project loaded"
  );

  Ok(pipeline.with_config(ExecuteConfig::with_parallelism(global.jobs)))
}

/// Drive `fut` on a fresh runtime until it finishes or Ctrl-C arrives.
///
/// Returns `None` when interrupted. Dropping the future kills running tools
/// and removes any staging tree.
fn block_on_interruptible<F: Future>(fut: F) -> Result<Option<F::Output>> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  Ok(rt.block_on(async {
    tokio::select! {
      output = fut => Some(output),
      _ = tokio::signal::ctrl_c() => {
        print_warning("Interrupted");
        None
      }
    }
  }))
}
