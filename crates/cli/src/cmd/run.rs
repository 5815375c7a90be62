//! Implementation of the `bootkit run` command.

use std::time::Instant;

use anyhow::Result;

use bootkit_lib::Goal;

use super::build::{print_build_error, print_report};
use super::{EXIT_INTERRUPTED, block_on_interruptible, load_pipeline};
use crate::GlobalArgs;
use crate::output::{display_path, print_info, symbols};

/// Build the image, boot it and return the emulator's exit code.
pub fn cmd_run(global: &GlobalArgs) -> Result<i32> {
  let start = Instant::now();
  let pipeline = load_pipeline(global)?;
  let root = pipeline.project().root.clone();
  let mut printed = Ok(());

  let ran = block_on_interruptible(pipeline.run(|report| {
    printed = print_report(Goal::Image, report, &root, global.output, start);
    if report.is_success() && !global.output.is_json() {
      print_info(&format!(
        "Booting {} {} {}",
        display_path(&pipeline.layout().image, &root),
        symbols::ARROW,
        pipeline.toolchain().emulator
      ));
    }
  }))?;
  printed?;

  let Some(ran) = ran else {
    return Ok(EXIT_INTERRUPTED);
  };
  match ran {
    Ok(outcome) => Ok(outcome.exit_code),
    Err(e) => {
      print_build_error(&e, global.output)?;
      Ok(e.exit_code())
    }
  }
}
