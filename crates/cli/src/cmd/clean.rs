//! Implementation of the `bootkit clean` command.

use anyhow::Result;

use super::build::print_build_error;
use super::load_pipeline_for_clean;
use crate::GlobalArgs;
use crate::output::{display_path, print_info, print_json, print_stat, print_success, symbols};

pub fn cmd_clean(global: &GlobalArgs) -> Result<i32> {
  let pipeline = load_pipeline_for_clean(global)?;
  let root = pipeline.project().root.clone();

  let report = match pipeline.clean() {
    Ok(report) => report,
    Err(e) => {
      print_build_error(&e, global.output)?;
      return Ok(e.exit_code());
    }
  };

  if global.output.is_json() {
    print_json(&report)?;
    return Ok(0);
  }

  if report.is_empty() {
    print_info("Nothing to clean");
    return Ok(0);
  }

  if global.verbose {
    for path in &report.removed {
      println!("  {} {}", symbols::MINUS, display_path(path, &root));
    }
  }
  print_success("Clean complete!");
  print_stat("Removed", &report.removed.len().to_string());

  Ok(0)
}
