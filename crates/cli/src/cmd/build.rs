//! Implementation of the `bootkit all`, `kernel` and `iso` commands.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;

use bootkit_lib::Goal;
use bootkit_lib::execute::{BuildError, BuildReport, BuiltTarget, SkipReason};
use bootkit_lib::graph::TargetId;
use bootkit_lib::stages::Stage;

use super::{EXIT_INTERRUPTED, block_on_interruptible, load_pipeline};
use crate::GlobalArgs;
use crate::output::{
  OutputFormat, display_path, format_duration, print_detail, print_error, print_info, print_json, print_stat,
  print_success, print_warning,
};

/// Bring `goal` up to date and return the process exit code.
pub fn cmd_build(goal: Goal, global: &GlobalArgs) -> Result<i32> {
  let start = Instant::now();
  let pipeline = load_pipeline(global)?;
  let root = pipeline.project().root.clone();

  let Some(result) = block_on_interruptible(pipeline.build(goal))? else {
    return Ok(EXIT_INTERRUPTED);
  };

  match result {
    Ok(report) => {
      print_report(goal, &report, &root, global.output, start)?;
      Ok(report.exit_code())
    }
    Err(e) => {
      print_build_error(&e, global.output)?;
      Ok(e.exit_code())
    }
  }
}

#[derive(Serialize)]
struct FailureSummary {
  target: Option<TargetId>,
  stage: Option<Stage>,
  message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  stderr: Option<String>,
}

impl FailureSummary {
  fn new(target: Option<&TargetId>, err: &BuildError) -> Self {
    let stderr = match err {
      BuildError::ToolFailed { stderr, .. } if !stderr.is_empty() => Some(stderr.clone()),
      _ => None,
    };
    Self {
      target: target.cloned(),
      stage: err.stage(),
      message: err.to_string(),
      stderr,
    }
  }
}

#[derive(Serialize)]
struct BuildSummary<'a> {
  goal: Goal,
  success: bool,
  exit_code: i32,
  /// Every target the plan covered, whatever its outcome.
  targets: usize,
  built: &'a [BuiltTarget],
  fresh: &'a [TargetId],
  failed: Vec<FailureSummary>,
  skipped: &'a BTreeMap<TargetId, SkipReason>,
  invocations: usize,
}

/// Print a build report in the requested format.
pub(super) fn print_report(
  goal: Goal,
  report: &BuildReport,
  root: &Path,
  output: OutputFormat,
  start: Instant,
) -> Result<()> {
  if output.is_json() {
    return print_json(&BuildSummary {
      goal,
      success: report.is_success(),
      exit_code: report.exit_code(),
      targets: report.total(),
      built: &report.built,
      fresh: &report.fresh,
      failed: report
        .failed
        .iter()
        .map(|(id, e)| FailureSummary::new(Some(id), e))
        .collect(),
      skipped: &report.skipped,
      invocations: report.invocations,
    });
  }

  for built in &report.built {
    print_success(&format!(
      "{} {} ({})",
      built.kind,
      display_path(built.id.path(), root),
      format_duration(built.duration)
    ));
  }

  for (id, err) in &report.failed {
    print_error(&format!("{} failed: {}", display_path(id.path(), root), err));
    if let BuildError::ToolFailed { stderr, .. } = err {
      for line in stderr.lines() {
        print_detail(line);
      }
    }
  }

  for (id, reason) in &report.skipped {
    print_warning(&format!("{} skipped: {}", display_path(id.path(), root), reason));
  }

  println!();
  if report.is_success() {
    if report.built.is_empty() {
      print_info(&format!("Nothing to do, {} is up to date", goal));
    } else {
      print_success("Build complete!");
    }
  } else {
    print_error("Build failed");
  }
  print_stat("Built", &report.built.len().to_string());
  print_stat("Up to date", &report.fresh.len().to_string());
  if !report.skipped.is_empty() {
    print_stat("Skipped", &report.skipped.len().to_string());
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}

/// Print a failure that happened before any target ran.
pub(super) fn print_build_error(err: &BuildError, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    return print_json(&FailureSummary::new(None, err));
  }
  print_error(&err.to_string());
  Ok(())
}
