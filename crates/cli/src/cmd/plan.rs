//! Implementation of the `bootkit plan` command.
//!
//! Resolves a goal against the current file timestamps and prints the waves
//! that a build would run, with the command for each target. No tool is
//! invoked and nothing is written.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use bootkit_lib::Goal;
use bootkit_lib::graph::{Staleness, TargetId, TargetKind};

use super::build::print_build_error;
use super::load_pipeline;
use crate::GlobalArgs;
use crate::output::{display_path, print_detail, print_info, print_json, print_stat, print_success, symbols};

#[derive(Serialize)]
struct PlannedTarget {
  id: TargetId,
  kind: TargetKind,
  reason: Staleness,
  command: String,
}

#[derive(Serialize)]
struct PlanSummary {
  goal: Goal,
  waves: Vec<Vec<PlannedTarget>>,
  fresh: Vec<TargetId>,
  reasons: BTreeMap<TargetId, Staleness>,
}

pub fn cmd_plan(goal: Goal, global: &GlobalArgs) -> Result<i32> {
  let pipeline = load_pipeline(global)?;
  let root = pipeline.project().root.clone();

  let (graph, plan) = match pipeline.plan(goal) {
    Ok(resolved) => resolved,
    Err(e) => {
      print_build_error(&e, global.output)?;
      return Ok(e.exit_code());
    }
  };

  let waves: Vec<Vec<PlannedTarget>> = plan
    .waves
    .iter()
    .map(|wave| {
      wave
        .iter()
        .filter_map(|id| graph.get(id))
        .map(|target| PlannedTarget {
          id: target.id.clone(),
          kind: target.kind,
          reason: plan.reasons.get(&target.id).cloned().unwrap_or(Staleness::Fresh),
          command: target.recipe.preview().command_line(),
        })
        .collect()
    })
    .collect();

  if global.output.is_json() {
    print_json(&PlanSummary {
      goal,
      waves,
      fresh: plan.fresh.clone(),
      reasons: plan.reasons.clone(),
    })?;
    return Ok(0);
  }

  if plan.is_empty() {
    print_success(&format!("Nothing to do, {} is up to date", goal));
    print_stat("Up to date", &plan.fresh.len().to_string());
    return Ok(0);
  }

  print_info(&format!(
    "Plan for {}: {} target(s) in {} wave(s)",
    goal,
    plan.len(),
    plan.waves.len()
  ));
  for (idx, wave) in waves.iter().enumerate() {
    println!();
    println!("Wave {}", idx + 1);
    for target in wave {
      println!(
        "  {} {} {} ({})",
        symbols::PLUS,
        target.kind,
        display_path(target.id.path(), &root),
        target.reason
      );
      if global.verbose {
        print_detail(&target.command);
      }
    }
  }
  println!();
  print_stat("To build", &plan.len().to_string());
  print_stat("Up to date", &plan.fresh.len().to_string());

  Ok(0)
}
