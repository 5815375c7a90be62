//! Plan execution.
//!
//! Runs a resolved [`BuildPlan`] wave by wave. Targets within a wave run
//! concurrently on a `JoinSet`, bounded by a semaphore. A failure lets the
//! targets already running finish; targets still waiting for a permit and
//! everything left in the plan are skipped.

mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::graph::{BuildPlan, BuildTarget, Recipe, TargetGraph, TargetId};
use crate::runner::{ToolInvocation, ToolOutput, ToolRunner};
use crate::stages::{ensure_inputs, image};

pub use types::{BuildError, BuildReport, BuiltTarget, EXIT_TOOL_NOT_FOUND, ExecuteConfig, SkipReason};

/// Execute a resolved plan.
///
/// Never returns early: every target in the plan ends up built, failed or
/// skipped in the report.
pub async fn execute_plan<R: ToolRunner>(
  graph: &TargetGraph,
  plan: &BuildPlan,
  runner: Arc<R>,
  config: &ExecuteConfig,
) -> BuildReport {
  info!(targets = plan.len(), waves = plan.waves.len(), "starting build execution");

  let mut report = BuildReport {
    fresh: plan.fresh.clone(),
    ..Default::default()
  };
  let mut broken: HashSet<TargetId> = HashSet::new();
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let aborted = Arc::new(AtomicBool::new(false));

  for (wave_idx, wave) in plan.waves.iter().enumerate() {
    if !report.failed.is_empty() {
      for id in wave {
        let reason = graph
          .dependencies(id)
          .into_iter()
          .find(|dep| broken.contains(dep))
          .map(SkipReason::FailedDependency)
          .unwrap_or(SkipReason::Aborted);
        warn!(target = %id, reason = %reason, "skipping target");
        broken.insert(id.clone());
        report.skipped.insert(id.clone(), reason);
      }
      continue;
    }

    debug!(wave = wave_idx, targets = wave.len(), "executing wave");

    let mut join_set = JoinSet::new();
    let mut in_flight: HashMap<tokio::task::Id, TargetId> = HashMap::new();

    for id in wave {
      let Some(target) = graph.get(id).cloned() else {
        report.failed.push((id.clone(), crate::graph::GraphError::UnknownTarget(id.clone()).into()));
        broken.insert(id.clone());
        continue;
      };
      let runner = runner.clone();
      let semaphore = semaphore.clone();
      let aborted = aborted.clone();

      let handle = join_set.spawn(async move {
        let permit = semaphore.acquire_owned().await;
        // A sibling failed while this target waited for a permit.
        if aborted.load(Ordering::SeqCst) {
          return (target, None, std::time::Duration::ZERO);
        }
        let started = Instant::now();
        let outcome = match permit {
          Ok(_permit) => {
            let outcome = run_target(&target, runner.as_ref()).await;
            if outcome.result.is_err() {
              aborted.store(true, Ordering::SeqCst);
            }
            outcome
          }
          Err(_) => TargetOutcome {
            result: Err(BuildError::Io(std::io::Error::other("executor semaphore closed"))),
            invocations: 0,
            invocation: None,
          },
        };
        (target, Some(outcome), started.elapsed())
      });
      in_flight.insert(handle.id(), id.clone());
    }

    while let Some(joined) = join_set.join_next_with_id().await {
      match joined {
        Ok((_, (target, None, _))) => {
          warn!(target = %target.id, reason = %SkipReason::Aborted, "skipping target");
          broken.insert(target.id.clone());
          report.skipped.insert(target.id, SkipReason::Aborted);
        }
        Ok((_, (target, Some(outcome), duration))) => {
          report.invocations += outcome.invocations;
          match outcome.result {
            Ok(()) => {
              info!(target = %target.id, kind = %target.kind, ?duration, "target built");
              check_outputs(&target, outcome.invocation.as_ref());
              report.built.push(BuiltTarget {
                id: target.id,
                kind: target.kind,
                duration,
              });
            }
            Err(e) => {
              error!(target = %target.id, error = %e, "target failed");
              remove_partial_output(&target).await;
              broken.insert(target.id.clone());
              report.failed.push((target.id, e));
            }
          }
        }
        Err(e) => {
          let id = in_flight.get(&e.id()).cloned();
          error!(error = %e, target = ?id, "build task panicked");
          aborted.store(true, Ordering::SeqCst);
          if let Some(id) = id {
            broken.insert(id.clone());
            report
              .failed
              .push((id, BuildError::Io(std::io::Error::other(format!("build task panicked: {e}")))));
          }
        }
      }
    }
  }

  info!(
    built = report.built.len(),
    fresh = report.fresh.len(),
    failed = report.failed.len(),
    skipped = report.skipped.len(),
    invocations = report.invocations,
    "build execution complete"
  );

  report
}

struct TargetOutcome {
  result: Result<(), BuildError>,
  invocations: usize,
  invocation: Option<ToolInvocation>,
}

/// Run one target's recipe and turn the tool's answer into a result.
async fn run_target<R: ToolRunner>(target: &BuildTarget, runner: &R) -> TargetOutcome {
  let stage = target.stage();

  if let Some(parent) = target.output().parent()
    && let Err(e) = tokio::fs::create_dir_all(parent).await
  {
    return TargetOutcome {
      result: Err(e.into()),
      invocations: 0,
      invocation: None,
    };
  }

  let (invocation, ran) = match &target.recipe {
    Recipe::Tool(invocation) => {
      if let Err(e) = ensure_inputs(stage, &target.id, &target.inputs).await {
        return TargetOutcome {
          result: Err(e),
          invocations: 0,
          invocation: None,
        };
      }
      info!(target = %target.id, stage = %stage, "building target");
      let ran = runner
        .run(invocation)
        .await
        .map_err(|source| BuildError::ToolUnavailable {
          stage,
          target: target.id.clone(),
          source,
        });
      (invocation.clone(), ran)
    }
    Recipe::MasterImage(recipe) => {
      info!(target = %target.id, stage = %stage, "building target");
      let ran = image::master(recipe, &target.id, runner).await;
      // Input checks and staging come before the tool; their errors mean nothing ran.
      if !matches!(ran, Ok(_) | Err(BuildError::ToolUnavailable { .. })) {
        return TargetOutcome {
          result: ran.map(|_| ()),
          invocations: 0,
          invocation: None,
        };
      }
      (target.recipe.preview(), ran)
    }
  };

  let result = ran.and_then(|output| into_result(target, &invocation, output));
  TargetOutcome {
    result,
    invocations: 1,
    invocation: Some(invocation),
  }
}

fn into_result(target: &BuildTarget, invocation: &ToolInvocation, output: ToolOutput) -> Result<(), BuildError> {
  if output.success() {
    return Ok(());
  }
  Err(BuildError::ToolFailed {
    stage: target.stage(),
    target: target.id.clone(),
    program: invocation.program.clone(),
    code: output.code,
    stderr: output.stderr_tail(),
  })
}

/// Warn when a tool reported success without writing what it promised.
///
/// The next target's input check turns this into a hard `MissingInput`.
fn check_outputs(target: &BuildTarget, invocation: Option<&ToolInvocation>) {
  let mut expected = invocation.map(|inv| inv.outputs.clone()).unwrap_or_default();
  if !expected.iter().any(|p| p == target.output()) {
    expected.push(target.output().to_path_buf());
  }

  for path in expected {
    if !path.exists() {
      warn!(target = %target.id, path = ?path, "tool succeeded but expected output is missing");
    }
  }
}

/// Delete whatever a failed target left at its output path.
async fn remove_partial_output(target: &BuildTarget) {
  match tokio::fs::remove_file(target.output()).await {
    Ok(()) => debug!(target = %target.id, "removed partial output"),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => warn!(target = %target.id, error = %e, "failed to remove partial output"),
  }
}
