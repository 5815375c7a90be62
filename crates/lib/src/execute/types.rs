//! Types for plan execution.
//!
//! This module defines the error type, the execution report, and the
//! configuration for running a resolved build plan.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::graph::{GraphError, TargetId, TargetKind};
use crate::runner::ToolError;
use crate::stages::Stage;
use crate::toolchain::ConfigError;

/// Exit code reported when a tool cannot be found, as a shell would.
pub const EXIT_TOOL_NOT_FOUND: i32 = 127;

/// Errors that stop a build.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The tool ran and exited unsuccessfully.
  #[error("{stage}: {program} failed for {target} (exit code {})", display_code(.code))]
  ToolFailed {
    stage: Stage,
    target: TargetId,
    program: String,
    /// `None` when the tool was killed by a signal.
    code: Option<i32>,
    /// Tail of the tool's stderr.
    stderr: String,
  },

  /// The tool could not be started.
  #[error("{stage}: cannot run tool for {target}: {source}")]
  ToolUnavailable {
    stage: Stage,
    target: TargetId,
    #[source]
    source: ToolError,
  },

  /// A required input was absent when its target was about to run.
  #[error("{stage}: input {path} of {target} is missing")]
  MissingInput {
    stage: Stage,
    target: TargetId,
    path: PathBuf,
  },

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
  match code {
    Some(code) => code.to_string(),
    None => "none, terminated by signal".to_string(),
  }
}

impl BuildError {
  /// Process exit status for this failure.
  ///
  /// A tool's own nonzero code is passed through unchanged.
  pub fn exit_code(&self) -> i32 {
    match self {
      Self::ToolFailed { code: Some(code), .. } if *code != 0 => *code,
      Self::ToolUnavailable {
        source: ToolError::NotFound { .. },
        ..
      } => EXIT_TOOL_NOT_FOUND,
      _ => 1,
    }
  }

  /// The stage the failure belongs to, when there is one.
  pub fn stage(&self) -> Option<Stage> {
    match self {
      Self::ToolFailed { stage, .. } | Self::ToolUnavailable { stage, .. } | Self::MissingInput { stage, .. } => {
        Some(*stage)
      }
      Self::Graph(GraphError::MissingInput { stage, .. }) => Some(*stage),
      _ => None,
    }
  }
}

/// Why a target in the plan was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
  /// A target it depends on failed or was skipped.
  FailedDependency(TargetId),
  /// An unrelated target failed and execution stopped.
  Aborted,
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::FailedDependency(dep) => write!(f, "dependency {} failed", dep),
      Self::Aborted => write!(f, "build aborted"),
    }
  }
}

/// A target that was built successfully.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltTarget {
  pub id: TargetId,
  pub kind: TargetKind,
  pub duration: Duration,
}

/// Outcome of executing a plan.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Targets built, in completion order.
  pub built: Vec<BuiltTarget>,

  /// Targets that were already current.
  pub fresh: Vec<TargetId>,

  /// Targets that failed. Siblings in the same wave may fail together.
  pub failed: Vec<(TargetId, BuildError)>,

  /// Targets not attempted because execution stopped.
  pub skipped: BTreeMap<TargetId, SkipReason>,

  /// External tool invocations made.
  pub invocations: usize,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  /// The failure that determines the exit status.
  pub fn first_failure(&self) -> Option<&BuildError> {
    self.failed.first().map(|(_, e)| e)
  }

  pub fn exit_code(&self) -> i32 {
    match self.first_failure() {
      Some(err) => err.exit_code(),
      None if self.skipped.is_empty() => 0,
      None => 1,
    }
  }

  pub fn was_built(&self, id: &TargetId) -> bool {
    self.built.iter().any(|b| &b.id == id)
  }

  /// Total number of targets in the plan.
  pub fn total(&self) -> usize {
    self.built.len() + self.fresh.len() + self.failed.len() + self.skipped.len()
  }
}

/// Configuration for plan execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of tools running at once.
  pub parallelism: usize,
}

impl ExecuteConfig {
  pub fn with_parallelism(parallelism: Option<usize>) -> Self {
    match parallelism {
      Some(n) if n > 0 => Self { parallelism: n },
      _ => Self::default(),
    }
  }
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
