//! External tool invocation.
//!
//! Every stage describes its work as a [`ToolInvocation`] and hands it to a
//! [`ToolRunner`]. The pipeline owns the runner; stages never spawn
//! processes themselves, so tests can substitute a fake.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Number of trailing stderr lines kept in error reports.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("tool not found: {program}")]
  NotFound { program: String },

  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },
}

/// One fully specified external command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
  pub program: String,
  pub args: Vec<String>,
  /// Variables added to the inherited environment.
  pub env: BTreeMap<String, String>,
  pub cwd: Option<PathBuf>,
  /// Files the command is expected to write.
  pub outputs: Vec<PathBuf>,
  /// Inherit the terminal instead of capturing output.
  pub interactive: bool,
}

impl ToolInvocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn arg_path(self, path: &Path) -> Self {
    self.arg(path.to_string_lossy())
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
    self.outputs.push(path.into());
    self
  }

  pub fn interactive(mut self) -> Self {
    self.interactive = true;
    self
  }

  /// Shell-like rendering for logs and dry runs.
  pub fn command_line(&self) -> String {
    let mut parts = Vec::with_capacity(self.args.len() + 1);
    parts.push(quote(&self.program));
    parts.extend(self.args.iter().map(|a| quote(a)));
    parts.join(" ")
  }
}

fn quote(s: &str) -> String {
  if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
    s.to_string()
  } else {
    format!("'{}'", s.replace('\'', r"'\''"))
  }
}

/// What a finished tool reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  /// Exit code; `None` when the process was terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// The last lines of stderr.
  pub fn stderr_tail(&self) -> String {
    let lines: Vec<&str> = self.stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
  }
}

/// Runs external tools on behalf of the stages.
pub trait ToolRunner: Send + Sync + 'static {
  /// Run the invocation to completion.
  ///
  /// A nonzero exit is reported through [`ToolOutput::code`], not as an
  /// error; errors mean the process could not be started at all.
  fn run(&self, invocation: &ToolInvocation) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;
}

/// Spawns real processes with `tokio::process`.
///
/// Children are killed when their future is dropped, so cancelling the
/// pipeline never leaves a tool running.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
  async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
    info!(cmd = %invocation.command_line(), "running tool");

    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).envs(&invocation.env).kill_on_drop(true);
    if let Some(dir) = &invocation.cwd {
      command.current_dir(dir);
    }

    let spawn_err = |source: io::Error| {
      if source.kind() == io::ErrorKind::NotFound {
        ToolError::NotFound {
          program: invocation.program.clone(),
        }
      } else {
        ToolError::Spawn {
          program: invocation.program.clone(),
          source,
        }
      }
    };

    if invocation.interactive {
      command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
      let status = command.status().await.map_err(spawn_err)?;
      debug!(program = %invocation.program, code = ?status.code(), "interactive tool exited");
      return Ok(ToolOutput {
        code: status.code(),
        ..Default::default()
      });
    }

    command.stdin(Stdio::null());
    let output = command.output().await.map_err(spawn_err)?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "tool stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "tool stdout");
    }

    Ok(ToolOutput {
      code: output.status.code(),
      stdout,
      stderr,
    })
  }
}
