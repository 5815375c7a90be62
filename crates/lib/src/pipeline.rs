//! The build pipeline.
//!
//! A [`Pipeline`] owns the resolved configuration and the tool runner. Each
//! call discovers sources, declares the target graph, takes one timestamp
//! snapshot, resolves the requested goal and executes the plan.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::discover;
use crate::execute::{BuildError, BuildReport, ExecuteConfig, execute_plan};
use crate::graph::{BuildPlan, FileStates, TargetGraph, TargetId};
use crate::layout::OutputLayout;
use crate::project::{Project, ProjectFile};
use crate::runner::ToolRunner;
use crate::stages::{self, clean::CleanReport, launch};
use crate::toolchain::{ConfigError, Toolchain, ToolchainOverrides};

/// What a build invocation should end up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
  /// The linked flat binary.
  Binary,
  /// The flat binary, with the library build always re-run so cargo can
  /// apply its own incrementality.
  Kernel,
  /// The bootable disc image.
  Image,
}

impl Goal {
  pub fn target(&self, layout: &OutputLayout) -> TargetId {
    match self {
      Self::Binary | Self::Kernel => TargetId::from(layout.binary.as_path()),
      Self::Image => TargetId::from(layout.image.as_path()),
    }
  }

  /// Targets rebuilt regardless of timestamps.
  pub fn forced(&self, layout: &OutputLayout) -> Vec<TargetId> {
    match self {
      Self::Kernel => vec![TargetId::from(layout.archive.as_path())],
      Self::Binary | Self::Image => Vec::new(),
    }
  }
}

impl fmt::Display for Goal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Binary => "binary",
      Self::Kernel => "kernel",
      Self::Image => "image",
    };
    f.write_str(name)
  }
}

/// Result of `run`: the image build, then the emulator session.
#[derive(Debug)]
pub struct RunOutcome {
  pub report: BuildReport,
  /// Whether the emulator was started.
  pub launched: bool,
  /// The emulator's exit code, or the build's when it never launched.
  pub exit_code: i32,
}

pub struct Pipeline<R: ToolRunner> {
  project: Project,
  toolchain: Toolchain,
  layout: OutputLayout,
  runner: Arc<R>,
  config: ExecuteConfig,
}

impl<R: ToolRunner> Pipeline<R> {
  pub fn new(project: Project, toolchain: Toolchain, runner: R) -> Self {
    let layout = OutputLayout::new(&project, &toolchain);
    Self {
      project,
      toolchain,
      layout,
      runner: Arc::new(runner),
      config: ExecuteConfig::default(),
    }
  }

  /// Resolve configuration for the project at `root` and build a pipeline.
  ///
  /// Precedence is `overrides`, then `bootkit.toml`, then defaults.
  pub fn load(root: &Path, overrides: &ToolchainOverrides, runner: R) -> Result<Self, ConfigError> {
    Self::load_with(root, overrides, runner, Project::resolve)
  }

  /// Load a pipeline that is only going to [`clean`](Self::clean).
  ///
  /// Tolerates a missing or nameless library manifest.
  pub fn load_for_clean(root: &Path, overrides: &ToolchainOverrides, runner: R) -> Result<Self, ConfigError> {
    Self::load_with(root, overrides, runner, Project::resolve_lenient)
  }

  fn load_with(
    root: &Path,
    overrides: &ToolchainOverrides,
    runner: R,
    resolve: fn(&Path, &ProjectFile, &Toolchain) -> Result<Project, ConfigError>,
  ) -> Result<Self, ConfigError> {
    if !root.is_dir() {
      return Err(ConfigError::ProjectNotFound(root.to_path_buf()));
    }
    let file = ProjectFile::load(root)?;
    let toolchain = Toolchain::resolve(overrides, &file, root)?;
    let project = resolve(root, &file, &toolchain)?;
    Ok(Self::new(project, toolchain, runner))
  }

  pub fn with_config(mut self, config: ExecuteConfig) -> Self {
    self.config = config;
    self
  }

  pub fn project(&self) -> &Project {
    &self.project
  }

  pub fn toolchain(&self) -> &Toolchain {
    &self.toolchain
  }

  pub fn layout(&self) -> &OutputLayout {
    &self.layout
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  /// Discover sources and declare every target.
  pub fn graph(&self) -> Result<TargetGraph, BuildError> {
    let sources = discover::entry_point_sources(&self.project.source_root, &self.project.source_extensions)?;
    if sources.is_empty() {
      warn!(root = ?self.project.source_root, "no entry-point sources found");
    }
    let library_inputs = discover::library_inputs(&self.project, &self.toolchain)?;
    let targets = stages::declare_targets(&self.project, &self.toolchain, &self.layout, &sources, library_inputs);
    Ok(TargetGraph::from_targets(targets)?)
  }

  /// Resolve `goal` without running anything.
  pub fn plan(&self, goal: Goal) -> Result<(TargetGraph, BuildPlan), BuildError> {
    let graph = self.graph()?;
    let states = FileStates::scan(graph.paths());
    let plan = graph.resolve_forcing(&goal.target(&self.layout), &states, &goal.forced(&self.layout))?;
    Ok((graph, plan))
  }

  /// Bring `goal` up to date.
  ///
  /// Errors are configuration, discovery and resolution failures; a failing
  /// tool is reported inside the returned [`BuildReport`].
  pub async fn build(&self, goal: Goal) -> Result<BuildReport, BuildError> {
    let (graph, plan) = self.plan(goal)?;
    info!(goal = %goal, targets = plan.len(), "building");

    let mut report = execute_plan(&graph, &plan, self.runner.clone(), &self.config).await;

    let goal_id = goal.target(&self.layout);
    if report.is_success() && !goal_id.path().exists() {
      let stage = graph.get(&goal_id).map(|t| t.stage()).unwrap_or(stages::Stage::Link);
      report.failed.push((
        goal_id.clone(),
        BuildError::MissingInput {
          stage,
          path: goal_id.path().to_path_buf(),
          target: goal_id,
        },
      ));
    }
    Ok(report)
  }

  /// Build the image, then boot it and wait for the emulator to exit.
  ///
  /// `on_built` sees the build report before the emulator starts, whether
  /// or not the build succeeded.
  pub async fn run(&self, on_built: impl FnOnce(&BuildReport)) -> Result<RunOutcome, BuildError> {
    let report = self.build(Goal::Image).await?;
    on_built(&report);
    if !report.is_success() {
      return Ok(RunOutcome {
        exit_code: report.exit_code(),
        launched: false,
        report,
      });
    }

    let exit_code = self.launch().await?;
    Ok(RunOutcome {
      report,
      launched: true,
      exit_code,
    })
  }

  /// Boot the existing image without building anything.
  pub async fn launch(&self) -> Result<i32, BuildError> {
    info!(image = ?self.layout.image, "launching emulator");
    launch::launch(&self.toolchain, &self.layout, self.runner.as_ref()).await
  }

  /// Remove every derived artifact.
  pub fn clean(&self) -> Result<CleanReport, BuildError> {
    let graph = self.graph()?;
    Ok(stages::clean::clean(&self.layout, &graph)?)
  }
}
