//! Target graph and staleness resolver.
//!
//! Targets are declared once per invocation. An edge runs from a target to
//! every target that lists its output as an input. Resolution takes a goal
//! and a [`FileStates`] snapshot and returns the targets to build, grouped
//! into waves whose members have no dependencies on each other.

mod stale;
mod target;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use stale::{FileStates, Staleness, staleness};
pub use target::{BuildTarget, Recipe, TargetId, TargetKind};

use crate::stages::Stage;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("output {0} is declared by more than one target")]
  DuplicateOutput(TargetId),

  #[error("no target produces {0}")]
  UnknownTarget(TargetId),

  #[error("dependency cycle detected involving {0}")]
  Cycle(TargetId),

  #[error("{stage}: input {path} of {target} does not exist and no target produces it")]
  MissingInput {
    stage: Stage,
    target: TargetId,
    path: PathBuf,
  },
}

/// Targets to build for one goal, in dependency order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
  pub goal: Option<TargetId>,
  /// Each wave only depends on earlier waves; members may build concurrently.
  pub waves: Vec<Vec<TargetId>>,
  /// Targets in the goal's closure that are already current.
  pub fresh: Vec<TargetId>,
  /// Reason each target in the closure is built or skipped.
  pub reasons: BTreeMap<TargetId, Staleness>,
}

impl BuildPlan {
  /// True when nothing needs to run.
  pub fn is_empty(&self) -> bool {
    self.waves.is_empty()
  }

  /// Number of targets that will be built.
  pub fn len(&self) -> usize {
    self.waves.iter().map(Vec::len).sum()
  }

  /// Targets to build, flattened in a valid sequential order.
  pub fn ordered(&self) -> impl Iterator<Item = &TargetId> {
    self.waves.iter().flatten()
  }

  pub fn contains(&self, id: &TargetId) -> bool {
    self.ordered().any(|t| t == id)
  }
}

/// The declared targets and the edges between them.
pub struct TargetGraph {
  graph: DiGraph<TargetId, ()>,
  nodes: HashMap<TargetId, NodeIndex>,
  targets: HashMap<TargetId, BuildTarget>,
}

impl TargetGraph {
  /// Build the graph from a set of declarations.
  ///
  /// # Errors
  ///
  /// `DuplicateOutput` when two targets claim the same output path, `Cycle`
  /// when the input relation is not acyclic.
  pub fn from_targets(declared: Vec<BuildTarget>) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    let mut targets = HashMap::new();

    // First pass: one node per target
    for target in declared {
      if targets.contains_key(&target.id) {
        return Err(GraphError::DuplicateOutput(target.id));
      }
      let idx = graph.add_node(target.id.clone());
      nodes.insert(target.id.clone(), idx);
      targets.insert(target.id.clone(), target);
    }

    // Second pass: edge from producer to consumer for every declared input
    for (id, target) in &targets {
      let consumer = nodes[id];
      for input in &target.inputs {
        if let Some(&producer) = nodes.get(&TargetId::from(input.as_path())) {
          graph.add_edge(producer, consumer, ());
        }
      }
    }

    let dag = Self { graph, nodes, targets };
    dag.topological()?;

    debug!(targets = dag.len(), "declared target graph");
    Ok(dag)
  }

  /// All target ids, dependencies before dependents.
  pub fn topological(&self) -> Result<Vec<TargetId>, GraphError> {
    toposort(&self.graph, None)
      .map(|sorted| sorted.into_iter().map(|idx| self.graph[idx].clone()).collect())
      .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].clone()))
  }

  pub fn get(&self, id: &TargetId) -> Option<&BuildTarget> {
    self.targets.get(id)
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  pub fn targets(&self) -> impl Iterator<Item = &BuildTarget> {
    self.targets.values()
  }

  /// Whether `path` is the output of a declared target.
  pub fn produces(&self, path: &Path) -> bool {
    self.nodes.contains_key(&TargetId::from(path))
  }

  /// Direct upstream targets of `id`.
  pub fn dependencies(&self, id: &TargetId) -> Vec<TargetId> {
    let Some(&idx) = self.nodes.get(id) else {
      return Vec::new();
    };
    let mut out: Vec<TargetId> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|n| self.graph[n].clone())
      .collect();
    out.sort();
    out.dedup();
    out
  }

  /// `id` plus everything it transitively depends on.
  pub fn closure(&self, id: &TargetId) -> HashSet<TargetId> {
    let mut seen = HashSet::new();
    let mut stack = vec![id.clone()];
    while let Some(current) = stack.pop() {
      if seen.insert(current.clone()) {
        stack.extend(self.dependencies(&current));
      }
    }
    seen
  }

  /// Every path the graph mentions, inputs and outputs.
  pub fn paths(&self) -> impl Iterator<Item = &Path> {
    self
      .targets
      .values()
      .flat_map(|t| std::iter::once(t.output()).chain(t.inputs.iter().map(PathBuf::as_path)))
  }

  /// Resolve `goal` against a timestamp snapshot.
  pub fn resolve(&self, goal: &TargetId, states: &FileStates) -> Result<BuildPlan, GraphError> {
    self.resolve_forcing(goal, states, &[])
  }

  /// Resolve `goal`, treating every target in `forced` as stale.
  ///
  /// Fails with `MissingInput` before anything runs if an input of any
  /// target in the closure is neither present nor produced by a target.
  pub fn resolve_forcing(
    &self,
    goal: &TargetId,
    states: &FileStates,
    forced: &[TargetId],
  ) -> Result<BuildPlan, GraphError> {
    if !self.targets.contains_key(goal) {
      return Err(GraphError::UnknownTarget(goal.clone()));
    }

    let closure = self.closure(goal);
    let order: Vec<TargetId> = self.topological()?.into_iter().filter(|id| closure.contains(id)).collect();

    // Fail fast on inputs nobody can produce
    for id in &order {
      let target = &self.targets[id];
      for input in &target.inputs {
        if !self.produces(input) && !states.exists(input) {
          return Err(GraphError::MissingInput {
            stage: target.stage(),
            target: id.clone(),
            path: input.clone(),
          });
        }
      }
    }

    let mut plan = BuildPlan {
      goal: Some(goal.clone()),
      ..Default::default()
    };
    let mut levels: HashMap<TargetId, usize> = HashMap::new();

    for id in &order {
      let target = &self.targets[id];
      let deps = self.dependencies(id);
      let rebuilt_dep = deps.iter().find(|d| levels.contains_key(*d));

      let reason = if forced.contains(id) {
        Staleness::Forced
      } else {
        match rebuilt_dep {
          Some(dep) => Staleness::DependencyRebuilt(dep.clone()),
          None => staleness(target, states),
        }
      };

      if reason.is_fresh() {
        plan.fresh.push(id.clone());
      } else {
        let level = deps
          .iter()
          .filter_map(|d| levels.get(d))
          .map(|l| l + 1)
          .max()
          .unwrap_or(0);
        levels.insert(id.clone(), level);
        if plan.waves.len() <= level {
          plan.waves.resize_with(level + 1, Vec::new);
        }
        plan.waves[level].push(id.clone());
      }
      plan.reasons.insert(id.clone(), reason);
    }

    for wave in &mut plan.waves {
      wave.sort();
    }
    plan.fresh.sort();

    debug!(
      goal = %goal,
      to_build = plan.len(),
      fresh = plan.fresh.len(),
      waves = plan.waves.len(),
      "resolved build plan"
    );
    Ok(plan)
  }
}
