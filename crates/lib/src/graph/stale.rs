//! Timestamp snapshot and the staleness rule.
//!
//! The filesystem is read exactly once per resolution, into [`FileStates`].
//! Everything after that is a pure function of the snapshot.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use super::target::{BuildTarget, TargetId};

/// Modification times of every path the graph mentions; `None` means absent.
#[derive(Debug, Clone, Default)]
pub struct FileStates {
  mtimes: HashMap<PathBuf, Option<SystemTime>>,
}

impl FileStates {
  /// Stat each path once. Unreadable paths count as missing.
  pub fn scan<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
    let mtimes = paths
      .into_iter()
      .map(|path| {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        (path.to_path_buf(), modified)
      })
      .collect();
    Self { mtimes }
  }

  /// Record a path's state directly.
  pub fn insert(&mut self, path: impl Into<PathBuf>, modified: Option<SystemTime>) {
    self.mtimes.insert(path.into(), modified);
  }

  pub fn modified(&self, path: &Path) -> Option<SystemTime> {
    self.mtimes.get(path).copied().flatten()
  }

  pub fn exists(&self, path: &Path) -> bool {
    self.modified(path).is_some()
  }
}

/// Why a target will (or will not) be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Staleness {
  Fresh,
  /// The output does not exist.
  MissingOutput,
  /// This input was modified after the output.
  InputNewer(PathBuf),
  /// An upstream target is being rebuilt.
  DependencyRebuilt(TargetId),
  /// Rebuilt unconditionally; the external tool decides what is current.
  Forced,
}

impl Staleness {
  pub fn is_fresh(&self) -> bool {
    matches!(self, Self::Fresh)
  }
}

impl fmt::Display for Staleness {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Fresh => write!(f, "up to date"),
      Self::MissingOutput => write!(f, "output missing"),
      Self::InputNewer(path) => write!(f, "{} changed", path.display()),
      Self::DependencyRebuilt(dep) => write!(f, "{} rebuilt", dep),
      Self::Forced => write!(f, "forced"),
    }
  }
}

/// Staleness of a target judged on its own timestamps.
///
/// Stale when the output is missing or any input is strictly newer than the
/// output. Equal timestamps count as fresh.
pub fn staleness(target: &BuildTarget, states: &FileStates) -> Staleness {
  let Some(output_time) = states.modified(target.output()) else {
    return Staleness::MissingOutput;
  };

  for input in &target.inputs {
    if let Some(input_time) = states.modified(input)
      && input_time > output_time
    {
      return Staleness::InputNewer(input.clone());
    }
  }

  Staleness::Fresh
}
