//! Remove every derived artifact.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::graph::TargetGraph;
use crate::layout::OutputLayout;

/// Paths removed by a clean, in removal order.
#[derive(Debug, Default, Serialize)]
pub struct CleanReport {
  pub removed: Vec<PathBuf>,
}

impl CleanReport {
  pub fn is_empty(&self) -> bool {
    self.removed.is_empty()
  }
}

/// Delete target outputs, staging leftovers, the object tree and the cargo
/// target directory, then the output root if nothing else is left in it.
///
/// Running it twice is harmless; the second run removes nothing.
pub fn clean(layout: &OutputLayout, graph: &TargetGraph) -> io::Result<CleanReport> {
  let mut report = CleanReport::default();

  let mut outputs: Vec<&Path> = graph.targets().map(|t| t.output()).collect();
  outputs.sort();
  for output in outputs {
    remove_path(output, &mut report)?;
  }

  if layout.root.is_dir() {
    let mut staging: Vec<PathBuf> = std::fs::read_dir(&layout.root)?
      .filter_map(Result::ok)
      .map(|entry| entry.path())
      .filter(|path| layout.is_staging_dir(path))
      .collect();
    staging.sort();
    for dir in staging {
      remove_path(&dir, &mut report)?;
    }
  }

  remove_path(&layout.object_dir, &mut report)?;
  remove_path(&layout.cargo_target_dir, &mut report)?;

  // Drop now-empty intermediate directories like `<root>/arch`.
  if let Some(parent) = layout.object_dir.parent()
    && parent != layout.root
  {
    remove_if_empty(parent, &mut report)?;
  }
  remove_if_empty(&layout.root, &mut report)?;

  info!(removed = report.removed.len(), "clean complete");
  Ok(report)
}

fn remove_path(path: &Path, report: &mut CleanReport) -> io::Result<()> {
  let metadata = match std::fs::symlink_metadata(path) {
    Ok(m) => m,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(e),
  };

  if metadata.is_dir() {
    std::fs::remove_dir_all(path)?;
  } else {
    std::fs::remove_file(path)?;
  }
  debug!(path = ?path, "removed");
  report.removed.push(path.to_path_buf());
  Ok(())
}

fn remove_if_empty(dir: &Path, report: &mut CleanReport) -> io::Result<()> {
  let empty = match std::fs::read_dir(dir) {
    Ok(mut entries) => entries.next().is_none(),
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(e),
  };
  if empty {
    std::fs::remove_dir(dir)?;
    debug!(path = ?dir, "removed empty directory");
    report.removed.push(dir.to_path_buf());
  }
  Ok(())
}
