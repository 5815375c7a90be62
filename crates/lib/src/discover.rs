//! Source discovery.
//!
//! Walks the project tree once at startup to find the entry-point source
//! units and the files the library build depends on. Results are sorted so
//! target declaration order is stable between runs.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::project::Project;
use crate::toolchain::Toolchain;

/// Find every entry-point source unit under `root` with one of `extensions`.
///
/// A missing root yields no units rather than an error; the link stage then
/// reports the missing objects.
pub fn entry_point_sources(root: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
  if !root.exists() {
    debug!(root = ?root, "source root does not exist");
    return Ok(Vec::new());
  }

  let mut sources = Vec::new();
  for entry in WalkDir::new(root).follow_links(true) {
    let entry = entry.map_err(io::Error::other)?;
    if !entry.file_type().is_file() {
      continue;
    }
    let matches = entry
      .path()
      .extension()
      .and_then(|e| e.to_str())
      .is_some_and(|ext| extensions.iter().any(|want| want == ext));
    if matches {
      sources.push(entry.into_path());
    }
  }

  sources.sort();
  debug!(count = sources.len(), root = ?root, "discovered entry-point sources");
  Ok(sources)
}

/// Files whose modification marks the library archive stale.
///
/// The manifest, the lockfile, every `.rs` file under `src/`, and the custom
/// target specification when one exists in the search path.
pub fn library_inputs(project: &Project, toolchain: &Toolchain) -> io::Result<Vec<PathBuf>> {
  let mut inputs = vec![project.library_dir.join("Cargo.toml")];

  let lockfile = project.library_dir.join("Cargo.lock");
  if lockfile.exists() {
    inputs.push(lockfile);
  }

  let target_spec = toolchain.target_spec_dir.join(format!("{}.json", toolchain.triple));
  if target_spec.exists() {
    inputs.push(target_spec);
  }

  let src = project.library_dir.join("src");
  let mut sources = Vec::new();
  if src.exists() {
    for entry in WalkDir::new(&src) {
      let entry = entry.map_err(io::Error::other)?;
      if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "rs") {
        sources.push(entry.into_path());
      }
    }
  }
  sources.sort();
  inputs.extend(sources);

  debug!(count = inputs.len(), "collected library inputs");
  Ok(inputs)
}
