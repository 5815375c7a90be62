//! Project configuration.
//!
//! A project is a directory holding the entry-point sources, the placement
//! script, the boot-loader configuration and the library crate. Everything
//! has a conventional location; an optional `bootkit.toml` in the project
//! root can move any of it:
//!
//! ```toml
//! arch = "x86_64"
//!
//! [paths]
//! source_root = "src/arch/{arch}"
//! linker_script = "src/arch/{arch}/linker.ld"
//! boot_config = "src/arch/{arch}/grub.cfg"
//! output_dir = "build"
//!
//! [library]
//! crate_name = "my_kernel"
//! ```
//!
//! `{arch}` and `{target}` in path values expand to the resolved architecture
//! and target triple.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::PROJECT_FILE;
use crate::toolchain::{ConfigError, Toolchain};

/// `[paths]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSection {
  pub source_root: Option<String>,
  pub source_extensions: Option<Vec<String>>,
  pub linker_script: Option<String>,
  pub boot_config: Option<String>,
  pub output_dir: Option<String>,
  pub library_dir: Option<String>,
  pub target_spec_dir: Option<PathBuf>,
}

/// `[tools]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsSection {
  pub compiler: Option<String>,
  pub assembler: Option<String>,
  pub linker: Option<String>,
  pub mastering: Option<String>,
  pub emulator: Option<String>,
}

/// `[library]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibrarySection {
  pub crate_name: Option<String>,
  pub release: bool,
  pub build_std: Option<Vec<String>>,
}

/// `[run]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
  pub gdb_port: Option<u16>,
  pub args: Vec<String>,
}

/// Raw contents of `bootkit.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectFile {
  pub arch: Option<String>,
  pub target: Option<String>,
  pub paths: PathsSection,
  pub tools: ToolsSection,
  pub library: LibrarySection,
  pub run: RunSection,
}

impl ProjectFile {
  /// Load `bootkit.toml` from `root`, or defaults when it does not exist.
  pub fn load(root: &Path) -> Result<Self, ConfigError> {
    let path = root.join(PROJECT_FILE);
    if !path.exists() {
      debug!(path = ?path, "no project file, using defaults");
      return Ok(Self::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
      path,
      message: e.to_string(),
    })
  }
}

/// Resolved project paths, all absolute.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
  pub root: PathBuf,
  /// Directory searched for entry-point source units.
  pub source_root: PathBuf,
  /// File extensions (without dot) that mark entry-point source units.
  pub source_extensions: Vec<String>,
  pub linker_script: PathBuf,
  pub boot_config: PathBuf,
  pub output_dir: PathBuf,
  /// Directory holding the library's `Cargo.toml`.
  pub library_dir: PathBuf,
  /// Library crate name with `-` normalized to `_`, as it appears in the archive name.
  pub crate_name: String,
}

impl Project {
  /// Resolve project paths for the given toolchain.
  ///
  /// The library crate name comes from the project file or, failing that,
  /// from the `[package]` table of the library's `Cargo.toml`.
  pub fn resolve(root: &Path, file: &ProjectFile, toolchain: &Toolchain) -> Result<Self, ConfigError> {
    Self::resolve_with(root, file, toolchain, false)
  }

  /// Like [`Project::resolve`], but when the manifest cannot supply the
  /// crate name, the library directory's name stands in for it.
  ///
  /// Only output paths depend on the name, so this is enough for `clean`.
  pub fn resolve_lenient(root: &Path, file: &ProjectFile, toolchain: &Toolchain) -> Result<Self, ConfigError> {
    Self::resolve_with(root, file, toolchain, true)
  }

  fn resolve_with(root: &Path, file: &ProjectFile, toolchain: &Toolchain, lenient: bool) -> Result<Self, ConfigError> {
    if !root.is_dir() {
      return Err(ConfigError::ProjectNotFound(root.to_path_buf()));
    }
    let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

    let paths = &file.paths;
    let expand_path = |value: &Option<String>, default: &str| {
      let expanded = expand(value.as_deref().unwrap_or(default), toolchain);
      if expanded == "." {
        root.clone()
      } else {
        root.join(expanded)
      }
    };

    let library_dir = expand_path(&paths.library_dir, ".");
    let crate_name = match &file.library.crate_name {
      Some(name) => name.clone(),
      None => match read_crate_name(&library_dir.join("Cargo.toml")) {
        Ok(name) => name,
        Err(e) if lenient => {
          let name = library_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kernel".to_string());
          warn!(error = %e, crate_name = %name, "library crate name unavailable, using directory name");
          name
        }
        Err(e) => return Err(e),
      },
    }
    .replace('-', "_");

    Ok(Self {
      source_root: expand_path(&paths.source_root, "src/arch/{arch}"),
      source_extensions: paths
        .source_extensions
        .clone()
        .unwrap_or_else(|| vec!["asm".to_string(), "s".to_string()]),
      linker_script: expand_path(&paths.linker_script, "src/arch/{arch}/linker.ld"),
      boot_config: expand_path(&paths.boot_config, "src/arch/{arch}/grub.cfg"),
      output_dir: expand_path(&paths.output_dir, "build"),
      library_dir,
      crate_name,
      root,
    })
  }
}

/// Expand `{arch}` and `{target}` in a configured path.
pub fn expand(template: &str, toolchain: &Toolchain) -> String {
  template
    .replace("{arch}", toolchain.arch.as_str())
    .replace("{target}", &toolchain.triple)
}

#[derive(Deserialize)]
struct CargoManifest {
  package: Option<CargoPackage>,
}

#[derive(Deserialize)]
struct CargoPackage {
  name: String,
}

fn read_crate_name(manifest_path: &Path) -> Result<String, ConfigError> {
  let content = std::fs::read_to_string(manifest_path).map_err(|source| ConfigError::Read {
    path: manifest_path.to_path_buf(),
    source,
  })?;
  let manifest: CargoManifest = toml::from_str(&content).map_err(|e| ConfigError::Parse {
    path: manifest_path.to_path_buf(),
    message: e.to_string(),
  })?;
  manifest
    .package
    .map(|p| p.name)
    .ok_or_else(|| ConfigError::MissingCrateName(manifest_path.to_path_buf()))
}
