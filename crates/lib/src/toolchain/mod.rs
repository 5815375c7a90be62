//! Toolchain configuration.
//!
//! A [`Toolchain`] names every external program the pipeline invokes and the
//! target it builds for. It is resolved once per invocation, at the boundary,
//! from command-line overrides, the project file and built-in defaults, and
//! is never mutated afterwards. Stages receive it by reference and never read
//! the environment themselves.

mod arch;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_GDB_PORT, TARGET_PATH_ENV};
use crate::project::ProjectFile;

pub use arch::Arch;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unsupported architecture: {0} (expected x86_64 or i686)")]
  UnsupportedArch(String),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("cannot determine library crate name: no [package] name in {0}")]
  MissingCrateName(PathBuf),

  #[error("project directory not found: {0}")]
  ProjectNotFound(PathBuf),
}

/// Cargo profile the library is compiled with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
  #[default]
  Debug,
  Release,
}

impl Profile {
  /// Directory name cargo uses for this profile under `<target-dir>/<triple>/`.
  pub fn dir_name(&self) -> &'static str {
    match self {
      Self::Debug => "debug",
      Self::Release => "release",
    }
  }
}

/// Values supplied on the command line (or by the caller) that take
/// precedence over the project file.
#[derive(Debug, Clone, Default)]
pub struct ToolchainOverrides {
  pub arch: Option<String>,
  pub triple: Option<String>,
  pub compiler: Option<String>,
  pub assembler: Option<String>,
  pub linker: Option<String>,
  pub mastering: Option<String>,
  pub emulator: Option<String>,
  pub release: bool,
  /// Search path for the custom target specification.
  pub target_spec_dir: Option<PathBuf>,
}

impl ToolchainOverrides {
  /// Fill in the target specification search path from `RUST_TARGET_PATH`
  /// unless one was already given explicitly.
  ///
  /// This is the only place the environment is consulted.
  pub fn with_env(mut self) -> Self {
    if self.target_spec_dir.is_none()
      && let Some(value) = std::env::var_os(TARGET_PATH_ENV)
      && !value.is_empty()
    {
      debug!(path = ?value, "using target spec path from {}", TARGET_PATH_ENV);
      self.target_spec_dir = Some(PathBuf::from(value));
    }
    self
  }
}

/// Fully resolved toolchain for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Toolchain {
  pub arch: Arch,
  pub triple: String,
  pub compiler: String,
  pub assembler: String,
  pub linker: String,
  pub mastering: String,
  pub emulator: String,
  pub profile: Profile,
  /// Crates rebuilt from source for the freestanding target (`-Z build-std`).
  pub build_std: Vec<String>,
  pub target_spec_dir: PathBuf,
  pub gdb_port: u16,
  pub emulator_args: Vec<String>,
}

impl Toolchain {
  /// Resolve the toolchain: overrides first, then the project file, then defaults.
  ///
  /// Relative target spec directories are interpreted against `project_root`.
  pub fn resolve(
    overrides: &ToolchainOverrides,
    file: &ProjectFile,
    project_root: &Path,
  ) -> Result<Self, ConfigError> {
    let arch = match overrides.arch.as_deref().or(file.arch.as_deref()) {
      Some(name) => name.parse()?,
      None => Arch::default(),
    };

    let triple = overrides
      .triple
      .clone()
      .or_else(|| file.target.clone())
      .unwrap_or_else(|| arch.default_triple());

    let tools = &file.tools;
    let pick = |cli: &Option<String>, project: &Option<String>, default: &str| {
      cli
        .clone()
        .or_else(|| project.clone())
        .unwrap_or_else(|| default.to_string())
    };

    let profile = if overrides.release || file.library.release {
      Profile::Release
    } else {
      Profile::Debug
    };

    let target_spec_dir = overrides
      .target_spec_dir
      .clone()
      .or_else(|| file.paths.target_spec_dir.clone())
      .map(|dir| project_root.join(dir))
      .unwrap_or_else(|| project_root.to_path_buf());

    let toolchain = Self {
      arch,
      triple,
      compiler: pick(&overrides.compiler, &tools.compiler, "cargo"),
      assembler: pick(&overrides.assembler, &tools.assembler, "nasm"),
      linker: pick(&overrides.linker, &tools.linker, "ld"),
      mastering: pick(&overrides.mastering, &tools.mastering, "grub-mkrescue"),
      emulator: pick(&overrides.emulator, &tools.emulator, arch.emulator_binary()),
      profile,
      build_std: file
        .library
        .build_std
        .clone()
        .unwrap_or_else(|| vec!["core".to_string(), "alloc".to_string()]),
      target_spec_dir,
      gdb_port: file.run.gdb_port.unwrap_or(DEFAULT_GDB_PORT),
      emulator_args: file.run.args.clone(),
    };

    debug!(arch = %toolchain.arch, triple = %toolchain.triple, "resolved toolchain");
    Ok(toolchain)
  }
}
