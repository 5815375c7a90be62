//! Test utilities for bootkit-lib.
//!
//! [`ProjectFixture`] lays out a minimal kernel project in a temporary
//! directory. [`FakeRunner`] stands in for the external toolchain: it records
//! every invocation and writes the outputs the invocation declares.
//!
//! Every file these helpers write is stamped from one process-wide logical
//! clock, so "newer than" comparisons never depend on filesystem timestamp
//! granularity.

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::discover;
use crate::graph::{BuildTarget, TargetGraph};
use crate::layout::OutputLayout;
use crate::project::{Project, ProjectFile};
use crate::runner::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use crate::stages;
use crate::toolchain::{Toolchain, ToolchainOverrides};

/// Start of the logical clock, well after any real file time in a test run.
const CLOCK_BASE_SECS: u64 = 4_000_000_000;

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Next logical timestamp. Strictly increasing across the whole test binary.
pub fn tick() -> SystemTime {
  let n = CLOCK.fetch_add(1, Ordering::SeqCst);
  SystemTime::UNIX_EPOCH + Duration::from_secs(CLOCK_BASE_SECS + n)
}

/// Set `path`'s modification time to the next logical timestamp.
pub fn stamp(path: &Path) {
  let file = OpenOptions::new().write(true).open(path).unwrap();
  file.set_modified(tick()).unwrap();
}

/// Write `contents` to `path`, creating parents, and stamp it.
pub fn write_stamped(path: &Path, contents: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, contents).unwrap();
  stamp(path);
}

/// Default toolchain for a project rooted at `/k`.
pub fn test_toolchain() -> Toolchain {
  Toolchain::resolve(&ToolchainOverrides::default(), &ProjectFile::default(), Path::new("/k")).unwrap()
}

/// A throwaway kernel project.
///
/// ```text
/// Cargo.toml              [package] name = "test-kernel"
/// src/lib.rs
/// src/arch/x86_64/<sources...>
/// src/arch/x86_64/linker.ld
/// src/arch/x86_64/grub.cfg
/// ```
pub struct ProjectFixture {
  _temp: TempDir,
  root: PathBuf,
  pub project: Project,
  pub toolchain: Toolchain,
  pub layout: OutputLayout,
}

impl ProjectFixture {
  pub fn new(sources: &[&str]) -> Self {
    Self::with_file(sources, "")
  }

  /// Like [`ProjectFixture::new`] with `bootkit.toml` set to `project_toml`.
  pub fn with_file(sources: &[&str], project_toml: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();

    write_stamped(&root.join("Cargo.toml"), "[package]\nname = \"test-kernel\"\nversion = \"0.1.0\"\n");
    write_stamped(&root.join("src/lib.rs"), "#![no_std]\n");
    let arch_dir = root.join("src/arch/x86_64");
    write_stamped(&arch_dir.join("linker.ld"), "ENTRY(start)\n");
    write_stamped(&arch_dir.join("grub.cfg"), "menuentry \"os\" { multiboot2 /boot/kernel.bin }\n");
    for source in sources {
      write_stamped(&arch_dir.join(source), "; source\n");
    }
    if !project_toml.is_empty() {
      std::fs::write(root.join(crate::consts::PROJECT_FILE), project_toml).unwrap();
    }

    let file = ProjectFile::load(&root).unwrap();
    let toolchain = Toolchain::resolve(&ToolchainOverrides::default(), &file, &root).unwrap();
    let project = Project::resolve(&root, &file, &toolchain).unwrap();
    let layout = OutputLayout::new(&project, &toolchain);

    Self {
      _temp: temp,
      root,
      project,
      toolchain,
      layout,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Entry-point sources currently on disk.
  pub fn sources(&self) -> Vec<PathBuf> {
    discover::entry_point_sources(&self.project.source_root, &self.project.source_extensions).unwrap()
  }

  pub fn declare(&self) -> Vec<BuildTarget> {
    let library_inputs = discover::library_inputs(&self.project, &self.toolchain).unwrap();
    stages::declare_targets(
      &self.project,
      &self.toolchain,
      &self.layout,
      &self.sources(),
      library_inputs,
    )
  }

  pub fn graph(&self) -> TargetGraph {
    TargetGraph::from_targets(self.declare()).unwrap()
  }

  pub fn write_output(&self, path: &Path, contents: &str) {
    write_stamped(path, contents);
  }

  /// Path of a source unit under the source root.
  pub fn source(&self, name: &str) -> PathBuf {
    self.project.source_root.join(name)
  }

  /// Mark a file as modified now.
  pub fn touch(&self, path: &Path) {
    stamp(path);
  }

  pub fn mtime(&self, path: &Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
  }
}

type Hook = Box<dyn Fn(&ToolInvocation) + Send + Sync>;

/// Fake toolchain.
///
/// Succeeds by default and writes each declared output. Individual programs
/// can be made to fail, to be missing, or to succeed without writing.
#[derive(Default)]
pub struct FakeRunner {
  log: Mutex<Vec<ToolInvocation>>,
  failures: HashMap<String, i32>,
  missing: HashSet<String>,
  silent: HashSet<String>,
  write_on_failure: bool,
  hook: Option<Hook>,
}

impl FakeRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// `program` exits with `code`.
  pub fn fail_program(mut self, program: &str, code: i32) -> Self {
    self.failures.insert(program.to_string(), code);
    self
  }

  /// `program` cannot be found.
  pub fn missing_program(mut self, program: &str) -> Self {
    self.missing.insert(program.to_string());
    self
  }

  /// `program` succeeds without writing its outputs.
  pub fn skip_outputs_for(mut self, program: &str) -> Self {
    self.silent.insert(program.to_string());
    self
  }

  /// Failing programs still leave (partial) outputs behind.
  pub fn write_on_failure(mut self) -> Self {
    self.write_on_failure = true;
    self
  }

  /// Called with every invocation before outputs are written.
  pub fn with_hook(mut self, hook: impl Fn(&ToolInvocation) + Send + Sync + 'static) -> Self {
    self.hook = Some(Box::new(hook));
    self
  }

  pub fn invocations(&self) -> Vec<ToolInvocation> {
    self.log.lock().unwrap().clone()
  }

  pub fn invocation_count(&self) -> usize {
    self.log.lock().unwrap().len()
  }

  pub fn programs(&self) -> Vec<String> {
    self.invocations().into_iter().map(|i| i.program).collect()
  }

  pub fn clear(&self) {
    self.log.lock().unwrap().clear();
  }
}

impl ToolRunner for FakeRunner {
  async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
    self.log.lock().unwrap().push(invocation.clone());

    if self.missing.contains(&invocation.program) {
      return Err(ToolError::NotFound {
        program: invocation.program.clone(),
      });
    }
    if let Some(hook) = &self.hook {
      hook(invocation);
    }

    let code = self.failures.get(&invocation.program).copied().unwrap_or(0);
    let write = if code == 0 {
      !self.silent.contains(&invocation.program)
    } else {
      self.write_on_failure
    };
    if write {
      for output in &invocation.outputs {
        write_stamped(output, &invocation.program);
      }
    }

    Ok(ToolOutput {
      code: Some(code),
      stdout: String::new(),
      stderr: if code == 0 {
        String::new()
      } else {
        format!("{}: fake failure", invocation.program)
      },
    })
  }
}
