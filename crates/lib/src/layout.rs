//! Fixed on-disk layout under the output root.
//!
//! ```text
//! <output>/arch/<arch>/<rel>.o                  relocatable objects
//! <output>/target/<triple>/<profile>/lib<c>.a   static archive
//! <output>/target/<triple>/kernel.bin           flat binary
//! <output>/os-<arch>.iso                        bootable image
//! <output>/isofiles-XXXXXX/                     staging tree (transient)
//! ```

use std::path::{Path, PathBuf};

use crate::consts::STAGING_PREFIX;
use crate::project::Project;
use crate::toolchain::Toolchain;

#[derive(Debug, Clone)]
pub struct OutputLayout {
  pub root: PathBuf,
  pub object_dir: PathBuf,
  /// Directory passed to cargo as `CARGO_TARGET_DIR`.
  pub cargo_target_dir: PathBuf,
  pub archive: PathBuf,
  pub binary: PathBuf,
  pub image: PathBuf,
}

impl OutputLayout {
  pub fn new(project: &Project, toolchain: &Toolchain) -> Self {
    let root = project.output_dir.clone();
    let cargo_target_dir = root.join("target");
    let triple_dir = cargo_target_dir.join(&toolchain.triple);

    Self {
      object_dir: root.join("arch").join(toolchain.arch.as_str()),
      archive: triple_dir
        .join(toolchain.profile.dir_name())
        .join(format!("lib{}.a", project.crate_name)),
      binary: triple_dir.join("kernel.bin"),
      image: root.join(format!("os-{}.iso", toolchain.arch)),
      cargo_target_dir,
      root,
    }
  }

  /// Object path mirroring `source`'s location relative to `source_root`.
  ///
  /// `src/arch/x86_64/boot/long_mode.asm` becomes
  /// `build/arch/x86_64/boot/long_mode.o`.
  pub fn object_for(&self, source_root: &Path, source: &Path) -> PathBuf {
    let relative = source.strip_prefix(source_root).unwrap_or(source);
    self.object_dir.join(relative).with_extension("o")
  }

  /// Whether `path` is a staging tree left inside the output root.
  pub fn is_staging_dir(&self, path: &Path) -> bool {
    path.parent() == Some(self.root.as_path())
      && path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(STAGING_PREFIX))
  }
}
