use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Kernel target architectures the pipeline knows how to assemble, link and boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
  #[default]
  X86_64,
  I686,
}

impl Arch {
  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::I686 => "i686",
    }
  }

  /// Target triple used when none is configured explicitly.
  pub fn default_triple(&self) -> String {
    format!("{}-unknown-none", self.as_str())
  }

  /// Object format handed to the assembler.
  pub fn object_format(&self) -> &'static str {
    match self {
      Self::X86_64 => "elf64",
      Self::I686 => "elf32",
    }
  }

  /// Linker emulation needed to produce an image for this architecture, if
  /// the host default does not already match.
  pub fn linker_emulation(&self) -> Option<&'static str> {
    match self {
      Self::X86_64 => None,
      Self::I686 => Some("elf_i386"),
    }
  }

  /// Name of the system emulator binary for this architecture.
  pub fn emulator_binary(&self) -> &'static str {
    match self {
      Self::X86_64 => "qemu-system-x86_64",
      Self::I686 => "qemu-system-i386",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "x86_64" | "amd64" => Ok(Self::X86_64),
      "i686" | "i386" | "x86" => Ok(Self::I686),
      other => Err(ConfigError::UnsupportedArch(other.to_string())),
    }
  }
}
