//! bootkit-lib: build orchestration for a freestanding kernel
//!
//! This crate turns entry-point assembly sources and a freestanding library
//! crate into a linked kernel binary, a bootable disc image and an emulator
//! session:
//! - `Toolchain` / `Project`: configuration resolved once per invocation
//! - `TargetGraph`: declared targets, staleness and build waves
//! - `ToolRunner`: the single seam through which external tools are run
//! - `Pipeline`: ties the above together behind `build`, `run` and `clean`

pub mod consts;
pub mod discover;
pub mod execute;
pub mod graph;
pub mod layout;
pub mod pipeline;
pub mod project;
pub mod runner;
pub mod stages;
pub mod toolchain;
pub mod util;

pub use pipeline::{Goal, Pipeline, RunOutcome};
