//! Boot the image under the emulator.

use crate::execute::BuildError;
use crate::graph::TargetId;
use crate::layout::OutputLayout;
use crate::runner::{ToolInvocation, ToolRunner};
use crate::toolchain::Toolchain;

use super::{Stage, ensure_inputs};

/// `<emulator> -cdrom <image> -serial stdio -gdb tcp::<port> [extra...]`
///
/// The session inherits the terminal so the guest's serial console shows up
/// on stdout.
pub fn invocation(toolchain: &Toolchain, layout: &OutputLayout) -> ToolInvocation {
  ToolInvocation::new(&toolchain.emulator)
    .arg("-cdrom")
    .arg_path(&layout.image)
    .arg("-serial")
    .arg("stdio")
    .arg("-gdb")
    .arg(format!("tcp::{}", toolchain.gdb_port))
    .args(toolchain.emulator_args.iter().cloned())
    .interactive()
}

/// Run the emulator until it exits and return its exit code.
///
/// A session ended by a signal reports 1.
pub async fn launch<R: ToolRunner>(
  toolchain: &Toolchain,
  layout: &OutputLayout,
  runner: &R,
) -> Result<i32, BuildError> {
  let id = TargetId::from(layout.image.as_path());
  ensure_inputs(Stage::Launch, &id, std::slice::from_ref(&layout.image)).await?;

  let output = runner
    .run(&invocation(toolchain, layout))
    .await
    .map_err(|source| BuildError::ToolUnavailable {
      stage: Stage::Launch,
      target: id,
      source,
    })?;

  Ok(output.code.unwrap_or(1))
}
