mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use bootkit_lib::Goal;
use bootkit_lib::toolchain::ToolchainOverrides;

use output::{OutputFormat, print_error};

/// bootkit - build, image and boot a freestanding kernel
#[derive(Parser)]
#[command(name = "bootkit")]
#[command(author, version, about, long_about = None)]
#[command(args_override_self = true)]
struct Cli {
  #[command(flatten)]
  global: GlobalArgs,

  #[command(subcommand)]
  command: Option<Commands>,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
struct GlobalArgs {
  /// Project directory (default: current directory)
  #[arg(short = 'C', long = "project-dir", global = true, default_value = ".")]
  project_dir: PathBuf,

  /// Target architecture (x86_64 or i686)
  #[arg(long, global = true)]
  arch: Option<String>,

  /// Target triple for the library build
  #[arg(long, global = true)]
  target: Option<String>,

  /// Compiler front-end used for the library
  #[arg(long, global = true)]
  compiler: Option<String>,

  /// Assembler for entry-point sources
  #[arg(long, global = true)]
  assembler: Option<String>,

  /// Linker
  #[arg(long, global = true)]
  linker: Option<String>,

  /// Disc image mastering tool
  #[arg(long = "mastering-tool", global = true)]
  mastering_tool: Option<String>,

  /// Emulator binary
  #[arg(long, global = true)]
  emulator: Option<String>,

  /// Build the library with the release profile
  #[arg(long, global = true)]
  release: bool,

  /// Maximum number of tools running at once
  #[arg(short, long, global = true)]
  jobs: Option<usize>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t, global = true)]
  output: OutputFormat,
}

impl GlobalArgs {
  fn overrides(&self) -> ToolchainOverrides {
    ToolchainOverrides {
      arch: self.arch.clone(),
      triple: self.target.clone(),
      compiler: self.compiler.clone(),
      assembler: self.assembler.clone(),
      linker: self.linker.clone(),
      mastering: self.mastering_tool.clone(),
      emulator: self.emulator.clone(),
      release: self.release,
      target_spec_dir: None,
    }
    .with_env()
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Build the kernel binary (default)
  All,

  /// Build the kernel binary, always re-running the library build
  Kernel,

  /// Build the bootable disc image
  Iso,

  /// Build the image and boot it in the emulator
  Run,

  /// Remove all build artifacts
  Clean,

  /// Show what a build would do without running any tool
  Plan {
    /// What to plan for
    #[arg(value_enum, default_value_t = PlanGoal::All)]
    goal: PlanGoal,
  },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlanGoal {
  All,
  Kernel,
  Iso,
}

impl From<PlanGoal> for Goal {
  fn from(goal: PlanGoal) -> Self {
    match goal {
      PlanGoal::All => Goal::Binary,
      PlanGoal::Kernel => Goal::Kernel,
      PlanGoal::Iso => Goal::Image,
    }
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.global.verbose);

  let global = &cli.global;
  let result = match cli.command.unwrap_or(Commands::All) {
    Commands::All => cmd::cmd_build(Goal::Binary, global),
    Commands::Kernel => cmd::cmd_build(Goal::Kernel, global),
    Commands::Iso => cmd::cmd_build(Goal::Image, global),
    Commands::Run => cmd::cmd_run(global),
    Commands::Clean => cmd::cmd_clean(global),
    Commands::Plan { goal } => cmd::cmd_plan(goal.into(), global),
  };

  match result {
    Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
