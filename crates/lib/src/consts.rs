/// Application name, used for the project file and log prefixes.
pub const APP_NAME: &str = "bootkit";

/// Name of the optional project configuration file in the project root.
pub const PROJECT_FILE: &str = "bootkit.toml";

/// The single environment variable consumed by the library build stage.
///
/// Points the cross-compiler at the directory holding the custom target
/// specification JSON.
pub const TARGET_PATH_ENV: &str = "RUST_TARGET_PATH";

/// Prefix of staging directories created inside the output root.
pub const STAGING_PREFIX: &str = "isofiles-";

/// File name the kernel binary takes inside the staging tree.
pub const STAGED_KERNEL_NAME: &str = "kernel.bin";

/// Default debug-access port bound by the emulator.
pub const DEFAULT_GDB_PORT: u16 = 1234;
