//! Controller-side CLI: control client and subcommand runners.
//!
//! ```bash
//! modhost-cli serve          # host a loader core and control server
//! modhost-cli status         # list loaded mods
//! modhost-cli load <id>      # load a mod (and its dependencies)
//! modhost-cli unload <id>    # unload a mod
//! modhost-cli suspend <id>   # suspend a mod
//! modhost-cli resume <id>    # resume a mod
//! ```

pub mod client;
pub mod commands;

pub use client::{CliError, ControlClient};
pub use commands::{run_mod_command, run_status};

/// Default control socket path.
#[cfg(unix)]
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/modhost-core.sock";

#[cfg(windows)]
pub const DEFAULT_SOCKET_PATH: &str = "modhost-core";

/// Socket path from the environment, or the default.
pub fn get_socket_path() -> String {
    std::env::var("MODHOST_SOCKET_PATH").unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string())
}
