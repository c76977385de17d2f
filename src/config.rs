//! Runtime configuration loading from environment variables.
//!
//! All configuration values are loaded from `MODHOST_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `MODHOST_MODS_DIR` | `mods` | Directory scanned for mod manifests |
//! | `MODHOST_INSTALL_DIR` | `.` | Root holding bootstrap stubs + runtime module |
//! | `MODHOST_SOCKET_PATH` | platform default | Control socket path |
//! | `MODHOST_INJECT_TIMEOUT_MS` | 5000 | Injection readiness timeout (ms) |
//! | `MODHOST_IPC_FRAME_LIMIT` | 1048576 | Max control frame size (bytes) |
//! | `MODHOST_MAX_CONNECTIONS` | 8 | Max concurrent controller connections |

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::get_socket_path;
use crate::ipc::{ConnectionConfig, IpcServerConfig};

/// Effective runtime configuration summary.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub mods_dir: PathBuf,
    pub install_dir: PathBuf,
    pub socket_path: String,
    pub inject_timeout_ms: u64,
    pub ipc_frame_limit: usize,
    pub max_connections: usize,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub mods_dir: PathBuf,
    pub install_dir: PathBuf,
    pub socket_path: String,
    pub inject_timeout: Duration,
    pub ipc_server: IpcServerConfig,
    pub connections: ConnectionConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_path(key: &str, default: &str) -> PathBuf {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => PathBuf::from(val),
        _ => PathBuf::from(default),
    }
}

fn load_ipc_server_config() -> IpcServerConfig {
    const DEFAULT_FRAME: usize = 1024 * 1024; // 1 MiB
    const MIN_FRAME: usize = 4096; // floor: 4 KiB
    let max_frame_size = parse_usize("MODHOST_IPC_FRAME_LIMIT", DEFAULT_FRAME);
    let max_frame_size = max_frame_size.max(MIN_FRAME);
    IpcServerConfig { max_frame_size }
}

fn load_connection_config() -> ConnectionConfig {
    let max_connections = parse_usize("MODHOST_MAX_CONNECTIONS", 8);
    let max_connections = max_connections.max(1);
    ConnectionConfig { max_connections }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let inject_ms = parse_u64("MODHOST_INJECT_TIMEOUT_MS", 5000);
    let inject_ms = inject_ms.max(100); // floor: 100ms

    EnvConfig {
        mods_dir: parse_path("MODHOST_MODS_DIR", "mods"),
        install_dir: parse_path("MODHOST_INSTALL_DIR", "."),
        socket_path: get_socket_path(),
        inject_timeout: Duration::from_millis(inject_ms),
        ipc_server: load_ipc_server_config(),
        connections: load_connection_config(),
    }
}

impl EnvConfig {
    /// Return a summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            mods_dir: self.mods_dir.clone(),
            install_dir: self.install_dir.clone(),
            socket_path: self.socket_path.clone(),
            inject_timeout_ms: self.inject_timeout.as_millis() as u64,
            ipc_frame_limit: self.ipc_server.max_frame_size,
            max_connections: self.connections.max_connections,
        }
    }
}
