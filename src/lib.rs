//! modhost-core
//!
//! A mod loading/lifecycle runtime for third-party code modules ("mods")
//! executed inside host game processes. The crate builds both as a library
//! for the controller and as the runtime module that gets bootstrapped
//! into a target process.
//!
//! # Responsibilities
//!
//! - **Discovery**: scan mod manifests from a mods directory
//! - **Resolution**: dependency-ordered load sequences, cycle detection
//! - **Bootstrap**: architecture-dispatched injection of the runtime,
//!   preceded by symbol preload and bounded by a readiness timeout
//! - **Lifecycle**: per-mod load/suspend/resume/unload state machine gated
//!   by manifest capability flags
//! - **Control**: local-socket protocol letting an external controller
//!   drive the loader one request at a time
//!
//! Out of scope: UI, mod packaging/distribution, and game-hooking — a
//! loaded mod brings its own hooking machinery.

pub mod cli;
pub mod config;
pub mod inject;
pub mod ipc;
pub mod mods;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use inject::{BootstrapLayout, Injector};
use ipc::{ConnectionConfig, ControlHandler, IpcServerConfig};
use mods::{LoaderCore, ManifestStore, NativeModuleLoader};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mods_dir: std::path::PathBuf,
    pub install_dir: std::path::PathBuf,
    pub socket_path: String,
    pub inject_timeout: Duration,
    pub ipc_server: IpcServerConfig,
    pub connections: ConnectionConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mods_dir: std::path::PathBuf::from("mods"),
            install_dir: std::path::PathBuf::from("."),
            socket_path: cli::get_socket_path(),
            inject_timeout: Duration::from_secs(5),
            ipc_server: IpcServerConfig::default(),
            connections: ConnectionConfig::default(),
        }
    }
}

impl From<config::EnvConfig> for RuntimeConfig {
    fn from(cfg: config::EnvConfig) -> Self {
        Self {
            mods_dir: cfg.mods_dir,
            install_dir: cfg.install_dir,
            socket_path: cfg.socket_path,
            inject_timeout: cfg.inject_timeout,
            ipc_server: cfg.ipc_server,
            connections: cfg.connections,
        }
    }
}

/// The assembled runtime: loader core plus control handler.
pub struct Runtime {
    pub loader: Arc<LoaderCore>,
    pub handler: Arc<ControlHandler>,
    pub config: RuntimeConfig,
}

impl Runtime {
    /// Wire up a runtime instance from the given configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let store = ManifestStore::new(config.mods_dir.clone());
        let injector = Injector::new(
            BootstrapLayout::new(config.install_dir.clone()),
            config.inject_timeout,
        );
        let loader = Arc::new(LoaderCore::new(
            store,
            Box::new(NativeModuleLoader),
            injector,
        ));
        let handler = Arc::new(ControlHandler::new(Arc::clone(&loader)));
        Self {
            loader,
            handler,
            config,
        }
    }
}

static RUNTIME_READY: AtomicBool = AtomicBool::new(false);

/// Entry point called by the bootstrap stub once the runtime module is
/// mapped into the target process. Returns 0 on success.
#[no_mangle]
pub extern "C" fn modhost_runtime_entry() -> i32 {
    RUNTIME_READY.store(true, Ordering::SeqCst);
    0
}

/// Readiness probe polled during the injection handshake. Returns nonzero
/// once `modhost_runtime_entry` has run.
#[no_mangle]
pub extern "C" fn modhost_runtime_ready() -> i32 {
    i32::from(RUNTIME_READY.load(Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_wiring() {
        let runtime = Runtime::new(RuntimeConfig::default());
        assert_eq!(runtime.loader.loaded_count(), 0);
        assert!(Arc::ptr_eq(runtime.handler.loader(), &runtime.loader));
    }

    #[test]
    fn test_runtime_entry_flips_readiness() {
        assert_eq!(modhost_runtime_entry(), 0);
        assert_ne!(modhost_runtime_ready(), 0);
    }
}
