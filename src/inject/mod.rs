//! Cross-process bootstrap of the runtime.
//!
//! Injection is a one-shot, architecture-dispatched handshake: pick the
//! bootstrap stub matching the *target* process bitness, verify every
//! required file exists on disk, resolve the callback addresses the
//! injected runtime needs (the preload step), start the stub, then block
//! until the runtime signals readiness or the timeout expires.
//!
//! Missing files are configuration defects and fail fast with the file
//! identity in the error; they are never retried.

mod current;
#[cfg(windows)]
mod remote;

pub use current::CurrentProcessDriver;
#[cfg(windows)]
pub use remote::RemoteProcessDriver;

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Exports the injected runtime must provide; resolved during preload so
/// no symbol lookup happens while code is already running in the foreign
/// process.
pub const RUNTIME_EXPORTS: &[&str] = &["modhost_runtime_entry", "modhost_runtime_ready"];

/// File names of the bootstrap components under the install root.
pub const BOOTSTRAP_STUB_X86: &str = "modhost_boot32.dll";
pub const BOOTSTRAP_STUB_X64: &str = "modhost_boot64.dll";
pub const RUNTIME_MODULE: &str = "modhost_core.dll";

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("bootstrap component not found: {0}")]
    ComponentNotFound(PathBuf),

    #[error("failed to resolve runtime export '{symbol}': {detail}")]
    PreloadFailed { symbol: String, detail: String },

    #[error("bootstrap stub failed to start: {0}")]
    BootstrapFailed(String),

    #[error("injected runtime did not signal readiness within {0:?}")]
    InjectionTimeout(Duration),

    #[error("runtime already injected into this process")]
    AlreadyInjected,
}

/// Bitness of the target process. Always the target's, never the
/// controller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86,
    X64,
}

impl Architecture {
    /// Architecture of the calling process.
    pub fn current() -> Self {
        if cfg!(target_pointer_width = "64") {
            Architecture::X64
        } else {
            Architecture::X86
        }
    }
}

/// Bootstrap stub + runtime module paths for one architecture.
#[derive(Debug, Clone)]
pub struct BootstrapTarget {
    pub architecture: Architecture,
    pub bootstrap_stub: PathBuf,
    pub runtime_module: PathBuf,
}

impl BootstrapTarget {
    /// Fail fast if any required file is absent. Called before any
    /// cross-process work begins.
    pub fn verify(&self) -> Result<(), InjectError> {
        for path in [&self.bootstrap_stub, &self.runtime_module] {
            if !path.is_file() {
                return Err(InjectError::ComponentNotFound(path.clone()));
            }
        }
        Ok(())
    }
}

/// Locates bootstrap components under an installation root.
#[derive(Debug, Clone)]
pub struct BootstrapLayout {
    install_root: PathBuf,
}

impl BootstrapLayout {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Build the target for `architecture` without touching the disk.
    pub fn target(&self, architecture: Architecture) -> BootstrapTarget {
        let stub = match architecture {
            Architecture::X86 => BOOTSTRAP_STUB_X86,
            Architecture::X64 => BOOTSTRAP_STUB_X64,
        };
        BootstrapTarget {
            architecture,
            bootstrap_stub: self.install_root.join(stub),
            runtime_module: self.install_root.join(RUNTIME_MODULE),
        }
    }
}

/// One resolved callback address.
#[derive(Debug, Clone)]
pub struct PreloadedSymbol {
    pub name: String,
    pub address: usize,
}

/// Addresses resolved before injection, cached for the lifetime of the
/// injected runtime.
#[derive(Debug, Clone, Default)]
pub struct PreloadTable {
    symbols: Vec<PreloadedSymbol>,
}

impl PreloadTable {
    pub fn new(symbols: Vec<PreloadedSymbol>) -> Self {
        Self { symbols }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.address)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Proof that the runtime is resident and ready inside one target process.
#[derive(Debug)]
pub struct RuntimeHandle {
    pub architecture: Architecture,
    pub preload: PreloadTable,
}

/// Raw per-target injection mechanics, split out so the handshake logic
/// can be driven against in-process and test targets alike.
pub trait InjectionDriver: Send {
    /// Bitness of the target process.
    fn architecture(&self) -> Architecture;

    /// Resolve and cache the callback addresses needed after injection.
    fn preload(&mut self, runtime_module: &Path) -> Result<PreloadTable, InjectError>;

    /// Start the bootstrap stub inside the target process.
    fn start_bootstrap(&mut self, target: &BootstrapTarget) -> Result<(), InjectError>;

    /// Block until the injected runtime signals readiness, bounded by
    /// `timeout`.
    fn wait_ready(&mut self, timeout: Duration) -> Result<(), InjectError>;
}

/// Drives the bootstrap handshake for one target process.
///
/// `inject` succeeds at most once per injector; on timeout the target is
/// left injected-but-not-ready and the caller must treat the failure as
/// fatal rather than retry.
pub struct Injector {
    layout: BootstrapLayout,
    timeout: Duration,
    injected: bool,
}

impl Injector {
    pub fn new(layout: BootstrapLayout, timeout: Duration) -> Self {
        Self {
            layout,
            timeout,
            injected: false,
        }
    }

    pub fn layout(&self) -> &BootstrapLayout {
        &self.layout
    }

    /// Bootstrap the runtime into the driver's target process.
    pub fn inject(
        &mut self,
        driver: &mut dyn InjectionDriver,
    ) -> Result<RuntimeHandle, InjectError> {
        if self.injected {
            return Err(InjectError::AlreadyInjected);
        }

        let architecture = driver.architecture();
        let target = self.layout.target(architecture);
        target.verify()?;

        let preload = driver.preload(&target.runtime_module)?;
        tracing::debug!(symbols = preload.len(), "preload complete");

        driver.start_bootstrap(&target)?;
        driver.wait_ready(self.timeout)?;

        self.injected = true;
        tracing::info!(?architecture, "runtime injected and ready");
        Ok(RuntimeHandle {
            architecture,
            preload,
        })
    }
}
