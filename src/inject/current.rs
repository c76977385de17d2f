//! In-process bootstrap driver.
//!
//! `load_for_current_process` does not cross a process boundary: the
//! "injection" is a plain dynamic load of the stub and runtime module into
//! the calling process. The readiness handshake still applies — the
//! runtime's `modhost_runtime_ready` export must report ready within the
//! timeout.

use std::path::Path;
use std::time::{Duration, Instant};

use libloading::Library;

use super::{
    Architecture, BootstrapTarget, InjectError, InjectionDriver, PreloadTable, PreloadedSymbol,
    RUNTIME_EXPORTS,
};

type ReadyFn = unsafe extern "C" fn() -> i32;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Loads the bootstrap stub and runtime module into the calling process.
#[derive(Default)]
pub struct CurrentProcessDriver {
    stub: Option<Library>,
    runtime: Option<Library>,
}

impl CurrentProcessDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InjectionDriver for CurrentProcessDriver {
    fn architecture(&self) -> Architecture {
        Architecture::current()
    }

    fn preload(&mut self, runtime_module: &Path) -> Result<PreloadTable, InjectError> {
        let lib = unsafe { Library::new(runtime_module) }.map_err(|e| {
            InjectError::BootstrapFailed(format!(
                "cannot load runtime module {}: {e}",
                runtime_module.display()
            ))
        })?;

        let mut symbols = Vec::with_capacity(RUNTIME_EXPORTS.len());
        for name in RUNTIME_EXPORTS {
            let mut raw = Vec::with_capacity(name.len() + 1);
            raw.extend_from_slice(name.as_bytes());
            raw.push(0);
            let address = unsafe { lib.get::<*const ()>(&raw) }
                .map(|s| *s as usize)
                .map_err(|e| InjectError::PreloadFailed {
                    symbol: (*name).to_string(),
                    detail: e.to_string(),
                })?;
            symbols.push(PreloadedSymbol {
                name: (*name).to_string(),
                address,
            });
        }

        self.runtime = Some(lib);
        Ok(PreloadTable::new(symbols))
    }

    fn start_bootstrap(&mut self, target: &BootstrapTarget) -> Result<(), InjectError> {
        // The runtime module was already mapped by the preload step; the
        // stub only has to run its initializers in this process.
        let stub = unsafe { Library::new(&target.bootstrap_stub) }.map_err(|e| {
            InjectError::BootstrapFailed(format!(
                "cannot load bootstrap stub {}: {e}",
                target.bootstrap_stub.display()
            ))
        })?;
        self.stub = Some(stub);
        Ok(())
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), InjectError> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| InjectError::BootstrapFailed("runtime module not loaded".into()))?;

        let ready: ReadyFn = unsafe { runtime.get::<ReadyFn>(b"modhost_runtime_ready\0") }
            .map(|s| *s)
            .map_err(|e| InjectError::PreloadFailed {
                symbol: "modhost_runtime_ready".into(),
                detail: e.to_string(),
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            if unsafe { ready() } != 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(InjectError::InjectionTimeout(timeout));
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
    }
}
