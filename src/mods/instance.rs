//! Per-mod lifecycle state machine.
//!
//! Every loaded mod is one `ModInstance`: its manifest, its current state,
//! the monotonic load timestamp, and the owned native module handle.
//! Transitions are gated by the manifest capability flags; a hook is never
//! invoked when its flag is false, and a faulting hook leaves the instance
//! in its prior state.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

use super::manifest::ModManifest;
use super::module::{ModModule, ModuleError};

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("mod '{id}' does not support {operation}")]
    Unsupported { id: String, operation: &'static str },

    #[error("mod '{id}' hook failed: {source}")]
    HookFailed { id: String, source: ModuleError },

    #[error("mod '{id}' is unloaded")]
    Unloaded { id: String },
}

/// Lifecycle state of a loaded mod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModState {
    Running,
    Suspended,
    Unloaded,
}

/// One loaded mod: manifest, state, and owned module handle.
pub struct ModInstance {
    manifest: ModManifest,
    state: ModState,
    load_timestamp: Instant,
    // None only after the unload hook has run and the handle was released.
    module: Option<Box<dyn ModModule>>,
}

/// Read-only view of one registry entry, detached from live state.
#[derive(Debug, Clone)]
pub struct ModSnapshot {
    pub manifest: ModManifest,
    pub state: ModState,
    pub load_timestamp: Instant,
}

impl ModInstance {
    /// Wrap a freshly loaded module. The instance starts `Running` and the
    /// load timestamp is captured here.
    pub fn new(manifest: ModManifest, module: Box<dyn ModModule>) -> Self {
        Self::new_at(manifest, module, Instant::now())
    }

    /// Like [`ModInstance::new`], with a caller-chosen load timestamp. The
    /// loader uses this to keep timestamps strictly increasing.
    pub fn new_at(
        manifest: ModManifest,
        module: Box<dyn ModModule>,
        load_timestamp: Instant,
    ) -> Self {
        Self {
            manifest,
            state: ModState::Running,
            load_timestamp,
            module: Some(module),
        }
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn manifest(&self) -> &ModManifest {
        &self.manifest
    }

    pub fn state(&self) -> ModState {
        self.state
    }

    pub fn load_timestamp(&self) -> Instant {
        self.load_timestamp
    }

    pub fn snapshot(&self) -> ModSnapshot {
        ModSnapshot {
            manifest: self.manifest.clone(),
            state: self.state,
            load_timestamp: self.load_timestamp,
        }
    }

    fn module_mut(&mut self) -> Result<&mut Box<dyn ModModule>, InstanceError> {
        let id = self.manifest.id.clone();
        self.module
            .as_mut()
            .ok_or(InstanceError::Unloaded { id })
    }

    /// `Running -> Suspended`. Requires `can_suspend`; suspending an
    /// already-suspended mod is a no-op success.
    pub fn suspend(&mut self) -> Result<(), InstanceError> {
        if self.state == ModState::Suspended {
            return Ok(());
        }
        if !self.manifest.can_suspend {
            return Err(InstanceError::Unsupported {
                id: self.manifest.id.clone(),
                operation: "suspend",
            });
        }
        let id = self.manifest.id.clone();
        self.module_mut()?
            .on_suspend()
            .map_err(|source| InstanceError::HookFailed { id, source })?;
        self.state = ModState::Suspended;
        Ok(())
    }

    /// `Suspended -> Running`. Resuming a running mod is a no-op success,
    /// so the operation is idempotent for controllers.
    pub fn resume(&mut self) -> Result<(), InstanceError> {
        if self.state == ModState::Running {
            return Ok(());
        }
        let id = self.manifest.id.clone();
        self.module_mut()?
            .on_resume()
            .map_err(|source| InstanceError::HookFailed { id, source })?;
        self.state = ModState::Running;
        Ok(())
    }

    /// `Running|Suspended -> Unloaded` (terminal). Requires `can_unload`;
    /// on success the module handle is released.
    pub fn unload(&mut self) -> Result<(), InstanceError> {
        if !self.manifest.can_unload {
            return Err(InstanceError::Unsupported {
                id: self.manifest.id.clone(),
                operation: "unload",
            });
        }
        let id = self.manifest.id.clone();
        self.module_mut()?
            .on_unload()
            .map_err(|source| InstanceError::HookFailed { id, source })?;
        self.state = ModState::Unloaded;
        self.module = None;
        Ok(())
    }
}
