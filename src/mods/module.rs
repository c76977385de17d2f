//! Native mod module ABI and loading.
//!
//! A mod module is a dynamic library exporting optional lifecycle hooks:
//! `mod_on_load`, `mod_on_suspend`, `mod_on_resume`, `mod_on_unload`, each
//! `extern "C" fn() -> i32` returning 0 on success. Hooks are resolved once
//! at load time into a hook table; a missing export simply means the mod
//! does not care about that transition.

use std::path::{Path, PathBuf};
use thiserror::Error;

use libloading::Library;

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("failed to load module {path}: {detail}")]
    LoadFailed { path: PathBuf, detail: String },

    #[error("hook '{hook}' failed with status {status}")]
    HookFailed { hook: &'static str, status: i32 },
}

/// Lifecycle hook entry points of a loaded mod module.
///
/// Implementations run arbitrary third-party code; a returned error is
/// surfaced to the caller as `ModHookFailed` and must leave the module in
/// a usable state.
pub trait ModModule: Send {
    fn on_load(&mut self) -> Result<(), ModuleError>;
    fn on_suspend(&mut self) -> Result<(), ModuleError>;
    fn on_resume(&mut self) -> Result<(), ModuleError>;
    fn on_unload(&mut self) -> Result<(), ModuleError>;
}

impl std::fmt::Debug for dyn ModModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ModModule")
    }
}

/// Turns a manifest entry path into a loaded module.
///
/// The seam exists so the loader can be exercised without real dynamic
/// libraries on disk.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, entry: &Path) -> Result<Box<dyn ModModule>, ModuleError>;
}

type HookFn = unsafe extern "C" fn() -> i32;

struct HookTable {
    on_load: Option<HookFn>,
    on_suspend: Option<HookFn>,
    on_resume: Option<HookFn>,
    on_unload: Option<HookFn>,
}

/// A mod module backed by a real dynamic library.
///
/// The library stays resident for the lifetime of the value; dropping it
/// releases the OS module handle.
pub struct NativeModule {
    _lib: Library,
    hooks: HookTable,
}

impl NativeModule {
    /// Load the library at `path` and resolve its optional hook exports.
    ///
    /// # Safety
    /// Loading a native library executes its initializers. Callers must
    /// only pass modules they intend to run.
    pub unsafe fn load(path: &Path) -> Result<Self, ModuleError> {
        let lib = Library::new(path).map_err(|e| ModuleError::LoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let hook = |name: &[u8]| -> Option<HookFn> {
            lib.get::<HookFn>(name).map(|s| *s).ok()
        };

        let hooks = HookTable {
            on_load: hook(b"mod_on_load\0"),
            on_suspend: hook(b"mod_on_suspend\0"),
            on_resume: hook(b"mod_on_resume\0"),
            on_unload: hook(b"mod_on_unload\0"),
        };

        Ok(Self { _lib: lib, hooks })
    }
}

fn invoke(hook: Option<HookFn>, name: &'static str) -> Result<(), ModuleError> {
    let Some(f) = hook else {
        // No export: the transition is a structural no-op for this mod.
        return Ok(());
    };
    let status = unsafe { f() };
    if status == 0 {
        Ok(())
    } else {
        Err(ModuleError::HookFailed { hook: name, status })
    }
}

impl ModModule for NativeModule {
    fn on_load(&mut self) -> Result<(), ModuleError> {
        invoke(self.hooks.on_load, "mod_on_load")
    }

    fn on_suspend(&mut self) -> Result<(), ModuleError> {
        invoke(self.hooks.on_suspend, "mod_on_suspend")
    }

    fn on_resume(&mut self) -> Result<(), ModuleError> {
        invoke(self.hooks.on_resume, "mod_on_resume")
    }

    fn on_unload(&mut self) -> Result<(), ModuleError> {
        invoke(self.hooks.on_unload, "mod_on_unload")
    }
}

/// Production loader: libloading-backed dynamic library loading.
pub struct NativeModuleLoader;

impl ModuleLoader for NativeModuleLoader {
    fn load(&self, entry: &Path) -> Result<Box<dyn ModModule>, ModuleError> {
        if !entry.is_file() {
            return Err(ModuleError::LoadFailed {
                path: entry.to_path_buf(),
                detail: "module file does not exist".into(),
            });
        }
        let module = unsafe { NativeModule::load(entry)? };
        Ok(Box::new(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_loader_rejects_missing_file() {
        let loader = NativeModuleLoader;
        let err = loader.load(Path::new("/nonexistent/mod.so")).unwrap_err();
        assert!(matches!(err, ModuleError::LoadFailed { .. }));
    }

    #[test]
    fn test_hook_failed_display_includes_status() {
        let err = ModuleError::HookFailed {
            hook: "mod_on_load",
            status: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("mod_on_load"));
        assert!(msg.contains('7'));
    }
}
