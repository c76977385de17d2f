//! Shared fixtures: on-disk manifest trees and counting module doubles.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modhost_core::inject::{
    Architecture, BootstrapLayout, BootstrapTarget, InjectError, InjectionDriver, Injector,
    PreloadTable,
};
use modhost_core::mods::{
    LoaderCore, ManifestStore, ModModule, ModuleError, ModuleLoader,
};

/// Builder for a mods directory on disk.
pub struct ModsDir {
    pub dir: tempfile::TempDir,
}

impl ModsDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_mod(&self, id: &str, deps: &[&str]) -> &Self {
        self.add_mod_full(id, deps, true, true, false)
    }

    pub fn add_mod_full(
        &self,
        id: &str,
        deps: &[&str],
        can_suspend: bool,
        can_unload: bool,
        auto_load: bool,
    ) -> &Self {
        let dir = self.dir.path().join(id);
        std::fs::create_dir_all(&dir).expect("mod dir");
        let deps: Vec<String> = deps.iter().map(|d| format!("\"{d}\"")).collect();
        let json = format!(
            r#"{{
                "id": "{id}",
                "dependencies": [{deps}],
                "can_suspend": {can_suspend},
                "can_unload": {can_unload},
                "auto_load": {auto_load},
                "entry": "{id}.dll"
            }}"#,
            deps = deps.join(", "),
        );
        std::fs::write(dir.join("mod.json"), json).expect("mod.json");
        self
    }
}

/// Per-mod hook invocation counters, keyed by mod id.
#[derive(Default)]
pub struct HookLog {
    counts: Mutex<HashMap<String, HashMap<&'static str, usize>>>,
    fail_load: Mutex<HashSet<String>>,
}

impl HookLog {
    pub fn count(&self, id: &str, hook: &'static str) -> usize {
        self.counts
            .lock()
            .unwrap()
            .get(id)
            .and_then(|hooks| hooks.get(hook))
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_load_of(&self, id: &str) {
        self.fail_load.lock().unwrap().insert(id.to_string());
    }

    fn record(&self, id: &str, hook: &'static str) {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .entry(hook)
            .or_default() += 1;
    }
}

struct CountingModule {
    id: String,
    log: Arc<HookLog>,
}

impl ModModule for CountingModule {
    fn on_load(&mut self) -> Result<(), ModuleError> {
        self.log.record(&self.id, "load");
        if self.log.fail_load.lock().unwrap().contains(&self.id) {
            return Err(ModuleError::HookFailed {
                hook: "mod_on_load",
                status: 1,
            });
        }
        Ok(())
    }

    fn on_suspend(&mut self) -> Result<(), ModuleError> {
        self.log.record(&self.id, "suspend");
        Ok(())
    }

    fn on_resume(&mut self) -> Result<(), ModuleError> {
        self.log.record(&self.id, "resume");
        Ok(())
    }

    fn on_unload(&mut self) -> Result<(), ModuleError> {
        self.log.record(&self.id, "unload");
        Ok(())
    }
}

/// Module loader double: keys counters by the entry file stem, which the
/// fixtures keep equal to the mod id.
pub struct CountingLoader {
    pub log: Arc<HookLog>,
}

impl ModuleLoader for CountingLoader {
    fn load(&self, entry: &Path) -> Result<Box<dyn ModModule>, ModuleError> {
        let id = entry
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Box::new(CountingModule {
            id,
            log: Arc::clone(&self.log),
        }))
    }
}

/// Bootstrap driver double that is immediately ready.
pub struct ReadyDriver;

impl InjectionDriver for ReadyDriver {
    fn architecture(&self) -> Architecture {
        Architecture::current()
    }

    fn preload(&mut self, _runtime_module: &Path) -> Result<PreloadTable, InjectError> {
        Ok(PreloadTable::default())
    }

    fn start_bootstrap(&mut self, _target: &BootstrapTarget) -> Result<(), InjectError> {
        Ok(())
    }

    fn wait_ready(&mut self, _timeout: Duration) -> Result<(), InjectError> {
        Ok(())
    }
}

/// A loader core over `mods_dir` with counting modules and a throwaway
/// injector layout.
pub fn loader_with(mods: &ModsDir) -> (LoaderCore, Arc<HookLog>) {
    let log = Arc::new(HookLog::default());
    let store = ManifestStore::new(mods.root());
    let injector = Injector::new(
        BootstrapLayout::new(mods.root().join("install")),
        Duration::from_millis(200),
    );
    let loader = LoaderCore::new(store, Box::new(CountingLoader { log: Arc::clone(&log) }), injector);
    (loader, log)
}

/// Create the bootstrap stub/runtime files the injector verifies.
pub fn write_bootstrap_components(install_root: &Path) {
    std::fs::create_dir_all(install_root).expect("install dir");
    for name in [
        modhost_core::inject::BOOTSTRAP_STUB_X86,
        modhost_core::inject::BOOTSTRAP_STUB_X64,
        modhost_core::inject::RUNTIME_MODULE,
    ] {
        std::fs::write(install_root.join(name), b"stub").expect("component");
    }
}
