//! Loader core: the authoritative registry of loaded mods.
//!
//! One `LoaderCore` exists per injected runtime. It owns the registry
//! exclusively; every mutating operation runs to completion under the
//! registry lock, so control requests can never race on loader state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use super::instance::{InstanceError, ModInstance, ModSnapshot};
use super::manifest::{ManifestStore, ModManifest};
use super::module::{ModuleError, ModuleLoader};
use super::resolver::{resolve, ResolveError};
use crate::inject::{
    CurrentProcessDriver, InjectError, InjectionDriver, Injector, RuntimeHandle,
};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("invalid mod id '{0}'")]
    InvalidModId(String),

    #[error("mod '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("mod '{id}' module failed to load: {source}")]
    ModuleLoad { id: String, source: ModuleError },

    #[error("mod '{id}' load hook failed: {source}")]
    LoadHookFailed { id: String, source: ModuleError },

    #[error(transparent)]
    Inject(#[from] InjectError),
}

/// Insertion-ordered mapping from mod id to instance.
///
/// Iteration order is load order, which is what `loaded_mods` reports and
/// what the timestamp ordering guarantee is checked against.
struct LoaderRegistry {
    instances: HashMap<String, ModInstance>,
    order: Vec<String>,
}

impl LoaderRegistry {
    fn new() -> Self {
        Self {
            instances: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ModInstance> {
        self.instances.get_mut(id)
    }

    fn insert(&mut self, instance: ModInstance) {
        let id = instance.id().to_string();
        self.order.push(id.clone());
        self.instances.insert(id, instance);
    }

    fn remove(&mut self, id: &str) -> Option<ModInstance> {
        let removed = self.instances.remove(id);
        if removed.is_some() {
            self.order.retain(|o| o != id);
        }
        removed
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn snapshots(&self) -> Vec<ModSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.instances.get(id))
            .map(|i| i.snapshot())
            .collect()
    }

    /// Ids of loaded mods that list `id` as a direct dependency.
    fn dependents_of(&self, id: &str) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|o| self.instances.get(o))
            .filter(|i| i.manifest().dependencies.iter().any(|d| d == id))
            .map(|i| i.id().to_string())
            .collect()
    }
}

struct Inner {
    registry: LoaderRegistry,
    injector: Injector,
    runtime: Option<RuntimeHandle>,
    last_load_at: Option<Instant>,
}

/// Orchestrates manifest discovery, dependency resolution, and mod
/// lifecycle for one process.
pub struct LoaderCore {
    store: ManifestStore,
    modules: Box<dyn ModuleLoader>,
    started_at: Instant,
    inner: Mutex<Inner>,
}

impl LoaderCore {
    pub fn new(store: ManifestStore, modules: Box<dyn ModuleLoader>, injector: Injector) -> Self {
        Self {
            store,
            modules,
            started_at: Instant::now(),
            inner: Mutex::new(Inner {
                registry: LoaderRegistry::new(),
                injector,
                runtime: None,
                last_load_at: None,
            }),
        }
    }

    /// Monotonic zero point for wire-facing timestamps.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// One-time attach for the current process: bootstrap the runtime if
    /// it is not resident yet, then load every auto-load mod in dependency
    /// order. A second call after success is a no-op.
    pub fn load_for_current_process(&self) -> Result<(), LoaderError> {
        let mut driver = CurrentProcessDriver::new();
        self.load_for_current_process_with(&mut driver)
    }

    /// Attach using a caller-supplied bootstrap driver.
    pub fn load_for_current_process_with(
        &self,
        driver: &mut dyn InjectionDriver,
    ) -> Result<(), LoaderError> {
        let mut inner = self.inner.lock();
        if inner.runtime.is_some() {
            tracing::debug!("runtime already resident, attach is a no-op");
            return Ok(());
        }

        // Injection failure aborts the whole attach; nothing is loaded.
        let handle = inner.injector.inject(driver)?;
        inner.runtime = Some(handle);

        let manifests = self.store.list();
        for manifest in manifests.iter().filter(|m| m.auto_load) {
            if inner.registry.contains(&manifest.id) {
                continue;
            }
            // One broken auto-load mod must not keep the rest out.
            if let Err(e) = self.load_locked(&mut inner, &manifest.id, &manifests) {
                tracing::warn!(id = %manifest.id, error = %e, "auto-load failed");
            }
        }
        Ok(())
    }

    /// Load `id` and any of its not-yet-loaded dependencies, dependencies
    /// first.
    pub fn load_mod(&self, id: &str) -> Result<(), LoaderError> {
        if id.is_empty() {
            return Err(LoaderError::InvalidModId(id.to_string()));
        }
        let mut inner = self.inner.lock();
        if inner.registry.contains(id) {
            return Err(LoaderError::AlreadyLoaded(id.to_string()));
        }
        let manifests = self.store.list();
        if !manifests.iter().any(|m| m.id == id) {
            return Err(LoaderError::InvalidModId(id.to_string()));
        }
        self.load_locked(&mut inner, id, &manifests)
    }

    fn load_locked(
        &self,
        inner: &mut Inner,
        id: &str,
        manifests: &[ModManifest],
    ) -> Result<(), LoaderError> {
        let order = resolve(id, manifests)?;

        for manifest in order {
            if inner.registry.contains(&manifest.id) {
                // Already-resident dependency: nothing to do.
                continue;
            }

            let mut module =
                self.modules
                    .load(&manifest.entry)
                    .map_err(|source| LoaderError::ModuleLoad {
                        id: manifest.id.clone(),
                        source,
                    })?;
            module
                .on_load()
                .map_err(|source| LoaderError::LoadHookFailed {
                    id: manifest.id.clone(),
                    source,
                })?;

            let timestamp = self.next_timestamp(inner);
            tracing::info!(id = %manifest.id, "mod loaded");
            inner
                .registry
                .insert(ModInstance::new_at(manifest, module, timestamp));
        }
        Ok(())
    }

    /// Strictly increasing load timestamps, even on platforms whose
    /// monotonic clock can report the same instant twice in a row.
    fn next_timestamp(&self, inner: &mut Inner) -> Instant {
        let mut now = Instant::now();
        if let Some(last) = inner.last_load_at {
            if now <= last {
                now = last + Duration::from_nanos(1);
            }
        }
        inner.last_load_at = Some(now);
        now
    }

    /// Unload `id` and drop it from the registry. Dependencies are left
    /// resident even if `id` was their only dependent; unloading a shared
    /// dependency must be requested explicitly.
    pub fn unload_mod(&self, id: &str) -> Result<(), LoaderError> {
        let mut inner = self.inner.lock();
        let instance = inner
            .registry
            .get_mut(id)
            .ok_or_else(|| LoaderError::InvalidModId(id.to_string()))?;
        instance.unload()?;

        let dependents = inner.registry.dependents_of(id);
        if !dependents.is_empty() {
            tracing::warn!(id, ?dependents, "unloaded a mod that loaded mods depend on");
        }

        inner.registry.remove(id);
        tracing::info!(id, "mod unloaded");
        Ok(())
    }

    pub fn suspend_mod(&self, id: &str) -> Result<(), LoaderError> {
        let mut inner = self.inner.lock();
        let instance = inner
            .registry
            .get_mut(id)
            .ok_or_else(|| LoaderError::InvalidModId(id.to_string()))?;
        instance.suspend()?;
        tracing::info!(id, "mod suspended");
        Ok(())
    }

    pub fn resume_mod(&self, id: &str) -> Result<(), LoaderError> {
        let mut inner = self.inner.lock();
        let instance = inner
            .registry
            .get_mut(id)
            .ok_or_else(|| LoaderError::InvalidModId(id.to_string()))?;
        instance.resume()?;
        tracing::info!(id, "mod resumed");
        Ok(())
    }

    /// Owned snapshots of the registry in load order.
    pub fn loaded_mods(&self) -> Vec<ModSnapshot> {
        self.inner.lock().registry.snapshots()
    }

    pub fn is_mod_loaded(&self, id: &str) -> bool {
        self.inner.lock().registry.contains(id)
    }

    pub fn loaded_count(&self) -> usize {
        self.inner.lock().registry.len()
    }
}
