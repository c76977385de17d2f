//! Mod discovery, dependency resolution, and lifecycle.

pub mod instance;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod resolver;

pub use instance::{InstanceError, ModInstance, ModSnapshot, ModState};
pub use loader::{LoaderCore, LoaderError};
pub use manifest::{ManifestError, ManifestStore, ModManifest};
pub use module::{ModModule, ModuleError, ModuleLoader, NativeModuleLoader};
pub use resolver::{resolve, LoadOrder, ResolveError};
