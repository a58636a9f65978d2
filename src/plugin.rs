//! Storage driver contract and the process-wide plugin registry.
//!
//! A driver is a named implementation of [`DriverApi`] that can open
//! storages; each opened storage is a [`StorageBackend`] and each
//! per-instance transfer handle a [`DataModelBackend`]. The required
//! methods of each trait form the minimum api every driver provides;
//! the optional methods default to a diagnostic naming the driver and
//! the missing capability, so a caller invoking an unimplemented
//! capability gets a precise error rather than a silent no-op.
//!
//! The registry is process-wide: drivers register under their name and
//! are resolved by [`lookup`]. Resolution falls back to scanning the
//! plugin search path for loadable modules through an installed
//! [`PluginLoader`]; the loader itself (platform dynamic linking) is an
//! external concern and only its interface is defined here. The search
//! path is seeded from the `DLITE_STORAGE_PLUGIN_DIRS` environment
//! variable and can be edited with [`path_insert`], [`path_append`] and
//! [`path_remove`]. The registry is expected to be configured during
//! startup; see the crate docs for the concurrency contract.

use std::collections::HashMap;
use std::env;
use std::hash::BuildHasherDefault;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use seahash::SeaHasher;
use tracing::{debug, warn};

use crate::datatype::{PropertyValue, TypeTag};
use crate::entity::Entity;
use crate::error::{DLiteError, Result};

pub type MapHasher = BuildHasherDefault<SeaHasher>;

/// Environment variable holding the plugin search path (platform
/// path-list separator).
pub const PLUGIN_ENV_VAR: &str = "DLITE_STORAGE_PLUGIN_DIRS";

/// When this environment variable is set to a non-empty value, the
/// compile-time build-root plugin directory is appended to the search
/// path.
pub const BUILD_ROOT_ENV_VAR: &str = "DLITE_USE_BUILD_ROOT";

/// Extension of a loadable driver module on this platform.
#[cfg(windows)]
pub const MODULE_EXT: &str = "dll";
#[cfg(not(windows))]
pub const MODULE_EXT: &str = "so";

/// Returns the missing-capability diagnostic for `driver`.
pub fn missing_capability(driver: &str, capability: &'static str) -> DLiteError {
    DLiteError::MissingCapability { driver: driver.to_owned(), capability }
}

// ------------- Driver contract -------------

/// A named storage driver.
pub trait DriverApi: Send + Sync {
    /// The driver name the registry resolves.
    fn name(&self) -> &str;

    /// Opens a storage. `options` is a driver-defined string; by
    /// convention `"r"` opens read-only, `"w"` opens for writing and
    /// `"a"` appends to an existing storage.
    fn open(&self, uri: &str, options: &str) -> Result<Box<dyn StorageBackend>>;
}

/// An opened storage, as provided by a driver.
pub trait StorageBackend {
    /// Name of the driver that opened this storage.
    fn driver(&self) -> &str;

    /// Flushes and releases driver-side resources.
    fn close(&mut self) -> Result<()>;

    /// A fresh datamodel handle for the instance with the given uuid.
    fn data_model(&self, uuid: &str) -> Result<Box<dyn DataModelBackend>>;

    /// All instance uuids present in the storage.
    fn get_uuids(&self) -> Result<Vec<String>> {
        Err(missing_capability(self.driver(), "get_uuids"))
    }

    /// Reads the entity with the given uuid in its format-native form.
    fn get_entity(&self, _uuid: &str) -> Result<Arc<Entity>> {
        Err(missing_capability(self.driver(), "get_entity"))
    }

    /// Writes an entity in its format-native form.
    fn set_entity(&mut self, _entity: &Entity) -> Result<()> {
        Err(missing_capability(self.driver(), "set_entity"))
    }
}

/// A per-instance transfer handle, as provided by a driver.
pub trait DataModelBackend {
    /// Name of the driver that created this datamodel.
    fn driver(&self) -> &str;

    /// The uri of the metadata the stored instance conforms to.
    fn meta_uri(&self) -> Result<String>;

    /// The stored size of dimension `name`.
    fn dimension_size(&self, name: &str) -> Result<usize>;

    /// Reads property `name` as a value of `(tag, size)` with the given
    /// runtime shape (empty for scalars).
    fn get_property(
        &self,
        name: &str,
        tag: TypeTag,
        size: usize,
        shape: &[usize],
    ) -> Result<PropertyValue>;

    fn set_meta_uri(&mut self, _uri: &str) -> Result<()> {
        Err(missing_capability(self.driver(), "set_meta_uri"))
    }

    fn set_dimension_size(&mut self, _name: &str, _size: usize) -> Result<()> {
        Err(missing_capability(self.driver(), "set_dimension_size"))
    }

    fn set_property(&mut self, _name: &str, _value: &PropertyValue) -> Result<()> {
        Err(missing_capability(self.driver(), "set_property"))
    }

    fn has_dimension(&self, _name: &str) -> Result<bool> {
        Err(missing_capability(self.driver(), "has_dimension"))
    }

    fn has_property(&self, _name: &str) -> Result<bool> {
        Err(missing_capability(self.driver(), "has_property"))
    }

    /// The original name the stored uuid was derived from, if recorded.
    fn get_data_name(&self) -> Result<String> {
        Err(missing_capability(self.driver(), "get_data_name"))
    }

    /// Records the original name the uuid was derived from.
    fn set_data_name(&mut self, _name: &str) -> Result<()> {
        Err(missing_capability(self.driver(), "set_data_name"))
    }
}

/// Interface to the platform dynamic-module loader. Loading shared
/// objects is an external concern; the registry only needs to hand a
/// module path to an installed loader and receive the driver api the
/// module exports through its well-known entry symbol.
pub trait PluginLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn DriverApi>>;
}

// ------------- Registry -------------

struct PluginRegistry {
    drivers: HashMap<String, Arc<dyn DriverApi>, MapHasher>,
    paths: Vec<PathBuf>,
    loader: Option<Box<dyn PluginLoader>>,
}

impl PluginRegistry {
    fn from_env() -> PluginRegistry {
        let mut paths = Vec::new();
        if let Some(dirs) = env::var_os(PLUGIN_ENV_VAR) {
            paths.extend(env::split_paths(&dirs));
        }
        if env::var_os(BUILD_ROOT_ENV_VAR).is_some_and(|v| !v.is_empty()) {
            if let Some(build_dir) = option_env!("DLITE_STORAGE_PLUGINS") {
                paths.push(PathBuf::from(build_dir));
            }
        }
        PluginRegistry { drivers: HashMap::default(), paths, loader: None }
    }

    fn resolve(&mut self, name: &str) -> Result<Arc<dyn DriverApi>> {
        if let Some(api) = self.drivers.get(name) {
            return Ok(Arc::clone(api));
        }
        if self.loader.is_some() {
            // first pass: a module named after the driver
            let candidates: Vec<PathBuf> = self
                .paths
                .iter()
                .map(|dir| dir.join(format!("{name}.{MODULE_EXT}")))
                .filter(|p| p.is_file())
                .collect();
            for candidate in candidates {
                if let Some(api) = self.load_module(&candidate) {
                    let api_name = api.name().to_owned();
                    self.drivers.insert(api_name, Arc::clone(&api));
                    return Ok(api);
                }
            }
            // second pass: register every loadable module and pick by name
            self.load_all_modules();
            if let Some(api) = self.drivers.get(name) {
                return Ok(Arc::clone(api));
            }
        }
        Err(DLiteError::PluginResolution(self.resolution_failure(name)))
    }

    fn load_module(&self, path: &Path) -> Option<Arc<dyn DriverApi>> {
        let loader = self.loader.as_ref()?;
        match loader.load(path) {
            Ok(api) => {
                debug!(path = %path.display(), driver = api.name(), "loaded storage plugin");
                Some(api)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load storage plugin");
                None
            }
        }
    }

    fn load_all_modules(&mut self) {
        let mut found = Vec::new();
        for dir in &self.paths {
            let Ok(entries) = std::fs::read_dir(dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some(MODULE_EXT) {
                    if let Some(api) = self.load_module(&path) {
                        found.push(api);
                    }
                }
            }
        }
        for api in found {
            self.drivers.entry(api.name().to_owned()).or_insert(api);
        }
    }

    fn resolution_failure(&self, name: &str) -> String {
        let mut msg =
            format!("cannot find storage plugin for driver \"{name}\" in search path:\n");
        for p in &self.paths {
            msg.push_str(&format!("    {}\n", p.display()));
        }
        if self.paths.len() <= 1 {
            msg.push_str(&format!(
                "Is the {PLUGIN_ENV_VAR} environment variable set?"
            ));
        }
        msg
    }
}

lazy_static! {
    static ref REGISTRY: Mutex<PluginRegistry> = Mutex::new(PluginRegistry::from_env());
}

fn with_registry<T>(op: impl FnOnce(&mut PluginRegistry) -> T) -> T {
    let mut registry = REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    op(&mut registry)
}

/// Registers a driver api under its name, replacing any previous
/// registration of the same name.
pub fn register(api: Arc<dyn DriverApi>) {
    with_registry(|r| {
        debug!(driver = api.name(), "registered storage plugin");
        r.drivers.insert(api.name().to_owned(), api);
    })
}

/// Resolves the driver with the given name: a registered api is
/// returned directly, otherwise the search path is scanned through the
/// installed loader. Fails with a diagnostic listing the effective
/// search path.
pub fn lookup(name: &str) -> Result<Arc<dyn DriverApi>> {
    with_registry(|r| r.resolve(name))
}

/// Unregisters the driver with the given name.
pub fn unload(name: &str) -> Result<()> {
    with_registry(|r| {
        r.drivers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DLiteError::PluginResolution(format!("no registered driver: \"{name}\"")))
    })
}

/// Unregisters every driver.
pub fn unload_all() {
    with_registry(|r| r.drivers.clear())
}

/// Loads and registers every module found in the search path.
pub fn load_all() {
    with_registry(|r| r.load_all_modules())
}

/// Installs the dynamic-module loader used to resolve drivers from disk.
pub fn set_loader(loader: Box<dyn PluginLoader>) {
    with_registry(|r| r.loader = Some(loader))
}

/// Iterator over a snapshot of the registered drivers.
pub struct PluginIter {
    apis: std::vec::IntoIter<Arc<dyn DriverApi>>,
}

impl Iterator for PluginIter {
    type Item = Arc<dyn DriverApi>;
    fn next(&mut self) -> Option<Self::Item> {
        self.apis.next()
    }
}

/// Returns an iterator over the currently registered drivers.
pub fn iter() -> PluginIter {
    let apis: Vec<_> = with_registry(|r| r.drivers.values().cloned().collect());
    PluginIter { apis: apis.into_iter() }
}

/// The current plugin search path.
pub fn paths() -> Vec<PathBuf> {
    with_registry(|r| r.paths.clone())
}

/// Inserts `path` into the search path at index `n`. Negative indices
/// count from the end; out-of-range indices are clipped.
pub fn path_insert(n: isize, path: impl Into<PathBuf>) {
    let path = path.into();
    with_registry(|r| {
        let i = clip_index(n, r.paths.len());
        r.paths.insert(i, path);
    })
}

/// Appends `path` to the search path.
pub fn path_append(path: impl Into<PathBuf>) {
    let path = path.into();
    with_registry(|r| r.paths.push(path))
}

/// Removes path number `n` from the search path. Negative indices count
/// from the end; out-of-range indices are clipped.
pub fn path_remove(n: isize) -> Result<()> {
    with_registry(|r| {
        if r.paths.is_empty() {
            return Err(DLiteError::PluginResolution(
                "cannot remove from an empty search path".to_owned(),
            ));
        }
        let i = clip_index(n, r.paths.len()).min(r.paths.len() - 1);
        r.paths.remove(i);
        Ok(())
    })
}

/// Maps an index that may be negative (counted from the end) into
/// `0..=len`, clipping out-of-range values.
fn clip_index(n: isize, len: usize) -> usize {
    if n < 0 {
        len.saturating_sub(n.unsigned_abs())
    } else {
        (n as usize).min(len)
    }
}
