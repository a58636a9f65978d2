//! Storage handles: opening and closing driver-backed storages.
//!
//! A [`Storage`] pairs a resolved driver with one opened backend and
//! the facts of the opening call (uri, options, writability). All
//! instance traffic flows through per-instance datamodels obtained from
//! the storage; see [`crate::datamodel`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::Result;
use crate::plugin::{self, DataModelBackend, StorageBackend};

/// An opened storage.
pub struct Storage {
    driver: String,
    backend: Box<dyn StorageBackend>,
    uri: String,
    options: String,
    writable: bool,
    closed: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("driver", &self.driver)
            .field("uri", &self.uri)
            .field("options", &self.options)
            .field("writable", &self.writable)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Storage {
    /// Resolves `driver_name` through the plugin registry and opens the
    /// storage at `uri` with the given options string.
    pub fn open(driver_name: &str, uri: &str, options: &str) -> Result<Storage> {
        let api = plugin::lookup(driver_name)?;
        let backend = api.open(uri, options)?;
        let writable = options_writable(options);
        debug!(driver = driver_name, uri, options, writable, "opened storage");
        Ok(Storage {
            driver: driver_name.to_owned(),
            backend,
            uri: uri.to_owned(),
            options: options.to_owned(),
            writable,
            closed: false,
        })
    }

    /// Closes the storage, flushing driver-side state.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.backend.close()
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }
    pub fn uri(&self) -> &str {
        &self.uri
    }
    pub fn options(&self) -> &str {
        &self.options
    }
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// A fresh driver datamodel handle for `uuid`.
    pub(crate) fn data_model(&self, uuid: &str) -> Result<Box<dyn DataModelBackend>> {
        self.backend.data_model(uuid)
    }

    /// All instance uuids in the storage (optional driver capability).
    pub fn uuids(&self) -> Result<Vec<String>> {
        self.backend.get_uuids()
    }

    /// Reads an entity in its format-native form (optional driver
    /// capability).
    pub fn get_entity(&self, uuid: &str) -> Result<Arc<Entity>> {
        self.backend.get_entity(uuid)
    }

    /// Writes an entity in its format-native form (optional driver
    /// capability).
    pub fn set_entity(&mut self, entity: &Entity) -> Result<()> {
        self.backend.set_entity(entity)
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.backend.close() {
                warn!(driver = %self.driver, uri = %self.uri, error = %e,
                      "error closing storage");
            }
        }
    }
}

/// A storage is writable when its options request write or append mode.
fn options_writable(options: &str) -> bool {
    options.contains('w') || options.contains('a')
}
