//! The per-instance datamodel façade.
//!
//! A [`DataModel`] binds a driver datamodel handle to `(storage, uuid)`
//! and exposes typed wrappers for the transfers the load/save protocol
//! needs. The required driver capabilities pass straight through;
//! optional capabilities surface the driver-naming diagnostic when the
//! backend does not provide them.
//!
//! [`ShapeIter`] is the single N-dimensional iterator drivers use to
//! walk C-ordered array data, whichever nesting shape their format
//! prefers.

use crate::datatype::{PropertyValue, TypeTag};
use crate::error::{DLiteError, Result};
use crate::identity::{get_uuid, UuidVersion};
use crate::plugin::DataModelBackend;
use crate::storage::Storage;

/// Typed transfer façade for one instance in one storage.
pub struct DataModel {
    backend: Box<dyn DataModelBackend>,
    driver: String,
    uuid: String,
}

impl DataModel {
    /// Creates a datamodel for the instance identified by `id` in
    /// `storage`. When `id` is a name a v5 uuid was derived from and the
    /// storage is writable, the original name is recorded through the
    /// driver's `set_data_name` if the driver provides it.
    pub fn new(storage: &Storage, id: &str) -> Result<DataModel> {
        let (uuid, version) = get_uuid(id);
        let backend = storage.data_model(&uuid).map_err(|e| {
            DLiteError::Driver(format!(
                "cannot create datamodel id='{id}' for storage '{}': {e}",
                storage.driver()
            ))
        })?;
        let mut model = DataModel { backend, driver: storage.driver().to_owned(), uuid };
        if version == UuidVersion::Hashed && storage.writable() {
            match model.backend.set_data_name(id) {
                Err(DLiteError::MissingCapability { .. }) => (),
                result => result?,
            }
        }
        Ok(model)
    }

    /// The canonical uuid this datamodel is bound to.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Name of the driver serving this datamodel.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// The uri of the metadata the stored instance conforms to.
    pub fn meta_uri(&self) -> Result<String> {
        self.backend.meta_uri()
    }

    /// The stored size of dimension `name`.
    pub fn dimension_size(&self, name: &str) -> Result<usize> {
        self.backend.dimension_size(name)
    }

    /// Reads property `name` with the expected tag, element width and
    /// runtime shape.
    pub fn get_property(
        &self,
        name: &str,
        tag: TypeTag,
        size: usize,
        shape: &[usize],
    ) -> Result<PropertyValue> {
        self.backend.get_property(name, tag, size, shape)
    }

    pub fn set_meta_uri(&mut self, uri: &str) -> Result<()> {
        self.backend.set_meta_uri(uri)
    }

    pub fn set_dimension_size(&mut self, name: &str, size: usize) -> Result<()> {
        self.backend.set_dimension_size(name, size)
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        self.backend.set_property(name, value)
    }

    pub fn has_dimension(&self, name: &str) -> Result<bool> {
        self.backend.has_dimension(name)
    }

    pub fn has_property(&self, name: &str) -> Result<bool> {
        self.backend.has_property(name)
    }

    pub fn get_data_name(&self) -> Result<String> {
        self.backend.get_data_name()
    }

    pub fn set_data_name(&mut self, name: &str) -> Result<()> {
        self.backend.set_data_name(name)
    }
}

// ------------- ShapeIter -------------

/// Iterates the multi-indices of a C-ordered array with the given
/// shape: the last axis varies fastest. A rank-zero shape yields a
/// single empty index (one scalar element); a shape containing a zero
/// yields nothing.
pub struct ShapeIter {
    shape: Vec<usize>,
    index: Vec<usize>,
    started: bool,
    done: bool,
}

impl ShapeIter {
    pub fn new(shape: &[usize]) -> ShapeIter {
        ShapeIter {
            shape: shape.to_vec(),
            index: vec![0; shape.len()],
            started: false,
            done: shape.contains(&0),
        }
    }

    /// Total number of elements the iterator will visit.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The next multi-index, or `None` when the array is exhausted. The
    /// returned slice is only valid until the next call.
    pub fn next_index(&mut self) -> Option<&[usize]> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.index);
        }
        for axis in (0..self.shape.len()).rev() {
            self.index[axis] += 1;
            if self.index[axis] < self.shape[axis] {
                return Some(&self.index);
            }
            self.index[axis] = 0;
        }
        self.done = true;
        None
    }
}
