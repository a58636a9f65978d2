//! Instances: typed values conforming to an entity.
//!
//! An [`Instance`] carries its canonical uuid, an optional uri (the
//! original name when the uuid was derived from one), a strong
//! reference to its entity, the bound dimension sizes and one
//! [`PropertyValue`] per entity property. Creation zero-initialises
//! every property: scalars to the zero element of their type, arrays
//! to a zeroed heap buffer whose length is the product of the bound
//! dimension sizes the property references. Dropping the instance drops
//! the buffers (including every owned string) and releases the entity
//! reference.
//!
//! Values are only mutated through the typed setters, which verify tag
//! and runtime shape and deep-copy the incoming value so the instance
//! owns independent copies of everything, strings included.
//!
//! Load and save speak only to the [`DataModel`] façade, so any driver
//! providing the required capabilities can serve them.

use std::sync::Arc;

use tracing::debug;

use crate::datamodel::DataModel;
use crate::datatype::{Buffer, Element, PropertyValue};
use crate::entity::{Entity, Property};
use crate::error::{DLiteError, Result};
use crate::identity::{get_uuid, UuidVersion};
use crate::storage::Storage;

/// A single value conforming to an entity.
#[derive(Debug, PartialEq)]
pub struct Instance {
    uuid: String,
    uri: Option<String>,
    meta: Arc<Entity>,
    dims: Vec<usize>,
    values: Vec<PropertyValue>,
}

impl Instance {
    /// Creates a zero-initialised instance of `meta` with the given
    /// bound dimension sizes. The `id` may be empty (random uuid), a
    /// UUID (copied) or a unique name (v5 uuid derived from it; the name
    /// is kept as the instance uri). Takes one strong reference to the
    /// entity.
    pub fn create(meta: &Arc<Entity>, dims: &[usize], id: &str) -> Result<Instance> {
        if dims.len() != meta.ndimensions() {
            return Err(DLiteError::Schema(format!(
                "{} declares {} dimensions, got {} sizes",
                meta.uri(),
                meta.ndimensions(),
                dims.len()
            )));
        }
        let (uuid, version) = get_uuid(id);
        let uri = (version == UuidVersion::Hashed).then(|| id.to_owned());
        let values = meta
            .properties()
            .iter()
            .map(|p| {
                if p.ndims() == 0 {
                    PropertyValue::Scalar(Element::zero(p.tag(), p.size()))
                } else {
                    let shape = p.runtime_shape(dims);
                    let nmemb = shape.iter().product();
                    PropertyValue::Array {
                        data: Buffer::zeroed(p.tag(), p.size(), nmemb),
                        shape,
                    }
                }
            })
            .collect();
        Ok(Instance {
            uuid,
            uri,
            meta: Arc::clone(meta),
            dims: dims.to_vec(),
            values,
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }
    pub fn meta(&self) -> &Arc<Entity> {
        &self.meta
    }
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// The bound size of dimension `name`.
    pub fn dimension_size(&self, name: &str) -> Result<usize> {
        let i = self.meta.dimension_index(name)?;
        Ok(self.dims[i])
    }

    /// The bound size of dimension `i`.
    pub fn dimension_size_by_index(&self, i: usize) -> Result<usize> {
        self.dims.get(i).copied().ok_or_else(|| DLiteError::AbsentMember {
            uri: self.meta.uri().to_owned(),
            kind: "dimension index",
            name: i.to_string(),
        })
    }

    /// The value of property `name`.
    pub fn property(&self, name: &str) -> Result<&PropertyValue> {
        let i = self.meta.property_index(name)?;
        Ok(&self.values[i])
    }

    /// The value of property `i`.
    pub fn property_by_index(&self, i: usize) -> Result<&PropertyValue> {
        self.meta.property_by_index(i)?;
        Ok(&self.values[i])
    }

    /// Copies `value` into property `name`, verifying tag and runtime
    /// shape.
    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        let i = self.meta.property_index(name)?;
        self.set_property_by_index(i, value)
    }

    /// Copies `value` into property `i`, verifying tag and runtime
    /// shape. String arrays are copied element by element, so the
    /// instance owns an independent copy of every string.
    pub fn set_property_by_index(&mut self, i: usize, value: &PropertyValue) -> Result<()> {
        let meta = Arc::clone(&self.meta);
        let p = meta.property_by_index(i)?;
        self.check_value(p, value)?;
        self.values[i] = value.clone();
        Ok(())
    }

    /// Number of dimensions of property `name`.
    pub fn property_ndims(&self, name: &str) -> Result<usize> {
        Ok(self.meta.property(name)?.ndims())
    }

    /// Runtime size of dimension `j` of property `name`.
    pub fn property_dim_size(&self, name: &str, j: usize) -> Result<usize> {
        let p = self.meta.property(name)?;
        let &k = p.dims().get(j).ok_or_else(|| {
            DLiteError::Schema(format!(
                "dimension index {j} is out of range for property '{}' of {}",
                p.name(),
                self.meta.uri()
            ))
        })?;
        Ok(self.dims[k])
    }

    /// Verifies that `value` matches the declared tag, the storage form
    /// and the runtime shape of `p`.
    fn check_value(&self, p: &Property, value: &PropertyValue) -> Result<()> {
        if value.tag() != p.tag() {
            return Err(DLiteError::Schema(format!(
                "property '{}' of {} has type {}, got {}",
                p.name(),
                self.meta.uri(),
                p.tag().typename(),
                value.tag().typename()
            )));
        }
        let expected = p.runtime_shape(&self.dims);
        match value {
            PropertyValue::Scalar(e) if p.ndims() == 0 => self.check_element(p, e),
            PropertyValue::Array { shape, data } if p.ndims() > 0 => {
                if shape != &expected {
                    return Err(DLiteError::Schema(format!(
                        "property '{}' of {} has shape {expected:?}, got {shape:?}",
                        p.name(),
                        self.meta.uri()
                    )));
                }
                let nmemb: usize = expected.iter().product();
                if data.len() != nmemb {
                    return Err(DLiteError::Schema(format!(
                        "property '{}' of {} needs {nmemb} elements, got {}",
                        p.name(),
                        self.meta.uri(),
                        data.len()
                    )));
                }
                match data {
                    Buffer::Blob { width, .. } | Buffer::String { width, .. }
                        if *width != p.size() =>
                    {
                        Err(DLiteError::Schema(format!(
                            "property '{}' of {} has element width {}, got {width}",
                            p.name(),
                            self.meta.uri(),
                            p.size()
                        )))
                    }
                    Buffer::String { data, .. } => {
                        for s in data {
                            self.check_element(p, &Element::String(s.clone()))?;
                        }
                        Ok(())
                    }
                    _ => Ok(()),
                }
            }
            _ => Err(DLiteError::Schema(format!(
                "property '{}' of {} is {}, got a {} value",
                p.name(),
                self.meta.uri(),
                if p.ndims() == 0 { "a scalar" } else { "an array" },
                if p.ndims() == 0 { "array" } else { "scalar" },
            ))),
        }
    }

    /// Width checks for a single element: blobs must have exactly the
    /// declared width and fixed strings must leave room for the NUL
    /// terminator.
    fn check_element(&self, p: &Property, e: &Element) -> Result<()> {
        match e {
            Element::Blob(b) if b.len() != p.size() => Err(DLiteError::Schema(format!(
                "property '{}' of {} holds blobs of {} bytes, got {}",
                p.name(),
                self.meta.uri(),
                p.size(),
                b.len()
            ))),
            Element::String(s) if s.len() + 1 > p.size() => Err(DLiteError::Schema(format!(
                "string '{s}' does not fit property '{}' of {} (width {})",
                p.name(),
                self.meta.uri(),
                p.size()
            ))),
            _ => Ok(()),
        }
    }

    /// Loads the instance identified by `id` from `storage` and checks
    /// it conforms to `meta`.
    pub fn load(storage: &Storage, id: &str, meta: &Arc<Entity>) -> Result<Instance> {
        let model = DataModel::new(storage, id)?;

        let uri = model.meta_uri()?;
        if uri != meta.uri() {
            return Err(DLiteError::Schema(format!(
                "metadata ({}) does not correspond to metadata in storage ({uri})",
                meta.uri()
            )));
        }

        let mut dims = Vec::with_capacity(meta.ndimensions());
        for d in meta.dimensions() {
            dims.push(model.dimension_size(d.name())?);
        }

        let mut inst = Instance::create(meta, &dims, id)?;
        for (i, p) in meta.properties().iter().enumerate() {
            let shape = p.runtime_shape(&dims);
            let value = model.get_property(p.name(), p.tag(), p.size(), &shape)?;
            inst.set_property_by_index(i, &value)?;
        }
        debug!(uuid = %inst.uuid, uri = %meta.uri(), "loaded instance");
        Ok(inst)
    }

    /// Saves the instance to `storage`: the meta uri, every bound
    /// dimension size, then every property value.
    pub fn save(&self, storage: &Storage) -> Result<()> {
        let mut model = DataModel::new(storage, &self.uuid)?;
        model.set_meta_uri(self.meta.uri())?;
        for (d, &n) in self.meta.dimensions().iter().zip(&self.dims) {
            model.set_dimension_size(d.name(), n)?;
        }
        for (p, value) in self.meta.properties().iter().zip(&self.values) {
            model.set_property(p.name(), value)?;
        }
        debug!(uuid = %self.uuid, uri = %self.meta.uri(), "saved instance");
        Ok(())
    }
}
