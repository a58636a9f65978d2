//! Entities: the metadata half of the instance/metadata graph.
//!
//! An [`Entity`] describes a class of instances: its named dimensions,
//! its typed properties and the derived byte layout an instance of the
//! entity occupies. Entities are themselves instances of a meta-entity;
//! the singleton [`struct@SCHEMA_ENTITY`] is the root of that two-level
//! graph and the only place it cycles, so it is pinned for the lifetime
//! of the process.
//!
//! Entities are shared: every instance holds one strong reference
//! (`Arc`) to its entity and every entity holds one to the schema
//! singleton. `Arc::strong_count` is the observable reference count;
//! cloning the `Arc` takes a reference and dropping it releases one.
//!
//! Layout is computed once, at creation, by sweeping the members of a
//! hypothetical instance block in declaration order through
//! [`crate::datatype::member_offset`]: the fixed header, one size slot
//! per dimension, one slot per property (inline scalar or pointer to
//! heap) and one pointer slot per relation. The resulting offsets are
//! recorded in a [`MemoryLayout`].

use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::debug;

use crate::datatype::{self, StorageForm, TypeTag, POINTER_SIZE};
use crate::error::{DLiteError, Result};
use crate::identity::{get_uuid, UuidVersion};
use crate::storage::Storage;

/// Byte width of one dimension-size slot inside an instance block.
const DIM_SLOT_SIZE: usize = std::mem::size_of::<usize>();

/// Bytes of the canonical UUID field in an instance header, including
/// the NUL terminator.
const UUID_FIELD_SIZE: usize = 37;

// ------------- Dimension -------------
/// A named symbolic size. Instances bind each dimension to a concrete
/// non-negative integer at creation.
#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    name: String,
    description: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn description(&self) -> &str {
        &self.description
    }
}

// ------------- Property -------------
/// A typed, possibly multi-dimensional field of an instance. `dims`
/// holds indices into the owning entity's dimension list; the runtime
/// shape of the property is the corresponding dimension sizes.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    name: String,
    tag: TypeTag,
    size: usize,
    dims: Vec<usize>,
    description: Option<String>,
    unit: Option<String>,
}

impl Property {
    /// A rank-zero property stored inline.
    pub fn scalar(name: impl Into<String>, tag: TypeTag, size: usize) -> Self {
        Self { name: name.into(), tag, size, dims: Vec::new(), description: None, unit: None }
    }

    /// An array property whose shape references the owning entity's
    /// dimensions by index.
    pub fn array(name: impl Into<String>, tag: TypeTag, size: usize, dims: Vec<usize>) -> Self {
        Self { name: name.into(), tag, size, dims, description: None, unit: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn tag(&self) -> TypeTag {
        self.tag
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// The storage form of the property inside an instance block.
    pub fn storage_form(&self) -> StorageForm {
        if self.dims.is_empty() {
            StorageForm::Inline { tag: self.tag, size: self.size }
        } else {
            StorageForm::Pointer
        }
    }

    /// Runtime shape given the instance's bound dimension sizes.
    pub fn runtime_shape(&self, dims: &[usize]) -> Vec<usize> {
        self.dims.iter().map(|&k| dims[k]).collect()
    }

    /// Number of elements given the instance's bound dimension sizes.
    pub fn nmemb(&self, dims: &[usize]) -> usize {
        self.dims.iter().map(|&k| dims[k]).product()
    }
}

// ------------- MemoryLayout -------------
/// Derived byte layout of an instance block: total size, offset of the
/// dimension-size array, offset of each property slot and offset of the
/// relations slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryLayout {
    pub size: usize,
    pub dimoffset: usize,
    pub propoffsets: Vec<usize>,
    pub reloffset: usize,
}

// ------------- Entity -------------
/// Metadata describing a class of instances.
#[derive(Debug, PartialEq)]
pub struct Entity {
    uuid: String,
    uri: String,
    description: String,
    /// The meta-entity this entity is an instance of. `None` only for
    /// the schema singleton, which is its own root.
    meta: Option<Arc<Entity>>,
    dimensions: Vec<Dimension>,
    properties: Vec<Property>,
    nrelations: usize,
    layout: MemoryLayout,
}

lazy_static! {
    /// The singleton schema describing entities themselves. The static
    /// holds a strong reference for the lifetime of the process, so the
    /// singleton is never freed.
    pub static ref SCHEMA_ENTITY: Arc<Entity> = Arc::new(Entity::schema_entity());
}

impl Entity {
    /// Creates a new entity from the given dimensions and properties,
    /// derives its uuid from `uri`, links it to the schema singleton and
    /// computes its instance layout.
    pub fn create(
        uri: impl Into<String>,
        description: impl Into<String>,
        dimensions: Vec<Dimension>,
        properties: Vec<Property>,
    ) -> Result<Arc<Entity>> {
        let uri = uri.into();
        for p in &properties {
            datatype::check_size(p.tag, p.size)?;
            for &k in &p.dims {
                if k >= dimensions.len() {
                    return Err(DLiteError::Schema(format!(
                        "property '{}' of {uri} references dimension index {k} \
                         but only {} dimensions are declared",
                        p.name,
                        dimensions.len()
                    )));
                }
            }
        }
        let (uuid, _) = get_uuid(&uri);
        let mut entity = Entity {
            uuid,
            uri,
            description: description.into(),
            meta: Some(Arc::clone(&SCHEMA_ENTITY)),
            dimensions,
            properties,
            nrelations: 0,
            layout: MemoryLayout::default(),
        };
        entity.postinit();
        debug!(uri = %entity.uri, size = entity.layout.size, "created entity");
        Ok(Arc::new(entity))
    }

    /// The observable reference count of a shared entity.
    pub fn refcount(entity: &Arc<Entity>) -> usize {
        Arc::strong_count(entity)
    }

    /// Computes the derived layout fields by sweeping the members of an
    /// instance block in declaration order.
    fn postinit(&mut self) {
        // header: uuid[37], uri pointer, meta pointer; alignment floor is
        // the pointer alignment
        let mut maxalign = POINTER_SIZE;
        let uri_offset = datatype::member_offset(0, UUID_FIELD_SIZE, TypeTag::StringPtr, POINTER_SIZE);
        let mut offset = datatype::member_offset(uri_offset, POINTER_SIZE, TypeTag::StringPtr, POINTER_SIZE);
        let mut size = POINTER_SIZE;

        // dimension-size slots
        for i in 0..self.dimensions.len() {
            offset = datatype::member_offset(offset, size, TypeTag::UInt, DIM_SLOT_SIZE);
            size = DIM_SLOT_SIZE;
            if i == 0 {
                self.layout.dimoffset = offset;
            }
        }
        if !self.dimensions.is_empty() {
            maxalign = maxalign.max(datatype::alignment(TypeTag::UInt, DIM_SLOT_SIZE));
        }

        // property slots: inline scalars at their declared width, arrays
        // as a pointer to the heap buffer
        self.layout.propoffsets.clear();
        for p in &self.properties {
            let form = p.storage_form();
            offset = datatype::align_up(offset + size, form.alignment());
            size = form.size();
            self.layout.propoffsets.push(offset);
            maxalign = maxalign.max(form.alignment());
        }

        // relation slots
        for i in 0..self.nrelations {
            offset = datatype::member_offset(offset, size, TypeTag::StringPtr, POINTER_SIZE);
            size = POINTER_SIZE;
            if i == 0 {
                self.layout.reloffset = offset;
            }
        }
        if self.nrelations == 0 {
            self.layout.reloffset = datatype::align_up(offset + size, POINTER_SIZE);
        }

        self.layout.size = datatype::align_up(offset + size, maxalign);
    }

    /// The schema singleton. Metadata blocks have a fixed layout, so no
    /// member sweep happens here.
    fn schema_entity() -> Entity {
        Entity {
            uuid: "00000000-0000-0000-0000-000000000000".to_owned(),
            uri: "http://meta.sintef.no/0.1/schema-entity".to_owned(),
            description: "Schema for entities".to_owned(),
            meta: None,
            dimensions: vec![
                Dimension::new("ndimensions", "Number of dimensions."),
                Dimension::new("nproperties", "Number of properties."),
                Dimension::new("nrelations", "Number of relations."),
            ],
            properties: vec![
                Property::array("dimensions", TypeTag::StringPtr, POINTER_SIZE, vec![0])
                    .with_description("Name and description of each dimension."),
                Property::array("properties", TypeTag::StringPtr, POINTER_SIZE, vec![1])
                    .with_description("Name, type, shape and description of each property."),
            ],
            nrelations: 0,
            layout: meta_layout(3),
        }
    }

    // accessors
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    pub fn uri(&self) -> &str {
        &self.uri
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn meta(&self) -> Option<&Arc<Entity>> {
        self.meta.as_ref()
    }
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }
    pub fn ndimensions(&self) -> usize {
        self.dimensions.len()
    }
    pub fn nproperties(&self) -> usize {
        self.properties.len()
    }
    pub fn nrelations(&self) -> usize {
        self.nrelations
    }
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Index of the dimension named `name`.
    pub fn dimension_index(&self, name: &str) -> Result<usize> {
        self.dimensions
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| DLiteError::AbsentMember {
                uri: self.uri.clone(),
                kind: "dimension",
                name: name.to_owned(),
            })
    }

    /// Index of the property named `name`.
    pub fn property_index(&self, name: &str) -> Result<usize> {
        self.properties
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| DLiteError::AbsentMember {
                uri: self.uri.clone(),
                kind: "property",
                name: name.to_owned(),
            })
    }

    /// The property named `name`.
    pub fn property(&self, name: &str) -> Result<&Property> {
        let i = self.property_index(name)?;
        Ok(&self.properties[i])
    }

    /// The property with index `i`.
    pub fn property_by_index(&self, i: usize) -> Result<&Property> {
        self.properties.get(i).ok_or_else(|| DLiteError::AbsentMember {
            uri: self.uri.clone(),
            kind: "property index",
            name: i.to_string(),
        })
    }

    /// Loads an entity from `storage`. The `id` may be the entity uri or
    /// its UUID; ids that are neither a UUID nor a name a UUID can be
    /// derived from are rejected. Requires the driver's `get_entity`
    /// capability.
    pub fn load(storage: &Storage, id: &str) -> Result<Arc<Entity>> {
        let (uuid, version) = get_uuid(id);
        if !matches!(version, UuidVersion::Copy | UuidVersion::Hashed) {
            return Err(DLiteError::Identity(format!(
                "id '{id}' is not a UUID or a string an UUID can be generated from"
            )));
        }
        storage.get_entity(&uuid)
    }

    /// Saves an entity to `storage`. Requires the driver's `set_entity`
    /// capability.
    pub fn save(storage: &mut Storage, entity: &Entity) -> Result<()> {
        storage.set_entity(entity)
    }
}

/// Fixed layout of a metadata block. The header holds the uuid field
/// followed by eleven pointer-sized members (uri, meta, description,
/// size, dimoffset, propoffsets, reloffset, refcount, dimensions,
/// properties, relations) and one count slot per meta-dimension; the
/// dimension and relation member offsets are therefore constants of the
/// header shape, and only the trailing count slots scale with the number
/// of meta-dimensions.
fn meta_layout(ndimensions: usize) -> MemoryLayout {
    debug_assert!(ndimensions >= 3);
    let w = POINTER_SIZE;
    let uri_offset = datatype::align_up(UUID_FIELD_SIZE, w);
    MemoryLayout {
        size: uri_offset + 11 * w + ndimensions * DIM_SLOT_SIZE,
        dimoffset: uri_offset + 8 * w,
        propoffsets: Vec::new(),
        reloffset: uri_offset + 10 * w,
    }
}
