//! Built-in JSON storage driver.
//!
//! A storage file is a single JSON object keyed by instance UUID. Each
//! instance entry carries the members the datamodel protocol writes:
//!
//! ```json
//! { "8c9c6b42-…": { "dataname": "myinst",
//!                   "meta": "namespace/version/name",
//!                   "dimensions": {"n": 3},
//!                   "properties": {"x": [0.1, 0.2, 0.3]} } }
//! ```
//!
//! Entities are stored as schema documents: `uri`, `description`,
//! `dimensions` as `{name, description}` records and `properties` as
//! `{name, type, size, dims, unit, description}` records with dimension
//! names in `dims`. `get_entity` accepts both a uuid-keyed store and a
//! file holding one bare schema document.
//!
//! Array properties are written as nested arrays in C order; blobs are
//! written as lowercase hex strings.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::datamodel::ShapeIter;
use crate::datatype::{Buffer, Element, PropertyValue, TypeTag};
use crate::entity::{Dimension, Entity, Property};
use crate::error::{DLiteError, Result};
use crate::identity::get_uuid;
use crate::plugin::{self, DataModelBackend, DriverApi, StorageBackend};

const DRIVER_NAME: &str = "json";

/// The JSON storage driver.
pub struct JsonDriver;

impl JsonDriver {
    pub fn new() -> JsonDriver {
        JsonDriver
    }
}

impl Default for JsonDriver {
    fn default() -> Self {
        JsonDriver::new()
    }
}

/// Registers the JSON driver in the process-wide plugin registry.
pub fn register() {
    plugin::register(Arc::new(JsonDriver::new()));
}

enum Mode {
    Read,
    Write,
    Append,
}

fn parse_mode(options: &str) -> Result<Mode> {
    match options {
        "" | "r" => Ok(Mode::Read),
        "w" => Ok(Mode::Write),
        "a" | "rw" => Ok(Mode::Append),
        _ => Err(DLiteError::Storage(format!(
            "invalid options '{options}' for json storage (expected \"r\", \"w\", \"a\" or \"rw\")"
        ))),
    }
}

impl DriverApi for JsonDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn open(&self, uri: &str, options: &str) -> Result<Box<dyn StorageBackend>> {
        let path = PathBuf::from(uri);
        let (root, writable) = match parse_mode(options)? {
            Mode::Read => (read_root(&path)?, false),
            Mode::Write => (Map::new(), true),
            Mode::Append => {
                let root = if path.is_file() { read_root(&path)? } else { Map::new() };
                (root, true)
            }
        };
        debug!(uri, options, "opened json storage");
        Ok(Box::new(JsonStorage {
            doc: Rc::new(RefCell::new(JsonDocument { root, path, writable, dirty: false })),
        }))
    }
}

fn read_root(path: &Path) -> Result<Map<String, Value>> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(DLiteError::Driver(format!(
            "json storage '{}' does not hold a top-level object",
            path.display()
        ))),
    }
}

/// The document shared by a storage and its datamodels.
struct JsonDocument {
    root: Map<String, Value>,
    path: PathBuf,
    writable: bool,
    dirty: bool,
}

impl JsonDocument {
    fn flush(&mut self) -> Result<()> {
        if self.writable && self.dirty {
            let text = serde_json::to_string_pretty(&Value::Object(self.root.clone()))?;
            fs::write(&self.path, text)?;
            self.dirty = false;
        }
        Ok(())
    }
}

/// An opened JSON storage.
pub struct JsonStorage {
    doc: Rc<RefCell<JsonDocument>>,
}

impl StorageBackend for JsonStorage {
    fn driver(&self) -> &str {
        DRIVER_NAME
    }

    fn close(&mut self) -> Result<()> {
        self.doc.borrow_mut().flush()
    }

    fn data_model(&self, uuid: &str) -> Result<Box<dyn DataModelBackend>> {
        Ok(Box::new(JsonDataModel { doc: Rc::clone(&self.doc), uuid: uuid.to_owned() }))
    }

    fn get_uuids(&self) -> Result<Vec<String>> {
        let doc = self.doc.borrow();
        if doc.root.contains_key("uri") {
            // a bare schema document identifies a single entity
            let uri = doc.root.get("uri").and_then(Value::as_str).unwrap_or_default();
            return Ok(vec![get_uuid(uri).0]);
        }
        Ok(doc.root.keys().cloned().collect())
    }

    fn get_entity(&self, uuid: &str) -> Result<Arc<Entity>> {
        let doc = self.doc.borrow();
        if doc.root.contains_key("uri") {
            let schema: SchemaDoc =
                serde_json::from_value(Value::Object(doc.root.clone()))?;
            if get_uuid(&schema.uri).0 == uuid {
                return entity_from_doc(schema);
            }
        } else if let Some(value) = doc.root.get(uuid) {
            let schema: SchemaDoc = serde_json::from_value(value.clone())?;
            return entity_from_doc(schema);
        }
        Err(DLiteError::Driver(format!(
            "no entity with uuid '{uuid}' in storage '{}'",
            doc.path.display()
        )))
    }

    fn set_entity(&mut self, entity: &Entity) -> Result<()> {
        let mut doc = self.doc.borrow_mut();
        if !doc.writable {
            return Err(not_writable(&doc));
        }
        let value = serde_json::to_value(doc_from_entity(entity))?;
        doc.root.insert(entity.uuid().to_owned(), value);
        doc.dirty = true;
        Ok(())
    }
}

fn not_writable(doc: &JsonDocument) -> DLiteError {
    DLiteError::Storage(format!("json storage '{}' is not writable", doc.path.display()))
}

// ------------- Schema documents -------------

#[derive(Serialize, Deserialize)]
struct SchemaDoc {
    uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default)]
    dimensions: Vec<SchemaDimension>,
    #[serde(default)]
    properties: Vec<SchemaProperty>,
}

#[derive(Serialize, Deserialize)]
struct SchemaDimension {
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
}

#[derive(Serialize, Deserialize)]
struct SchemaProperty {
    name: String,
    #[serde(rename = "type")]
    typename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dims: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

fn entity_from_doc(doc: SchemaDoc) -> Result<Arc<Entity>> {
    let dimensions: Vec<Dimension> = doc
        .dimensions
        .iter()
        .map(|d| Dimension::new(&d.name, &d.description))
        .collect();
    let mut properties = Vec::with_capacity(doc.properties.len());
    for sp in &doc.properties {
        let tag = TypeTag::from_typename(&sp.typename)?;
        let size = sp.size.or_else(|| tag.default_size()).ok_or_else(|| {
            DLiteError::Schema(format!(
                "property '{}' of type {} needs an explicit size",
                sp.name, sp.typename
            ))
        })?;
        let mut dims = Vec::with_capacity(sp.dims.len());
        for dim_name in &sp.dims {
            let k = doc
                .dimensions
                .iter()
                .position(|d| &d.name == dim_name)
                .ok_or_else(|| {
                    DLiteError::Schema(format!(
                        "unknown dimension '{dim_name}' referenced by property '{}' of {}",
                        sp.name, doc.uri
                    ))
                })?;
            dims.push(k);
        }
        let mut p = if dims.is_empty() {
            Property::scalar(&sp.name, tag, size)
        } else {
            Property::array(&sp.name, tag, size, dims)
        };
        if let Some(description) = &sp.description {
            p = p.with_description(description);
        }
        if let Some(unit) = &sp.unit {
            p = p.with_unit(unit);
        }
        properties.push(p);
    }
    Entity::create(doc.uri, doc.description, dimensions, properties)
}

fn doc_from_entity(entity: &Entity) -> SchemaDoc {
    SchemaDoc {
        uri: entity.uri().to_owned(),
        description: entity.description().to_owned(),
        dimensions: entity
            .dimensions()
            .iter()
            .map(|d| SchemaDimension {
                name: d.name().to_owned(),
                description: d.description().to_owned(),
            })
            .collect(),
        properties: entity
            .properties()
            .iter()
            .map(|p| SchemaProperty {
                name: p.name().to_owned(),
                typename: p.tag().typename().to_owned(),
                size: Some(p.size()),
                dims: p
                    .dims()
                    .iter()
                    .map(|&k| entity.dimensions()[k].name().to_owned())
                    .collect(),
                unit: p.unit().map(str::to_owned),
                description: p.description().map(str::to_owned),
            })
            .collect(),
    }
}

// ------------- Datamodel -------------

struct JsonDataModel {
    doc: Rc<RefCell<JsonDocument>>,
    uuid: String,
}

impl JsonDataModel {
    fn with_entry<T>(&self, op: impl FnOnce(&Map<String, Value>) -> Result<T>) -> Result<T> {
        let doc = self.doc.borrow();
        let entry = doc
            .root
            .get(&self.uuid)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                DLiteError::Driver(format!(
                    "no instance with uuid '{}' in storage '{}'",
                    self.uuid,
                    doc.path.display()
                ))
            })?;
        op(entry)
    }

    fn with_entry_mut<T>(
        &mut self,
        op: impl FnOnce(&mut Map<String, Value>) -> Result<T>,
    ) -> Result<T> {
        let mut doc = self.doc.borrow_mut();
        if !doc.writable {
            return Err(not_writable(&doc));
        }
        doc.dirty = true;
        let entry = doc
            .root
            .entry(self.uuid.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let object = entry.as_object_mut().ok_or_else(|| {
            DLiteError::Driver(format!("malformed entry for uuid '{}'", self.uuid))
        })?;
        op(object)
    }

    /// Inserts `value` under `member.name`, creating the member object
    /// when absent.
    fn insert_member(&mut self, member: &str, name: &str, value: Value) -> Result<()> {
        self.with_entry_mut(|entry| {
            let object = entry
                .entry(member.to_owned())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .ok_or_else(|| {
                    DLiteError::Driver(format!("malformed '{member}' member"))
                })?;
            object.insert(name.to_owned(), value);
            Ok(())
        })
    }

    fn member_exists(&self, member: &str, name: &str) -> bool {
        let doc = self.doc.borrow();
        doc.root
            .get(&self.uuid)
            .and_then(Value::as_object)
            .and_then(|entry| entry.get(member))
            .and_then(Value::as_object)
            .map_or(false, |object| object.contains_key(name))
    }
}

impl DataModelBackend for JsonDataModel {
    fn driver(&self) -> &str {
        DRIVER_NAME
    }

    fn meta_uri(&self) -> Result<String> {
        self.with_entry(|entry| {
            entry
                .get("meta")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| {
                    DLiteError::Driver(format!(
                        "no metadata recorded for instance '{}'",
                        self.uuid
                    ))
                })
        })
    }

    fn dimension_size(&self, name: &str) -> Result<usize> {
        self.with_entry(|entry| {
            entry
                .get("dimensions")
                .and_then(Value::as_object)
                .and_then(|dims| dims.get(name))
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .ok_or_else(|| {
                    DLiteError::Driver(format!(
                        "no dimension '{name}' recorded for instance '{}'",
                        self.uuid
                    ))
                })
        })
    }

    fn get_property(
        &self,
        name: &str,
        tag: TypeTag,
        size: usize,
        shape: &[usize],
    ) -> Result<PropertyValue> {
        self.with_entry(|entry| {
            let value = entry
                .get("properties")
                .and_then(Value::as_object)
                .and_then(|props| props.get(name))
                .ok_or_else(|| {
                    DLiteError::Driver(format!(
                        "no property '{name}' recorded for instance '{}'",
                        self.uuid
                    ))
                })?;
            json_to_value(value, tag, size, shape)
        })
    }

    fn set_meta_uri(&mut self, uri: &str) -> Result<()> {
        let uri = uri.to_owned();
        self.with_entry_mut(|entry| {
            entry.insert("meta".to_owned(), Value::String(uri));
            Ok(())
        })
    }

    fn set_dimension_size(&mut self, name: &str, size: usize) -> Result<()> {
        self.insert_member("dimensions", name, Value::Number(Number::from(size as u64)))
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        let json = value_to_json(value)?;
        self.insert_member("properties", name, json)
    }

    fn has_dimension(&self, name: &str) -> Result<bool> {
        Ok(self.member_exists("dimensions", name))
    }

    fn has_property(&self, name: &str) -> Result<bool> {
        Ok(self.member_exists("properties", name))
    }

    fn get_data_name(&self) -> Result<String> {
        self.with_entry(|entry| {
            entry
                .get("dataname")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| {
                    DLiteError::Driver(format!(
                        "no data name recorded for instance '{}'",
                        self.uuid
                    ))
                })
        })
    }

    fn set_data_name(&mut self, name: &str) -> Result<()> {
        let name = name.to_owned();
        self.with_entry_mut(|entry| {
            entry.insert("dataname".to_owned(), Value::String(name));
            Ok(())
        })
    }
}

// ------------- Value conversion -------------

fn json_to_value(
    value: &Value,
    tag: TypeTag,
    size: usize,
    shape: &[usize],
) -> Result<PropertyValue> {
    if shape.is_empty() {
        return Ok(PropertyValue::Scalar(json_to_element(value, tag, size)?));
    }
    let mut elements = Vec::with_capacity(shape.iter().product());
    let mut it = ShapeIter::new(shape);
    while let Some(idx) = it.next_index() {
        let leaf = lookup_nested(value, idx, shape)?;
        elements.push(json_to_element(leaf, tag, size)?);
    }
    Ok(PropertyValue::Array {
        shape: shape.to_vec(),
        data: Buffer::from_elements(tag, size, elements)?,
    })
}

/// Descends a nested C-ordered array to the element at `idx`, checking
/// the array length along every axis.
fn lookup_nested<'v>(root: &'v Value, idx: &[usize], shape: &[usize]) -> Result<&'v Value> {
    let mut value = root;
    for (axis, &i) in idx.iter().enumerate() {
        let array = value.as_array().ok_or_else(|| {
            DLiteError::Schema(format!("expected a nested array of shape {shape:?}"))
        })?;
        if array.len() != shape[axis] {
            return Err(DLiteError::Schema(format!(
                "axis {axis} has length {} (expected {})",
                array.len(),
                shape[axis]
            )));
        }
        value = &array[i];
    }
    Ok(value)
}

fn json_to_element(value: &Value, tag: TypeTag, size: usize) -> Result<Element> {
    let mismatch = || {
        DLiteError::Schema(format!("expected a {} value, got {value}", tag.typename()))
    };
    match tag {
        TypeTag::Blob => {
            let bytes = hex_to_bytes(value.as_str().ok_or_else(mismatch)?)?;
            if bytes.len() != size {
                return Err(DLiteError::Schema(format!(
                    "blob value has {} bytes (expected {size})",
                    bytes.len()
                )));
            }
            Ok(Element::Blob(bytes))
        }
        TypeTag::Bool => value.as_bool().map(Element::Bool).ok_or_else(mismatch),
        TypeTag::Int => value.as_i64().map(Element::Int).ok_or_else(mismatch),
        TypeTag::UInt => value.as_u64().map(Element::UInt).ok_or_else(mismatch),
        TypeTag::Float => value.as_f64().map(Element::Float).ok_or_else(mismatch),
        TypeTag::String => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if s.len() + 1 > size {
                return Err(DLiteError::Schema(format!(
                    "string '{s}' does not fit width {size}"
                )));
            }
            Ok(Element::String(s.to_owned()))
        }
        TypeTag::StringPtr => value
            .as_str()
            .map(|s| Element::StringPtr(s.to_owned()))
            .ok_or_else(mismatch),
    }
}

fn value_to_json(value: &PropertyValue) -> Result<Value> {
    match value {
        PropertyValue::Scalar(e) => element_to_json(e),
        PropertyValue::Array { shape, data } => {
            if shape.is_empty() {
                return Err(DLiteError::Schema(
                    "array value with an empty shape".to_owned(),
                ));
            }
            let nmemb: usize = shape.iter().product();
            if data.len() != nmemb {
                return Err(DLiteError::Schema(format!(
                    "array value of shape {shape:?} needs {nmemb} elements, got {}",
                    data.len()
                )));
            }
            let flat: Vec<Value> = (0..data.len())
                .map(|i| element_to_json(&data.element(i)))
                .collect::<Result<_>>()?;
            Ok(nest(&flat, shape))
        }
    }
}

/// Rebuilds the nested C-ordered form of a flat element slice. The
/// caller has verified that `flat` holds exactly `product(shape)`
/// elements.
fn nest(flat: &[Value], shape: &[usize]) -> Value {
    match shape.split_first() {
        None => flat[0].clone(),
        Some((&n, rest)) => {
            let chunk: usize = rest.iter().product();
            Value::Array(
                (0..n)
                    .map(|i| nest(&flat[i * chunk..(i + 1) * chunk], rest))
                    .collect(),
            )
        }
    }
}

fn element_to_json(element: &Element) -> Result<Value> {
    match element {
        Element::Blob(bytes) => {
            let mut s = String::with_capacity(bytes.len() * 2);
            for b in bytes {
                s.push_str(&format!("{b:02x}"));
            }
            Ok(Value::String(s))
        }
        Element::Bool(v) => Ok(Value::Bool(*v)),
        Element::Int(v) => Ok(Value::Number(Number::from(*v))),
        Element::UInt(v) => Ok(Value::Number(Number::from(*v))),
        Element::Float(v) => Number::from_f64(*v).map(Value::Number).ok_or_else(|| {
            DLiteError::Driver(format!("cannot store non-finite float {v}"))
        }),
        Element::String(v) | Element::StringPtr(v) => Ok(Value::String(v.clone())),
    }
}

fn hex_to_bytes(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(DLiteError::Schema(format!("invalid hex blob: '{s}'")));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| DLiteError::Schema(format!("invalid hex blob: '{s}'")))
        })
        .collect()
}
