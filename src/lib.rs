//! DLite – a lightweight framework for representing, storing and
//! retrieving self-describing structured data.
//!
//! Every datum (an [`instance::Instance`]) carries a reference to its
//! schema (an [`entity::Entity`]), which declares the named dimensions
//! and typed, possibly multi-dimensional properties the instance must
//! populate. Entities are themselves instances of a meta-entity (the
//! pinned singleton [`struct@entity::SCHEMA_ENTITY`]), forming a
//! two-level metaclass graph that only cycles at its root.
//!
//! ## Modules
//! * [`identity`] – canonical UUID derivation and metadata-uri helpers.
//! * [`datatype`] – primitive type tags, alignment/offset math and the
//!   tagged runtime values properties hold.
//! * [`entity`] – dimensions, properties, entities and the derived
//!   instance byte layout.
//! * [`instance`] – the instance runtime: create, typed accessors,
//!   load and save.
//! * [`datamodel`] – the per-instance transfer façade between an
//!   instance and a storage.
//! * [`plugin`] – the storage driver contract and the process-wide
//!   plugin registry.
//! * [`storage`] – opening and closing driver-backed storages.
//! * [`triplestore`] – the triple-store primitive and its in-memory
//!   implementation.
//! * [`collection`] – labelled bags of instance references tracked as
//!   triples.
//! * [`json_storage`] – the built-in JSON reference driver.
//!
//! ## Identity
//! Instances are identified by canonical lowercase UUID strings. Ids
//! that are not UUIDs deterministically map to version 5 SHA-1 UUIDs,
//! so a human-readable name names the same instance on every machine;
//! empty ids get a random version 4 UUID.
//!
//! ## Storage
//! Drivers implement [`plugin::DriverApi`]; the registry resolves them
//! by name, falling back to a search-path scan through an installed
//! [`plugin::PluginLoader`]. All instance traffic flows property by
//! property through the [`datamodel::DataModel`] façade, so drivers
//! only deal in typed values, never in entity internals. Optional
//! driver capabilities fail with a diagnostic naming the driver.
//!
//! ## Quick Start
//! ```
//! use dlite::entity::{Dimension, Entity, Property};
//! use dlite::instance::Instance;
//! use dlite::datatype::{Buffer, PropertyValue, TypeTag, POINTER_SIZE};
//!
//! let entity = Entity::create(
//!     "http://example.com/meta/0.1/Vector",
//!     "A labelled vector.",
//!     vec![Dimension::new("n", "Number of components.")],
//!     vec![
//!         Property::scalar("label", TypeTag::StringPtr, POINTER_SIZE),
//!         Property::array("components", TypeTag::Float, 8, vec![0]),
//!     ],
//! ).unwrap();
//! let mut inst = Instance::create(&entity, &[3], "my-vector").unwrap();
//! inst.set_property("components", &PropertyValue::Array {
//!     shape: vec![3],
//!     data: Buffer::Float(vec![1.0, 2.0, 3.0]),
//! }).unwrap();
//! assert_eq!(inst.dimension_size("n").unwrap(), 3);
//! ```
//!
//! ## Concurrency
//! The core is single-threaded: callers serialise access to any given
//! entity, instance, storage, datamodel or collection externally. The
//! plugin registry is process-wide and meant to be configured during
//! startup.
//!
//! ## License
//! Dual licensed under Apache-2.0 and MIT.

pub mod collection;
pub mod datamodel;
pub mod datatype;
pub mod entity;
pub mod error;
pub mod identity;
pub mod instance;
pub mod json_storage;
pub mod plugin;
pub mod storage;
pub mod triplestore;
