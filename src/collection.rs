//! Collections: labelled bags of instance references.
//!
//! A collection delegates all fact storage to a triple store. For every
//! member added under a label it records three membership triples,
//! `(label, _is-a, Instance)`, `(label, _has-uuid, uuid)` and
//! `(label, _has-meta, metaUri)`, alongside any user-supplied
//! relations. Collections hold labels and uuids, not strong instance
//! references: freeing a collection leaves the instances it referenced
//! alone.

use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{DLiteError, Result};
use crate::identity::{get_uuid, UuidVersion};
use crate::instance::Instance;
use crate::triplestore::{MemoryTripleStore, Triple, TripleState, TripleStore};

/// Predicate marking a label as an instance member.
pub const REL_IS_A: &str = "_is-a";
/// Predicate carrying a member's uuid.
pub const REL_HAS_UUID: &str = "_has-uuid";
/// Predicate carrying a member's metadata uri.
pub const REL_HAS_META: &str = "_has-meta";
/// Predicate linking a label to a dimension-mapping relation by id.
pub const REL_HAS_DIMMAP: &str = "_has-dimmap";

/// A labelled bag of instance references backed by a triple store.
pub struct Collection {
    uuid: String,
    uri: Option<String>,
    dimensions: Vec<(String, usize)>,
    meta: Option<Arc<Entity>>,
    store: Box<dyn TripleStore>,
}

impl Collection {
    /// Creates an empty collection identified by `id` (empty for a
    /// random uuid) over the default in-memory triple store.
    pub fn create(id: &str) -> Collection {
        Collection::with_store(id, Box::new(MemoryTripleStore::new()))
    }

    /// Creates an empty collection over a caller-supplied triple store.
    pub fn with_store(id: &str, store: Box<dyn TripleStore>) -> Collection {
        let (uuid, version) = get_uuid(id);
        let uri = (version == UuidVersion::Hashed).then(|| id.to_owned());
        Collection { uuid, uri, dimensions: Vec::new(), meta: None, store }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }
    pub fn meta(&self) -> Option<&Arc<Entity>> {
        self.meta.as_ref()
    }

    pub fn set_meta(&mut self, meta: Arc<Entity>) {
        self.meta = Some(meta);
    }

    /// Named dimensions of the collection.
    pub fn dimensions(&self) -> &[(String, usize)] {
        &self.dimensions
    }

    /// Sets the size of the named collection dimension, declaring it if
    /// needed.
    pub fn set_dimension(&mut self, name: &str, size: usize) {
        match self.dimensions.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = size,
            None => self.dimensions.push((name.to_owned(), size)),
        }
    }

    /// The size of the named collection dimension.
    pub fn dimension_size(&self, name: &str) -> Result<usize> {
        self.dimensions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, size)| *size)
            .ok_or_else(|| DLiteError::AbsentMember {
                uri: self.uuid.clone(),
                kind: "dimension",
                name: name.to_owned(),
            })
    }

    /// Adds (a reference to) `inst` under `label`.
    pub fn add(&mut self, label: &str, inst: &Instance) -> Result<()> {
        self.add_relation(label, REL_IS_A, "Instance");
        self.add_relation(label, REL_HAS_UUID, inst.uuid());
        self.add_relation(label, REL_HAS_META, inst.meta().uri());
        Ok(())
    }

    /// Removes the member with the given label together with its
    /// membership and dimension-mapping triples.
    pub fn remove(&mut self, label: &str) -> Result<()> {
        if self.remove_relations(Some(label), Some(REL_IS_A), Some("Instance")) == 0 {
            return Err(DLiteError::AbsentMember {
                uri: self.uuid.clone(),
                kind: "label",
                name: label.to_owned(),
            });
        }
        // delete the relations the dimmap triples point at, by id
        let mut referenced = Vec::new();
        let mut state = self.store.init_state();
        while let Some(t) = self.store.find(&mut state, Some(label), Some(REL_HAS_DIMMAP), None) {
            referenced.push(t.o().to_owned());
        }
        for id in referenced {
            self.store.remove_by_id(&id);
        }
        self.remove_relations(Some(label), Some(REL_HAS_UUID), None);
        self.remove_relations(Some(label), Some(REL_HAS_META), None);
        self.remove_relations(Some(label), Some(REL_HAS_DIMMAP), None);
        Ok(())
    }

    /// Adds a subject-predicate-object relation.
    pub fn add_relation(&mut self, s: &str, p: &str, o: &str) {
        self.store.add(s, p, o);
    }

    /// Removes matching relations; `None` components are wildcards.
    /// Returns the number of relations removed.
    pub fn remove_relations(
        &mut self,
        s: Option<&str>,
        p: Option<&str>,
        o: Option<&str>,
    ) -> usize {
        self.store.remove(s, p, o)
    }

    /// A fresh iteration state for [`Collection::find`].
    pub fn init_state(&self) -> TripleState {
        self.store.init_state()
    }

    /// Finds matching relations one at a time against the given state;
    /// with no state only the first match is returned. The collection
    /// must not be mutated while iterating.
    pub fn find(
        &self,
        state: Option<&mut TripleState>,
        s: Option<&str>,
        p: Option<&str>,
        o: Option<&str>,
    ) -> Option<&Triple> {
        match state {
            Some(state) => self.store.find(state, s, p, o),
            None => self.store.find_first(s, p, o),
        }
    }

    /// Number of stored relations, membership triples included.
    pub fn nrelations(&self) -> usize {
        self.store.len()
    }
}
