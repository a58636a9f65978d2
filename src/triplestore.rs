//! The triple-store primitive collections are built on.
//!
//! A [`Triple`] is a `(subject, predicate, object)` relation with a
//! stable content-derived id. The [`TripleStore`] trait is the small
//! interface collections require; [`MemoryTripleStore`] is the
//! in-memory implementation used by default. Pattern arguments are
//! `Option<&str>` where `None` is a wildcard.
//!
//! Iteration uses a caller-supplied [`TripleState`]; the store must not
//! be mutated while a state is live.

use std::fmt;
use std::hash::Hasher;

use seahash::SeaHasher;

// ------------- Triple -------------
/// A subject-predicate-object relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triple {
    s: String,
    p: String,
    o: String,
    id: String,
}

impl Triple {
    pub fn new(s: impl Into<String>, p: impl Into<String>, o: impl Into<String>) -> Triple {
        let (s, p, o) = (s.into(), p.into(), o.into());
        let id = triple_id(&s, &p, &o);
        Triple { s, p, o, id }
    }

    pub fn s(&self) -> &str {
        &self.s
    }
    pub fn p(&self) -> &str {
        &self.p
    }
    pub fn o(&self) -> &str {
        &self.o
    }

    /// Stable id derived from the triple's content.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, s: Option<&str>, p: Option<&str>, o: Option<&str>) -> bool {
        s.map_or(true, |s| self.s == s)
            && p.map_or(true, |p| self.p == p)
            && o.map_or(true, |o| self.o == o)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.s, self.p, self.o)
    }
}

/// Content-derived id of a triple.
pub fn triple_id(s: &str, p: &str, o: &str) -> String {
    let mut hasher = SeaHasher::default();
    hasher.write(s.as_bytes());
    hasher.write(&[0]);
    hasher.write(p.as_bytes());
    hasher.write(&[0]);
    hasher.write(o.as_bytes());
    format!("{:016x}", hasher.finish())
}

/// Iteration state for [`TripleStore::find`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TripleState {
    pos: usize,
}

// ------------- TripleStore -------------
/// The interface collections require from a triple store.
pub trait TripleStore {
    /// Adds a triple. Adding an already present triple is a no-op.
    fn add(&mut self, s: &str, p: &str, o: &str);

    /// Removes every triple matching the pattern and returns how many
    /// were removed. `None` components are wildcards.
    fn remove(&mut self, s: Option<&str>, p: Option<&str>, o: Option<&str>) -> usize;

    /// Removes the triple with the given id. Returns whether one was
    /// removed.
    fn remove_by_id(&mut self, id: &str) -> bool;

    /// The first triple matching the pattern.
    fn find_first(&self, s: Option<&str>, p: Option<&str>, o: Option<&str>) -> Option<&Triple>;

    /// A fresh iteration state for [`TripleStore::find`].
    fn init_state(&self) -> TripleState {
        TripleState::default()
    }

    /// The next triple matching the pattern, advancing `state`. The
    /// store must not be mutated between calls sharing a state.
    fn find(
        &self,
        state: &mut TripleState,
        s: Option<&str>,
        p: Option<&str>,
        o: Option<&str>,
    ) -> Option<&Triple>;

    /// Number of stored triples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ------------- MemoryTripleStore -------------
/// In-memory triple store with linear-scan matching.
#[derive(Debug, Default)]
pub struct MemoryTripleStore {
    triples: Vec<Triple>,
}

impl MemoryTripleStore {
    pub fn new() -> MemoryTripleStore {
        MemoryTripleStore { triples: Vec::new() }
    }
}

impl TripleStore for MemoryTripleStore {
    fn add(&mut self, s: &str, p: &str, o: &str) {
        if self.find_first(Some(s), Some(p), Some(o)).is_none() {
            self.triples.push(Triple::new(s, p, o));
        }
    }

    fn remove(&mut self, s: Option<&str>, p: Option<&str>, o: Option<&str>) -> usize {
        let before = self.triples.len();
        self.triples.retain(|t| !t.matches(s, p, o));
        before - self.triples.len()
    }

    fn remove_by_id(&mut self, id: &str) -> bool {
        let before = self.triples.len();
        self.triples.retain(|t| t.id != id);
        before != self.triples.len()
    }

    fn find_first(&self, s: Option<&str>, p: Option<&str>, o: Option<&str>) -> Option<&Triple> {
        self.triples.iter().find(|t| t.matches(s, p, o))
    }

    fn find(
        &self,
        state: &mut TripleState,
        s: Option<&str>,
        p: Option<&str>,
        o: Option<&str>,
    ) -> Option<&Triple> {
        while state.pos < self.triples.len() {
            let t = &self.triples[state.pos];
            state.pos += 1;
            if t.matches(s, p, o) {
                return Some(t);
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.triples.len()
    }
}
