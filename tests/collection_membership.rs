use std::sync::Arc;

use dlite::collection::{Collection, REL_HAS_DIMMAP, REL_HAS_META, REL_HAS_UUID, REL_IS_A};
use dlite::datatype::{TypeTag, POINTER_SIZE};
use dlite::entity::{Dimension, Entity, Property};
use dlite::instance::Instance;
use dlite::triplestore::{MemoryTripleStore, TripleStore};

fn labelled_entity() -> Arc<Entity> {
    Entity::create(
        "http://example.com/meta/0.1/Labelled",
        "Something with a label.",
        vec![Dimension::new("n", "Number of values.")],
        vec![
            Property::scalar("label", TypeTag::StringPtr, POINTER_SIZE),
            Property::array("values", TypeTag::Float, 8, vec![0]),
        ],
    )
    .unwrap()
}

#[test]
fn add_records_the_membership_triples() {
    let entity = labelled_entity();
    let inst = Instance::create(&entity, &[2], "member-one").unwrap();
    let mut coll = Collection::create("");

    coll.add("a", &inst).unwrap();
    assert_eq!(coll.nrelations(), 3);

    let t = coll.find(None, Some("a"), Some(REL_IS_A), None).unwrap();
    assert_eq!(t.o(), "Instance");
    let t = coll.find(None, Some("a"), Some(REL_HAS_UUID), None).unwrap();
    assert_eq!(t.o(), inst.uuid());
    let t = coll.find(None, Some("a"), Some(REL_HAS_META), None).unwrap();
    assert_eq!(t.o(), entity.uri());
}

#[test]
fn remove_clears_every_membership_triple() {
    let entity = labelled_entity();
    let inst = Instance::create(&entity, &[2], "member-two").unwrap();
    let mut coll = Collection::create("");

    coll.add("a", &inst).unwrap();
    coll.remove("a").unwrap();

    assert!(coll.find(None, Some("a"), None, None).is_none());
    assert_eq!(coll.nrelations(), 0);
    // removing an absent label is an error
    assert!(coll.remove("a").is_err());
}

#[test]
fn remove_follows_dimension_mappings_by_id() {
    let entity = labelled_entity();
    let inst = Instance::create(&entity, &[2], "member-three").unwrap();
    let mut coll = Collection::create("");

    coll.add("a", &inst).unwrap();
    coll.add_relation("a#n", "_maps-to", "n");
    let mapping_id = coll
        .find(None, Some("a#n"), Some("_maps-to"), None)
        .unwrap()
        .id()
        .to_owned();
    coll.add_relation("a", REL_HAS_DIMMAP, &mapping_id);

    coll.remove("a").unwrap();
    // the referenced mapping triple is gone too
    assert!(coll.find(None, Some("a#n"), None, None).is_none());
    assert_eq!(coll.nrelations(), 0);
}

#[test]
fn find_iterates_with_caller_state() {
    let entity = labelled_entity();
    let mut coll = Collection::create("bag-of-things");
    assert_eq!(coll.uri(), Some("bag-of-things"));

    for (label, id) in [("a", "x1"), ("b", "x2"), ("c", "x3")] {
        let inst = Instance::create(&entity, &[1], id).unwrap();
        coll.add(label, &inst).unwrap();
    }

    let mut state = coll.init_state();
    let mut labels = Vec::new();
    while let Some(t) = coll.find(Some(&mut state), None, Some(REL_IS_A), Some("Instance")) {
        labels.push(t.s().to_owned());
    }
    assert_eq!(labels, ["a", "b", "c"]);
}

#[test]
fn user_relations_survive_member_removal() {
    let entity = labelled_entity();
    let inst = Instance::create(&entity, &[1], "kept").unwrap();
    let mut coll = Collection::create("");

    coll.add("a", &inst).unwrap();
    coll.add_relation("a-side", "comment", "free standing");
    coll.remove("a").unwrap();

    let t = coll.find(None, Some("a-side"), None, None).unwrap();
    assert_eq!(t.o(), "free standing");
    assert_eq!(coll.remove_relations(Some("a-side"), None, None), 1);
}

#[test]
fn collection_dimensions() {
    let mut coll = Collection::create("");
    coll.set_dimension("nmembers", 3);
    coll.set_dimension("nmembers", 4);
    assert_eq!(coll.dimension_size("nmembers").unwrap(), 4);
    assert!(coll.dimension_size("missing").is_err());
    assert_eq!(coll.dimensions().len(), 1);
}

#[test]
fn triple_store_pattern_matching() {
    let mut store = MemoryTripleStore::new();
    store.add("s1", "p", "o1");
    store.add("s1", "p", "o2");
    store.add("s2", "p", "o1");
    store.add("s1", "p", "o1"); // idempotent
    assert_eq!(store.len(), 3);

    assert_eq!(store.find_first(Some("s2"), None, None).unwrap().o(), "o1");
    assert!(store.find_first(None, Some("q"), None).is_none());

    let mut state = store.init_state();
    let mut count = 0;
    while store.find(&mut state, Some("s1"), Some("p"), None).is_some() {
        count += 1;
    }
    assert_eq!(count, 2);

    let id = store.find_first(Some("s2"), None, None).unwrap().id().to_owned();
    assert!(store.remove_by_id(&id));
    assert!(!store.remove_by_id(&id));
    assert_eq!(store.remove(Some("s1"), None, None), 2);
    assert!(store.is_empty());
}
