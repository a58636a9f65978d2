use std::sync::Arc;

use dlite::datatype::{TypeTag, POINTER_SIZE};
use dlite::entity::{Dimension, Entity, Property, SCHEMA_ENTITY};
use dlite::error::DLiteError;
use dlite::instance::Instance;

fn point_entity(uri: &str) -> Arc<Entity> {
    Entity::create(
        uri,
        "A point with a label.",
        vec![Dimension::new("n", "Number of coordinates.")],
        vec![
            Property::scalar("label", TypeTag::StringPtr, POINTER_SIZE),
            Property::array("coords", TypeTag::Float, 8, vec![0]),
        ],
    )
    .unwrap()
}

#[test]
fn incref_decref_restores_refcount() {
    let entity = point_entity("http://example.com/meta/0.1/RefPoint");
    assert_eq!(Entity::refcount(&entity), 1);
    let extra = Arc::clone(&entity);
    assert_eq!(Entity::refcount(&entity), 2);
    drop(extra);
    assert_eq!(Entity::refcount(&entity), 1);
}

#[test]
fn instances_hold_one_reference_each() {
    let entity = point_entity("http://example.com/meta/0.1/CountPoint");
    let before = Entity::refcount(&entity);
    let a = Instance::create(&entity, &[2], "").unwrap();
    let b = Instance::create(&entity, &[3], "").unwrap();
    assert_eq!(Entity::refcount(&entity), before + 2);
    drop(a);
    assert_eq!(Entity::refcount(&entity), before + 1);
    drop(b);
    assert_eq!(Entity::refcount(&entity), before);
}

#[test]
fn entities_pin_the_schema_singleton() {
    // other tests create entities concurrently, so only lower bounds can
    // be asserted on the shared singleton
    let entity = point_entity("http://example.com/meta/0.1/MetaPoint");
    assert!(Arc::ptr_eq(entity.meta().unwrap(), &SCHEMA_ENTITY));
    assert!(
        Entity::refcount(&SCHEMA_ENTITY) >= 2,
        "the singleton is pinned and referenced"
    );
}

#[test]
fn schema_singleton_is_its_own_root() {
    assert!(SCHEMA_ENTITY.meta().is_none());
    assert_eq!(SCHEMA_ENTITY.uuid(), "00000000-0000-0000-0000-000000000000");
    assert_eq!(SCHEMA_ENTITY.ndimensions(), 3);
    assert_eq!(SCHEMA_ENTITY.nproperties(), 2);
}

#[test]
fn member_lookups() {
    let entity = point_entity("http://example.com/meta/0.1/LookupPoint");
    assert_eq!(entity.dimension_index("n").unwrap(), 0);
    assert_eq!(entity.property_index("coords").unwrap(), 1);
    assert_eq!(entity.property("label").unwrap().tag(), TypeTag::StringPtr);

    let err = entity.dimension_index("missing").unwrap_err();
    match &err {
        DLiteError::AbsentMember { uri, kind, name } => {
            assert_eq!(uri, entity.uri());
            assert_eq!(*kind, "dimension");
            assert_eq!(name, "missing");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(entity.property_index("missing").is_err());
    assert!(entity.property_by_index(17).is_err());
}

#[test]
fn entity_uuid_derives_from_uri() {
    let entity = point_entity("http://example.com/meta/0.1/UuidPoint");
    let (expected, _) = dlite::identity::get_uuid("http://example.com/meta/0.1/UuidPoint");
    assert_eq!(entity.uuid(), expected);
}
