use dlite::datatype::{self, TypeTag, POINTER_SIZE};
use dlite::entity::{Dimension, Entity, Property, SCHEMA_ENTITY};

fn mixed_entity() -> std::sync::Arc<Entity> {
    Entity::create(
        "http://example.com/meta/0.1/Mixed",
        "Entity exercising every storage form.",
        vec![
            Dimension::new("n", "First dimension."),
            Dimension::new("m", "Second dimension."),
        ],
        vec![
            Property::scalar("flag", TypeTag::Bool, 1),
            Property::scalar("count", TypeTag::Int, 2),
            Property::scalar("tag", TypeTag::String, 10),
            Property::scalar("weight", TypeTag::Float, 8),
            Property::scalar("checksum", TypeTag::Blob, 5),
            Property::array("labels", TypeTag::StringPtr, POINTER_SIZE, vec![0]),
            Property::array("matrix", TypeTag::Float, 8, vec![1, 0]),
        ],
    )
    .unwrap()
}

#[test]
fn header_and_dimension_offsets() {
    let entity = mixed_entity();
    let layout = entity.layout();
    // header: uuid[37], uri pointer, meta pointer, then the dimension
    // size slots
    let uri_offset = datatype::align_up(37, POINTER_SIZE);
    let meta_offset = uri_offset + POINTER_SIZE;
    let expected_dimoffset = datatype::align_up(
        meta_offset + POINTER_SIZE,
        std::mem::size_of::<usize>(),
    );
    assert_eq!(layout.dimoffset, expected_dimoffset);
}

#[test]
fn property_offsets_are_aligned_and_in_bounds() {
    let entity = mixed_entity();
    let layout = entity.layout();
    assert_eq!(layout.propoffsets.len(), entity.nproperties());
    for (i, p) in entity.properties().iter().enumerate() {
        let form = p.storage_form();
        let offset = layout.propoffsets[i];
        assert_eq!(offset % form.alignment(), 0, "property '{}' misaligned", p.name());
        assert!(
            offset + form.size() <= layout.size,
            "property '{}' overruns the block",
            p.name()
        );
    }
    // members were swept in declaration order
    for pair in layout.propoffsets.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    assert_eq!(layout.size % POINTER_SIZE, 0, "block should pad to max alignment");
}

#[test]
fn array_properties_use_pointer_slots() {
    let entity = mixed_entity();
    for p in entity.properties() {
        let form = p.storage_form();
        if p.ndims() > 0 {
            assert_eq!(form.size(), POINTER_SIZE);
            assert_eq!(form.alignment(), POINTER_SIZE);
        } else {
            assert_eq!(form.size(), p.size());
        }
    }
}

#[test]
fn member_offset_math() {
    assert_eq!(datatype::align_up(37, 8), 40);
    assert_eq!(datatype::align_up(40, 8), 40);
    assert_eq!(datatype::member_offset(0, 37, TypeTag::StringPtr, POINTER_SIZE), 40);
    assert_eq!(datatype::member_offset(40, 1, TypeTag::Float, 8), 48);
    assert_eq!(datatype::member_offset(40, 1, TypeTag::Bool, 1), 41);
    // blobs and fixed strings are byte aligned
    assert_eq!(datatype::alignment(TypeTag::Blob, 5), 1);
    assert_eq!(datatype::alignment(TypeTag::String, 10), 1);
    assert_eq!(datatype::alignment(TypeTag::UInt, 4), 4);
    assert_eq!(datatype::alignment(TypeTag::StringPtr, POINTER_SIZE), POINTER_SIZE);
}

#[test]
fn typename_round_trip() {
    for tag in [
        TypeTag::Blob,
        TypeTag::Bool,
        TypeTag::Int,
        TypeTag::UInt,
        TypeTag::Float,
        TypeTag::String,
        TypeTag::StringPtr,
    ] {
        assert_eq!(TypeTag::from_typename(tag.typename()).unwrap(), tag);
    }
    // short schema aliases
    assert_eq!(TypeTag::from_typename("string-pointer").unwrap(), TypeTag::StringPtr);
    assert_eq!(TypeTag::from_typename("int").unwrap(), TypeTag::Int);
    assert!(TypeTag::from_typename("quaternion").is_err());
}

#[test]
fn meta_entity_layout_is_fixed() {
    let layout = SCHEMA_ENTITY.layout();
    let w = POINTER_SIZE;
    let uri_offset = datatype::align_up(37, w);
    assert_eq!(layout.dimoffset, uri_offset + 8 * w);
    assert_eq!(layout.reloffset, uri_offset + 10 * w);
    // three meta-dimension count slots follow the header
    assert_eq!(layout.size, uri_offset + 11 * w + 3 * std::mem::size_of::<usize>());
    assert!(layout.propoffsets.is_empty());
}

#[test]
fn invalid_widths_are_rejected() {
    let result = Entity::create(
        "http://example.com/meta/0.1/BadWidth",
        "",
        vec![],
        vec![Property::scalar("x", TypeTag::Float, 3)],
    );
    assert!(result.is_err());
    let result = Entity::create(
        "http://example.com/meta/0.1/BadDim",
        "",
        vec![Dimension::new("n", "")],
        vec![Property::array("xs", TypeTag::Float, 8, vec![1])],
    );
    assert!(result.is_err());
}
