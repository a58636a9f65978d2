use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dlite::datatype::{TypeTag, POINTER_SIZE};
use dlite::entity::{Dimension, Entity, Property};
use dlite::identity::get_uuid;
use dlite::instance::Instance;
use dlite::triplestore::{MemoryTripleStore, TripleStore};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("uuid v5", |b| b.iter(|| get_uuid(black_box("myinst"))));
    c.bench_function("uuid copy", |b| {
        b.iter(|| get_uuid(black_box("8690cc2d-0a45-4dc4-9ae2-3b7a0aff7264")))
    });

    c.bench_function("entity create", |b| {
        b.iter(|| {
            Entity::create(
                black_box("http://example.com/meta/0.1/Bench"),
                "",
                vec![
                    Dimension::new("n", "First dimension."),
                    Dimension::new("m", "Second dimension."),
                ],
                vec![
                    Property::scalar("label", TypeTag::StringPtr, POINTER_SIZE),
                    Property::scalar("weight", TypeTag::Float, 8),
                    Property::array("values", TypeTag::Float, 8, vec![0]),
                    Property::array("grid", TypeTag::Float, 8, vec![1, 0]),
                ],
            )
            .unwrap()
        })
    });

    let entity = Entity::create(
        "http://example.com/meta/0.1/BenchInstance",
        "",
        vec![Dimension::new("n", "")],
        vec![Property::array("values", TypeTag::Float, 8, vec![0])],
    )
    .unwrap();
    c.bench_function("instance create 1k", |b| {
        b.iter(|| Instance::create(&entity, black_box(&[1000]), "").unwrap())
    });

    let mut store = MemoryTripleStore::new();
    for i in 0..1000 {
        store.add(&format!("label{i}"), "_is-a", "Instance");
    }
    c.bench_function("triple find 1k", |b| {
        b.iter(|| store.find_first(black_box(Some("label999")), None, None))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
