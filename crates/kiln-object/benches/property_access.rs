use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kiln_object::{access, Class, ComputedProperty, Mixin, Properties, Value};

fn person_class() -> Class {
    Class::core_object()
        .extend_named(
            "Person",
            [Mixin::builder()
                .value("firstName", Value::Null)
                .value("lastName", Value::Null)
                .computed(
                    "fullName",
                    ComputedProperty::new(|this, _| {
                        let first = access::get(this, "firstName")?;
                        let last = access::get(this, "lastName")?;
                        Ok(Value::string(format!("{} {}", first, last)))
                    })
                    .depends_on(["{first,last}Name"]),
                )
                .observer("nameChanged", ["fullName"], |_, _| Ok(()))
                .build()],
        )
        .unwrap()
}

fn bench_get(c: &mut Criterion) {
    let person = person_class()
        .create_with(Properties::new().with("firstName", "Tom").with("lastName", "Dale"))
        .unwrap();

    let mut group = c.benchmark_group("get");
    for key in ["firstName", "fullName", "missing"] {
        group.bench_with_input(BenchmarkId::new("key", key), &key, |b, key| {
            b.iter(|| access::get(&person, black_box(key)).unwrap());
        });
    }
    group.finish();
}

fn bench_set(c: &mut Criterion) {
    let person = person_class().create().unwrap();

    c.bench_function("set_observed", |b| {
        b.iter(|| access::set(&person, "firstName", black_box(Value::from("Yehuda"))).unwrap());
    });

    c.bench_function("set_unobserved", |b| {
        b.iter(|| access::set(&person, "age", black_box(Value::from(30))).unwrap());
    });
}

fn bench_create(c: &mut Criterion) {
    let class = person_class();

    c.bench_function("create_with_hash", |b| {
        b.iter(|| {
            class
                .create_with(black_box(
                    Properties::new().with("firstName", "Tom").with("lastName", "Dale"),
                ))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_get, bench_set, bench_create);
criterion_main!(benches);
