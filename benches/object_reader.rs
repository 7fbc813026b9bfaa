use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use xaml_stream::{
    from_nodes, to_nodes, DynObject, DynRuntime, MemberBuilder, ObjectReader, SchemaContext,
    TypeBuilder, Value, XamlTypeName,
};

fn schema() -> SchemaContext {
    let mut schema = SchemaContext::new();
    schema.register(
        TypeBuilder::new("urn:bench", "Panel")
            .collection()
            .item_type(XamlTypeName::xaml("Object"))
            .build()
            .unwrap(),
    );
    schema.register(
        TypeBuilder::new("urn:bench", "Item")
            .runtime_name_property("Name")
            .member(MemberBuilder::new("Name", XamlTypeName::xaml("String")))
            .member(MemberBuilder::new("Width", XamlTypeName::xaml("Double")))
            .member(MemberBuilder::new("Label", XamlTypeName::xaml("String")))
            .build()
            .unwrap(),
    );
    schema
}

fn item(index: usize) -> Value {
    DynObject::new(XamlTypeName::new("urn:bench", "Item"))
        .with_member("Name", format!("item{}", index))
        .with_member("Width", index as f64 * 1.5)
        .with_member("Label", "benchmark item")
        .into_value()
}

fn panel(count: usize) -> Value {
    DynObject::new(XamlTypeName::new("urn:bench", "Panel"))
        .with_items((0..count).map(item))
        .into_value()
}

/// A panel where every item appears twice, forcing references.
fn shared_panel(count: usize) -> Value {
    let items: Vec<Value> = (0..count).map(item).collect();
    DynObject::new(XamlTypeName::new("urn:bench", "Panel"))
        .with_items(items.iter().chain(items.iter()).cloned())
        .into_value()
}

fn benchmark_read_primitive(c: &mut Criterion) {
    let schema = SchemaContext::new();
    let runtime = DynRuntime::new();
    let value = Value::from(42);

    c.bench_function("read_primitive", |b| {
        b.iter(|| to_nodes(black_box(&value), &schema, &runtime))
    });
}

fn benchmark_read_panels(c: &mut Criterion) {
    let schema = schema();
    let runtime = DynRuntime::new();
    let mut group = c.benchmark_group("read_panel");

    for size in [10, 100, 1000].iter() {
        let value = panel(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| to_nodes(black_box(value), &schema, &runtime))
        });
    }
    group.finish();
}

fn benchmark_read_shared(c: &mut Criterion) {
    let schema = schema();
    let runtime = DynRuntime::new();
    let value = shared_panel(100);

    c.bench_function("read_shared_panel", |b| {
        b.iter(|| to_nodes(black_box(&value), &schema, &runtime))
    });
}

fn benchmark_pull_reader(c: &mut Criterion) {
    let schema = schema();
    let runtime = DynRuntime::new();
    let value = panel(100);

    c.bench_function("pull_reader_count", |b| {
        b.iter(|| {
            let mut reader = ObjectReader::new(black_box(&value), &schema, &runtime).unwrap();
            let mut count = 0usize;
            while reader.read().unwrap() {
                count += 1;
            }
            count
        })
    });
}

fn benchmark_round_trip(c: &mut Criterion) {
    let schema = schema();
    let runtime = DynRuntime::new();
    let value = panel(100);
    let nodes = to_nodes(&value, &schema, &runtime).unwrap();

    c.bench_function("write_panel", |b| {
        b.iter(|| from_nodes(black_box(nodes.clone()), &schema, &runtime))
    });
}

criterion_group!(
    benches,
    benchmark_read_primitive,
    benchmark_read_panels,
    benchmark_read_shared,
    benchmark_pull_reader,
    benchmark_round_trip
);
criterion_main!(benches);
