//! Optional-content `/Order` tree benchmarks
//!
//! Measures parsing, position computation and serialisation of large
//! nested `/Order` arrays, the work done on every layer edit.
//!
//! Run with: `cargo bench --bench order_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lopdf::{Document as LoDocument, Object, StringFormat};
use pdfkiln::ocg::OrderTree;

/// `breadth` layers per level, each followed by a child array, down to
/// `depth` levels. Every third level is wrapped in a labelled group.
fn nested_order(breadth: u32, depth: u32) -> Vec<Object> {
    fn level(next_id: &mut u32, breadth: u32, depth: u32) -> Vec<Object> {
        let mut items = Vec::new();
        if depth % 3 == 0 {
            items.push(Object::String(
                format!("Group {depth}").into_bytes(),
                StringFormat::Literal,
            ));
        }
        for _ in 0..breadth {
            *next_id += 1;
            items.push(Object::Reference((*next_id, 0)));
            if depth > 1 {
                items.push(Object::Array(level(next_id, breadth, depth - 1)));
            }
        }
        items
    }
    let mut next_id = 0;
    level(&mut next_id, breadth, depth)
}

fn flat_order(count: u32) -> Vec<Object> {
    (1..=count).map(|id| Object::Reference((id, 0))).collect()
}

fn benchmark_parse(c: &mut Criterion) {
    let doc = LoDocument::with_version("1.7");
    let mut group = c.benchmark_group("order_parse");

    for (name, items) in [
        ("flat_1000", flat_order(1000)),
        ("nested_4x5", nested_order(4, 5)),
        ("nested_10x3", nested_order(10, 3)),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &items, |b, items| {
            b.iter(|| OrderTree::parse(black_box(&doc), black_box(items)))
        });
    }
    group.finish();
}

fn benchmark_positions(c: &mut Criterion) {
    let doc = LoDocument::with_version("1.7");
    let tree = OrderTree::parse(&doc, &nested_order(4, 5));

    c.bench_function("order_positions_nested_4x5", |b| {
        b.iter(|| black_box(&tree).positions())
    });
}

fn benchmark_round_trip(c: &mut Criterion) {
    let doc = LoDocument::with_version("1.7");
    let items = nested_order(6, 4);

    c.bench_function("order_round_trip_nested_6x4", |b| {
        b.iter(|| {
            let written = OrderTree::parse(&doc, black_box(&items)).to_objects();
            OrderTree::parse(&doc, &written)
        })
    });
}

fn benchmark_remove_layer(c: &mut Criterion) {
    let doc = LoDocument::with_version("1.7");
    let tree = OrderTree::parse(&doc, &nested_order(4, 5));

    c.bench_function("order_remove_layer_nested_4x5", |b| {
        b.iter(|| {
            let mut tree = tree.clone();
            tree.remove_layer(black_box((2, 0)))
        })
    });
}

criterion_group!(
    benches,
    benchmark_parse,
    benchmark_positions,
    benchmark_round_trip,
    benchmark_remove_layer
);
criterion_main!(benches);
