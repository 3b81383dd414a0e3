//! Benchmarks for signature schemes and splitters.

#![allow(missing_docs)]

use bisim::*;
use bisim_testkit::{random_graph, RandomGraphSpec};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_refine(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine");
    group.sample_size(100);
    group.measurement_time(std::time::Duration::from_secs(10));

    // Three distinct labels, interned by a throwaway graph.
    let mut labels_graph: Graph<u8, u8> = Graph::new("labels");
    for label in 0..3u8 {
        labels_graph.add_node(label, label);
    }
    let ids: Vec<LabelId> = (0..3u8)
        .filter_map(|node| labels_graph.label_id(&node))
        .collect();

    for fan_out in [1usize, 8, 64] {
        let labels: Vec<LabelId> = (0..fan_out).map(|i| ids[i % ids.len()]).collect();

        let exact = Exact;
        let exact_targets: Vec<ExactSignature> =
            labels.iter().map(|label| exact.initial(*label)).collect();
        group.throughput(Throughput::Elements(fan_out as u64));
        group.bench_with_input(BenchmarkId::new("exact", fan_out), &fan_out, |b, _| {
            b.iter(|| {
                exact.refine(
                    black_box(ids[0]),
                    labels.iter().copied().zip(exact_targets.iter()),
                )
            });
        });

        let estimate = Estimate::default();
        let estimate_targets: Vec<EstimateSignature> =
            labels.iter().map(|label| estimate.initial(*label)).collect();
        group.bench_with_input(BenchmarkId::new("estimate", fan_out), &fan_out, |b, _| {
            b.iter(|| {
                estimate.refine(
                    black_box(ids[0]),
                    labels.iter().copied().zip(estimate_targets.iter()),
                )
            });
        });
    }

    group.finish();
}

fn bench_splitters(c: &mut Criterion) {
    let graph = random_graph(9, RandomGraphSpec { nodes: 10_000, edges: 0, ..Default::default() });

    let mut group = c.benchmark_group("split");
    group.throughput(Throughput::Elements(graph.node_count() as u64));
    group.bench_function("chunk", |b| b.iter(|| chunk_splitter(&graph, black_box(16))));
    group.bench_function("round_robin", |b| b.iter(|| round_robin_splitter(&graph, black_box(16))));
    group.bench_function("hash", |b| b.iter(|| hash_splitter(&graph, black_box(16))));
    group.finish();
}

criterion_group!(benches, bench_refine, bench_splitters);
criterion_main!(benches);
