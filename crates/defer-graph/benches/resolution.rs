use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use defer_core::{Record, Relationship, Snapshot};
use defer_graph::DependencyGraph;
use defer_graph::graph::{cycles, order, query};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TIERS: [(&str, u64); 3] = [("small", 200), ("medium", 2_000), ("large", 10_000)];

/// Random DAG: every edge points from a higher id to a lower one.
fn generate_dag(records: u64, seed: u64) -> Snapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    let recs: Vec<Record> = (1..=records).map(Record::new).collect();
    let mut rels = Vec::new();
    for id in 2..=records {
        let fan_out = rng.gen_range(0..=3);
        for _ in 0..fan_out {
            let target = rng.gen_range(1..id);
            rels.push(Relationship::blocks(id, target));
        }
    }
    Snapshot::new(recs, rels)
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph.tiered");

    for (name, size) in TIERS {
        let snapshot = generate_dag(size, 0xDEF3_u64 + size);
        let graph = DependencyGraph::from_snapshot(&snapshot);
        let records = snapshot.records_by_id();
        group.throughput(Throughput::Elements(size));

        group.bench_with_input(BenchmarkId::new("build", name), &snapshot, |b, snap| {
            b.iter(|| black_box(DependencyGraph::from_snapshot(snap)));
        });

        group.bench_with_input(BenchmarkId::new("order", name), &graph, |b, graph| {
            b.iter(|| black_box(order::resolution_order(graph)));
        });

        group.bench_with_input(BenchmarkId::new("stats", name), &graph, |b, graph| {
            b.iter(|| black_box(query::stats(graph, &records)));
        });

        group.bench_with_input(BenchmarkId::new("validate", name), &graph, |b, graph| {
            let source = defer_core::RecordId(1);
            let target = defer_core::RecordId(size);
            b.iter(|| black_box(cycles::would_create_cycle(graph, source, target)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolution);
criterion_main!(benches);
