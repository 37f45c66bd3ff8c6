#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use graph_record::kv::{KvStore, MemKv};
use graph_record::storage::index::{KeyCodec, VertexIndex};
use graph_record::storage::{FieldType, IndexUniqueness};
use graph_record::{IndexOptions, VertexId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const VERTEX_COUNT: u64 = 16_384;
const VALUE_DOMAIN: i64 = 1_000;

fn micro_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/vertex_index");
    group.sample_size(40);
    let mut harness = IndexHarness::new(VERTEX_COUNT, VALUE_DOMAIN);

    group.throughput(Throughput::Elements(1));
    group.bench_function("eq_lookup", |b| {
        b.iter(|| black_box(harness.eq_lookup()));
    });
    group.bench_function("unique_lookup", |b| {
        b.iter(|| black_box(harness.unique_lookup()));
    });

    group.throughput(Throughput::Elements(64));
    group.bench_function("range_scan", |b| {
        b.iter(|| black_box(harness.range_scan(64)));
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("add_delete", |b| {
        b.iter(|| black_box(harness.add_delete()));
    });

    group.finish();
}

struct IndexHarness {
    kv: MemKv,
    scores: VertexIndex,
    ids: VertexIndex,
    domain: i64,
    vertices: u64,
    rng: ChaCha8Rng,
}

impl IndexHarness {
    fn new(vertices: u64, domain: i64) -> Self {
        let kv = MemKv::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);
        let mut write = kv.begin_write().expect("write");
        let scores = VertexIndex::open(
            &mut write,
            "person:vidx:score",
            KeyCodec::Single(FieldType::Int64),
            IndexUniqueness::NonUnique,
            IndexOptions::default(),
        )
        .expect("score index");
        let ids = VertexIndex::open(
            &mut write,
            "person:vidx:uid",
            KeyCodec::Single(FieldType::Int64),
            IndexUniqueness::GlobalUnique,
            IndexOptions::default(),
        )
        .expect("uid index");
        for vid in 0..vertices {
            let score: i64 = rng.gen_range(0..domain);
            scores
                .add(&mut write, &score.to_le_bytes(), VertexId(vid))
                .expect("add score");
            ids.add(&mut write, &(vid as i64).to_le_bytes(), VertexId(vid))
                .expect("add uid");
        }
        kv.commit(write).expect("commit");
        Self {
            kv,
            scores,
            ids,
            domain,
            vertices,
            rng,
        }
    }

    fn eq_lookup(&mut self) -> usize {
        let target: i64 = self.rng.gen_range(0..self.domain);
        let read = self.kv.begin_read().expect("read");
        self.scores
            .lookup(&read, &target.to_le_bytes())
            .expect("lookup")
            .len()
    }

    fn unique_lookup(&mut self) -> usize {
        let target = self.rng.gen_range(0..self.vertices) as i64;
        let read = self.kv.begin_read().expect("read");
        self.ids
            .lookup(&read, &target.to_le_bytes())
            .expect("lookup")
            .len()
    }

    fn range_scan(&mut self, limit: usize) -> usize {
        let start: i64 = self.rng.gen_range(0..self.domain);
        let lo = start.to_le_bytes();
        let read = self.kv.begin_read().expect("read");
        self.scores
            .iter(&read, Some(&lo[..]), None)
            .expect("iter")
            .take(limit)
            .count()
    }

    fn add_delete(&mut self) -> bool {
        let score: i64 = self.rng.gen_range(0..self.domain);
        let vid = VertexId(self.vertices + self.rng.gen_range(0..1_024));
        let mut write = self.kv.begin_write().expect("write");
        self.scores
            .add(&mut write, &score.to_le_bytes(), vid)
            .expect("add");
        let removed = self
            .scores
            .delete(&mut write, &score.to_le_bytes(), vid)
            .expect("delete");
        self.kv.abort(write);
        removed
    }
}

criterion_group!(benches, micro_index);
criterion_main!(benches);
