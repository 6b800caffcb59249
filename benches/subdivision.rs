use criterion::{criterion_group, criterion_main, black_box, Criterion};

use glam::Vec2;
use lebtri::cbt::{Cbt, CbtConfig};
use lebtri::leb::Domain;
use lebtri::mesh::{LodDecision, Triangulation, TriangulationConfig};

fn bench_reduce_full_16(c: &mut Criterion) {
    let mut cbt = Cbt::new(&CbtConfig { max_depth: 16, init_depth: 10 }).unwrap();

    c.bench_function("reduce_full_depth16", |b| {
        b.iter(|| {
            cbt.reduce_full();
            black_box(cbt.leaf_count())
        });
    });
}

fn bench_reduce_path_16(c: &mut Criterion) {
    let mut cbt = Cbt::new(&CbtConfig { max_depth: 16, init_depth: 10 }).unwrap();

    c.bench_function("reduce_path_depth16", |b| {
        let mut slot = 0u64;
        b.iter(|| {
            slot = (slot + 977) & ((1 << 16) - 1);
            cbt.reduce_path(black_box(slot));
        });
    });
}

fn bench_decode_leaves(c: &mut Criterion) {
    let tri = Triangulation::new(&TriangulationConfig {
        max_depth: 16,
        init_depth: 12,
        domain: Domain::Square,
    })
    .unwrap();

    c.bench_function("decode_leaves_4096", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for leaf in tri.leaves() {
                acc += leaf.triangle.area();
            }
            black_box(acc)
        });
    });
}

fn bench_update_pass(c: &mut Criterion) {
    let target = Vec2::new(0.3, 0.7);

    c.bench_function("update_pass_depth14", |b| {
        b.iter_with_setup(
            || {
                Triangulation::new(&TriangulationConfig {
                    max_depth: 14,
                    init_depth: 8,
                    domain: Domain::Square,
                })
                .unwrap()
            },
            |mut tri| {
                let stats = tri
                    .update_pass(|leaf| {
                        let mid = leaf.triangle.hypotenuse_midpoint();
                        if (mid - target).length() < 0.1 {
                            LodDecision::Split
                        } else {
                            LodDecision::Keep
                        }
                    })
                    .unwrap();
                black_box(stats)
            },
        );
    });
}

criterion_group!(
    benches,
    bench_reduce_full_16,
    bench_reduce_path_16,
    bench_decode_leaves,
    bench_update_pass
);
criterion_main!(benches);
