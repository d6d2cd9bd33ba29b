// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thicket_rtree::{Config, Point, RTree, Rect};

fn gen_grid_rects(n: usize, cell: f32) -> Vec<Rect> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f32 * cell;
            let y0 = y as f32 * cell;
            out.push(Rect::new(x0, y0, x0 + cell, y0 + cell));
        }
    }
    out
}

fn gen_random_rects(count: usize, extent: f32, max_side: f32, seed: u64) -> Vec<Rect> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let x: f32 = rng.random_range(0.0..extent);
        let y: f32 = rng.random_range(0.0..extent);
        let w: f32 = rng.random_range(0.1..max_side);
        let h: f32 = rng.random_range(0.1..max_side);
        out.push(Rect::new(x, y, x + w, y + h));
    }
    out
}

fn bench_build_and_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_build_query");
    for &n in &[64_usize, 128] {
        let rects = gen_grid_rects(n, 10.0);
        let probe = Rect::new(100.0, 100.0, 500.0, 500.0);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("build_query_n{}", n), |b| {
            b.iter_batched(
                RTree::with_defaults,
                |mut tree| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        tree.add(r, i as i32);
                    }
                    let mut hits = 0_usize;
                    tree.intersects(&probe, |_| {
                        hits += 1;
                        true
                    });
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_nearest_n(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_nearest_n");
    for &count in &[10_usize, 100] {
        let rects = gen_random_rects(10_000, 1000.0, 5.0, 7);
        let mut tree = RTree::new(Config::new(16, 8));
        for (i, r) in rects.iter().copied().enumerate() {
            tree.add(r, i as i32);
        }
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(format!("nearest_{}_of_10k", count), |b| {
            b.iter(|| {
                let mut hits = 0_usize;
                tree.nearest_n(
                    Point::new(500.0, 500.0),
                    |_| {
                        hits += 1;
                        true
                    },
                    count,
                    f32::INFINITY,
                );
                black_box(hits);
            })
        });
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_churn");
    let rects = gen_random_rects(2_000, 500.0, 4.0, 13);
    group.throughput(Throughput::Elements(rects.len() as u64));

    group.bench_function("insert_delete_2k", |b| {
        b.iter_batched(
            || rects.clone(),
            |rects| {
                let mut tree = RTree::new(Config::new(10, 5));
                for (i, r) in rects.iter().copied().enumerate() {
                    tree.add(r, i as i32);
                }
                for (i, r) in rects.iter().copied().enumerate() {
                    tree.delete(r, i as i32);
                }
                black_box(tree.len());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_build_and_query, bench_nearest_n, bench_churn);
criterion_main!(benches);
