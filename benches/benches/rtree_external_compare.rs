// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use thicket_rtree::{RTree, Rect};

use rstar::primitives::Rectangle;
use rstar::{AABB, RTree as RStarTree};

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

fn to_rstar_rects(v: &[Rect]) -> Vec<Rectangle<[f32; 2]>> {
    v.iter()
        .map(|r| Rectangle::from_corners([r.min_x, r.min_y], [r.max_x, r.max_y]))
        .collect()
}

fn bench_rtree_external_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_external_compare");
    for &n in &[64_usize, 128] {
        let rects = gen_grid_rects(n, 10.0);
        let probe = Rect::new(100.0, 100.0, 500.0, 500.0);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("thicket_build_query_n{}", n), |b| {
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

        group.bench_function(format!("rstar_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_rects(&rects),
                |rectangles| {
                    let tree = RStarTree::bulk_load(rectangles);
                    let aabb = AABB::from_corners(
                        [probe.min_x, probe.min_y],
                        [probe.max_x, probe.max_y],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rtree_external_compare);
criterion_main!(benches);
