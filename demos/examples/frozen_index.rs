// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Freezing a tree into a read-only index.
//!
//! Load a tree with random rectangles, freeze it, and show that queries
//! carry over while the mutable tree is left empty.
//!
//! Run:
//! - `cargo run -p thicket_demos --example frozen_index`

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thicket_rtree::{Config, IdCollector, Point, RTree, Rect};

fn main() {
    let mut tree = RTree::new(Config::new(16, 8));
    let mut rng = StdRng::seed_from_u64(1);
    for id in 0..1000 {
        let x: f32 = rng.random_range(0.0..500.0);
        let y: f32 = rng.random_range(0.0..500.0);
        tree.add(Rect::new(x, y, x + 2.0, y + 2.0), id);
    }
    println!("tree size before freezing: {}", tree.len());

    let index = tree.to_index();
    println!("tree size after freezing: {}", tree.len());
    println!("index size: {}", index.len());

    let mut hits = IdCollector::new();
    index.intersects(&Rect::new(100.0, 100.0, 150.0, 150.0), hits.sink());
    println!("entries in (100,100)..(150,150): {}", hits.len());

    let mut nearest = Vec::new();
    index.nearest_n(
        Point::new(250.0, 250.0),
        |id| {
            nearest.push(id);
            true
        },
        5,
        f32::INFINITY,
    );
    println!("five nearest to the center: {nearest:?}");
}
