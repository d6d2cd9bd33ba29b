// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! R-tree basics.
//!
//! Build a small tree, run the four query kinds, and delete an entry.
//!
//! Run:
//! - `cargo run -p thicket_demos --example basic_rtree`

use thicket_rtree::{IdCollector, Point, RTree, Rect};

fn main() {
    let mut tree = RTree::with_defaults();
    tree.add(Rect::new(0.0, 0.0, 10.0, 10.0), 1);
    tree.add(Rect::new(5.0, 5.0, 15.0, 15.0), 2);
    tree.add(Rect::new(20.0, 20.0, 30.0, 30.0), 3);
    tree.add(Rect::new(2.0, 2.0, 4.0, 4.0), 4);

    println!("size: {}", tree.len());
    println!("bounds: {:?}", tree.bounds());

    let mut intersecting = IdCollector::new();
    tree.intersects(&Rect::new(4.0, 4.0, 6.0, 6.0), intersecting.sink());
    println!("intersecting (4,4)..(6,6): {:?}", intersecting.into_sorted());

    let mut contained = IdCollector::new();
    tree.contains(&Rect::new(0.0, 0.0, 12.0, 12.0), contained.sink());
    println!("contained by (0,0)..(12,12): {:?}", contained.into_sorted());

    let mut nearest = IdCollector::new();
    tree.nearest(Point::new(18.0, 18.0), nearest.sink(), f32::INFINITY);
    println!("nearest to (18,18): {:?}", nearest.into_vec());

    let mut nearest_two = Vec::new();
    tree.nearest_n(
        Point::new(0.0, 0.0),
        |id| {
            nearest_two.push(id);
            true
        },
        2,
        f32::INFINITY,
    );
    println!("two nearest to the origin, closest first: {nearest_two:?}");

    let removed = tree.delete(Rect::new(2.0, 2.0, 4.0, 4.0), 4);
    println!("deleted id 4: {removed}, size now {}", tree.len());
}
