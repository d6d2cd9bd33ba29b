// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Indexing kurbo geometry.
//!
//! Layout code that works in `kurbo::Rect` can feed an R-tree by
//! converting at the boundary; queries come back as ids into the original
//! slice.
//!
//! Run:
//! - `cargo run -p thicket_demos --example kurbo_interop`

use thicket_rtree::{IdCollector, RTree, Rect};

fn to_index_rect(r: kurbo::Rect) -> Rect {
    Rect::new(r.x0 as f32, r.y0 as f32, r.x1 as f32, r.y1 as f32)
}

fn main() {
    let widgets = [
        kurbo::Rect::new(0.0, 0.0, 200.0, 40.0),
        kurbo::Rect::new(0.0, 40.0, 60.0, 400.0),
        kurbo::Rect::new(60.0, 40.0, 200.0, 400.0),
        kurbo::Rect::new(80.0, 60.0, 180.0, 120.0),
    ];

    let mut tree = RTree::with_defaults();
    for (i, r) in widgets.iter().enumerate() {
        tree.add(to_index_rect(*r), i as i32);
    }

    // Which widgets does a drag-selection touch?
    let selection = kurbo::Rect::new(70.0, 50.0, 190.0, 130.0);
    let mut hits = IdCollector::new();
    tree.intersects(&to_index_rect(selection), hits.sink());
    for id in hits.into_sorted() {
        println!("selection touches widget {id}: {:?}", widgets[id as usize]);
    }
}
