// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thicket R-tree: an in-memory 2D spatial index over flat primitive
//! storage.
//!
//! A [`RTree`] indexes axis-aligned rectangles identified by non-negative
//! `i32` ids and answers four kinds of spatial query:
//!
//! - [`RTree::intersects`]: every entry intersecting a rectangle.
//! - [`RTree::contains`]: every entry contained by a rectangle.
//! - [`RTree::nearest`]: every entry nearest to a point (equidistant
//!   nearest entries are all reported).
//! - [`RTree::nearest_n`] / [`RTree::nearest_n_unsorted`]: the N entries
//!   nearest to a point, with or without distance ordering.
//!
//! Queries report ids through a callback returning `bool`; returning
//! `false` halts the traversal. A mutable tree can be frozen into a
//! read-only [`FrozenIndex`] sharing the same query surface.
//!
//! Entry rectangles are stored in per-node parallel coordinate arrays held
//! in a flat node arena, which keeps the hot traversal loops scanning
//! dense primitive storage instead of chasing per-entry allocations.
//!
//! # Example
//!
//! ```rust
//! use thicket_rtree::{Point, RTree, Rect};
//!
//! let mut tree = RTree::with_defaults();
//! tree.add(Rect::new(0.0, 0.0, 2.0, 2.0), 1);
//! tree.add(Rect::new(10.0, 10.0, 12.0, 12.0), 2);
//!
//! let mut hits = Vec::new();
//! tree.intersects(&Rect::new(1.0, 1.0, 3.0, 3.0), |id| {
//!     hits.push(id);
//!     true
//! });
//! assert_eq!(hits, vec![1]);
//!
//! let mut nearest = Vec::new();
//! tree.nearest_n(Point::new(9.0, 9.0), |id| {
//!     nearest.push(id);
//!     true
//! }, 1, f32::INFINITY);
//! assert_eq!(nearest, vec![2]);
//!
//! // Freeze into a read-only index; the tree is left empty.
//! let index = tree.to_index();
//! assert_eq!(index.len(), 2);
//! ```
//!
//! # Re-entrancy
//!
//! A tree reuses internal scratch buffers across operations, so mutating
//! it from within one of its own query callbacks is not supported.
//! Callbacks may freely use other trees or frozen indexes.
//!
//! # Float semantics
//!
//! Coordinates are `f32` and are assumed not to be NaN. Rectangles that
//! touch only along an edge count as intersecting, and a rectangle
//! contains itself.

pub mod buf;
pub mod codec;
pub mod collect;
pub mod config;
pub mod geom;
pub mod heap;
mod frozen;
mod node;
mod query;
mod tree;

pub use codec::DecodeError;
pub use collect::IdCollector;
pub use config::Config;
pub use frozen::FrozenIndex;
pub use geom::{Point, Rect};
pub use heap::{PriorityQueue, SortOrder};
pub use tree::RTree;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn empty_tree_behavior() {
        let mut tree = RTree::with_defaults();
        assert_eq!(tree.len(), 0);
        assert!(tree.bounds().is_none());
        assert!(!tree.delete(Rect::new(0.0, 0.0, 0.0, 0.0), 1));
        tree.nearest_n(
            Point::new(0.0, 0.0),
            |_| panic!("nothing to report"),
            5,
            f32::INFINITY,
        );
        tree.intersects(&Rect::new(-10.0, -10.0, 10.0, 10.0), |_| {
            panic!("nothing to report")
        });
    }

    #[test]
    fn intersects_reports_only_overlapping_entries() {
        let mut tree = RTree::with_defaults();
        tree.add(Rect::new(0.0, 0.0, 0.0, 0.0), 1);
        tree.add(Rect::new(10.0, 10.0, 10.0, 10.0), 2);

        let mut hits = IdCollector::new();
        tree.intersects(&Rect::new(-1.0, -1.0, 1.0, 1.0), hits.sink());
        assert_eq!(hits.into_sorted(), vec![1]);
    }

    #[test]
    fn intersection_scenario() {
        let rects = [
            Rect::new(0.0, 0.0, 0.0, 0.0),
            Rect::new(1.0, 1.0, 1.0, 1.0),
            Rect::new(2.0, 2.0, 6.0, 6.0),
            Rect::new(3.0, 3.0, 7.0, 5.0),
            Rect::new(3.0, 3.0, 5.0, 7.0),
            Rect::new(1.0, 3.0, 5.0, 5.0),
            Rect::new(3.0, 1.0, 5.0, 5.0),
        ];
        let mut tree = RTree::with_defaults();
        for (i, r) in rects.iter().enumerate() {
            tree.add(*r, i as i32 + 1);
        }

        let mut hits = IdCollector::new();
        tree.intersects(&Rect::new(2.0, 2.0, 6.0, 6.0), hits.sink());
        assert_eq!(hits.into_sorted(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn contains_is_stricter_than_intersects() {
        let mut tree = RTree::with_defaults();
        tree.add(Rect::new(1.0, 1.0, 2.0, 2.0), 1);
        tree.add(Rect::new(1.0, 1.0, 5.0, 5.0), 2);
        tree.add(Rect::new(3.0, 3.0, 4.0, 4.0), 3);

        let probe = Rect::new(0.0, 0.0, 4.5, 4.5);
        let mut contained = IdCollector::new();
        tree.contains(&probe, contained.sink());
        assert_eq!(contained.into_sorted(), vec![1, 3]);

        let mut intersecting = IdCollector::new();
        tree.intersects(&probe, intersecting.sink());
        assert_eq!(intersecting.into_sorted(), vec![1, 2, 3]);
    }

    #[test]
    fn nearest_reports_all_containing_rectangles() {
        let mut tree = RTree::with_defaults();
        tree.add(Rect::new(0.0, 0.0, 10.0, 10.0), 1);
        tree.add(Rect::new(4.0, 4.0, 6.0, 6.0), 2);
        tree.add(Rect::new(5.0, 0.0, 10.0, 10.0), 3);
        tree.add(Rect::new(20.0, 20.0, 21.0, 21.0), 4);

        // The point lies inside three overlapping rectangles, all at
        // distance zero.
        let mut hits = IdCollector::new();
        tree.nearest(Point::new(5.5, 5.5), hits.sink(), f32::INFINITY);
        assert_eq!(hits.into_sorted(), vec![1, 2, 3]);
    }

    #[test]
    fn nearest_n_orders_by_distance() {
        let mut tree = RTree::new(Config::new(8, 4));
        let mut rng = StdRng::seed_from_u64(99);
        let mut rects = Vec::new();
        for id in 0..100 {
            let x: f32 = rng.random_range(0.0..100.0);
            let y: f32 = rng.random_range(0.0..100.0);
            let r = Rect::new(x, y, x + 1.0, y + 1.0);
            tree.add(r, id);
            rects.push(r);
        }

        let p = Point::new(50.0, 50.0);
        let mut reported = Vec::new();
        tree.nearest_n(p, |id| {
            reported.push(id);
            true
        }, 10, f32::INFINITY);

        assert!(reported.len() >= 10);
        let distances: Vec<f32> = reported
            .iter()
            .map(|&id| rects[id as usize].distance_sq(p))
            .collect();
        for pair in distances.windows(2) {
            assert!(pair[0] <= pair[1], "distances out of order: {distances:?}");
        }

        // Compare against a linear scan: everything at or inside the cutoff
        // distance must be reported.
        let mut all: Vec<(f32, i32)> = rects
            .iter()
            .enumerate()
            .map(|(id, r)| (r.distance_sq(p), id as i32))
            .collect();
        all.sort_by(|a, b| a.partial_cmp(b).expect("distances are not NaN"));
        let cutoff = all[9].0;
        let expected: Vec<i32> = all
            .iter()
            .filter(|&&(d, _)| d <= cutoff)
            .map(|&(_, id)| id)
            .collect();
        let mut reported_sorted = reported.clone();
        reported_sorted.sort_unstable();
        let mut expected_sorted = expected;
        expected_sorted.sort_unstable();
        assert_eq!(reported_sorted, expected_sorted);
    }

    #[test]
    fn nearest_n_variants_agree() {
        let mut tree = RTree::new(Config::new(6, 3));
        let mut rng = StdRng::seed_from_u64(7);
        for id in 0..150 {
            let x: f32 = rng.random_range(0.0..60.0);
            let y: f32 = rng.random_range(0.0..60.0);
            tree.add(Rect::new(x, y, x + 2.0, y + 2.0), id);
        }

        let p = Point::new(30.0, 30.0);
        let mut sorted = IdCollector::new();
        tree.nearest_n(p, sorted.sink(), 15, f32::INFINITY);
        let mut unsorted = IdCollector::new();
        tree.nearest_n_unsorted(p, unsorted.sink(), 15, f32::INFINITY);
        assert_eq!(sorted.into_sorted(), unsorted.into_sorted());
    }

    #[test]
    fn furthest_distance_limits_results() {
        let mut tree = RTree::with_defaults();
        tree.add(Rect::new(0.0, 0.0, 1.0, 1.0), 1);
        tree.add(Rect::new(5.0, 0.0, 6.0, 1.0), 2);
        tree.add(Rect::new(100.0, 0.0, 101.0, 1.0), 3);

        // Only two entries lie within distance 10 of the origin, even
        // though five were requested.
        let mut hits = IdCollector::new();
        tree.nearest_n(Point::new(0.0, 0.0), hits.sink(), 5, 10.0);
        assert_eq!(hits.into_sorted(), vec![1, 2]);

        let mut nearest = IdCollector::new();
        tree.nearest(Point::new(102.0, 0.5), nearest.sink(), 0.5);
        assert!(nearest.is_empty());
    }

    #[test]
    fn callback_false_halts_traversal() {
        let mut tree = RTree::new(Config::new(4, 2));
        for id in 0..60 {
            let x = (id % 10) as f32 * 2.0;
            let y = (id / 10) as f32 * 2.0;
            tree.add(Rect::new(x, y, x + 1.5, y + 1.5), id);
        }

        let mut seen = 0;
        tree.intersects(&Rect::new(0.0, 0.0, 20.0, 12.0), |_| {
            seen += 1;
            seen < 5
        });
        assert_eq!(seen, 5);

        let mut seen = 0;
        tree.nearest_n(Point::new(0.0, 0.0), |_| {
            seen += 1;
            false
        }, 10, f32::INFINITY);
        assert_eq!(seen, 1);
    }

    #[test]
    fn queries_agree_before_and_after_freezing() {
        let mut tree = RTree::new(Config::new(6, 3));
        let mut rng = StdRng::seed_from_u64(3);
        for id in 0..50 {
            let x: f32 = rng.random_range(0.0..40.0);
            let y: f32 = rng.random_range(0.0..40.0);
            tree.add(Rect::new(x, y, x + 3.0, y + 3.0), id);
        }
        let probe = tree.bounds().expect("tree is not empty");

        let mut before = IdCollector::new();
        tree.intersects(&probe, before.sink());
        let index = tree.to_index();
        let mut after = IdCollector::new();
        index.intersects(&probe, after.sink());
        assert_eq!(before.into_sorted(), after.into_sorted());
    }
}
