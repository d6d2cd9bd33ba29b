// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A callback decorator that gathers matching ids for later inspection.

/// Collects the ids a query reports, optionally sorting them afterwards.
///
/// ```rust
/// use thicket_rtree::{IdCollector, RTree, Rect};
///
/// let mut tree = RTree::with_defaults();
/// tree.add(Rect::new(0.0, 0.0, 1.0, 1.0), 2);
/// tree.add(Rect::new(0.5, 0.5, 2.0, 2.0), 1);
///
/// let mut hits = IdCollector::new();
/// tree.intersects(&Rect::new(0.0, 0.0, 3.0, 3.0), hits.sink());
/// assert_eq!(hits.into_sorted(), vec![1, 2]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct IdCollector {
    ids: Vec<i32>,
}

impl IdCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that records every id and never halts the traversal.
    pub fn sink(&mut self) -> impl FnMut(i32) -> bool + '_ {
        let ids = &mut self.ids;
        move |id| {
            ids.push(id);
            true
        }
    }

    /// Number of ids collected so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The collected ids in visit order.
    pub fn into_vec(self) -> Vec<i32> {
        self.ids
    }

    /// The collected ids sorted ascending.
    pub fn into_sorted(mut self) -> Vec<i32> {
        self.ids.sort_unstable();
        self.ids
    }
}
