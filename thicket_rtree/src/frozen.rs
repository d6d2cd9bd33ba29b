// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frozen index: a read-only snapshot of a tree, produced by
//! transferring the node arena out of the mutable instance.

use crate::geom::{Point, Rect};
use crate::node::Node;
use crate::query::{self, NodeSource};
use crate::tree::RTree;

/// An immutable R-tree snapshot supporting queries only.
///
/// Produced by [`RTree::to_index`], which empties the source tree. Because
/// the index never changes, it can be shared freely and queried from
/// multiple threads.
pub struct FrozenIndex {
    nodes: Vec<Option<Node>>,
    root_node_id: i32,
    size: usize,
}

impl std::fmt::Debug for FrozenIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrozenIndex")
            .field("size", &self.size)
            .field("arena_nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl FrozenIndex {
    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The bounds of all entries, or `None` if the index is empty.
    pub fn bounds(&self) -> Option<Rect> {
        query::bounds(self)
    }

    /// Call `on_hit` with the id of every entry intersecting `rect`.
    pub fn intersects<F: FnMut(i32) -> bool>(&self, rect: &Rect, on_hit: F) {
        query::intersects(self, rect, on_hit);
    }

    /// Call `on_hit` with the id of every entry contained by `rect`.
    pub fn contains<F: FnMut(i32) -> bool>(&self, rect: &Rect, on_hit: F) {
        query::contains(self, rect, on_hit);
    }

    /// Call `on_hit` with the id of every entry nearest to `p`.
    pub fn nearest<F: FnMut(i32) -> bool>(&self, p: Point, on_hit: F, furthest_distance: f32) {
        query::nearest(self, p, on_hit, furthest_distance);
    }

    /// Call `on_hit` with the ids of the `count` entries nearest to `p`, in
    /// order of increasing distance.
    pub fn nearest_n<F: FnMut(i32) -> bool>(
        &self,
        p: Point,
        on_hit: F,
        count: usize,
        furthest_distance: f32,
    ) {
        query::nearest_n(self, p, on_hit, count, furthest_distance);
    }

    /// Like [`FrozenIndex::nearest_n`] but without the distance ordering.
    pub fn nearest_n_unsorted<F: FnMut(i32) -> bool>(
        &self,
        p: Point,
        on_hit: F,
        count: usize,
        furthest_distance: f32,
    ) {
        query::nearest_n_unsorted(self, p, on_hit, count, furthest_distance);
    }

    pub(crate) fn nodes(&self) -> &[Option<Node>] {
        &self.nodes
    }
}

impl NodeSource for FrozenIndex {
    fn root_node_id(&self) -> i32 {
        self.root_node_id
    }

    fn node(&self, id: i32) -> Option<&Node> {
        self.nodes.get(id as usize).and_then(|slot| slot.as_ref())
    }
}

impl RTree {
    /// Transfer this tree's contents into a read-only [`FrozenIndex`],
    /// leaving the tree empty.
    ///
    /// Small or hole-sparse arenas transfer as-is. An arena where at least
    /// a tenth of the slots are holes is compacted: live nodes are
    /// renumbered densely so the frozen structure wastes no space.
    pub fn to_index(&mut self) -> FrozenIndex {
        if self.size == 0 {
            self.clear();
            return FrozenIndex {
                nodes: Vec::new(),
                root_node_id: 0,
                size: 0,
            };
        }

        let deleted = self.free_node_ids.len();
        let nodes = std::mem::take(&mut self.nodes);
        let root_node_id = self.root_node_id;
        let size = self.size;
        self.clear();

        if size < 128 || deleted == 0 || deleted < size / 10 {
            return FrozenIndex {
                nodes,
                root_node_id,
                size,
            };
        }
        let (nodes, root_node_id) = compact(nodes, root_node_id);
        FrozenIndex {
            nodes,
            root_node_id,
            size,
        }
    }
}

/// Renumber live nodes densely in traversal order, rewriting internal
/// child ids. The root receives id 0.
fn compact(mut nodes: Vec<Option<Node>>, root_node_id: i32) -> (Vec<Option<Node>>, i32) {
    let mut remap = vec![-1_i32; nodes.len()];
    let mut order = Vec::new();
    let mut stack = vec![root_node_id];
    while let Some(old_id) = stack.pop() {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "node ids are 32-bit by construction"
        )]
        {
            remap[old_id as usize] = order.len() as i32;
        }
        order.push(old_id);
        if let Some(n) = nodes[old_id as usize].as_ref() {
            if !n.is_leaf() {
                for i in 0..n.entry_count {
                    stack.push(n.ids[i]);
                }
            }
        }
    }

    let mut compacted = Vec::with_capacity(order.len());
    for old_id in order {
        let mut n = nodes[old_id as usize]
            .take()
            .expect("compaction reached a missing node");
        n.node_id = remap[old_id as usize];
        if !n.is_leaf() {
            for i in 0..n.entry_count {
                n.ids[i] = remap[n.ids[i] as usize];
            }
        }
        compacted.push(Some(n));
    }
    (compacted, 0)
}
