// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mutable R-tree: node arena, Guttman insertion and deletion, and the
//! consistency checker.

use crate::buf::IntBuf;
use crate::config::Config;
use crate::geom::{self, Point, Rect};
use crate::node::{Node, UNUSED_ID};
use crate::query::{self, NodeSource};

const STATUS_ASSIGNED: u8 = 0;
const STATUS_UNASSIGNED: u8 = 1;

/// A dynamic 2D R-tree indexing integer-identified rectangles.
///
/// Entries are added with [`RTree::add`] and removed with [`RTree::delete`];
/// the five query operations report matching entry ids through a callback
/// that returns `false` to halt the traversal.
///
/// The tree reuses per-instance scratch buffers across mutations, so no
/// mutating operation may be re-entered from within a query callback on the
/// same tree. Callbacks are free to query a different tree or a
/// [`crate::FrozenIndex`].
pub struct RTree {
    pub(crate) max_node_entries: usize,
    pub(crate) min_node_entries: usize,

    /// Node arena indexed by node id. Released ids go on the free list and
    /// leave a `None` hole until reused.
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) free_node_ids: IntBuf,

    pub(crate) root_node_id: i32,
    /// Height of the tree; leaves are always level 1.
    pub(crate) tree_height: i32,
    pub(crate) size: usize,

    /// Path stacks from the root down to the current node, reused across
    /// mutations so inserts and deletes do not allocate.
    parents: IntBuf,
    parents_entry: IntBuf,
    /// Per-entry assignment marks during a node split.
    entry_status: Box<[u8]>,
}

impl Default for RTree {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for RTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|slot| slot.is_some()).count();
        f.debug_struct("RTree")
            .field("max_node_entries", &self.max_node_entries)
            .field("min_node_entries", &self.min_node_entries)
            .field("size", &self.size)
            .field("height", &self.tree_height)
            .field("arena_nodes", &total)
            .field("alive", &alive)
            .finish_non_exhaustive()
    }
}

impl RTree {
    /// Create an empty tree with the given fan-out configuration.
    pub fn new(config: Config) -> Self {
        let mut tree = Self {
            max_node_entries: config.max_node_entries,
            min_node_entries: config.min_node_entries,
            nodes: Vec::new(),
            free_node_ids: IntBuf::new(),
            root_node_id: 0,
            tree_height: 1,
            size: 0,
            parents: IntBuf::new(),
            parents_entry: IntBuf::new(),
            entry_status: vec![STATUS_UNASSIGNED; config.max_node_entries].into_boxed_slice(),
        };
        tree.nodes
            .push(Some(Node::new(0, 1, tree.max_node_entries)));
        tree
    }

    /// Create an empty tree with the default configuration.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Assemble a tree from decoded state. The caller guarantees the parts
    /// describe a structurally valid tree.
    pub(crate) fn from_parts(
        max_node_entries: usize,
        min_node_entries: usize,
        nodes: Vec<Option<Node>>,
        free_node_ids: IntBuf,
        root_node_id: i32,
        tree_height: i32,
        size: usize,
    ) -> Self {
        Self {
            max_node_entries,
            min_node_entries,
            nodes,
            free_node_ids,
            root_node_id,
            tree_height,
            size,
            parents: IntBuf::new(),
            parents_entry: IntBuf::new(),
            entry_status: vec![STATUS_UNASSIGNED; max_node_entries].into_boxed_slice(),
        }
    }

    /// Maximum number of entries per node.
    pub fn max_node_entries(&self) -> usize {
        self.max_node_entries
    }

    /// Minimum number of entries per non-root node.
    pub fn min_node_entries(&self) -> usize {
        self.min_node_entries
    }

    /// Number of entries in the tree.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The bounds of all entries, or `None` if the tree is empty.
    pub fn bounds(&self) -> Option<Rect> {
        query::bounds(self)
    }

    /// Remove all entries and release all nodes.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_node_ids.clear();
        self.parents.clear();
        self.parents_entry.clear();
        self.tree_height = 1;
        self.root_node_id = 0;
        self.size = 0;
        self.nodes
            .push(Some(Node::new(0, 1, self.max_node_entries)));
    }

    /// Add a rectangle with the given id.
    ///
    /// Ids must be non-negative; adding more than one rectangle with the
    /// same id is undefined (deletion will remove an arbitrary match).
    pub fn add(&mut self, rect: Rect, id: i32) {
        debug_assert!(id >= 0, "entry ids must be non-negative");
        log::debug!("adding rectangle {rect:?}, id {id}");
        self.add_entry_at_level(rect.min_x, rect.min_y, rect.max_x, rect.max_y, id, 1);
        self.size += 1;
        self.internal_check();
    }

    /// Delete the entry matching both `rect` (exactly) and `id`.
    ///
    /// Returns `false` if no such entry exists.
    pub fn delete(&mut self, rect: Rect, id: i32) -> bool {
        // The find-leaf descent only follows internal entries whose MBR
        // contains the rectangle: an entry can only live below such nodes.
        self.parents.reset();
        self.parents.push(self.root_node_id);
        self.parents_entry.reset();
        self.parents_entry.push(-1);

        let mut found: Option<(i32, usize)> = None;
        while found.is_none() && !self.parents.is_empty() {
            let n_id = self.parents.peek();
            let start_index = (self.parents_entry.peek() + 1) as usize;

            enum Step {
                Descend(i32, usize),
                Found(usize),
                Exhausted,
            }
            let step = {
                let n = self.node_ref(n_id);
                if n.is_leaf() {
                    match n.find_entry(rect.min_x, rect.min_y, rect.max_x, rect.max_y, id) {
                        Some(i) => Step::Found(i),
                        None => Step::Exhausted,
                    }
                } else {
                    let mut descend = None;
                    for i in start_index..n.entry_count {
                        if n.entry_contains(i, &rect) {
                            descend = Some((n.ids[i], i));
                            break;
                        }
                    }
                    match descend {
                        Some((child, i)) => Step::Descend(child, i),
                        None => Step::Exhausted,
                    }
                }
            };

            match step {
                Step::Descend(child, i) => {
                    // remember where to resume when the child is exhausted
                    self.parents_entry.pop();
                    self.parents_entry.push(i as i32);
                    self.parents.push(child);
                    self.parents_entry.push(-1);
                    continue;
                }
                Step::Found(i) => {
                    found = Some((n_id, i));
                }
                Step::Exhausted => {}
            }
            self.parents.pop();
            self.parents_entry.pop();
        }

        if let Some((leaf_id, index)) = found {
            log::debug!("deleting entry {index} of node {leaf_id}, id {id}");
            self.node_mut(leaf_id).delete_entry(index);
            self.condense_tree(leaf_id);
            self.size -= 1;
        }

        // Shrink: while the root holds a single entry and is not a leaf, its
        // sole child becomes the new root.
        loop {
            let root = self.node_ref(self.root_node_id);
            if root.entry_count != 1 || self.tree_height <= 1 {
                break;
            }
            let new_root_id = root.ids[0];
            let old_root_id = self.root_node_id;
            self.release_node(old_root_id);
            self.root_node_id = new_root_id;
            self.tree_height -= 1;
        }

        // An empty tree keeps one leaf node around; restore its MBR to the
        // empty sentinel so the next add initializes it.
        if self.size == 0 {
            let root = self.node_mut(self.root_node_id);
            root.mbr_min_x = f32::MAX;
            root.mbr_min_y = f32::MAX;
            root.mbr_max_x = -f32::MAX;
            root.mbr_max_y = -f32::MAX;
        }

        self.internal_check();
        found.is_some()
    }

    /// Re-add every entry of a frozen index to this tree.
    pub fn extend_from_index(&mut self, index: &crate::FrozenIndex) {
        for node in index.nodes().iter().flatten() {
            if !node.is_leaf() {
                continue;
            }
            for i in 0..node.entry_count {
                self.add_entry_at_level(
                    node.entries_min_x[i],
                    node.entries_min_y[i],
                    node.entries_max_x[i],
                    node.entries_max_y[i],
                    node.ids[i],
                    1,
                );
                self.size += 1;
                self.internal_check();
            }
        }
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
    ///
    /// All equidistant nearest entries are reported. Entries further than
    /// `furthest_distance` are never reported.
    pub fn nearest<F: FnMut(i32) -> bool>(&self, p: Point, on_hit: F, furthest_distance: f32) {
        query::nearest(self, p, on_hit, furthest_distance);
    }

    /// Call `on_hit` with the ids of the `count` entries nearest to `p`, in
    /// order of increasing distance.
    ///
    /// Fewer ids are reported if fewer entries lie within
    /// `furthest_distance`; more if entries tie at the cutoff distance.
    pub fn nearest_n<F: FnMut(i32) -> bool>(
        &self,
        p: Point,
        on_hit: F,
        count: usize,
        furthest_distance: f32,
    ) {
        query::nearest_n(self, p, on_hit, count, furthest_distance);
    }

    /// Like [`RTree::nearest_n`] but without the distance ordering, which is
    /// faster when order does not matter.
    pub fn nearest_n_unsorted<F: FnMut(i32) -> bool>(
        &self,
        p: Point,
        on_hit: F,
        count: usize,
        furthest_distance: f32,
    ) {
        query::nearest_n_unsorted(self, p, on_hit, count, furthest_distance);
    }

    /// Verify the structural invariants of the tree, reporting any
    /// discrepancy through the `log` channel.
    pub fn check_consistency(&self) -> bool {
        let mut leaf_entries = 0;
        if !self.check_node(self.root_node_id, self.tree_height, None, &mut leaf_entries) {
            return false;
        }
        if leaf_entries != self.size {
            log::error!(
                "tree size {} does not match {leaf_entries} reachable leaf entries",
                self.size
            );
            return false;
        }
        true
    }

    // ---- insertion ----

    /// Add an entry at the given level; level 1 for external adds, higher
    /// for re-inserts during condensation. Does not touch `size`.
    pub(crate) fn add_entry_at_level(
        &mut self,
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        id: i32,
        level: i32,
    ) {
        let n_id = self.choose_node(min_x, min_y, max_x, max_y, level);

        let mut split_id = None;
        if self.node_ref(n_id).entry_count < self.max_node_entries {
            self.node_mut(n_id).add_entry(min_x, min_y, max_x, max_y, id);
        } else {
            split_id = Some(self.split_node(n_id, min_x, min_y, max_x, max_y, id));
        }

        // Propagate MBR updates (and any split) back up the recorded path.
        if let Some(new_node_id) = self.adjust_tree(n_id, split_id) {
            // The root itself split: grow the tree by one level.
            let old_root_id = self.root_node_id;
            let new_root_id = self.next_node_id();
            self.tree_height += 1;
            let mut root = Node::new(new_root_id, self.tree_height, self.max_node_entries);
            {
                let n = self.node_ref(new_node_id);
                root.add_entry(n.mbr_min_x, n.mbr_min_y, n.mbr_max_x, n.mbr_max_y, new_node_id);
            }
            {
                let n = self.node_ref(old_root_id);
                root.add_entry(n.mbr_min_x, n.mbr_min_y, n.mbr_max_x, n.mbr_max_y, old_root_id);
            }
            self.put_node(new_root_id, root);
            self.root_node_id = new_root_id;
        }
    }

    /// Walk from the root to the target level, picking at each step the
    /// entry needing least enlargement (ties broken by smaller area), and
    /// record the path in the parent stacks.
    fn choose_node(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32, level: i32) -> i32 {
        self.parents.reset();
        self.parents_entry.reset();

        let mut n_id = self.root_node_id;
        loop {
            let descend = {
                let n = self.node_ref(n_id);
                if n.level == level {
                    None
                } else {
                    let mut index = 0;
                    let mut best_area = geom::area(
                        n.entries_min_x[0],
                        n.entries_min_y[0],
                        n.entries_max_x[0],
                        n.entries_max_y[0],
                    );
                    let mut least_enlargement = geom::enlargement(
                        n.entries_min_x[0],
                        n.entries_min_y[0],
                        n.entries_max_x[0],
                        n.entries_max_y[0],
                        best_area,
                        min_x,
                        min_y,
                        max_x,
                        max_y,
                    );
                    for i in 1..n.entry_count {
                        let entry_area = geom::area(
                            n.entries_min_x[i],
                            n.entries_min_y[i],
                            n.entries_max_x[i],
                            n.entries_max_y[i],
                        );
                        let entry_enlargement = geom::enlargement(
                            n.entries_min_x[i],
                            n.entries_min_y[i],
                            n.entries_max_x[i],
                            n.entries_max_y[i],
                            entry_area,
                            min_x,
                            min_y,
                            max_x,
                            max_y,
                        );
                        if entry_enlargement < least_enlargement
                            || (entry_enlargement == least_enlargement && entry_area < best_area)
                        {
                            index = i;
                            best_area = entry_area;
                            least_enlargement = entry_enlargement;
                        }
                    }
                    Some((index, n.ids[index]))
                }
            };

            match descend {
                None => return n_id,
                Some((index, child_id)) => {
                    self.parents.push(n_id);
                    self.parents_entry.push(index as i32);
                    n_id = child_id;
                }
            }
        }
    }

    /// Ascend the recorded path, refreshing each parent's entry for the
    /// changed child and installing (or propagating) a split sibling.
    /// Returns the sibling of the root if the split reached it.
    fn adjust_tree(&mut self, mut n_id: i32, mut nn_id: Option<i32>) -> Option<i32> {
        while self.node_ref(n_id).level != self.tree_height {
            let parent_id = self.parents.pop();
            let entry = self.parents_entry.pop() as usize;

            let (n_min_x, n_min_y, n_max_x, n_max_y) = {
                let n = self.node_ref(n_id);
                (n.mbr_min_x, n.mbr_min_y, n.mbr_max_x, n.mbr_max_y)
            };
            {
                let parent = self.node_mut(parent_id);
                if parent.ids[entry] != n_id {
                    log::error!(
                        "entry {entry} of node {} should reference node {n_id}, references {}",
                        parent.node_id,
                        parent.ids[entry]
                    );
                }
                if parent.entries_min_x[entry] != n_min_x
                    || parent.entries_min_y[entry] != n_min_y
                    || parent.entries_max_x[entry] != n_max_x
                    || parent.entries_max_y[entry] != n_max_y
                {
                    parent.entries_min_x[entry] = n_min_x;
                    parent.entries_min_y[entry] = n_min_y;
                    parent.entries_max_x[entry] = n_max_x;
                    parent.entries_max_y[entry] = n_max_y;
                    parent.recalculate_mbr();
                }
            }

            let mut propagated = None;
            if let Some(nn) = nn_id {
                let (nn_min_x, nn_min_y, nn_max_x, nn_max_y) = {
                    let n = self.node_ref(nn);
                    (n.mbr_min_x, n.mbr_min_y, n.mbr_max_x, n.mbr_max_y)
                };
                if self.node_ref(parent_id).entry_count < self.max_node_entries {
                    self.node_mut(parent_id)
                        .add_entry(nn_min_x, nn_min_y, nn_max_x, nn_max_y, nn);
                } else {
                    propagated =
                        Some(self.split_node(parent_id, nn_min_x, nn_min_y, nn_max_x, nn_max_y, nn));
                }
            }

            n_id = parent_id;
            nn_id = propagated;
        }
        nn_id
    }

    // ---- splitting (Guttman quadratic) ----

    /// Split a full node receiving one more entry, distributing entries
    /// between the retained node and a freshly allocated sibling. Returns
    /// the sibling's id.
    fn split_node(
        &mut self,
        n_id: i32,
        new_min_x: f32,
        new_min_y: f32,
        new_max_x: f32,
        new_max_y: f32,
        new_id: i32,
    ) -> i32 {
        self.entry_status.fill(STATUS_UNASSIGNED);

        let mut n = self.take_node(n_id);
        let new_node_id = self.next_node_id();
        let mut new_node = Node::new(new_node_id, n.level, self.max_node_entries);

        self.pick_seeds(&mut n, new_min_x, new_min_y, new_max_x, new_max_y, new_id, &mut new_node);

        while n.entry_count + new_node.entry_count < self.max_node_entries + 1 {
            if self.max_node_entries + 1 - new_node.entry_count == self.min_node_entries {
                // The rest must go to the original node for it to reach the
                // minimum.
                for i in 0..self.max_node_entries {
                    if self.entry_status[i] == STATUS_UNASSIGNED {
                        self.entry_status[i] = STATUS_ASSIGNED;
                        if n.entries_min_x[i] < n.mbr_min_x {
                            n.mbr_min_x = n.entries_min_x[i];
                        }
                        if n.entries_min_y[i] < n.mbr_min_y {
                            n.mbr_min_y = n.entries_min_y[i];
                        }
                        if n.entries_max_x[i] > n.mbr_max_x {
                            n.mbr_max_x = n.entries_max_x[i];
                        }
                        if n.entries_max_y[i] > n.mbr_max_y {
                            n.mbr_max_y = n.entries_max_y[i];
                        }
                        n.entry_count += 1;
                    }
                }
                break;
            }
            if self.max_node_entries + 1 - n.entry_count == self.min_node_entries {
                // The rest must go to the new node.
                for i in 0..self.max_node_entries {
                    if self.entry_status[i] == STATUS_UNASSIGNED {
                        self.entry_status[i] = STATUS_ASSIGNED;
                        new_node.add_entry(
                            n.entries_min_x[i],
                            n.entries_min_y[i],
                            n.entries_max_x[i],
                            n.entries_max_y[i],
                            n.ids[i],
                        );
                        n.ids[i] = UNUSED_ID;
                    }
                }
                break;
            }
            self.pick_next(&mut n, &mut new_node);
        }

        n.reorganize();
        self.put_node(n_id, n);
        self.put_node(new_node_id, new_node);
        new_node_id
    }

    /// Choose the two seed entries anchoring the split groups: per
    /// dimension, the entry with the highest low side against the entry
    /// with the lowest high side, keeping the pair with the greatest
    /// normalized separation. The new rectangle participates as a
    /// candidate (index -1).
    #[allow(clippy::too_many_arguments)]
    fn pick_seeds(
        &mut self,
        n: &mut Node,
        new_min_x: f32,
        new_min_y: f32,
        new_max_x: f32,
        new_max_y: f32,
        new_id: i32,
        new_node: &mut Node,
    ) {
        // For seed picking the node MBR covers the new rectangle as well.
        if new_min_x < n.mbr_min_x {
            n.mbr_min_x = new_min_x;
        }
        if new_min_y < n.mbr_min_y {
            n.mbr_min_y = new_min_y;
        }
        if new_max_x > n.mbr_max_x {
            n.mbr_max_x = new_max_x;
        }
        if new_max_y > n.mbr_max_y {
            n.mbr_max_y = new_max_y;
        }

        let (sep_x, hl_x, lh_x) = seeds_for_axis(
            &n.entries_min_x,
            &n.entries_max_x,
            n.entry_count,
            new_min_x,
            new_max_x,
            n.mbr_max_x - n.mbr_min_x,
        );
        let (sep_y, hl_y, lh_y) = seeds_for_axis(
            &n.entries_min_y,
            &n.entries_max_y,
            n.entry_count,
            new_min_y,
            new_max_y,
            n.mbr_max_y - n.mbr_min_y,
        );

        let (mut highest_low, mut lowest_high) = if sep_y >= sep_x {
            (hl_y, lh_y)
        } else {
            (hl_x, lh_x)
        };

        // When every entry overlaps the new rectangle, both seeds resolve to
        // it. Fall back to the entry with the smallest min-y against the one
        // with the largest max-x, which are always distinct.
        if highest_low == lowest_high {
            highest_low = -1;
            lowest_high = 0;
            let mut smallest_min_y = new_min_y;
            let mut largest_max_x = n.entries_max_x[0];
            for i in 1..n.entry_count {
                if n.entries_min_y[i] < smallest_min_y {
                    smallest_min_y = n.entries_min_y[i];
                    highest_low = i as i32;
                } else if n.entries_max_x[i] > largest_max_x {
                    largest_max_x = n.entries_max_x[i];
                    lowest_high = i as i32;
                }
            }
        }

        // The highest-low seed opens the new node; -1 means the new
        // rectangle itself, which otherwise takes over the vacated slot.
        if highest_low == -1 {
            new_node.add_entry(new_min_x, new_min_y, new_max_x, new_max_y, new_id);
        } else {
            let i = highest_low as usize;
            new_node.add_entry(
                n.entries_min_x[i],
                n.entries_min_y[i],
                n.entries_max_x[i],
                n.entries_max_y[i],
                n.ids[i],
            );
            n.entries_min_x[i] = new_min_x;
            n.entries_min_y[i] = new_min_y;
            n.entries_max_x[i] = new_max_x;
            n.entries_max_y[i] = new_max_y;
            n.ids[i] = new_id;
        }
        if lowest_high == -1 {
            lowest_high = highest_low;
        }

        let seed = lowest_high as usize;
        self.entry_status[seed] = STATUS_ASSIGNED;
        n.entry_count = 1;
        n.mbr_min_x = n.entries_min_x[seed];
        n.mbr_min_y = n.entries_min_y[seed];
        n.mbr_max_x = n.entries_max_x[seed];
        n.mbr_max_y = n.entries_max_y[seed];
    }

    /// Assign the unassigned entry whose routing matters most: the one with
    /// the greatest difference between the enlargements of the two group
    /// MBRs. Ties go to the smaller area, then the group with fewer
    /// entries, then the new node.
    fn pick_next(&mut self, n: &mut Node, new_node: &mut Node) {
        let mut max_difference = f32::NEG_INFINITY;
        let mut next = 0;
        let mut to_new_node = false;

        let n_area = geom::area(n.mbr_min_x, n.mbr_min_y, n.mbr_max_x, n.mbr_max_y);
        let new_node_area = geom::area(
            new_node.mbr_min_x,
            new_node.mbr_min_y,
            new_node.mbr_max_x,
            new_node.mbr_max_y,
        );

        for i in 0..self.max_node_entries {
            if self.entry_status[i] != STATUS_UNASSIGNED {
                continue;
            }
            if n.ids[i] == UNUSED_ID {
                log::error!("node {}: unassigned entry {i} has no id", n.node_id);
            }

            let n_increase = geom::enlargement(
                n.mbr_min_x,
                n.mbr_min_y,
                n.mbr_max_x,
                n.mbr_max_y,
                n_area,
                n.entries_min_x[i],
                n.entries_min_y[i],
                n.entries_max_x[i],
                n.entries_max_y[i],
            );
            let new_node_increase = geom::enlargement(
                new_node.mbr_min_x,
                new_node.mbr_min_y,
                new_node.mbr_max_x,
                new_node.mbr_max_y,
                new_node_area,
                n.entries_min_x[i],
                n.entries_min_y[i],
                n.entries_max_x[i],
                n.entries_max_y[i],
            );

            let difference = (n_increase - new_node_increase).abs();
            if difference > max_difference {
                next = i;
                to_new_node = if n_increase < new_node_increase {
                    false
                } else if new_node_increase < n_increase {
                    true
                } else if n_area < new_node_area {
                    false
                } else if new_node_area < n_area {
                    true
                } else if new_node.entry_count < n.entry_count {
                    true
                } else if n.entry_count < new_node.entry_count {
                    false
                } else {
                    true
                };
                max_difference = difference;
            }
        }

        self.entry_status[next] = STATUS_ASSIGNED;
        if to_new_node {
            new_node.add_entry(
                n.entries_min_x[next],
                n.entries_min_y[next],
                n.entries_max_x[next],
                n.entries_max_y[next],
                n.ids[next],
            );
            n.ids[next] = UNUSED_ID;
        } else {
            // The entry stays where it is; only the count and MBR change.
            if n.entries_min_x[next] < n.mbr_min_x {
                n.mbr_min_x = n.entries_min_x[next];
            }
            if n.entries_min_y[next] < n.mbr_min_y {
                n.mbr_min_y = n.entries_min_y[next];
            }
            if n.entries_max_x[next] > n.mbr_max_x {
                n.mbr_max_x = n.entries_max_x[next];
            }
            if n.entries_max_y[next] > n.mbr_max_y {
                n.mbr_max_y = n.entries_max_y[next];
            }
            n.entry_count += 1;
        }
    }

    // ---- deletion ----

    /// Walk upward from a shrunken leaf: eliminate under-full nodes
    /// (queueing them for reinsertion), otherwise tighten the parent's
    /// entry. Orphaned entries are reinserted at their original level.
    fn condense_tree(&mut self, leaf_id: i32) {
        let mut n_id = leaf_id;
        let mut eliminated = IntBuf::new();

        while self.node_ref(n_id).level != self.tree_height {
            let parent_id = self.parents.pop();
            let parent_entry = self.parents_entry.pop() as usize;

            let (under_full, n_min_x, n_min_y, n_max_x, n_max_y) = {
                let n = self.node_ref(n_id);
                (
                    n.entry_count < self.min_node_entries,
                    n.mbr_min_x,
                    n.mbr_min_y,
                    n.mbr_max_x,
                    n.mbr_max_y,
                )
            };

            if under_full {
                self.node_mut(parent_id).delete_entry(parent_entry);
                eliminated.push(n_id);
            } else {
                let parent = self.node_mut(parent_id);
                if parent.entries_min_x[parent_entry] != n_min_x
                    || parent.entries_min_y[parent_entry] != n_min_y
                    || parent.entries_max_x[parent_entry] != n_max_x
                    || parent.entries_max_y[parent_entry] != n_max_y
                {
                    let old_min_x = parent.entries_min_x[parent_entry];
                    let old_min_y = parent.entries_min_y[parent_entry];
                    let old_max_x = parent.entries_max_x[parent_entry];
                    let old_max_y = parent.entries_max_y[parent_entry];
                    parent.entries_min_x[parent_entry] = n_min_x;
                    parent.entries_min_y[parent_entry] = n_min_y;
                    parent.entries_max_x[parent_entry] = n_max_x;
                    parent.entries_max_y[parent_entry] = n_max_y;
                    parent.recalculate_mbr_if_influenced_by(
                        old_min_x, old_min_y, old_max_x, old_max_y,
                    );
                }
            }

            n_id = parent_id;
        }

        // Entries from eliminated leaves rejoin leaves; entries from higher
        // nodes rejoin at their original level so subtree leaves stay level
        // with the rest of the tree.
        while !eliminated.is_empty() {
            let e_id = eliminated.pop();
            let e = self.take_node(e_id);
            for j in 0..e.entry_count {
                self.add_entry_at_level(
                    e.entries_min_x[j],
                    e.entries_min_y[j],
                    e.entries_max_x[j],
                    e.entries_max_y[j],
                    e.ids[j],
                    e.level,
                );
            }
            self.free_node_ids.push(e_id);
        }
    }

    // ---- arena ----

    pub(crate) fn node_ref(&self, id: i32) -> &Node {
        self.nodes[id as usize].as_ref().expect("node id not in arena")
    }

    fn node_mut(&mut self, id: i32) -> &mut Node {
        self.nodes[id as usize].as_mut().expect("node id not in arena")
    }

    fn take_node(&mut self, id: i32) -> Node {
        self.nodes[id as usize].take().expect("node id not in arena")
    }

    fn put_node(&mut self, id: i32, node: Node) {
        let index = id as usize;
        if index == self.nodes.len() {
            self.nodes.push(Some(node));
        } else {
            self.nodes[index] = Some(node);
        }
    }

    fn next_node_id(&mut self) -> i32 {
        if self.free_node_ids.is_empty() {
            self.nodes.len() as i32
        } else {
            self.free_node_ids.pop()
        }
    }

    fn release_node(&mut self, id: i32) {
        self.nodes[id as usize] = None;
        self.free_node_ids.push(id);
    }

    // ---- consistency ----

    fn check_node(
        &self,
        node_id: i32,
        expected_level: i32,
        expected_mbr: Option<Rect>,
        leaf_entries: &mut usize,
    ) -> bool {
        let Some(n) = NodeSource::node(self, node_id) else {
            log::error!("could not read node {node_id}");
            return false;
        };

        if node_id == self.root_node_id && self.size == 0 && n.level != 1 {
            log::error!("tree is empty but root node is not at level 1");
            return false;
        }
        if n.level != expected_level {
            log::error!(
                "node {node_id}: expected level {expected_level}, actual level {}",
                n.level
            );
            return false;
        }
        if node_id != self.root_node_id
            && (n.entry_count < self.min_node_entries || n.entry_count > self.max_node_entries)
        {
            log::error!(
                "node {node_id}: entry count {} outside [{}, {}]",
                n.entry_count,
                self.min_node_entries,
                self.max_node_entries
            );
            return false;
        }

        let cached = n.mbr();
        let computed = n.computed_mbr();
        if cached != computed {
            log::error!("node {node_id}: cached MBR {cached:?} does not match computed {computed:?}");
            return false;
        }
        if let Some(expected) = expected_mbr {
            if cached != expected {
                log::error!("node {node_id}: MBR does not match the parent's entry");
                return false;
            }
        }

        if n.is_leaf() {
            *leaf_entries += n.entry_count;
        }
        for i in 0..n.entry_count {
            if n.ids[i] == UNUSED_ID {
                log::error!("node {node_id}: entry {i} is unused");
                return false;
            }
            if n.level > 1 {
                let child_mbr = Rect {
                    min_x: n.entries_min_x[i],
                    min_y: n.entries_min_y[i],
                    max_x: n.entries_max_x[i],
                    max_y: n.entries_max_y[i],
                };
                if !self.check_node(n.ids[i], n.level - 1, Some(child_mbr), leaf_entries) {
                    return false;
                }
            }
        }
        true
    }

    #[cfg(feature = "internal_checks")]
    fn internal_check(&self) {
        if !self.check_consistency() {
            log::error!("consistency check failed after mutation");
        }
    }

    #[cfg(not(feature = "internal_checks"))]
    #[inline]
    fn internal_check(&self) {}
}

impl NodeSource for RTree {
    fn root_node_id(&self) -> i32 {
        self.root_node_id
    }

    fn node(&self, id: i32) -> Option<&Node> {
        self.nodes.get(id as usize).and_then(|slot| slot.as_ref())
    }
}

/// Seed candidates along one axis: the entry with the highest low side
/// against the entry with the lowest high side (never the same entry), with
/// the separation normalized by the span of the whole set. A zero span
/// counts as fully separated. Index -1 denotes the new rectangle.
fn seeds_for_axis(
    lows: &[f32],
    highs: &[f32],
    count: usize,
    new_low: f32,
    new_high: f32,
    span: f32,
) -> (f32, i32, i32) {
    let mut highest_low = new_low;
    let mut highest_low_index = -1;
    let mut lowest_high = new_high;
    let mut lowest_high_index = -1;

    for i in 0..count {
        if lows[i] >= highest_low {
            highest_low = lows[i];
            highest_low_index = i as i32;
        } else if highs[i] <= lowest_high {
            lowest_high = highs[i];
            lowest_high_index = i as i32;
        }
    }

    // A negative separation means the seeds overlap; they are still usable
    // when nothing better exists.
    let separation = if span == 0.0 {
        1.0
    } else {
        (highest_low - lowest_high) / span
    };
    (separation, highest_low_index, lowest_high_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn collect_intersects(tree: &RTree, rect: &Rect) -> Vec<i32> {
        let mut ids = Vec::new();
        tree.intersects(rect, |id| {
            ids.push(id);
            true
        });
        ids.sort_unstable();
        ids
    }

    #[test]
    fn add_then_delete_restores_size() {
        let mut tree = RTree::new(Config::new(4, 2));
        let r = Rect::new(1.0, 1.0, 2.0, 2.0);
        tree.add(r, 1);
        assert_eq!(tree.len(), 1);
        assert!(tree.delete(r, 1));
        assert_eq!(tree.len(), 0);
        assert!(tree.bounds().is_none());
        assert!(tree.check_consistency());
    }

    #[test]
    fn delete_requires_exact_rect_and_id() {
        let mut tree = RTree::with_defaults();
        tree.add(Rect::new(0.0, 0.0, 2.0, 2.0), 1);
        assert!(!tree.delete(Rect::new(0.0, 0.0, 2.0, 3.0), 1));
        assert!(!tree.delete(Rect::new(0.0, 0.0, 2.0, 2.0), 2));
        assert_eq!(tree.len(), 1);
        assert!(tree.delete(Rect::new(0.0, 0.0, 2.0, 2.0), 1));
    }

    #[test]
    fn added_rect_is_found_by_intersects() {
        let mut tree = RTree::new(Config::new(4, 2));
        for id in 0..40 {
            let x = (id % 8) as f32 * 3.0;
            let y = (id / 8) as f32 * 3.0;
            tree.add(Rect::new(x, y, x + 2.0, y + 2.0), id);
        }
        assert!(tree.check_consistency());
        for id in 0..40 {
            let x = (id % 8) as f32 * 3.0;
            let y = (id / 8) as f32 * 3.0;
            let hits = collect_intersects(&tree, &Rect::new(x, y, x + 2.0, y + 2.0));
            assert!(hits.contains(&id), "id {id} missing from {hits:?}");
        }
    }

    #[test]
    fn splits_grow_the_tree_and_keep_invariants() {
        let mut tree = RTree::new(Config::new(4, 2));
        let mut rng = StdRng::seed_from_u64(11);
        for id in 0..200 {
            let x: f32 = rng.random_range(0.0..100.0);
            let y: f32 = rng.random_range(0.0..100.0);
            tree.add(Rect::new(x, y, x + 1.0, y + 1.0), id);
        }
        assert!(tree.tree_height > 1);
        assert_eq!(tree.len(), 200);
        assert!(tree.check_consistency());
    }

    #[test]
    fn churn_keeps_tree_consistent() {
        let mut tree = RTree::new(Config::new(10, 5));
        let mut rng = StdRng::seed_from_u64(42);
        let mut rects = Vec::new();
        for id in 0..1000 {
            let x: f32 = rng.random_range(0.0..500.0);
            let y: f32 = rng.random_range(0.0..500.0);
            let r = Rect::new(x, y, x + rng.random_range(0.5..5.0), y + rng.random_range(0.5..5.0));
            tree.add(r, id);
            rects.push((r, id));
        }
        assert!(tree.check_consistency());

        // Delete in a shuffled order, re-verifying every 100 removals.
        for i in (1..rects.len()).rev() {
            let j = rng.random_range(0..=i);
            rects.swap(i, j);
        }
        for (deleted, (r, id)) in rects.iter().enumerate() {
            assert!(tree.delete(*r, *id), "entry {id} not found");
            if (deleted + 1) % 100 == 0 {
                assert!(tree.check_consistency(), "inconsistent after {} deletions", deleted + 1);
                assert_eq!(tree.len(), rects.len() - deleted - 1);
            }
        }
        assert!(tree.is_empty());
        assert!(tree.bounds().is_none());
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut tree = RTree::new(Config::new(4, 2));
        for id in 0..50 {
            tree.add(Rect::new(id as f32, 0.0, id as f32 + 1.0, 1.0), id);
        }
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.bounds().is_none());
        assert!(tree.check_consistency());
        tree.add(Rect::new(0.0, 0.0, 1.0, 1.0), 7);
        assert_eq!(collect_intersects(&tree, &Rect::new(0.0, 0.0, 1.0, 1.0)), vec![7]);
    }

    #[test]
    fn bounds_tracks_entries() {
        let mut tree = RTree::with_defaults();
        assert!(tree.bounds().is_none());
        tree.add(Rect::new(1.0, 2.0, 3.0, 4.0), 1);
        tree.add(Rect::new(-1.0, 0.0, 0.0, 9.0), 2);
        assert_eq!(tree.bounds(), Some(Rect::new(-1.0, 0.0, 3.0, 9.0)));
        tree.delete(Rect::new(-1.0, 0.0, 0.0, 9.0), 2);
        assert_eq!(tree.bounds(), Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn degenerate_rectangles_are_well_defined() {
        let mut tree = RTree::new(Config::new(4, 2));
        for id in 0..30 {
            let p = id as f32;
            tree.add(Rect::new(p, p, p, p), id);
        }
        assert!(tree.check_consistency());
        let hits = collect_intersects(&tree, &Rect::new(10.0, 10.0, 10.0, 10.0));
        assert_eq!(hits, vec![10]);
        assert!(tree.delete(Rect::new(10.0, 10.0, 10.0, 10.0), 10));
    }

    #[test]
    fn identical_rectangles_split_cleanly() {
        // Forces the degenerate pick_seeds fallback where every entry
        // overlaps the new rectangle.
        let mut tree = RTree::new(Config::new(4, 2));
        let r = Rect::new(5.0, 5.0, 6.0, 6.0);
        for id in 0..25 {
            tree.add(r, id);
        }
        assert!(tree.check_consistency());
        let hits = collect_intersects(&tree, &r);
        assert_eq!(hits, (0..25).collect::<Vec<_>>());
    }
}
