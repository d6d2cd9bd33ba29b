// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The traversal algorithms shared by the mutable tree and the frozen
//! index, generic over a node-lookup capability.
//!
//! Every query reports matching entry ids through a caller callback whose
//! `false` return halts the traversal immediately; partial results
//! delivered before the halt are valid.

use crate::buf::IntBuf;
use crate::geom::{Point, Rect};
use crate::heap::{PriorityQueue, SortOrder};
use crate::node::Node;

/// Node lookup capability supplied by both tree flavors.
pub(crate) trait NodeSource {
    fn root_node_id(&self) -> i32;
    fn node(&self, id: i32) -> Option<&Node>;
}

/// The bounds of all entries, or `None` when there are none.
pub(crate) fn bounds<S: NodeSource>(source: &S) -> Option<Rect> {
    let root = source.node(source.root_node_id())?;
    if root.entry_count == 0 {
        None
    } else {
        Some(root.mbr())
    }
}

/// Depth-first search for entries intersecting `rect`.
pub(crate) fn intersects<S, F>(source: &S, rect: &Rect, mut on_hit: F)
where
    S: NodeSource,
    F: FnMut(i32) -> bool,
{
    if let Some(root) = source.node(source.root_node_id()) {
        intersects_node(source, rect, &mut on_hit, root);
    }
}

fn intersects_node<S, F>(source: &S, rect: &Rect, on_hit: &mut F, n: &Node) -> bool
where
    S: NodeSource,
    F: FnMut(i32) -> bool,
{
    for i in 0..n.entry_count {
        if !n.entry_intersects(i, rect) {
            continue;
        }
        if n.is_leaf() {
            if !on_hit(n.ids[i]) {
                return false;
            }
        } else if let Some(child) = source.node(n.ids[i]) {
            if !intersects_node(source, rect, on_hit, child) {
                return false;
            }
        }
    }
    true
}

/// Non-recursive search for entries contained by `rect`, driven by a path
/// stack and a next-child-index stack.
///
/// Internal nodes are entered when their entry merely intersects `rect`
/// (they may still hold contained entries); at leaves only contained
/// entries are reported.
pub(crate) fn contains<S, F>(source: &S, rect: &Rect, mut on_hit: F)
where
    S: NodeSource,
    F: FnMut(i32) -> bool,
{
    let mut parents = IntBuf::new();
    let mut parents_entry = IntBuf::new();
    parents.push(source.root_node_id());
    parents_entry.push(-1);

    'traversal: while !parents.is_empty() {
        let Some(n) = source.node(parents.peek()) else {
            return;
        };
        let start_index = (parents_entry.peek() + 1) as usize;

        if !n.is_leaf() {
            for i in start_index..n.entry_count {
                if n.entry_intersects(i, rect) {
                    // remember where to resume when the child is exhausted
                    parents_entry.pop();
                    parents_entry.push(i as i32);
                    parents.push(n.ids[i]);
                    parents_entry.push(-1);
                    continue 'traversal;
                }
            }
        } else {
            for i in 0..n.entry_count {
                if n.entry_contained_by(i, rect) && !on_hit(n.ids[i]) {
                    return;
                }
            }
        }
        parents.pop();
        parents_entry.pop();
    }
}

/// Report every entry nearest to `p`; equidistant nearest entries are all
/// reported, in no particular order.
pub(crate) fn nearest<S, F>(source: &S, p: Point, mut on_hit: F, furthest_distance: f32)
where
    S: NodeSource,
    F: FnMut(i32) -> bool,
{
    let Some(root) = source.node(source.root_node_id()) else {
        return;
    };
    let mut nearest_ids = IntBuf::new();
    nearest_node(
        source,
        p,
        root,
        furthest_distance * furthest_distance,
        &mut nearest_ids,
    );
    for id in nearest_ids.iter() {
        if !on_hit(id) {
            break;
        }
    }
}

/// Recursive descent tracking the best squared distance seen so far. A
/// strictly closer leaf entry resets the collected set; an equal one
/// extends it. Subtrees further than the current best are pruned.
fn nearest_node<S: NodeSource>(
    source: &S,
    p: Point,
    n: &Node,
    mut furthest_distance_sq: f32,
    nearest_ids: &mut IntBuf,
) -> f32 {
    for i in 0..n.entry_count {
        let entry_distance_sq = n.entry_distance_sq(i, p.x, p.y);
        if n.is_leaf() {
            if entry_distance_sq < furthest_distance_sq {
                furthest_distance_sq = entry_distance_sq;
                nearest_ids.reset();
            }
            if entry_distance_sq <= furthest_distance_sq {
                nearest_ids.push(n.ids[i]);
            }
        } else if entry_distance_sq <= furthest_distance_sq {
            if let Some(child) = source.node(n.ids[i]) {
                furthest_distance_sq =
                    nearest_node(source, p, child, furthest_distance_sq, nearest_ids);
            }
        }
    }
    furthest_distance_sq
}

/// Report the `count` entries nearest to `p` in order of increasing
/// distance. Fewer may be reported if fewer lie within
/// `furthest_distance`; more if entries tie at the cutoff distance.
pub(crate) fn nearest_n<S, F>(
    source: &S,
    p: Point,
    mut on_hit: F,
    count: usize,
    furthest_distance: f32,
) where
    S: NodeSource,
    F: FnMut(i32) -> bool,
{
    let mut queue = PriorityQueue::new(SortOrder::Descending);
    gather_nearest_n(source, p, count, furthest_distance, &mut queue);
    queue.set_sort_order(SortOrder::Ascending);
    while let Some((id, _)) = queue.pop() {
        if !on_hit(id) {
            return;
        }
    }
}

/// Like [`nearest_n`] but drained worst-first, skipping the re-sort.
pub(crate) fn nearest_n_unsorted<S, F>(
    source: &S,
    p: Point,
    mut on_hit: F,
    count: usize,
    furthest_distance: f32,
) where
    S: NodeSource,
    F: FnMut(i32) -> bool,
{
    let mut queue = PriorityQueue::new(SortOrder::Descending);
    gather_nearest_n(source, p, count, furthest_distance, &mut queue);
    while let Some((id, _)) = queue.pop() {
        if !on_hit(id) {
            return;
        }
    }
}

/// Fill a descending-order queue (worst distance on top) with the nearest
/// `count` entries, preserving every tie at the cutoff distance.
fn gather_nearest_n<S: NodeSource>(
    source: &S,
    p: Point,
    count: usize,
    furthest_distance: f32,
    queue: &mut PriorityQueue,
) {
    if count == 0 {
        return;
    }

    let mut parents = IntBuf::new();
    let mut parents_entry = IntBuf::new();
    parents.push(source.root_node_id());
    parents_entry.push(-1);

    // Entries evicted at the same priority as the new top are remembered
    // here; they are restored while the cutoff distance still matches.
    let mut saved_values = IntBuf::new();
    let mut saved_priority = 0.0;

    let mut furthest_distance_sq = furthest_distance * furthest_distance;

    'traversal: while !parents.is_empty() {
        let Some(n) = source.node(parents.peek()) else {
            return;
        };
        let start_index = (parents_entry.peek() + 1) as usize;

        if !n.is_leaf() {
            // enter any subtree that could hold something closer than the
            // worst entry currently kept
            for i in start_index..n.entry_count {
                if n.entry_distance_sq(i, p.x, p.y) <= furthest_distance_sq {
                    parents_entry.pop();
                    parents_entry.push(i as i32);
                    parents.push(n.ids[i]);
                    parents_entry.push(-1);
                    continue 'traversal;
                }
            }
        } else {
            for i in 0..n.entry_count {
                let entry_distance_sq = n.entry_distance_sq(i, p.x, p.y);
                if entry_distance_sq > furthest_distance_sq {
                    continue;
                }
                queue.insert(n.ids[i], entry_distance_sq);

                while queue.len() > count {
                    let (value, distance_sq) =
                        queue.pop().expect("queue holds more than count entries");
                    if queue.priority() == Some(distance_sq) {
                        saved_values.push(value);
                        saved_priority = distance_sq;
                    } else {
                        saved_values.reset();
                    }
                }

                if !saved_values.is_empty() && queue.priority() == Some(saved_priority) {
                    for svi in 0..saved_values.len() {
                        queue.insert(saved_values.get(svi), saved_priority);
                    }
                    saved_values.reset();
                }

                // narrow the search once `count` entries have been found
                if queue.len() >= count {
                    if let Some(worst) = queue.priority() {
                        if worst < furthest_distance_sq {
                            furthest_distance_sq = worst;
                        }
                    }
                }
            }
        }
        parents.pop();
        parents_entry.pop();
    }
}
