// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed little-endian persisted layout for a tree.
//!
//! Primitive arrays serialize as a 4-byte length followed by the packed
//! values. A node record is `level`, `entry_count`, the four coordinate
//! arrays, the id array, and the four cached MBR values. The tree header
//! records the fan-out configuration, height, root id, and size, followed
//! by the node count and the packed records. Records are prefixed with
//! their node id so arena holes survive a round trip; the free list is
//! rebuilt from the id gaps on read.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::buf::IntBuf;
use crate::node::Node;
use crate::tree::RTree;

/// Why a persisted tree could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Underlying read failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The header fields are out of range or contradictory.
    #[error("bad tree header: {0}")]
    Header(String),

    /// A node record is malformed.
    #[error("corrupt node record: {0}")]
    Corrupt(String),
}

impl RTree {
    /// Write the tree in the persisted layout.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_i32(w, self.max_node_entries as i32)?;
        write_i32(w, self.min_node_entries as i32)?;
        write_i32(w, self.tree_height)?;
        write_i32(w, self.root_node_id)?;
        write_i32(w, self.size as i32)?;

        let live = self.nodes.iter().flatten().count();
        write_i32(w, live as i32)?;
        for (id, slot) in self.nodes.iter().enumerate() {
            let Some(n) = slot else { continue };
            write_i32(w, id as i32)?;
            write_node(w, n)?;
        }
        Ok(())
    }

    /// Read a tree previously written with [`RTree::write_to`].
    pub fn read_from<R: Read>(r: &mut R) -> Result<RTree, DecodeError> {
        let max_node_entries = read_len(r, "MaxNodeEntries")?;
        let min_node_entries = read_len(r, "MinNodeEntries")?;
        if max_node_entries < 2 {
            return Err(DecodeError::Header(format!(
                "MaxNodeEntries = {max_node_entries}"
            )));
        }
        if min_node_entries < 1 || min_node_entries > max_node_entries / 2 {
            return Err(DecodeError::Header(format!(
                "MinNodeEntries = {min_node_entries} with MaxNodeEntries = {max_node_entries}"
            )));
        }
        let tree_height = read_i32(r)?;
        let root_node_id = read_i32(r)?;
        if tree_height < 1 || root_node_id < 0 {
            return Err(DecodeError::Header(format!(
                "height {tree_height}, root {root_node_id}"
            )));
        }
        let size = read_len(r, "size")?;
        let node_count = read_len(r, "node count")?;
        if node_count == 0 {
            return Err(DecodeError::Header("no nodes".into()));
        }

        let mut nodes: Vec<Option<Node>> = Vec::new();
        for _ in 0..node_count {
            let id = read_i32(r)?;
            if id < 0 {
                return Err(DecodeError::Corrupt(format!("node id {id}")));
            }
            let node = read_node(r, id, max_node_entries)?;
            let index = id as usize;
            if index >= nodes.len() {
                nodes.resize_with(index + 1, || None);
            }
            if nodes[index].is_some() {
                return Err(DecodeError::Corrupt(format!("duplicate node id {id}")));
            }
            nodes[index] = Some(node);
        }
        if nodes
            .get(root_node_id as usize)
            .and_then(|slot| slot.as_ref())
            .is_none()
        {
            return Err(DecodeError::Header(format!(
                "root node {root_node_id} missing"
            )));
        }

        let mut free_node_ids = IntBuf::new();
        for (id, slot) in nodes.iter().enumerate() {
            if slot.is_none() {
                free_node_ids.push(id as i32);
            }
        }

        Ok(RTree::from_parts(
            max_node_entries,
            min_node_entries,
            nodes,
            free_node_ids,
            root_node_id,
            tree_height,
            size,
        ))
    }
}

fn write_node<W: Write>(w: &mut W, n: &Node) -> io::Result<()> {
    write_i32(w, n.level)?;
    write_i32(w, n.entry_count as i32)?;
    write_f32_array(w, &n.entries_min_x)?;
    write_f32_array(w, &n.entries_min_y)?;
    write_f32_array(w, &n.entries_max_x)?;
    write_f32_array(w, &n.entries_max_y)?;
    write_i32_array(w, &n.ids)?;
    write_f32(w, n.mbr_min_x)?;
    write_f32(w, n.mbr_min_y)?;
    write_f32(w, n.mbr_max_x)?;
    write_f32(w, n.mbr_max_y)?;
    Ok(())
}

fn read_node<R: Read>(r: &mut R, id: i32, max_node_entries: usize) -> Result<Node, DecodeError> {
    let level = read_i32(r)?;
    if level < 1 {
        return Err(DecodeError::Corrupt(format!("node {id}: level {level}")));
    }
    let entry_count = read_len(r, "entry count")?;
    if entry_count > max_node_entries {
        return Err(DecodeError::Corrupt(format!(
            "node {id}: entry count {entry_count} exceeds {max_node_entries}"
        )));
    }

    let mut node = Node::new(id, level, max_node_entries);
    node.entry_count = entry_count;
    node.entries_min_x = read_f32_array(r, id, max_node_entries)?;
    node.entries_min_y = read_f32_array(r, id, max_node_entries)?;
    node.entries_max_x = read_f32_array(r, id, max_node_entries)?;
    node.entries_max_y = read_f32_array(r, id, max_node_entries)?;
    node.ids = read_i32_array(r, id, max_node_entries)?;
    node.mbr_min_x = read_f32(r)?;
    node.mbr_min_y = read_f32(r)?;
    node.mbr_max_x = read_f32(r)?;
    node.mbr_max_y = read_f32(r)?;
    Ok(node)
}

fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f32<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_i32_array<W: Write>(w: &mut W, values: &[i32]) -> io::Result<()> {
    write_i32(w, values.len() as i32)?;
    for &v in values {
        write_i32(w, v)?;
    }
    Ok(())
}

fn write_f32_array<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    write_i32(w, values.len() as i32)?;
    for &v in values {
        write_f32(w, v)?;
    }
    Ok(())
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32, io::Error> {
    let mut buf = [0_u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32<R: Read>(r: &mut R) -> Result<f32, io::Error> {
    let mut buf = [0_u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Read a non-negative i32 into a usize.
fn read_len<R: Read>(r: &mut R, what: &str) -> Result<usize, DecodeError> {
    let v = read_i32(r)?;
    if v < 0 {
        return Err(DecodeError::Header(format!("{what} = {v}")));
    }
    Ok(v as usize)
}

fn read_i32_array<R: Read>(
    r: &mut R,
    id: i32,
    expected: usize,
) -> Result<Box<[i32]>, DecodeError> {
    let len = read_len(r, "array length")?;
    if len != expected {
        return Err(DecodeError::Corrupt(format!(
            "node {id}: id array length {len}, expected {expected}"
        )));
    }
    let mut values = vec![0_i32; len];
    for v in &mut values {
        *v = read_i32(r)?;
    }
    Ok(values.into_boxed_slice())
}

fn read_f32_array<R: Read>(
    r: &mut R,
    id: i32,
    expected: usize,
) -> Result<Box<[f32]>, DecodeError> {
    let len = read_len(r, "array length")?;
    if len != expected {
        return Err(DecodeError::Corrupt(format!(
            "node {id}: coordinate array length {len}, expected {expected}"
        )));
    }
    let mut values = vec![0.0_f32; len];
    for v in &mut values {
        *v = read_f32(r)?;
    }
    Ok(values.into_boxed_slice())
}
