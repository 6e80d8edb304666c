//! Collapse of a binary BVH into a 4-ary wide tree.
//!
//! Wide nodes shorten the tree and raise the branching factor, which a
//! SIMD or warp-parallel traversal kernel exploits; the collapse is a pure
//! build-time cost paid once. Leaf ranges keep indexing the source tree's
//! `prim_index` permutation.

use glint_math::Aabb;

use crate::binary::BinaryBvh;

/// One of a wide node's four slots.
///
/// The unused-slot sentinel of the serialized layout becomes an explicit
/// variant here; only [`crate::layout`] ever sees the reserved integer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WideSlot {
    /// Unoccupied slot.
    Empty,
    /// A leaf over `prim_index[first .. first + count]` of the source tree.
    Leaf {
        /// Bounding box of the leaf.
        bounds: Aabb,
        /// First slot in the source tree's primitive permutation.
        first: u32,
        /// Number of primitives.
        count: u32,
    },
    /// An interior child.
    Node {
        /// Bounding box of the child subtree.
        bounds: Aabb,
        /// Index of the child wide node.
        child: u32,
    },
}

/// A 4-ary node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WideNode {
    /// Child slots; occupied slots precede empty ones.
    pub slots: [WideSlot; 4],
}

impl WideNode {
    fn empty() -> Self {
        Self {
            slots: [WideSlot::Empty; 4],
        }
    }
}

/// A 4-ary tree derived once from a [`BinaryBvh`]; read-only afterwards.
#[derive(Debug, Clone)]
pub struct WideBvh {
    /// Flat node array; the root is node 0.
    pub nodes: Vec<WideNode>,
}

impl WideBvh {
    /// Collapse a binary tree by greedy child absorption: while a node has
    /// fewer than four occupied slots, the interior slot with the largest
    /// bounding-box surface area is replaced by its two children. A leaf
    /// root is copied through unchanged.
    pub fn from_binary(bvh: &BinaryBvh) -> Self {
        let mut nodes = Vec::with_capacity(bvh.nodes.len() / 2 + 1);

        let root = &bvh.nodes[0];
        if bvh.is_leaf(0) {
            let mut node = WideNode::empty();
            if root.count > 0 {
                node.slots[0] = WideSlot::Leaf {
                    bounds: root.bounds,
                    first: root.left_first,
                    count: root.count,
                };
            }
            nodes.push(node);
            return Self { nodes };
        }

        collapse(bvh, 0, &mut nodes);
        Self { nodes }
    }

    /// All `(first, count)` leaf ranges in the tree.
    pub fn leaf_ranges(&self) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        for node in &self.nodes {
            for slot in &node.slots {
                if let WideSlot::Leaf { first, count, .. } = slot {
                    out.push((*first, *count));
                }
            }
        }
        out
    }
}

/// Collapse the subtree rooted at binary node `bin_idx` into a wide node,
/// returning its index. Children are emitted after their parent.
fn collapse(bvh: &BinaryBvh, bin_idx: u32, nodes: &mut Vec<WideNode>) -> u32 {
    let wide_idx = nodes.len() as u32;
    nodes.push(WideNode::empty());

    let node = &bvh.nodes[bin_idx as usize];
    let mut slots: Vec<u32> = vec![node.left_first, node.left_first + 1];

    // absorb the largest interior slot until four slots are occupied or only
    // leaves remain
    while slots.len() < 4 {
        let mut best: Option<(usize, f32)> = None;
        for (i, &s) in slots.iter().enumerate() {
            let sn = &bvh.nodes[s as usize];
            if sn.count == 0 {
                let area = sn.bounds.half_area();
                if best.map_or(true, |(_, a)| area > a) {
                    best = Some((i, area));
                }
            }
        }
        let Some((i, _)) = best else { break };
        let absorbed = &bvh.nodes[slots[i] as usize];
        slots[i] = absorbed.left_first;
        slots.push(absorbed.left_first + 1);
    }

    let mut out = [WideSlot::Empty; 4];
    for (i, &s) in slots.iter().enumerate() {
        let sn = &bvh.nodes[s as usize];
        out[i] = if sn.count > 0 {
            WideSlot::Leaf {
                bounds: sn.bounds,
                first: sn.left_first,
                count: sn.count,
            }
        } else {
            WideSlot::Node {
                bounds: sn.bounds,
                child: collapse(bvh, s, nodes),
            }
        };
    }
    nodes[wide_idx as usize].slots = out;
    wide_idx
}
