//! Flat, fixed-layout records for the traversal kernel.
//!
//! The structures here are a bit-exact contract with the (external) GPU
//! traversal code: `#[repr(C)]`, plain `f32`/`u32`/`i32` fields, bytemuck
//! `Pod` so buffers upload as raw bytes. The rich build-side types convert
//! into these once, after construction; the reserved `-1` slot sentinel
//! exists only at this boundary.

use bytemuck::{Pod, Zeroable};
use glint_math::Transform;

use crate::binary::BinaryBvh;
use crate::store::Instance;
use crate::tlas::{Tlas, TlasKind};
use crate::wide::{WideBvh, WideSlot};

/// Serialized binary BVH node: 32 bytes, the half-cache-line layout
/// traversal kernels expect. `count > 0` marks a leaf over
/// `prim_index[left_first .. left_first + count]`; otherwise children sit at
/// `left_first` and `left_first + 1`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuBvhNode {
    /// Bounding box minimum corner.
    pub aabb_min: [f32; 3],
    /// First child index or first leaf-primitive slot.
    pub left_first: u32,
    /// Bounding box maximum corner.
    pub aabb_max: [f32; 3],
    /// Leaf primitive count, 0 for interior nodes.
    pub count: u32,
}

/// One slot's bounding box inside a [`GpuWideNode`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuWideBox {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

/// Serialized 4-ary node: 128 bytes. Slot `i` is empty when `count[i] < 0`
/// (the reserved sentinel), a leaf when `count[i] > 0` (`child[i]` is the
/// first prim-index slot), and an interior child when `count[i] == 0`
/// (`child[i]` is the child node index).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuWideNode {
    /// Per-slot bounding boxes. Contents of empty slots are zeroed.
    pub bounds: [GpuWideBox; 4],
    /// Per-slot child node index or first leaf-primitive slot, -1 if empty.
    pub child: [i32; 4],
    /// Per-slot primitive count, 0 for interior slots, -1 if empty.
    pub count: [i32; 4],
}

/// Serialized instance: subtree root plus both directions of its transform,
/// padded so the matrix columns stay 16-byte aligned.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuInstance {
    /// Subtree root in the shared node array.
    pub root: u32,
    /// Padding for alignment.
    pub _pad: [u32; 3],
    /// Object-to-world matrix, column major.
    pub transform: [f32; 16],
    /// World-to-object matrix, column major.
    pub inverse: [f32; 16],
}

/// Serialized top-level node: 32 bytes. `left_right == 0` marks a leaf and
/// `instance` is valid; otherwise the children are packed as
/// `left | right << 16`. The packing caps a TLAS at 65535 nodes, ample for
/// instance counts this tier is built over.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuTlasNode {
    /// Bounding box minimum corner.
    pub aabb_min: [f32; 3],
    /// Packed child indices, 0 for a leaf.
    pub left_right: u32,
    /// Bounding box maximum corner.
    pub aabb_max: [f32; 3],
    /// Instance index, valid for leaves only.
    pub instance: u32,
}

fn vec3_array(p: &glint_math::Point3) -> [f32; 3] {
    [p.x, p.y, p.z]
}

fn matrix_array(t: &Transform) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    out.copy_from_slice(t.matrix.as_slice());
    out
}

/// Serialize a binary tree's node array. Node indices are preserved, so the
/// companion `prim_index` array uploads as-is.
pub fn flatten_bvh(bvh: &BinaryBvh) -> Vec<GpuBvhNode> {
    bvh.nodes
        .iter()
        .map(|n| GpuBvhNode {
            aabb_min: vec3_array(&n.bounds.min),
            left_first: n.left_first,
            aabb_max: vec3_array(&n.bounds.max),
            count: n.count,
        })
        .collect()
}

/// Serialize a wide tree's node array; indices are preserved.
pub fn flatten_wide(wide: &WideBvh) -> Vec<GpuWideNode> {
    wide.nodes
        .iter()
        .map(|node| {
            let mut out = GpuWideNode {
                bounds: [GpuWideBox::zeroed(); 4],
                child: [-1; 4],
                count: [-1; 4],
            };
            for (i, slot) in node.slots.iter().enumerate() {
                match slot {
                    WideSlot::Empty => {}
                    WideSlot::Leaf {
                        bounds,
                        first,
                        count,
                    } => {
                        out.bounds[i] = GpuWideBox {
                            min: vec3_array(&bounds.min),
                            max: vec3_array(&bounds.max),
                        };
                        out.child[i] = *first as i32;
                        out.count[i] = *count as i32;
                    }
                    WideSlot::Node { bounds, child } => {
                        out.bounds[i] = GpuWideBox {
                            min: vec3_array(&bounds.min),
                            max: vec3_array(&bounds.max),
                        };
                        out.child[i] = *child as i32;
                        out.count[i] = 0;
                    }
                }
            }
            out
        })
        .collect()
}

/// Serialize the instance list in order.
pub fn flatten_instances(instances: &[Instance]) -> Vec<GpuInstance> {
    instances
        .iter()
        .map(|inst| GpuInstance {
            root: inst.root,
            _pad: [0; 3],
            transform: matrix_array(&inst.transform),
            inverse: matrix_array(&inst.inverse),
        })
        .collect()
}

/// Serialize a TLAS in preorder with the root at slot 0, the layout the
/// traversal kernel starts from.
pub fn flatten_tlas(tlas: &Tlas) -> Vec<GpuTlasNode> {
    let mut out = Vec::with_capacity(tlas.nodes.len());
    if !tlas.nodes.is_empty() {
        emit_tlas(tlas, tlas.root, &mut out);
    }
    out
}

fn emit_tlas(tlas: &Tlas, idx: u32, out: &mut Vec<GpuTlasNode>) -> u32 {
    let node = &tlas.nodes[idx as usize];
    let slot = out.len() as u32;
    out.push(GpuTlasNode {
        aabb_min: vec3_array(&node.bounds.min),
        left_right: 0,
        aabb_max: vec3_array(&node.bounds.max),
        instance: 0,
    });
    match node.kind {
        TlasKind::Leaf { instance } => out[slot as usize].instance = instance,
        TlasKind::Interior { left, right } => {
            let l = emit_tlas(tlas, left, out);
            let r = emit_tlas(tlas, right, out);
            debug_assert!(l < 0x1_0000 && r < 0x1_0000, "tlas exceeds packed index range");
            out[slot as usize].left_right = l | (r << 16);
        }
    }
    slot
}
