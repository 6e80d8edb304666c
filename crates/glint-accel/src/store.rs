//! Shape registry and instancing.
//!
//! Each logical shape gets one binary BVH, built once and spliced into a
//! shared node/prim-index arena with disjoint index ranges. Instances
//! reference a shape's subtree root under a world transform, so geometry is
//! reused without rebuilding. Per-shape builds share no mutable state and
//! can fan out across threads; splicing into the shared arena stays
//! sequential.

use glint_math::{Aabb, Transform};
use glint_scene::Primitive;
use log::debug;
use rayon::prelude::*;

use crate::binary::{BinaryBvh, BvhNode};
use crate::config::{BuildConfig, BuildStats};
use crate::error::{AccelError, Result};
use crate::tlas::Tlas;

/// Handle to a registered shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(
    /// Zero-based slot in the store's shape list.
    pub u32,
);

/// Handle to a registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(
    /// Zero-based slot in the store's instance list.
    pub u32,
);

/// One registered shape: where its subtree landed in the shared arena.
#[derive(Debug, Clone)]
pub struct ShapeRecord {
    /// Root node index in the shared node array.
    pub root: u32,
    /// This shape's node range in the shared node array.
    pub node_count: u32,
    /// First slot of this shape's range in the shared prim-index array.
    pub prim_first: u32,
    /// Length of that range.
    pub prim_count: u32,
    /// Object-space bounds of the shape's tree.
    pub bounds: Aabb,
    /// Input primitive indices with no finite bounds (planes), passed
    /// through for the traversal consumer.
    pub unbounded: Vec<u32>,
}

/// One placed copy of a shape.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The shape this instance places.
    pub shape: ShapeId,
    /// Subtree root in the shared node array.
    pub root: u32,
    /// Object-to-world transform.
    pub transform: Transform,
    /// World-to-object transform, kept alongside so traversal never inverts.
    pub inverse: Transform,
    /// Shape bounds carried into world space.
    pub world_bounds: Aabb,
}

/// Owner of the shared bottom-level arenas and the instance list.
#[derive(Debug, Default)]
pub struct AccelStore {
    nodes: Vec<BvhNode>,
    prim_index: Vec<u32>,
    shapes: Vec<ShapeRecord>,
    instances: Vec<Instance>,
    tlas: Option<Tlas>,
}

impl AccelStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a BVH over one shape's primitives and register it.
    pub fn add_shape(
        &mut self,
        primitives: &[Primitive],
        config: &BuildConfig,
    ) -> (ShapeId, BuildStats) {
        let (bvh, stats) = BinaryBvh::build(primitives, config);
        (self.splice(bvh), stats)
    }

    /// Build several shapes concurrently, then splice them in input order.
    ///
    /// The builds are independent; only the (cheap) append into the shared
    /// arena is serialized, which keeps every shape's index range disjoint.
    pub fn add_shapes_parallel(
        &mut self,
        shapes: &[&[Primitive]],
        config: &BuildConfig,
    ) -> Vec<(ShapeId, BuildStats)> {
        let built: Vec<(BinaryBvh, BuildStats)> = shapes
            .par_iter()
            .map(|prims| BinaryBvh::build(prims, config))
            .collect();
        built
            .into_iter()
            .map(|(bvh, stats)| (self.splice(bvh), stats))
            .collect()
    }

    /// Append a finished tree to the shared arena, fixing up its indices.
    fn splice(&mut self, bvh: BinaryBvh) -> ShapeId {
        let node_base = self.nodes.len() as u32;
        let prim_base = self.prim_index.len() as u32;
        let node_count = bvh.nodes.len() as u32;
        // the degenerate single-node tree is a leaf even at count 0
        let single = bvh.nodes.len() == 1;

        let bounds = bvh.nodes[0].bounds;
        for mut node in bvh.nodes {
            if node.count > 0 || single {
                node.left_first += prim_base;
            } else {
                node.left_first += node_base;
            }
            self.nodes.push(node);
        }
        self.prim_index.extend_from_slice(&bvh.prim_index);

        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(ShapeRecord {
            root: node_base,
            node_count,
            prim_first: prim_base,
            prim_count: self.prim_index.len() as u32 - prim_base,
            bounds,
            unbounded: bvh.unbounded,
        });
        debug!(
            "registered shape {}: nodes [{}..{}), prim slots [{}..{})",
            id.0,
            node_base,
            node_base + node_count,
            prim_base,
            self.prim_index.len()
        );
        id
    }

    /// Place an instance of `shape` under `transform`.
    ///
    /// Fails only when the transform cannot be inverted; geometry is never
    /// rebuilt. The cached TLAS is invalidated.
    pub fn add_instance(&mut self, shape: ShapeId, transform: Transform) -> Result<InstanceId> {
        let record = self
            .shapes
            .get(shape.0 as usize)
            .ok_or(AccelError::UnknownShape(shape.0))?;
        let inverse = transform.inverse().ok_or(AccelError::SingularTransform)?;
        let world_bounds = record.bounds.transformed(&transform);
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(Instance {
            shape,
            root: record.root,
            transform,
            inverse,
            world_bounds,
        });
        self.tlas = None;
        Ok(id)
    }

    /// Re-place an existing instance. Invalidates the cached TLAS; the
    /// underlying shape tree is untouched.
    pub fn set_instance_transform(
        &mut self,
        instance: InstanceId,
        transform: Transform,
    ) -> Result<()> {
        let inverse = transform.inverse().ok_or(AccelError::SingularTransform)?;
        let bounds = {
            let inst = self
                .instances
                .get(instance.0 as usize)
                .ok_or(AccelError::UnknownInstance(instance.0))?;
            self.shapes[inst.shape.0 as usize].bounds.transformed(&transform)
        };
        let inst = &mut self.instances[instance.0 as usize];
        inst.transform = transform;
        inst.inverse = inverse;
        inst.world_bounds = bounds;
        self.tlas = None;
        Ok(())
    }

    /// Recompute one shape's bounding boxes bottom-up after its primitives
    /// moved, without changing topology. The cached TLAS is invalidated
    /// because instance world bounds derive from shape bounds.
    pub fn refit_shape(&mut self, shape: ShapeId, primitives: &[Primitive]) -> Result<()> {
        let record = self
            .shapes
            .get(shape.0 as usize)
            .ok_or(AccelError::UnknownShape(shape.0))?
            .clone();
        let first = record.root as usize;
        let last = first + record.node_count as usize;
        let single = record.node_count == 1;
        for i in (first..last).rev() {
            let node = self.nodes[i];
            if node.count > 0 {
                let mut bounds = Aabb::empty();
                for k in node.left_first..node.left_first + node.count {
                    let prim = self.prim_index[k as usize] as usize;
                    if let Some(b) = primitives[prim].shape.bounds() {
                        bounds.grow_aabb(&b);
                    }
                }
                self.nodes[i].bounds = bounds;
            } else if !single {
                let l = node.left_first as usize;
                self.nodes[i].bounds = self.nodes[l].bounds.union(&self.nodes[l + 1].bounds);
            }
        }
        let bounds = self.nodes[first].bounds;
        self.shapes[shape.0 as usize].bounds = bounds;
        for inst in &mut self.instances {
            if inst.shape == shape {
                inst.world_bounds = bounds.transformed(&inst.transform);
            }
        }
        self.tlas = None;
        Ok(())
    }

    /// The top-level tree over the current instances, building it on demand.
    pub fn tlas(&mut self) -> &Tlas {
        let instances = &self.instances;
        self.tlas.get_or_insert_with(|| Tlas::build(instances))
    }

    /// Shared bottom-level node arena.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Shared primitive permutation. Values index each shape's own input
    /// primitive list; slots are grouped per shape (see [`ShapeRecord`]).
    pub fn prim_index(&self) -> &[u32] {
        &self.prim_index
    }

    /// Registered shapes.
    pub fn shapes(&self) -> &[ShapeRecord] {
        &self.shapes
    }

    /// Registered instances.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }
}
