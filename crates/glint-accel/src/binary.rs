//! Binary BVH construction with binned SAH object splits and optional
//! spatial (SBVH) splits.
//!
//! The builder is top-down and iterative: an explicit work stack of
//! `(node index, primitive reference list)` pairs replaces recursion, so
//! pathological scenes cannot overflow the call stack. Nodes live in a flat
//! arena and refer to children and leaf ranges by index; the arena is
//! append-only during the build and immutable afterwards until an explicit
//! [`BinaryBvh::refit`] or rebuild.

use std::time::Instant;

use glint_math::{Aabb, Point3};
use glint_scene::{Primitive, Shape};
use log::debug;

use crate::clip::{clip_sphere_aabb, clip_triangle_aabb};
use crate::config::{BuildConfig, BuildStats};

/// One node of the binary tree.
///
/// `count > 0` marks a leaf whose primitives occupy
/// `prim_index[left_first .. left_first + count]`; `count == 0` marks an
/// interior node whose children sit at `left_first` and `left_first + 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    /// Bounding box of everything below this node.
    pub bounds: Aabb,
    /// First child index, or first leaf-primitive slot.
    pub left_first: u32,
    /// Number of primitives (0 for interior nodes).
    pub count: u32,
}

impl BvhNode {
    fn placeholder() -> Self {
        Self {
            bounds: Aabb::empty(),
            left_first: 0,
            count: 0,
        }
    }
}

/// A transient build-time record: one primitive's (possibly clipped)
/// bounding box plus its index in the input list. Spatial splits may
/// duplicate a reference into both children, each copy with a tighter box.
#[derive(Debug, Clone, Copy)]
struct PrimitiveRef {
    bounds: Aabb,
    prim: u32,
}

impl PrimitiveRef {
    fn centroid(&self) -> Point3 {
        self.bounds.center()
    }
}

/// A completed binary BVH over one primitive list.
#[derive(Debug, Clone)]
pub struct BinaryBvh {
    /// Flat node arena; the root is node 0. Children of an interior node are
    /// adjacent.
    pub nodes: Vec<BvhNode>,
    /// Leaf ranges index into this permutation of input primitive indices.
    /// An index may appear more than once when spatial splits clipped the
    /// primitive across a plane.
    pub prim_index: Vec<u32>,
    /// Indices of input primitives with no finite bounding box (planes).
    /// They cannot be partitioned and must be tested by the traversal
    /// consumer alongside the tree; they are never dropped.
    pub unbounded: Vec<u32>,
}

impl BinaryBvh {
    /// Build a BVH over `primitives`. Never fails: zero or one bounded
    /// primitives degenerate to a single leaf root.
    pub fn build(primitives: &[Primitive], config: &BuildConfig) -> (Self, BuildStats) {
        let start = Instant::now();
        let mut stats = BuildStats::default();
        // a split needs at least one interior plane
        let bins = config.bins.max(2);

        let mut refs = Vec::with_capacity(primitives.len());
        let mut unbounded = Vec::new();
        for (i, prim) in primitives.iter().enumerate() {
            match prim.shape.bounds() {
                Some(bounds) => refs.push(PrimitiveRef {
                    bounds,
                    prim: i as u32,
                }),
                None => unbounded.push(i as u32),
            }
        }

        let mut root_bounds = Aabb::empty();
        for r in &refs {
            root_bounds.grow_aabb(&r.bounds);
        }
        let root_area = root_bounds.half_area();

        // spatial splits can push the leaf count past the input size, so
        // reserve generously; the arena still grows on demand
        let n = refs.len();
        let mut nodes: Vec<BvhNode> = Vec::with_capacity((4 * n).max(1));
        let mut prim_index: Vec<u32> = Vec::with_capacity(2 * n);
        nodes.push(BvhNode::placeholder());

        let mut stack: Vec<(u32, Vec<PrimitiveRef>)> = vec![(0, refs)];
        while let Some((node_idx, refs)) = stack.pop() {
            let mut bounds = Aabb::empty();
            for r in &refs {
                bounds.grow_aabb(&r.bounds);
            }
            nodes[node_idx as usize].bounds = bounds;

            if refs.len() <= config.min_leaf_prims {
                make_leaf(&mut nodes, &mut prim_index, &mut stats, node_idx, &refs);
                continue;
            }

            // a lone reference can only be subdivided by clipping it once;
            // re-splitting an already-clipped copy would recurse forever on
            // self-similar geometry
            if refs.len() == 1 {
                let full = primitives[refs[0].prim as usize].shape.bounds();
                if full.map_or(true, |b| b != refs[0].bounds) {
                    make_leaf(&mut nodes, &mut prim_index, &mut stats, node_idx, &refs);
                    continue;
                }
            }

            let no_split_cost = refs.len() as f32 * bounds.half_area();
            let object = find_object_split(&refs, bins);

            // gate the (much costlier) spatial evaluation on how badly the
            // object split's children overlap, relative to the whole tree
            let try_spatial = match &object {
                Some(obj) if root_area > 0.0 => {
                    obj.left_bounds.overlap_area(&obj.right_bounds) / root_area
                        > config.spatial_alpha
                }
                Some(_) => false,
                // no usable centroid extent on any axis; a spatial split is
                // the only remaining chance to subdivide
                None => true,
            };
            let spatial = if try_spatial {
                find_spatial_split(&refs, &bounds, primitives, bins)
            } else {
                None
            };

            let object_cost = object.as_ref().map_or(f32::INFINITY, |s| s.cost);
            let spatial_cost = spatial.as_ref().map_or(f32::INFINITY, |s| s.cost);
            let best_cost = object_cost.min(spatial_cost);
            if best_cost >= no_split_cost {
                make_leaf(&mut nodes, &mut prim_index, &mut stats, node_idx, &refs);
                continue;
            }

            let use_spatial = spatial_cost < object_cost;
            let (left, right, duplicated) = if use_spatial {
                let s = spatial.as_ref().expect("spatial split present");
                partition_spatial(&refs, primitives, &bounds, s.axis, s.pos)
            } else {
                let s = object.as_ref().expect("object split present");
                let (l, r) = partition_object(&refs, s.axis, s.pos);
                (l, r, 0)
            };

            // a split that empties one side carries no information, and one
            // that duplicates every reference of a multi-primitive node into
            // both sides would recurse forever on stacked coincident
            // geometry; stop here
            if left.is_empty()
                || right.is_empty()
                || (refs.len() > 1 && left.len() == refs.len() && right.len() == refs.len())
            {
                make_leaf(&mut nodes, &mut prim_index, &mut stats, node_idx, &refs);
                continue;
            }

            if use_spatial {
                stats.spatial_splits += 1;
                stats.duplicated_refs += duplicated;
            } else {
                stats.object_splits += 1;
            }

            let left_idx = nodes.len() as u32;
            nodes.push(BvhNode::placeholder());
            nodes.push(BvhNode::placeholder());
            nodes[node_idx as usize].left_first = left_idx;
            nodes[node_idx as usize].count = 0;
            stack.push((left_idx, left));
            stack.push((left_idx + 1, right));
        }

        // children always follow their parent in the arena, so one reverse
        // pass recomputes every interior box as the exact union of its
        // children (spatial splits clip child geometry below the top-down
        // estimate)
        if nodes.len() > 1 {
            for i in (0..nodes.len()).rev() {
                if nodes[i].count == 0 {
                    let l = nodes[i].left_first as usize;
                    nodes[i].bounds = nodes[l].bounds.union(&nodes[l + 1].bounds);
                }
            }
        }

        debug!(
            "built binary bvh: {} prims -> {} nodes, {} leaves, {} object / {} spatial splits, {} duplicated refs in {:.2}ms",
            primitives.len(),
            nodes.len(),
            stats.leaf_count,
            stats.object_splits,
            stats.spatial_splits,
            stats.duplicated_refs,
            start.elapsed().as_secs_f64() * 1000.0
        );

        (
            Self {
                nodes,
                prim_index,
                unbounded,
            },
            stats,
        )
    }

    /// True if `node_idx` is a leaf. The degenerate single-node tree built
    /// from zero bounded primitives is a (possibly empty) leaf.
    pub fn is_leaf(&self, node_idx: u32) -> bool {
        self.nodes[node_idx as usize].count > 0 || self.nodes.len() == 1
    }

    /// Bottom-up recomputation of all bounding boxes without changing the
    /// topology. Valid when primitives moved but the partition is still
    /// meaningful; a full rebuild is required when the primitive set changes.
    ///
    /// Leaf boxes are recomputed from the full primitive bounds, so boxes
    /// tightened by spatial-split clipping relax to conservative ones.
    pub fn refit(&mut self, primitives: &[Primitive]) {
        let start = Instant::now();
        for i in (0..self.nodes.len()).rev() {
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
            } else if self.nodes.len() > 1 {
                let l = node.left_first as usize;
                self.nodes[i].bounds = self.nodes[l].bounds.union(&self.nodes[l + 1].bounds);
            }
        }
        debug!(
            "refitted {} nodes in {:.2}ms",
            self.nodes.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
}

fn make_leaf(
    nodes: &mut [BvhNode],
    prim_index: &mut Vec<u32>,
    stats: &mut BuildStats,
    node_idx: u32,
    refs: &[PrimitiveRef],
) {
    let node = &mut nodes[node_idx as usize];
    node.left_first = prim_index.len() as u32;
    node.count = refs.len() as u32;
    prim_index.extend(refs.iter().map(|r| r.prim));
    stats.leaf_count += 1;
}

/// Best object (centroid-binned) split over all three axes, if any axis has
/// nonzero centroid extent and some plane separates two nonempty sides.
struct ObjectSplit {
    axis: usize,
    pos: f32,
    cost: f32,
    left_bounds: Aabb,
    right_bounds: Aabb,
}

fn find_object_split(refs: &[PrimitiveRef], bins: usize) -> Option<ObjectSplit> {
    let mut best: Option<ObjectSplit> = None;

    for axis in 0..3 {
        let mut cmin = f32::INFINITY;
        let mut cmax = f32::NEG_INFINITY;
        for r in refs {
            let c = r.centroid()[axis];
            cmin = cmin.min(c);
            cmax = cmax.max(c);
        }
        // zero centroid extent: binning would divide by zero, skip the axis
        if cmin == cmax {
            continue;
        }

        let scale = bins as f32 / (cmax - cmin);
        let mut bin_count = vec![0u32; bins];
        let mut bin_bounds = vec![Aabb::empty(); bins];
        for r in refs {
            let b = (((r.centroid()[axis] - cmin) * scale) as usize).min(bins - 1);
            bin_count[b] += 1;
            bin_bounds[b].grow_aabb(&r.bounds);
        }

        // prefix/suffix sweep over the bins-1 interior plane positions
        let planes = bins - 1;
        let mut left_count = vec![0u32; planes];
        let mut left_box = vec![Aabb::empty(); planes];
        let mut right_count = vec![0u32; planes];
        let mut right_box = vec![Aabb::empty(); planes];
        let mut acc = Aabb::empty();
        let mut sum = 0u32;
        for i in 0..planes {
            sum += bin_count[i];
            acc.grow_aabb(&bin_bounds[i]);
            left_count[i] = sum;
            left_box[i] = acc;
        }
        acc = Aabb::empty();
        sum = 0;
        for i in (0..planes).rev() {
            sum += bin_count[i + 1];
            acc.grow_aabb(&bin_bounds[i + 1]);
            right_count[i] = sum;
            right_box[i] = acc;
        }

        let step = (cmax - cmin) / bins as f32;
        for i in 0..planes {
            if left_count[i] == 0 || right_count[i] == 0 {
                continue;
            }
            let cost = left_count[i] as f32 * left_box[i].half_area()
                + right_count[i] as f32 * right_box[i].half_area();
            // strict comparison keeps the first (lowest axis, lowest plane)
            // of equal-cost candidates
            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(ObjectSplit {
                    axis,
                    pos: cmin + step * (i + 1) as f32,
                    cost,
                    left_bounds: left_box[i],
                    right_bounds: right_box[i],
                });
            }
        }
    }

    best
}

/// Best spatial split: primitives are binned by their full extent, with
/// per-bin entry/exit counts so plane costs use exact membership, and
/// geometry spanning several bins is clipped to each for tight bin boxes.
struct SpatialSplit {
    axis: usize,
    pos: f32,
    cost: f32,
}

fn find_spatial_split(
    refs: &[PrimitiveRef],
    node_bounds: &Aabb,
    primitives: &[Primitive],
    bins: usize,
) -> Option<SpatialSplit> {
    let mut best: Option<SpatialSplit> = None;

    for axis in 0..3 {
        let amin = node_bounds.min[axis];
        let extent = node_bounds.max[axis] - amin;
        if extent <= 0.0 {
            continue;
        }
        let width = extent / bins as f32;
        let scale = bins as f32 / extent;

        let mut entry = vec![0u32; bins];
        let mut exit = vec![0u32; bins];
        let mut bin_bounds = vec![Aabb::empty(); bins];

        for r in refs {
            let first = (((r.bounds.min[axis] - amin) * scale) as usize).min(bins - 1);
            let last = (((r.bounds.max[axis] - amin) * scale) as usize)
                .min(bins - 1)
                .max(first);
            entry[first] += 1;
            exit[last] += 1;

            if first == last {
                bin_bounds[first].grow_aabb(&r.bounds);
            } else {
                let shape = &primitives[r.prim as usize].shape;
                for b in first..=last {
                    let mut slab = *node_bounds;
                    slab.min[axis] = amin + width * b as f32;
                    if b + 1 < bins {
                        slab.max[axis] = amin + width * (b + 1) as f32;
                    }
                    // degenerate geometry the clipper rejects still occupies
                    // the slab; fall back to the clamped reference box
                    let clipped = clip_shape(shape, &slab)
                        .unwrap_or_else(|| r.bounds.intersection(&slab));
                    bin_bounds[b].grow_aabb(&clipped);
                }
            }
        }

        let planes = bins - 1;
        let mut left_count = vec![0u32; planes];
        let mut left_area = vec![0.0f32; planes];
        let mut right_count = vec![0u32; planes];
        let mut right_area = vec![0.0f32; planes];
        let mut acc = Aabb::empty();
        let mut sum = 0u32;
        for i in 0..planes {
            sum += entry[i];
            acc.grow_aabb(&bin_bounds[i]);
            left_count[i] = sum;
            left_area[i] = acc.half_area();
        }
        acc = Aabb::empty();
        sum = 0;
        for i in (0..planes).rev() {
            sum += exit[i + 1];
            acc.grow_aabb(&bin_bounds[i + 1]);
            right_count[i] = sum;
            right_area[i] = acc.half_area();
        }

        for i in 0..planes {
            if left_count[i] == 0 || right_count[i] == 0 {
                continue;
            }
            let cost =
                left_count[i] as f32 * left_area[i] + right_count[i] as f32 * right_area[i];
            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(SpatialSplit {
                    axis,
                    pos: amin + width * (i + 1) as f32,
                    cost,
                });
            }
        }
    }

    best
}

fn clip_shape(shape: &Shape, target: &Aabb) -> Option<Aabb> {
    match shape {
        Shape::Triangle(t) => clip_triangle_aabb(target, &t.v0, &t.v1, &t.v2),
        Shape::Sphere(s) => clip_sphere_aabb(target, &s.center, s.radius),
        Shape::Plane(_) => None,
    }
}

fn partition_object(
    refs: &[PrimitiveRef],
    axis: usize,
    pos: f32,
) -> (Vec<PrimitiveRef>, Vec<PrimitiveRef>) {
    refs.iter().copied().partition(|r| r.centroid()[axis] < pos)
}

/// Partition for a spatial split: references straddling the plane are clipped
/// against both half-space boxes and a copy lands on each side. Returns both
/// sides plus the number of duplicated references.
fn partition_spatial(
    refs: &[PrimitiveRef],
    primitives: &[Primitive],
    node_bounds: &Aabb,
    axis: usize,
    pos: f32,
) -> (Vec<PrimitiveRef>, Vec<PrimitiveRef>, u32) {
    let mut left_box = *node_bounds;
    left_box.max[axis] = pos;
    let mut right_box = *node_bounds;
    right_box.min[axis] = pos;

    let mut duplicated = 0;
    let mut left = Vec::with_capacity(refs.len());
    let mut right = Vec::with_capacity(refs.len());
    for r in refs.iter().copied() {
        if r.bounds.max[axis] <= pos {
            left.push(r);
        } else if r.bounds.min[axis] >= pos {
            right.push(r);
        } else {
            let shape = &primitives[r.prim as usize].shape;
            match (clip_shape(shape, &left_box), clip_shape(shape, &right_box)) {
                (Some(lb), Some(rb)) => {
                    duplicated += 1;
                    left.push(PrimitiveRef {
                        bounds: lb,
                        prim: r.prim,
                    });
                    right.push(PrimitiveRef {
                        bounds: rb,
                        prim: r.prim,
                    });
                }
                (Some(lb), None) => left.push(PrimitiveRef {
                    bounds: lb,
                    prim: r.prim,
                }),
                (None, Some(rb)) => right.push(PrimitiveRef {
                    bounds: rb,
                    prim: r.prim,
                }),
                // clipper rejected both sides (degenerate sliver); keep the
                // reference whole on its centroid's side so it is never lost
                (None, None) => {
                    if r.centroid()[axis] < pos {
                        left.push(r);
                    } else {
                        right.push(r);
                    }
                }
            }
        }
    }
    (left, right, duplicated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_math::{Point2, Vec3};
    use glint_scene::Scene;

    fn uv() -> Point2 {
        Point2::new(0.0, 0.0)
    }

    /// A unit right triangle in the xy plane at `(x, y, z)`.
    fn tri_at(scene: &mut Scene, x: f32, y: f32, z: f32) {
        scene.add_triangle(
            Point3::new(x, y, z),
            Point3::new(x + 1.0, y, z),
            Point3::new(x, y + 1.0, z),
            uv(),
            uv(),
            uv(),
            "default",
        );
    }

    fn no_spatial() -> BuildConfig {
        BuildConfig {
            spatial_alpha: 1.0,
            ..BuildConfig::default()
        }
    }

    /// Every (node, depth-first) leaf range, flattened to primitive indices.
    fn leaf_prims(bvh: &BinaryBvh) -> Vec<u32> {
        let mut out = Vec::new();
        for node in &bvh.nodes {
            if node.count > 0 {
                for k in node.left_first..node.left_first + node.count {
                    out.push(bvh.prim_index[k as usize]);
                }
            }
        }
        out
    }

    #[test]
    fn test_empty_input_degenerates_to_single_leaf() {
        let (bvh, stats) = BinaryBvh::build(&[], &BuildConfig::default());
        assert_eq!(bvh.nodes.len(), 1);
        assert!(bvh.is_leaf(0));
        assert!(bvh.prim_index.is_empty());
        assert_eq!(stats.object_splits, 0);
    }

    #[test]
    fn test_single_primitive_is_leaf_root() {
        let mut scene = Scene::new();
        scene.add_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, "default");
        let (bvh, _) = BinaryBvh::build(scene.primitives(), &BuildConfig::default());
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].count, 1);
        assert_eq!(leaf_prims(&bvh), vec![0]);
    }

    #[test]
    fn test_two_far_triangles_split_into_two_leaves() {
        // two unit triangles 100 units apart, spatial splits disabled; the
        // object split must beat keeping both in one leaf
        let mut scene = Scene::new();
        tri_at(&mut scene, 0.0, 0.0, 0.0);
        tri_at(&mut scene, 100.0, 0.0, 0.0);

        // at the default min_leaf of 2 a two-primitive node is a leaf outright
        let (bvh, _) = BinaryBvh::build(scene.primitives(), &no_spatial());
        assert_eq!(bvh.nodes.len(), 1);

        let config = BuildConfig {
            min_leaf_prims: 1,
            ..no_spatial()
        };
        let (bvh, stats) = BinaryBvh::build(scene.primitives(), &config);
        assert_eq!(bvh.nodes.len(), 3);
        assert_eq!(bvh.nodes[0].count, 0);
        let l = &bvh.nodes[bvh.nodes[0].left_first as usize];
        let r = &bvh.nodes[bvh.nodes[0].left_first as usize + 1];
        assert_eq!(l.count, 1);
        assert_eq!(r.count, 1);
        assert_eq!(stats.object_splits, 1);
        assert_eq!(stats.spatial_splits, 0);
    }

    #[test]
    fn test_coverage_and_child_union_invariants() {
        let mut scene = Scene::new();
        for i in 0..32 {
            let x = (i % 8) as f32 * 3.0;
            let y = (i / 8) as f32 * 2.0;
            tri_at(&mut scene, x, y, (i % 5) as f32);
        }
        let (bvh, _) = BinaryBvh::build(scene.primitives(), &no_spatial());

        // every primitive index appears at least once, all ranges in bounds
        let mut seen = vec![false; 32];
        for p in leaf_prims(&bvh) {
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));

        // interior boxes are exactly the union of their children
        for node in &bvh.nodes {
            if node.count == 0 {
                let l = &bvh.nodes[node.left_first as usize];
                let r = &bvh.nodes[node.left_first as usize + 1];
                assert_eq!(node.bounds, l.bounds.union(&r.bounds));
            }
        }

        // root contains every input primitive box
        let root = &bvh.nodes[0];
        for prim in scene.primitives() {
            assert!(root.bounds.contains_aabb(&prim.shape.bounds().unwrap()));
        }
    }

    #[test]
    fn test_planes_collect_as_unbounded() {
        let mut scene = Scene::new();
        scene.add_plane(Vec3::new(0.0, 1.0, 0.0), 1.0, "default");
        tri_at(&mut scene, 0.0, 0.0, 0.0);
        scene.add_plane(Vec3::new(1.0, 0.0, 0.0), 2.0, "default");
        let (bvh, _) = BinaryBvh::build(scene.primitives(), &BuildConfig::default());
        assert_eq!(bvh.unbounded, vec![0, 2]);
        assert_eq!(leaf_prims(&bvh), vec![1]);
    }

    #[test]
    fn test_spatial_split_clips_single_straddling_triangle() {
        // a lone triangle spanning the node with alpha = 0 (spatial splits
        // always attempted): the triangle's index lands in both children,
        // each with a strictly smaller clipped box whose union stays inside
        // the original box
        let mut scene = Scene::new();
        scene.add_triangle(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            uv(),
            uv(),
            uv(),
            "default",
        );
        let full_box = scene.primitives()[0].shape.bounds().unwrap();

        let config = BuildConfig {
            spatial_alpha: 0.0,
            min_leaf_prims: 0,
            ..BuildConfig::default()
        };
        let (bvh, stats) = BinaryBvh::build(scene.primitives(), &config);

        assert_eq!(stats.spatial_splits, 1);
        assert_eq!(stats.duplicated_refs, 1);
        assert_eq!(bvh.nodes.len(), 3);
        assert_eq!(bvh.prim_index, vec![0, 0]);

        let l = &bvh.nodes[bvh.nodes[0].left_first as usize];
        let r = &bvh.nodes[bvh.nodes[0].left_first as usize + 1];
        assert_eq!(l.count, 1);
        assert_eq!(r.count, 1);
        assert!(l.bounds.half_area() < full_box.half_area());
        assert!(r.bounds.half_area() < full_box.half_area());
        assert!(full_box.contains_aabb(&l.bounds));
        assert!(full_box.contains_aabb(&r.bounds));
        assert!(full_box.contains_aabb(&l.bounds.union(&r.bounds)));
    }

    #[test]
    fn test_spatial_split_duplicates_sliver_across_clusters() {
        // a long sliver overlapping two tight clusters: the object split
        // cannot avoid heavy child overlap, so the gated spatial split wins
        // and duplicates the sliver into both sides
        let mut scene = Scene::new();
        tri_at(&mut scene, 0.0, 0.0, 0.0);
        tri_at(&mut scene, 0.2, 0.2, 0.0);
        tri_at(&mut scene, 0.4, 0.4, 0.0);
        tri_at(&mut scene, 9.0, 0.0, 0.0);
        tri_at(&mut scene, 8.8, 0.2, 0.0);
        tri_at(&mut scene, 8.6, 0.4, 0.0);
        scene.add_triangle(
            Point3::new(0.0, 0.45, 0.0),
            Point3::new(10.0, 0.5, 0.0),
            Point3::new(0.0, 0.55, 0.0),
            uv(),
            uv(),
            uv(),
            "default",
        );
        let straddler = (scene.primitives().len() - 1) as u32;
        let full_box = scene.primitives()[straddler as usize]
            .shape
            .bounds()
            .unwrap();

        let config = BuildConfig {
            spatial_alpha: 0.0,
            min_leaf_prims: 1,
            ..BuildConfig::default()
        };
        let (bvh, stats) = BinaryBvh::build(scene.primitives(), &config);

        assert!(stats.spatial_splits > 0);
        assert!(stats.duplicated_refs > 0);
        let copies = bvh.prim_index.iter().filter(|&&p| p == straddler).count();
        assert!(copies >= 2, "sliver appears on both sides of the plane");

        // leaves holding only a clipped copy bound it tighter than the full
        // triangle box
        for node in &bvh.nodes {
            if node.count == 1 && bvh.prim_index[node.left_first as usize] == straddler {
                assert!(full_box.contains_aabb(&node.bounds));
                assert!(node.bounds.half_area() < full_box.half_area());
            }
        }

        // nothing else was duplicated or dropped
        let mut seen = vec![0u32; scene.primitives().len()];
        for &p in &bvh.prim_index {
            seen[p as usize] += 1;
        }
        assert!(seen.iter().all(|&c| c >= 1));
    }

    #[test]
    fn test_split_cost_beats_leaf_cost() {
        // any interior node implies its chosen split cost beat the no-split
        // cost; verify the realized tree never has an interior node whose
        // children hold everything in one child (the degenerate outcome)
        let mut scene = Scene::new();
        for i in 0..16 {
            scene.add_sphere(Point3::new(i as f32 * 4.0, 0.0, 0.0), 1.0, "default");
        }
        let (bvh, _) = BinaryBvh::build(scene.primitives(), &no_spatial());
        for node in &bvh.nodes {
            if node.count == 0 {
                let l = &bvh.nodes[node.left_first as usize];
                let r = &bvh.nodes[node.left_first as usize + 1];
                let parent_prims = subtree_prims(&bvh, node);
                let no_split = parent_prims as f32 * node.bounds.half_area();
                let split = subtree_prims(&bvh, l) as f32 * l.bounds.half_area()
                    + subtree_prims(&bvh, r) as f32 * r.bounds.half_area();
                assert!(split < no_split);
            }
        }
    }

    fn subtree_prims(bvh: &BinaryBvh, node: &BvhNode) -> u32 {
        if node.count > 0 {
            node.count
        } else {
            let l = &bvh.nodes[node.left_first as usize];
            let r = &bvh.nodes[node.left_first as usize + 1];
            subtree_prims(bvh, l) + subtree_prims(bvh, r)
        }
    }

    #[test]
    fn test_refit_follows_moved_primitives() {
        let mut scene = Scene::new();
        for i in 0..8 {
            scene.add_sphere(Point3::new(i as f32 * 5.0, 0.0, 0.0), 1.0, "default");
        }
        let (mut bvh, _) = BinaryBvh::build(scene.primitives(), &no_spatial());
        let old_root = bvh.nodes[0].bounds;

        // move everything up by 10 and refit; topology must be untouched
        let mut moved = Scene::new();
        for i in 0..8 {
            moved.add_sphere(Point3::new(i as f32 * 5.0, 10.0, 0.0), 1.0, "default");
        }
        let topo: Vec<(u32, u32)> = bvh.nodes.iter().map(|n| (n.left_first, n.count)).collect();
        bvh.refit(moved.primitives());
        let topo_after: Vec<(u32, u32)> =
            bvh.nodes.iter().map(|n| (n.left_first, n.count)).collect();
        assert_eq!(topo, topo_after);
        assert!((bvh.nodes[0].bounds.min.y - (old_root.min.y + 10.0)).abs() < 1e-5);
        for node in &bvh.nodes {
            if node.count == 0 {
                let l = &bvh.nodes[node.left_first as usize];
                let r = &bvh.nodes[node.left_first as usize + 1];
                assert_eq!(node.bounds, l.bounds.union(&r.bounds));
            }
        }
    }

    #[test]
    fn test_identical_centroids_still_terminate() {
        // all centroids coincide: no object split exists; the spatial split
        // either subdivides by extent or the node becomes a leaf
        let mut scene = Scene::new();
        for r in 1..6 {
            scene.add_sphere(Point3::new(0.0, 0.0, 0.0), r as f32, "default");
        }
        let (bvh, _) = BinaryBvh::build(scene.primitives(), &BuildConfig::default());
        let mut seen = vec![false; 5];
        for p in leaf_prims(&bvh) {
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
