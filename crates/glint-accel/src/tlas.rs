//! Top-level acceleration structure over instances.
//!
//! The TLAS is a binary tree built by agglomerative clustering of instance
//! world bounding boxes: repeatedly find a mutual nearest-neighbor pair
//! (smallest surface area of the merged box) and fuse it. It is rebuilt
//! whenever any instance transform or the instance set changes, which is
//! cheap — proportional to the instance count, never to geometry size.

use std::time::Instant;

use glint_math::Aabb;
use log::debug;

use crate::store::Instance;

/// What a top-level node points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlasKind {
    /// A leaf referencing one instance.
    Leaf {
        /// Index into the instance list the tree was built over.
        instance: u32,
    },
    /// An interior node with two children.
    Interior {
        /// Left child node index.
        left: u32,
        /// Right child node index.
        right: u32,
    },
}

/// One node of the top-level tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TlasNode {
    /// World-space bounding box.
    pub bounds: Aabb,
    /// Leaf or interior payload.
    pub kind: TlasKind,
}

/// A completed top-level tree.
///
/// Leaves are created first (one per instance, in order), interior nodes are
/// appended as clusters merge; `root` names the final survivor. An empty
/// instance list produces an empty tree.
#[derive(Debug, Clone)]
pub struct Tlas {
    /// Flat node array.
    pub nodes: Vec<TlasNode>,
    /// Index of the root node.
    pub root: u32,
}

impl Tlas {
    /// Build a TLAS over the given instances by agglomerative clustering.
    ///
    /// For `n` instances the result has exactly `n - 1` interior nodes
    /// (`n > 1`), or a single leaf (`n == 1`). Any instance count is
    /// supported.
    pub fn build(instances: &[Instance]) -> Self {
        let start = Instant::now();
        let mut nodes: Vec<TlasNode> = instances
            .iter()
            .enumerate()
            .map(|(i, inst)| TlasNode {
                bounds: inst.world_bounds,
                kind: TlasKind::Leaf { instance: i as u32 },
            })
            .collect();

        if nodes.is_empty() {
            return Self {
                nodes,
                root: 0,
            };
        }

        // indices of cluster roots still to be merged
        let mut active: Vec<u32> = (0..nodes.len() as u32).collect();
        let mut a = 0usize;
        let mut b = find_best_match(&nodes, &active, a);

        while active.len() > 1 {
            let c = find_best_match(&nodes, &active, b);
            if c == a {
                // mutual nearest neighbors: fuse them
                let node_a = active[a];
                let node_b = active[b];
                let merged = TlasNode {
                    bounds: nodes[node_a as usize]
                        .bounds
                        .union(&nodes[node_b as usize].bounds),
                    kind: TlasKind::Interior {
                        left: node_a,
                        right: node_b,
                    },
                };
                let merged_idx = nodes.len() as u32;
                nodes.push(merged);

                active[a] = merged_idx;
                let last = active.len() - 1;
                active.swap_remove(b);
                if a == last {
                    // a's entry was the one relocated into b's slot
                    a = b;
                }
                if active.len() > 1 {
                    b = find_best_match(&nodes, &active, a);
                }
            } else {
                // walk the nearest-neighbor chain instead
                a = b;
                b = c;
            }
        }

        let root = active[0];
        debug!(
            "built tlas over {} instances: {} nodes in {:.2}ms",
            instances.len(),
            nodes.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Self { nodes, root }
    }
}

/// Index (into `active`) of the node whose merged box with `active[a]` has
/// the smallest surface area. O(n) scan per call.
fn find_best_match(nodes: &[TlasNode], active: &[u32], a: usize) -> usize {
    let mut smallest = f32::INFINITY;
    let mut best = a;
    for (i, &candidate) in active.iter().enumerate() {
        if i == a {
            continue;
        }
        let area = nodes[active[a] as usize]
            .bounds
            .union(&nodes[candidate as usize].bounds)
            .half_area();
        if area < smallest {
            smallest = area;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::store::AccelStore;
    use glint_math::{Point3, Transform};
    use glint_scene::Scene;

    fn store_with_unit_sphere() -> (AccelStore, crate::store::ShapeId) {
        let mut scene = Scene::new();
        scene.add_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, "default");
        let mut store = AccelStore::new();
        let (shape, _) = store.add_shape(scene.primitives(), &BuildConfig::default());
        (store, shape)
    }

    fn instances_at(xs: &[f32]) -> Vec<Instance> {
        let (mut store, shape) = store_with_unit_sphere();
        for &x in xs {
            store
                .add_instance(shape, Transform::translation(x, 0.0, 0.0))
                .unwrap();
        }
        store.instances().to_vec()
    }

    fn count_kinds(tlas: &Tlas) -> (usize, usize) {
        let mut leaves = 0;
        let mut interior = 0;
        for node in &tlas.nodes {
            match node.kind {
                TlasKind::Leaf { .. } => leaves += 1,
                TlasKind::Interior { .. } => interior += 1,
            }
        }
        (leaves, interior)
    }

    #[test]
    fn test_empty_instances() {
        let tlas = Tlas::build(&[]);
        assert!(tlas.nodes.is_empty());
    }

    #[test]
    fn test_single_instance_is_leaf_root() {
        let tlas = Tlas::build(&instances_at(&[5.0]));
        assert_eq!(tlas.nodes.len(), 1);
        assert_eq!(tlas.root, 0);
        assert_eq!(tlas.nodes[0].kind, TlasKind::Leaf { instance: 0 });
    }

    #[test]
    fn test_five_separated_instances() {
        // 5 widely separated boxes: clustering must produce exactly 4
        // interior nodes and a root containing all five
        let instances = instances_at(&[0.0, 100.0, 200.0, 300.0, 400.0]);
        let tlas = Tlas::build(&instances);
        let (leaves, interior) = count_kinds(&tlas);
        assert_eq!(leaves, 5);
        assert_eq!(interior, 4);
        let root = &tlas.nodes[tlas.root as usize];
        for inst in &instances {
            assert!(root.bounds.contains_aabb(&inst.world_bounds));
        }
    }

    #[test]
    fn test_interior_count_for_many_sizes() {
        for n in [2usize, 3, 4, 7, 16, 61] {
            let xs: Vec<f32> = (0..n).map(|i| i as f32 * 10.0).collect();
            let tlas = Tlas::build(&instances_at(&xs));
            let (leaves, interior) = count_kinds(&tlas);
            assert_eq!(leaves, n, "n={n}");
            assert_eq!(interior, n - 1, "n={n}");
        }
    }

    #[test]
    fn test_interior_bounds_are_child_unions() {
        let tlas = Tlas::build(&instances_at(&[0.0, 3.0, 50.0, 53.0, 200.0]));
        for node in &tlas.nodes {
            if let TlasKind::Interior { left, right } = node.kind {
                let expected = tlas.nodes[left as usize]
                    .bounds
                    .union(&tlas.nodes[right as usize].bounds);
                assert_eq!(node.bounds, expected);
            }
        }
    }

    #[test]
    fn test_nearby_pairs_cluster_first() {
        // two tight pairs far apart: each pair must merge below the root
        let tlas = Tlas::build(&instances_at(&[0.0, 3.0, 1000.0, 1003.0]));
        let root = &tlas.nodes[tlas.root as usize];
        let TlasKind::Interior { left, right } = root.kind else {
            panic!("root must be interior");
        };
        for child in [left, right] {
            let node = &tlas.nodes[child as usize];
            assert!(matches!(node.kind, TlasKind::Interior { .. }));
            // each side spans 5 units, not 1000
            assert!(node.bounds.extent().x < 10.0);
        }
    }

    #[test]
    fn test_every_instance_reachable_exactly_once() {
        let xs: Vec<f32> = (0..23).map(|i| (i * 37 % 101) as f32).collect();
        let tlas = Tlas::build(&instances_at(&xs));
        let mut seen = vec![0u32; xs.len()];
        let mut stack = vec![tlas.root];
        while let Some(idx) = stack.pop() {
            match tlas.nodes[idx as usize].kind {
                TlasKind::Leaf { instance } => seen[instance as usize] += 1,
                TlasKind::Interior { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }
}
