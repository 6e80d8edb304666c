//! Build-time configuration and statistics.

use serde::{Deserialize, Serialize};

/// Tunable constants for binary BVH construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Number of SAH bins per axis.
    pub bins: usize,
    /// Nodes with this many primitives or fewer become leaves outright.
    pub min_leaf_prims: usize,
    /// Spatial-split gate: a node whose best object split leaves
    /// `overlap_area / root_area` above this threshold also evaluates a
    /// spatial split. `1.0` disables spatial splits (the ratio never exceeds
    /// 1), `0.0` always attempts them.
    pub spatial_alpha: f32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            bins: 8,
            min_leaf_prims: 2,
            spatial_alpha: 1e-5,
        }
    }
}

/// Counters describing one build call.
///
/// Returned alongside the tree; nothing in the builder keeps global state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Interior nodes produced by an object (centroid) split.
    pub object_splits: u32,
    /// Interior nodes produced by a spatial split.
    pub spatial_splits: u32,
    /// Primitive references duplicated into both children by spatial splits.
    pub duplicated_refs: u32,
    /// Leaves in the finished tree.
    pub leaf_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = BuildConfig::default();
        assert_eq!(c.bins, 8);
        assert_eq!(c.min_leaf_prims, 2);
        assert!(c.spatial_alpha > 0.0 && c.spatial_alpha <= 1.0);
    }
}
