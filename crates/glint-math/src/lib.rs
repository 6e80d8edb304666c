#![warn(missing_docs)]

//! Math types for the glint ray tracing kernel.
//!
//! Thin wrappers around nalgebra providing the types the acceleration
//! structures are built from: points, vectors, affine transforms, and
//! axis-aligned bounding boxes. Everything is `f32` — the flat node layouts
//! handed to traversal kernels are a bit-exact `float32` contract, so the
//! builder stays in single precision end to end.

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f32>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f32>;

/// A point in 2D texture/parameter space.
pub type Point2 = nalgebra::Point2<f32>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f32>;

/// Linear tolerance for geometric comparisons (clipping, degeneracy checks).
pub const EPSILON: f32 = 1e-4;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f32>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f32, dy: f32, dz: f32) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation, applies rotation/scale).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for growing.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// True if the box contains no points (never grown, or inverted).
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn grow(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another AABB.
    pub fn grow_aabb(&mut self, other: &Aabb) {
        if !other.is_empty() {
            self.grow(&other.min);
            self.grow(&other.max);
        }
    }

    /// Union of two AABBs.
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.grow_aabb(other);
        out
    }

    /// Intersection of two AABBs. Empty if they do not overlap.
    pub fn intersection(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Point3::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: Point3::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        }
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Test if `other` lies entirely inside this box.
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        other.is_empty()
            || (self.min.x <= other.min.x
                && self.min.y <= other.min.y
                && self.min.z <= other.min.z
                && self.max.x >= other.max.x
                && self.max.y >= other.max.y
                && self.max.z >= other.max.z)
    }

    /// Center point of the box.
    pub fn center(&self) -> Point3 {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Extent (size) of the box per axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Half of the surface area: `dx*dy + dy*dz + dz*dx`.
    ///
    /// This is the SAH area measure. The constant factor 2 is dropped
    /// uniformly, it cancels in every cost comparison. Empty boxes report 0.
    pub fn half_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extent();
        e.x * e.y + e.y * e.z + e.z * e.x
    }

    /// Half-area of the overlap region between two boxes, 0 when disjoint.
    pub fn overlap_area(&self, other: &Aabb) -> f32 {
        self.intersection(other).half_area()
    }

    /// Transform all 8 corners and grow a new box around them.
    pub fn transformed(&self, t: &Transform) -> Aabb {
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.grow(&t.apply_point(&corner));
        }
        out
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-6);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result.x - 11.0).abs() < 1e-6);
        assert!((result.y - 22.0).abs() < 1e-6);
        assert!((result.z - 33.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_z_90() {
        let t = Transform::rotation_z(PI / 2.0);
        let p = Point3::new(1.0, 0.0, 0.0);
        let result = t.apply_point(&p);
        assert!(result.x.abs() < 1e-6);
        assert!((result.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform::translation(1.0, 2.0, 3.0).then(&Transform::scale(2.0, 2.0, 2.0));
        let inv = t.inverse().unwrap();
        let composed = t.then(&inv);
        let p = Point3::new(5.0, 6.0, 7.0);
        let result = composed.apply_point(&p);
        assert!((result - p).norm() < 1e-5);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let t = Transform::scale(1.0, 0.0, 1.0);
        assert!(t.inverse().is_none());
    }

    #[test]
    fn test_empty_aabb() {
        let b = Aabb::empty();
        assert!(b.is_empty());
        assert_eq!(b.half_area(), 0.0);
    }

    #[test]
    fn test_grow_and_area() {
        let mut b = Aabb::empty();
        b.grow(&Point3::new(0.0, 0.0, 0.0));
        b.grow(&Point3::new(2.0, 3.0, 4.0));
        assert!(!b.is_empty());
        // dx*dy + dy*dz + dz*dx = 6 + 12 + 8
        assert!((b.half_area() - 26.0).abs() < 1e-6);
        let c = b.center();
        assert!((c.x - 1.0).abs() < 1e-6);
        assert!((c.y - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_union_contains_both() {
        let a = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        let u = a.union(&b);
        assert!(u.contains_aabb(&a));
        assert!(u.contains_aabb(&b));
    }

    #[test]
    fn test_disjoint_overlap_is_zero() {
        let a = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 1.0, 1.0));
        assert!(!a.overlaps(&b));
        assert_eq!(a.overlap_area(&b), 0.0);
    }

    #[test]
    fn test_overlap_area() {
        let a = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
        let b = Aabb::new(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
        // overlap is the unit cube: 1 + 1 + 1
        assert!((a.overlap_area(&b) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_transformed_aabb() {
        let b = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let t = Transform::translation(10.0, 0.0, 0.0);
        let moved = b.transformed(&t);
        assert!((moved.min.x - 10.0).abs() < 1e-6);
        assert!((moved.max.x - 11.0).abs() < 1e-6);
        // rotation by 45 degrees about z grows the xy footprint
        let r = Transform::rotation_z(PI / 4.0);
        let rotated = b.transformed(&r);
        assert!(rotated.extent().x > 1.0);
        assert!(rotated.extent().y > 1.0);
        assert!((rotated.extent().z - 1.0).abs() < 1e-6);
    }
}
