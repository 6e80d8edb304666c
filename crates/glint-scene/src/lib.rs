#![warn(missing_docs)]

//! Primitive store for the glint ray tracing kernel.
//!
//! A [`Scene`] owns an ordered, immutable-once-created list of [`Primitive`]s
//! (triangles, spheres, planes) plus a name-keyed material registry. The
//! acceleration-structure builder in `glint-accel` consumes the primitive
//! list and nothing else; materials are carried through as opaque indices for
//! the downstream shading kernel.

use std::collections::HashMap;

use glint_math::{Aabb, Point2, Point3, Vec3};
use serde::{Deserialize, Serialize};

/// A triangle with per-vertex texture coordinates.
///
/// Normal and centroid are derived at construction and stored, so the builder
/// never recomputes them per binning pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// First vertex.
    pub v0: Point3,
    /// Second vertex.
    pub v1: Point3,
    /// Third vertex.
    pub v2: Point3,
    /// Texture coordinate at `v0`.
    pub uv0: Point2,
    /// Texture coordinate at `v1`.
    pub uv1: Point2,
    /// Texture coordinate at `v2`.
    pub uv2: Point2,
    /// Geometric normal, `normalize((v1-v0) x (v2-v0))`. Zero for degenerate
    /// triangles.
    pub normal: Vec3,
    /// Centroid, `(v0 + v1 + v2) / 3`.
    pub centroid: Point3,
}

impl Triangle {
    /// Build a triangle, deriving its normal and centroid.
    pub fn new(v0: Point3, v1: Point3, v2: Point3, uv0: Point2, uv1: Point2, uv2: Point2) -> Self {
        let cross = (v1 - v0).cross(&(v2 - v0));
        let normal = if cross.norm() > 0.0 {
            cross.normalize()
        } else {
            Vec3::zeros()
        };
        let centroid = Point3::new(
            (v0.x + v1.x + v2.x) / 3.0,
            (v0.y + v1.y + v2.y) / 3.0,
            (v0.z + v1.z + v2.z) / 3.0,
        );
        Self {
            v0,
            v1,
            v2,
            uv0,
            uv1,
            uv2,
            normal,
            centroid,
        }
    }
}

/// A sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Center point.
    pub center: Point3,
    /// Radius.
    pub radius: f32,
}

/// An infinite plane `dot(normal, p) + offset = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Plane normal.
    pub normal: Vec3,
    /// Signed distance of the plane from the origin along the normal.
    pub offset: f32,
}

/// Geometry payload of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// A triangle.
    Triangle(Triangle),
    /// A sphere.
    Sphere(Sphere),
    /// An infinite plane. Planes carry no bounding box and are handled
    /// outside the BVH proper.
    Plane(Plane),
}

impl Shape {
    /// Tight axis-aligned bounding box, or `None` for unbounded shapes.
    pub fn bounds(&self) -> Option<Aabb> {
        match self {
            Shape::Triangle(t) => {
                let mut b = Aabb::empty();
                b.grow(&t.v0);
                b.grow(&t.v1);
                b.grow(&t.v2);
                Some(b)
            }
            Shape::Sphere(s) => {
                let r = Vec3::new(s.radius, s.radius, s.radius);
                Some(Aabb::new(s.center - r, s.center + r))
            }
            Shape::Plane(_) => None,
        }
    }

    /// Centroid used for partitioning, or `None` for unbounded shapes.
    pub fn centroid(&self) -> Option<Point3> {
        match self {
            Shape::Triangle(t) => Some(t.centroid),
            Shape::Sphere(s) => Some(s.center),
            Shape::Plane(_) => None,
        }
    }
}

/// A scene primitive: geometry plus a material reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    /// Geometry payload.
    pub shape: Shape,
    /// Index into the scene's material table.
    pub material: u32,
}

/// A named material. Shading parameters live with the downstream kernel; the
/// scene only keeps enough to identify and preview a material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Registry name, unique within a scene.
    pub name: String,
    /// Base color, linear RGB.
    pub color: [f32; 3],
}

/// An ordered collection of primitives and the materials they reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    primitives: Vec<Primitive>,
    materials: Vec<Material>,
    #[serde(skip)]
    material_index: HashMap<String, u32>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material by name and return its index. Registering an
    /// existing name returns the previous index unchanged.
    pub fn add_material(&mut self, name: &str, color: [f32; 3]) -> u32 {
        if let Some(&idx) = self.material_index.get(name) {
            return idx;
        }
        let idx = self.materials.len() as u32;
        self.materials.push(Material {
            name: name.to_string(),
            color,
        });
        self.material_index.insert(name.to_string(), idx);
        idx
    }

    /// Look up a material index by name. Unknown names resolve to 0.
    pub fn material(&self, name: &str) -> u32 {
        self.material_index.get(name).copied().unwrap_or(0)
    }

    /// Append a triangle.
    pub fn add_triangle(
        &mut self,
        v0: Point3,
        v1: Point3,
        v2: Point3,
        uv0: Point2,
        uv1: Point2,
        uv2: Point2,
        material: &str,
    ) {
        let material = self.material(material);
        self.primitives.push(Primitive {
            shape: Shape::Triangle(Triangle::new(v0, v1, v2, uv0, uv1, uv2)),
            material,
        });
    }

    /// Append a sphere.
    pub fn add_sphere(&mut self, center: Point3, radius: f32, material: &str) {
        let material = self.material(material);
        self.primitives.push(Primitive {
            shape: Shape::Sphere(Sphere { center, radius }),
            material,
        });
    }

    /// Append an infinite plane.
    pub fn add_plane(&mut self, normal: Vec3, offset: f32, material: &str) {
        let material = self.material(material);
        self.primitives.push(Primitive {
            shape: Shape::Plane(Plane { normal, offset }),
            material,
        });
    }

    /// The ordered primitive list.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// The material table.
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }
}
