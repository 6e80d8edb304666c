//! Geometric clipping of primitives against axis-aligned boxes.
//!
//! Spatial splits need the tight bounding box of the part of a primitive that
//! falls inside a bin or half-space. Both routines here are pure functions:
//! geometry that misses the clip box yields `None`, degenerate geometry never
//! panics.

use glint_math::{Aabb, Point3};

/// Maximum vertex count a triangle can reach under six half-space clips.
const MAX_CLIPPED_VERTS: usize = 9;

/// Clip a triangle against an axis-aligned box and return the bounding box of
/// the surviving polygon.
///
/// Iterative Sutherland–Hodgman clipping: the triangle is cut against each of
/// the box's six face planes in turn. Returns `None` when fewer than three
/// vertices survive (the triangle misses the box, or only touches it in a
/// point or an edge sliver).
pub fn clip_triangle_aabb(bbox: &Aabb, v0: &Point3, v1: &Point3, v2: &Point3) -> Option<Aabb> {
    let mut poly: Vec<Point3> = Vec::with_capacity(MAX_CLIPPED_VERTS);
    poly.push(*v0);
    poly.push(*v1);
    poly.push(*v2);

    for axis in 0..3 {
        poly = clip_polygon_plane(&poly, axis, bbox.min[axis], true);
        if poly.len() < 3 {
            return None;
        }
        poly = clip_polygon_plane(&poly, axis, bbox.max[axis], false);
        if poly.len() < 3 {
            return None;
        }
    }

    let mut out = Aabb::empty();
    for p in &poly {
        out.grow(p);
    }
    Some(out)
}

/// Clip a polygon against a single axis-aligned plane, keeping the side
/// `p[axis] >= plane` (`keep_above`) or `p[axis] <= plane`.
fn clip_polygon_plane(poly: &[Point3], axis: usize, plane: f32, keep_above: bool) -> Vec<Point3> {
    let inside = |p: &Point3| {
        if keep_above {
            p[axis] >= plane
        } else {
            p[axis] <= plane
        }
    };

    let mut out = Vec::with_capacity(poly.len() + 1);
    for i in 0..poly.len() {
        let cur = poly[i];
        let next = poly[(i + 1) % poly.len()];
        let cur_in = inside(&cur);
        if cur_in {
            out.push(cur);
        }
        if cur_in != inside(&next) {
            let denom = next[axis] - cur[axis];
            if denom != 0.0 {
                let t = (plane - cur[axis]) / denom;
                let mut hit = cur + (next - cur) * t;
                // pin the clipped coordinate to the plane exactly
                hit[axis] = plane;
                out.push(hit);
            }
        }
    }
    out
}

/// Clip a sphere against an axis-aligned box and return the bounding box of
/// the spherical region inside it.
///
/// Starts from the sphere's own bounding box and tightens it per face plane:
/// when a plane cuts the sphere, the widest surviving cross-section is the
/// circle of intersection, whose radius bounds the remaining extent on the
/// other two axes. Returns `None` as soon as the sphere is found entirely on
/// the excluded side of any plane.
pub fn clip_sphere_aabb(bbox: &Aabb, center: &Point3, radius: f32) -> Option<Aabb> {
    let mut out = Aabb::new(
        Point3::new(center.x - radius, center.y - radius, center.z - radius),
        Point3::new(center.x + radius, center.y + radius, center.z + radius),
    );

    for axis in 0..3 {
        // min face: keep p[axis] >= plane
        let plane = bbox.min[axis];
        if center[axis] + radius <= plane {
            return None;
        }
        if center[axis] - radius < plane {
            out.min[axis] = out.min[axis].max(plane);
            if center[axis] < plane {
                // the equator is cut away; the intersection circle bounds the rest
                let d = plane - center[axis];
                let rc = (radius * radius - d * d).max(0.0).sqrt();
                tighten_other_axes(&mut out, center, axis, rc);
            }
        }

        // max face: keep p[axis] <= plane
        let plane = bbox.max[axis];
        if center[axis] - radius >= plane {
            return None;
        }
        if center[axis] + radius > plane {
            out.max[axis] = out.max[axis].min(plane);
            if center[axis] > plane {
                let d = center[axis] - plane;
                let rc = (radius * radius - d * d).max(0.0).sqrt();
                tighten_other_axes(&mut out, center, axis, rc);
            }
        }
    }

    if out.is_empty() {
        return None;
    }
    Some(out)
}

/// Shrink `out` on the two axes other than `axis` to `center ± rc`.
fn tighten_other_axes(out: &mut Aabb, center: &Point3, axis: usize, rc: f32) {
    for other in 0..3 {
        if other == axis {
            continue;
        }
        out.min[other] = out.min[other].max(center[other] - rc);
        out.max[other] = out.max[other].min(center[other] + rc);
    }
}
