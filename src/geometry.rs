//! Triangle/tetrahedron primitives and the Möller–Trumbore ray/triangle
//! intersection with the face/edge/vertex classification the locator
//! needs to pick the correct neighbor tetrahedron (spec §3, §4.A).

use crate::math::{Point3, Ray, Vec3};

/// Barycentric-coordinate tolerance used to classify a hit as face interior,
/// edge, or vertex rather than doing exact float comparisons.
pub const TOL_B: f32 = 1e-5;

/// Positional tolerance used by the point-in-tetrahedron containment test.
pub const TOL_IN: f32 = 1e-5;

/// An unordered triangle of vertex positions. Equality is positional, not
/// by vertex order — two tetrahedra sharing a face will generally have
/// stored its three corners in different winding order.
#[derive(Debug, Clone, Copy)]
pub struct Face {
    pub p1: Point3,
    pub p2: Point3,
    pub p3: Point3,
}

impl Face {
    pub const fn new(p1: Point3, p2: Point3, p3: Point3) -> Self {
        Self { p1, p2, p3 }
    }

    /// Outward-pointing normal: normalize((p2-p1) × (p3-p1)).
    pub fn normal(&self) -> Vec3 {
        (self.p2 - self.p1).cross(self.p3 - self.p1).normalized()
    }

    /// Positional, order-independent equality: true iff `other` names the
    /// same three corners (in any order), within `eps` squared-distance.
    pub fn same_triangle(&self, other: &Face, eps: f32) -> bool {
        let mine = [self.p1, self.p2, self.p3];
        let theirs = [other.p1, other.p2, other.p3];
        mine.iter().all(|m| theirs.iter().any(|t| m.approx_eq(*t, eps)))
            && theirs.iter().all(|t| mine.iter().any(|m| m.approx_eq(*t, eps)))
    }
}

/// Classification of where a ray hit a triangle, used by the locator to
/// decide which adjacency list (face/edge/vertex neighbors) to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitFeature {
    /// Ray is parallel to the triangle's plane, or the intersection falls
    /// outside the triangle / behind the ray origin.
    None,
    /// Intersection is a single vertex of the triangle.
    Vertex,
    /// Intersection lies on one of the triangle's edges.
    Edge,
    /// Intersection lies strictly inside the triangle.
    Interior,
}

#[derive(Debug, Clone, Copy)]
pub struct TriHit {
    pub t: f32,
    pub b1: f32,
    pub b2: f32,
    pub feature: HitFeature,
    /// The hit's defining points: 1 for a vertex hit, 2 for an edge hit,
    /// 3 (the whole triangle) for an interior hit. Unused slots are `None`.
    pub p1: Point3,
    pub p2: Option<Point3>,
    pub p3: Option<Point3>,
}

/// Möller–Trumbore ray/triangle intersection (spec §4.A). Returns `None`
/// when the ray is parallel to the triangle's plane, the hit is behind the
/// ray origin, or the barycentric coordinates fall outside the triangle.
pub fn ray_triangle_intersection(p0: Point3, p1: Point3, p2: Point3, ray: &Ray) -> Option<TriHit> {
    let s = ray.origin - p0;
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let s1 = ray.direction.cross(e2);
    let s2 = s.cross(e1);

    let divisor = s1.dot(e1);
    if divisor.abs() < TOL_B {
        return None;
    }

    let t = s2.dot(e2) / divisor;
    let b1 = s1.dot(s) / divisor;
    let b2 = s2.dot(ray.direction) / divisor;

    if t < 0.0 || b1 < -TOL_B || b2 < -TOL_B || b1 + b2 > 1.0 + TOL_B {
        return None;
    }

    let near = |x: f32, target: f32| (x - target).abs() < TOL_B;
    let b1_zero = near(b1, 0.0);
    let b2_zero = near(b2, 0.0);
    let sum_one = near(b1 + b2, 1.0);

    let degeneracies = [b1_zero, b2_zero, sum_one].iter().filter(|d| **d).count();

    let (feature, p1_pt, p2_pt, p3_pt) = match degeneracies {
        0 => (HitFeature::Interior, p0, Some(p1), Some(p2)),
        1 => {
            // Exactly one of {b1=0, b2=0, b1+b2=1} — an edge hit.
            if b1_zero {
                (HitFeature::Edge, p0, Some(p2), None)
            } else if b2_zero {
                (HitFeature::Edge, p0, Some(p1), None)
            } else {
                (HitFeature::Edge, p1, Some(p2), None)
            }
        }
        2 => {
            // Two degeneracies — a vertex hit.
            if b1_zero && b2_zero {
                (HitFeature::Vertex, p0, None, None)
            } else if b1_zero && sum_one {
                (HitFeature::Vertex, p2, None, None)
            } else {
                (HitFeature::Vertex, p1, None, None)
            }
        }
        _ => (HitFeature::None, p0, None, None),
    };

    if feature == HitFeature::None {
        return None;
    }

    Some(TriHit {
        t,
        b1,
        b2,
        feature,
        p1: p1_pt,
        p2: p2_pt,
        p3: p3_pt,
    })
}

/// Optical properties of a tetrahedron. Every field must be finite before
/// the transport kernel runs (spec §3 invariant); `Attribute::is_finite`
/// is the load-time check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribute {
    /// Absorption coefficient μₐ, ≥ 0.
    pub mua: f32,
    /// Scattering coefficient μₛ, ≥ 0.
    pub mus: f32,
    /// Henyey–Greenstein anisotropy g, -1 < g < 1.
    pub g: f32,
    /// Refractive index n, > 0.
    pub n: f32,
}

impl Attribute {
    pub const NAN: Attribute = Attribute {
        mua: f32::NAN,
        mus: f32::NAN,
        g: f32::NAN,
        n: f32::NAN,
    };

    pub fn is_finite(&self) -> bool {
        self.mua.is_finite() && self.mus.is_finite() && self.g.is_finite() && self.n.is_finite()
    }
}

/// A tetrahedron: four vertex positions, their four outward-oriented
/// bounding faces, and the optical attributes the kernel reads on every
/// step. Called "Pyramid" in the FORTRAN/Kokkos ancestor of this code —
/// spelled out here since it is, geometrically, a tetrahedron.
#[derive(Debug, Clone, Copy)]
pub struct Tetrahedron {
    pub v: [Point3; 4],
    /// f[k] is the face opposite vertex v[k].
    pub f: [Face; 4],
    pub attr: Attribute,
    /// The material id this tetrahedron was tagged with in the mesh file's
    /// `volumeelements` section — the key the policy file resolves optical
    /// properties and emission/collection classification from.
    pub material: u32,
}

impl Tetrahedron {
    /// Builds a tetrahedron from four vertex positions, verifying (and
    /// flipping, if necessary) each face's winding so its normal points
    /// outward — away from the tetrahedron's fourth vertex. Per spec §9,
    /// an implementation MUST do this rather than assume input winding.
    pub fn new(v0: Point3, v1: Point3, v2: Point3, v3: Point3) -> Self {
        let v = [v0, v1, v2, v3];
        let opposite = [(v1, v2, v3), (v0, v2, v3), (v0, v1, v3), (v0, v1, v2)];
        let mut f = [Face::new(v0, v1, v2); 4];
        for (k, &(a, b, c)) in opposite.iter().enumerate() {
            let other_vertex = v[k];
            let normal = (b - a).cross(c - a);
            // The outward normal must point away from the opposite vertex.
            let inward = normal.dot(other_vertex - a) > 0.0;
            f[k] = if inward { Face::new(a, c, b) } else { Face::new(a, b, c) };
        }
        Self {
            v,
            f,
            attr: Attribute::NAN,
            material: 0,
        }
    }

    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attr = attr;
        self
    }

    pub fn with_material(mut self, material: u32) -> Self {
        self.material = material;
        self
    }

    pub fn has_face(&self, face: &Face, eps: f32) -> bool {
        self.f.iter().any(|own| own.same_triangle(face, eps))
    }

    /// Signed distance of `p` from `face`'s plane, along its outward normal.
    /// Negative or zero means `p` is on the interior side.
    fn signed_distance(face: &Face, p: Point3) -> f32 {
        let n = face.normal();
        n.dot(p) - n.dot(face.p1)
    }

    /// Point-in-tetrahedron test: `p` is inside iff it is on the interior
    /// side of all four faces (spec §4.C.1).
    pub fn contains(&self, p: Point3) -> bool {
        self.f.iter().all(|face| Self::signed_distance(face, p) <= TOL_IN)
    }

    pub fn centroid(&self) -> Point3 {
        (self.v[0] + self.v[1] + self.v[2] + self.v[3]) * 0.25
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tet() -> Tetrahedron {
        Tetrahedron::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn faces_point_outward() {
        let t = unit_tet();
        for k in 0..4 {
            let d = Tetrahedron::signed_distance(&t.f[k], t.v[k]);
            assert!(d > 0.0, "face {k} normal should point away from opposite vertex");
        }
    }

    #[test]
    fn centroid_is_contained() {
        let t = unit_tet();
        assert!(t.contains(t.centroid()));
    }

    #[test]
    fn far_point_is_not_contained() {
        let t = unit_tet();
        assert!(!t.contains(Point3::new(5.0, 5.0, 5.0)));
    }

    #[test]
    fn ray_through_centroid_hits_a_face_interior() {
        let t = unit_tet();
        let ray = Ray::new(t.centroid(), Vec3::new(1.0, 1.0, 1.0).normalized());
        let hits: Vec<_> = t
            .f
            .iter()
            .filter_map(|f| ray_triangle_intersection(f.p1, f.p2, f.p3, &ray))
            .collect();
        assert!(!hits.is_empty());
    }

    #[test]
    fn face_equality_is_order_independent() {
        let a = Face::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0));
        let b = Face::new(Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0), Point3::new(0.0, 0.0, 0.0));
        assert!(a.same_triangle(&b, 1e-6));
    }
}
