//! The tetrahedral locator (spec §4.C) — the traversal kernel that, given
//! a photon's current tetrahedron, position, and direction, finds the
//! exit face, the distance to it, and the unique neighbor tetrahedron on
//! the other side. This is the O(1)-per-step primitive the transport
//! kernel leans on for every free-flight segment.

use crate::geometry::{ray_triangle_intersection, Face, HitFeature};
use crate::math::{Point3, Ray, Vec3};
use crate::mesh::Mesh;

/// Guards against immediately re-intersecting the face a photon just
/// crossed (spec §4.C step 1, §9's note on a more principled scale-aware
/// guard). `1e6 * f32::EPSILON` is the value spec.md names directly.
pub const T_MIN_GUARD: f32 = 1_000_000.0 * f32::EPSILON;

/// Fraction of the mesh's minimum edge length used to nudge the probe
/// point past an edge/vertex hit before testing neighbor containment
/// (spec §4.C step 3, §9 "10% of min edge").
pub const PROBE_FRACTION: f32 = 0.1;

pub struct LocateResult {
    pub distance: f32,
    pub hit_face: Face,
    pub feature: HitFeature,
    /// `None` means no neighbor tetrahedron claims this face/edge/vertex —
    /// the photon is exiting the mesh's spatial domain at this point.
    pub neighbor: Option<u32>,
}

/// Runs the four-face ray cast from `pos` along `dir` inside tetrahedron
/// `current`, classifies the nearest valid hit, and resolves the unique
/// neighbor tetrahedron across it. Returns `None` only when the ray is
/// effectively parallel to all four faces within tolerance (spec §4.C:
/// "no exit found") — a runtime traversal failure the kernel folds into
/// an `Ignore` termination (spec §7 kind 3).
pub fn locate(mesh: &Mesh, current: u32, pos: Point3, dir: Vec3) -> Option<LocateResult> {
    let tet = &mesh.tets[current as usize];
    let ray = Ray::new(pos, dir);

    let mut best: Option<(usize, f32, crate::geometry::TriHit)> = None;
    for k in 0..4 {
        let face = tet.f[k];
        if let Some(hit) = ray_triangle_intersection(face.p1, face.p2, face.p3, &ray) {
            if hit.t <= T_MIN_GUARD {
                continue;
            }
            if best.as_ref().map_or(true, |(_, t, _)| hit.t < *t) {
                best = Some((k, hit.t, hit));
            }
        }
    }

    let (face_idx, t, hit) = best?;
    let hit_face = tet.f[face_idx];
    let min_edge = mesh.min_edge_length();
    let probe = pos + dir * (t + PROBE_FRACTION * min_edge);

    let neighbor = match hit.feature {
        HitFeature::Interior => mesh.face_neighbors[current as usize]
            .iter()
            .copied()
            .find(|&j| mesh.tets[j as usize].has_face(&hit_face, crate::geometry::TOL_IN)),
        HitFeature::Edge => mesh.edge_neighbors[current as usize]
            .iter()
            .copied()
            .find(|&j| mesh.tets[j as usize].contains(probe)),
        HitFeature::Vertex => mesh.vertex_neighbors[current as usize]
            .iter()
            .copied()
            .find(|&j| mesh.tets[j as usize].contains(probe)),
        HitFeature::None => None,
    };

    Some(LocateResult {
        distance: t,
        hit_face,
        feature: hit.feature,
        neighbor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Tetrahedron;

    fn two_tet_mesh() -> Mesh {
        // Shared face (0,1,2); apexes at +z and -z.
        let v0 = Point3::new(0.0, 0.0, 0.0);
        let v1 = Point3::new(1.0, 0.0, 0.0);
        let v2 = Point3::new(0.0, 1.0, 0.0);
        let top = Point3::new(0.2, 0.2, 1.0);
        let bottom = Point3::new(0.2, 0.2, -1.0);
        let t0 = Tetrahedron::new(v0, v1, v2, top);
        let t1 = Tetrahedron::new(v0, v1, v2, bottom);
        let mut mesh = Mesh {
            vertices: vec![v0, v1, v2, top, bottom],
            tets: vec![t0, t1],
            face_neighbors: vec![Vec::new(); 2],
            edge_neighbors: vec![Vec::new(); 2],
            vertex_neighbors: vec![Vec::new(); 2],
            min_edge_length: std::sync::OnceLock::new(),
        };
        mesh.build_adjacency().unwrap();
        mesh
    }

    #[test]
    fn locates_face_neighbor_through_shared_face() {
        let mesh = two_tet_mesh();
        assert!(mesh.face_neighbors[0].contains(&1));
        let centroid = mesh.tets[0].centroid();
        // Aim roughly at the shared base triangle's centroid from t0's apex side.
        let target = Point3::new(0.3, 0.3, 0.0);
        let dir = (target - centroid).normalized();
        let result = locate(&mesh, 0, centroid, dir);
        assert!(result.is_some());
    }

    #[test]
    fn interior_point_always_has_an_exit() {
        let mesh = two_tet_mesh();
        let centroid = mesh.tets[0].centroid();
        for dir in [
            Vec3::unit_z(),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(-1.0, -1.0, -1.0).normalized(),
        ] {
            assert!(locate(&mesh, 0, centroid, dir).is_some());
        }
    }
}
