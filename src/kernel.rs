//! The transport kernel (spec §4.E) — the state machine that weaves the
//! locator's ray/tetrahedron traversal with exponential free-flight
//! sampling, Fresnel reflection/refraction, Henyey–Greenstein scattering,
//! absorption weight updates, and Russian-roulette termination.

use rand::Rng;

use crate::locator::{self, LocateResult};
use crate::math::Vec3;
use crate::mesh::Mesh;
use crate::photon::{Classification, Photon, TerminationRecord};
use crate::policy::PolicyTable;

/// Russian-roulette weight threshold (spec §4.E).
pub const W_MIN: f32 = 1e-4;
/// Russian-roulette survival probability (spec §4.E).
pub const P_SURVIVE: f32 = 0.1;
/// Hard cap on face-crossing iterations within a single free-flight step
/// (spec §4.E) — defensive, not expected to trigger in practice.
pub const MAX_ITER: u32 = 100;
/// Recommended cap on outer (emit-to-termination) iterations (spec §4.E,
/// §5 "an outer-iteration bound is RECOMMENDED").
pub const MAX_OUTER_ITER: u32 = 100_000;

fn ignore(photon: &Photon) -> TerminationRecord {
    TerminationRecord {
        classification: Classification::Ignore,
        tet: photon.current,
        pos: photon.pos,
        dir: photon.dir,
        weight: photon.weight,
    }
}

/// Runs one photon from emission to termination, returning its
/// termination record. `tet` and `dir` are the emission site and
/// direction chosen by the emission policy (spec §4.G); `rng` is this
/// photon's private stream (spec §3, §5).
pub fn transport(
    mesh: &Mesh,
    policy: &PolicyTable,
    tet: u32,
    pos: crate::math::Point3,
    dir: Vec3,
    rng: &mut impl Rng,
) -> TerminationRecord {
    let mut photon = Photon::emit(tet, pos, dir.normalized());

    let mut outer_iter = 0u32;
    while photon.alive {
        outer_iter += 1;
        if outer_iter > MAX_OUTER_ITER {
            photon.alive = false;
            return ignore(&photon);
        }

        let attr = mesh.tets[photon.current as usize].attr;
        let sigma_t = attr.mua + attr.mus;
        let mut s = if sigma_t > 0.0 {
            -(rng.gen::<f32>().ln()) / sigma_t
        } else {
            1.0
        };

        let mut inner_iter = 0u32;
        loop {
            inner_iter += 1;
            if inner_iter > MAX_ITER {
                photon.alive = false;
                return ignore(&photon);
            }

            let loc = match locator::locate(mesh, photon.current, photon.pos, photon.dir) {
                Some(loc) => loc,
                None => {
                    // Ray parallel to all four faces within tolerance (spec §7 kind 3).
                    photon.alive = false;
                    return ignore(&photon);
                }
            };

            let Some(next_tet) = loc.neighbor else {
                // Locator found an exit but no neighbor claims it — either the
                // true mesh boundary, or an edge/vertex hit no tet matched
                // (spec §7 kind 3: both are traversal failures, not errors).
                photon.alive = false;
                return ignore(&photon);
            };

            match policy.classify(next_tet) {
                Classification::Collect => {
                    photon.alive = false;
                    return TerminationRecord {
                        classification: Classification::Collect,
                        tet: next_tet,
                        pos: photon.pos,
                        dir: photon.dir,
                        weight: photon.weight,
                    };
                }
                Classification::OutOfRange => {
                    photon.alive = false;
                    return TerminationRecord {
                        classification: Classification::OutOfRange,
                        tet: next_tet,
                        pos: photon.pos,
                        dir: photon.dir,
                        weight: photon.weight,
                    };
                }
                Classification::Ignore | Classification::Emit => {
                    // Ordinary tissue: no special handling, fall through to
                    // the move/cross-or-collide decision below.
                }
            }

            if s > loc.distance {
                photon.move_by(loc.distance);
                s -= loc.distance;
                deal_with_face(mesh, &mut photon, &loc, next_tet, rng);
            } else {
                photon.move_by(s);
                absorb(&mut photon, attr.mua, attr.mus);
                scatter(&mut photon, attr.g, rng);
                break;
            }
        }

        if photon.weight < W_MIN {
            let u: f32 = rng.gen();
            if u > P_SURVIVE {
                photon.alive = false;
                return ignore(&photon);
            }
            photon.weight /= P_SURVIVE;
        }
    }

    ignore(&photon)
}

/// Fresnel reflection/refraction at a refractive-index interface (spec
/// §4.E). `next_tet` is already known to exist and to classify as
/// ordinary tissue (Collect/OutOfRange short-circuit before this runs).
fn deal_with_face(mesh: &Mesh, photon: &mut Photon, loc: &LocateResult, next_tet: u32, rng: &mut impl Rng) {
    let normal = loc.hit_face.normal();
    let n1 = mesh.tets[photon.current as usize].attr.n;
    let n2 = mesh.tets[next_tet as usize].attr.n;
    let nr = n1 / n2;

    if nr == 1.0 {
        photon.current = next_tet;
        return;
    }

    let cos_theta_i = -(photon.dir.dot(normal));
    let discriminant = 1.0 - nr * nr * (1.0 - cos_theta_i * cos_theta_i);
    if discriminant <= 0.0 {
        mirror(photon, normal);
        return;
    }
    let cos_theta_t = discriminant.sqrt();

    let theta_i = cos_theta_i.abs().acos();
    let theta_t = cos_theta_t.acos();

    let r = if (theta_i + theta_t).sin().abs() < 1e-15 {
        ((nr - 1.0) / (nr + 1.0)).powi(2)
    } else {
        let sin_ratio = (theta_i - theta_t).sin() / (theta_i + theta_t).sin();
        let tan_ratio = (theta_i - theta_t).tan() / (theta_i + theta_t).tan();
        0.5 * (sin_ratio * sin_ratio + tan_ratio * tan_ratio)
    };

    let xi: f32 = rng.gen();
    if xi <= r {
        mirror(photon, normal);
    } else {
        transmit(photon, next_tet, nr, cos_theta_i, cos_theta_t, normal);
    }
}

fn mirror(photon: &mut Photon, normal: Vec3) {
    photon.dir = photon.dir.reflect(normal).normalized();
    // `nextPyramid` reverts to `curPyramid` — current tet is unchanged.
}

fn transmit(photon: &mut Photon, next_tet: u32, nr: f32, cos_theta_i: f32, cos_theta_t: f32, normal: Vec3) {
    let factor = if cos_theta_i > 0.0 {
        nr * cos_theta_i - cos_theta_t
    } else {
        nr * cos_theta_i + cos_theta_t
    };
    photon.dir = (photon.dir * nr + normal * factor).normalized();
    photon.current = next_tet;
}

fn absorb(photon: &mut Photon, mua: f32, mus: f32) {
    if mua + mus > 0.0 {
        let dw = photon.weight * mua / (mua + mus);
        photon.weight -= dw;
    }
}

/// Henyey–Greenstein scattering (spec §4.E). The degenerate ξ∈{0,1}
/// fallback uses cosθ = ±1 (spec §9 / SPEC_FULL.md OQ-3), not the
/// original's dimensionally-invalid `(1-ξ)·π`.
fn scatter(photon: &mut Photon, g: f32, rng: &mut impl Rng) {
    let cos_theta = if g != 0.0 {
        let xi: f32 = rng.gen();
        if xi > 0.0 && xi < 1.0 {
            let g2 = g * g;
            (1.0 + g2 - ((1.0 - g2) / (1.0 - g * (1.0 - 2.0 * xi))).powi(2)) / (2.0 * g)
        } else if xi <= 0.0 {
            1.0
        } else {
            -1.0
        }
    } else {
        2.0 * rng.gen::<f32>() - 1.0
    };

    let phi = 2.0 * std::f32::consts::PI * rng.gen::<f32>();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let sin_psi = phi.sin();
    let cos_psi = phi.cos();

    let d = photon.dir;
    let new_dir = if d.z.abs() > 0.999 {
        Vec3::new(
            sin_theta * cos_psi,
            sin_theta * sin_psi,
            d.z.signum() * cos_theta,
        )
    } else {
        let denom = (1.0 - d.z * d.z).sqrt();
        Vec3::new(
            sin_theta * (d.x * d.z * cos_psi - d.y * sin_psi) / denom + d.x * cos_theta,
            sin_theta * (d.y * d.z * cos_psi + d.x * sin_psi) / denom + d.y * cos_theta,
            -sin_theta * cos_psi * denom + d.z * cos_theta,
        )
    };

    photon.dir = new_dir.normalized();
}
