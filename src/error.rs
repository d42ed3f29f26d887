//! Error taxonomy for mesh loading, initialization, and policy wiring
//! (spec §7, kinds 1 and 2 — fatal, surfaced to the user immediately).
//! Per-photon runtime failures (§7, kinds 3 and 4) are not `Result`s; they
//! are folded into `TerminationRecord`s by the transport kernel.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to read mesh file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed mesh file at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("tetrahedron {tet} has a non-finite {field} attribute")]
    NonFiniteAttribute { tet: usize, field: &'static str },

    #[error("mesh contains no tetrahedra")]
    EmptyMesh,

    #[error("tetrahedron {tet} exceeds the {kind}-neighbor diagnostic cap ({count} entries)")]
    AdjacencyOverflow {
        tet: usize,
        kind: &'static str,
        count: usize,
    },

    #[error("policy file references material {material}, which no tetrahedron uses")]
    UnknownMaterial { material: u32 },

    #[error("tetrahedron {tet} has material id {material} with no entry in the policy file")]
    MissingMaterial { tet: usize, material: u32 },

    #[error("policy file declares no EMIT material — there is nowhere to launch photons from")]
    NoEmitters,
}
