//! Emission/collection policy and the optical-properties table (spec
//! §4.G, §6, §9 "avoid indirection through a vtable"). Both are keyed by
//! the `.vol` file's material id, then flattened into a plain per-tet
//! lookup table the kernel indexes directly — no dynamic dispatch.

use std::collections::HashMap;
use std::path::Path;

use crate::error::MeshError;
use crate::geometry::Attribute;
use crate::mesh::Mesh;
use crate::photon::Classification;

/// One material's optical properties plus its emission/collection role,
/// as declared in the policy file.
#[derive(Debug, Clone, Copy)]
pub struct MaterialEntry {
    pub attr: Attribute,
    pub class: Classification,
}

fn parse_class(tok: &str, line: usize) -> Result<Classification, MeshError> {
    match tok.to_ascii_uppercase().as_str() {
        "EMIT" => Ok(Classification::Emit),
        "COLLECT" => Ok(Classification::Collect),
        "OUTOFRANGE" => Ok(Classification::OutOfRange),
        "IGNORE" => Ok(Classification::Ignore),
        other => Err(MeshError::Parse {
            line,
            reason: format!("unknown classification '{other}'"),
        }),
    }
}

fn parse_field<T: std::str::FromStr>(tok: Option<&str>, line: usize) -> Result<T, MeshError> {
    tok.and_then(|s| s.parse().ok())
        .ok_or_else(|| MeshError::Parse {
            line,
            reason: "expected a numeric field".to_string(),
        })
}

/// Parses a sectioned text policy file:
///
/// ```text
/// materials
/// <count>
/// <material_id> mua mus g n CLASS
/// ...
/// ```
///
/// mirroring the `.vol` loader's own plain-text-sections style (spec §6).
pub fn load_policy_file(path: &Path) -> Result<HashMap<u32, MaterialEntry>, MeshError> {
    let text = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();

    let mut i = 0;
    while i < lines.len() && !lines[i].contains("materials") {
        i += 1;
    }
    if i >= lines.len() {
        return Err(MeshError::Parse {
            line: 0,
            reason: "missing 'materials' section".to_string(),
        });
    }
    i += 1;
    let count: usize = parse_field(lines.get(i).map(|l| l.trim()), i)?;
    i += 1;

    let mut table = HashMap::with_capacity(count);
    for _ in 0..count {
        let l = lines.get(i).ok_or_else(|| MeshError::Parse {
            line: i,
            reason: "unexpected end of file in materials section".to_string(),
        })?;
        let mut it = l.split_whitespace();
        let material: u32 = parse_field(it.next(), i)?;
        let mua: f32 = parse_field(it.next(), i)?;
        let mus: f32 = parse_field(it.next(), i)?;
        let g: f32 = parse_field(it.next(), i)?;
        let n: f32 = parse_field(it.next(), i)?;
        let class_tok = it.next().ok_or_else(|| MeshError::Parse {
            line: i,
            reason: "missing classification field".to_string(),
        })?;
        let class = parse_class(class_tok, i)?;
        table.insert(material, MaterialEntry { attr: Attribute { mua, mus, g, n }, class });
        i += 1;
    }
    Ok(table)
}

/// The flattened, per-tet lookup the kernel actually indexes: a plain
/// classification table plus the precomputed list of emitter tets (spec
/// §4.G: "pick uniformly from the set of EMIT tets").
pub struct PolicyTable {
    pub classification: Vec<Classification>,
    pub emit_tets: Vec<u32>,
}

impl PolicyTable {
    pub fn classify(&self, tet: u32) -> Classification {
        self.classification[tet as usize]
    }
}

/// Expands a material-keyed policy into per-tet optical attributes (set
/// directly on `mesh.tets[i].attr`) and a flat `PolicyTable`. Errors if
/// any tet's material id has no entry (spec §7 kind 2: fatal at init).
pub fn apply_policy(mesh: &mut Mesh, table: &HashMap<u32, MaterialEntry>) -> Result<PolicyTable, MeshError> {
    let mut classification = Vec::with_capacity(mesh.tets.len());
    let mut emit_tets = Vec::new();
    let mut used_materials = std::collections::HashSet::with_capacity(table.len());

    for (i, tet) in mesh.tets.iter_mut().enumerate() {
        let entry = table.get(&tet.material).ok_or(MeshError::MissingMaterial {
            tet: i,
            material: tet.material,
        })?;
        used_materials.insert(tet.material);
        *tet = tet.with_attribute(entry.attr);
        classification.push(entry.class);
        if entry.class == Classification::Emit {
            emit_tets.push(i as u32);
        }
    }

    if let Some(&material) = table.keys().find(|m| !used_materials.contains(m)) {
        return Err(MeshError::UnknownMaterial { material });
    }
    if emit_tets.is_empty() {
        return Err(MeshError::NoEmitters);
    }

    mesh.validate_attributes()?;
    Ok(PolicyTable { classification, emit_tets })
}
