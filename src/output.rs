//! Termination-record output (spec §6): one line per photon,
//! `type tet_index x y z dx dy dz weight`, written to a file or stdout.

use std::io::{self, Write};

use crate::photon::{Classification, TerminationRecord};

fn type_str(c: Classification) -> &'static str {
    match c {
        Classification::Emit => "EMIT",
        Classification::Collect => "COLLECT",
        Classification::OutOfRange => "OUTOFRANGE",
        Classification::Ignore => "IGNORE",
    }
}

/// Writes one line per record to `out`, in the order given.
pub fn write_records<W: Write>(out: &mut W, records: &[TerminationRecord]) -> io::Result<()> {
    for r in records {
        writeln!(
            out,
            "{} {} {} {} {} {} {} {} {}",
            type_str(r.classification),
            r.tet,
            r.pos.x,
            r.pos.y,
            r.pos.z,
            r.dir.x,
            r.dir.y,
            r.dir.z,
            r.weight,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn writes_one_line_per_record() {
        let records = vec![
            TerminationRecord {
                classification: Classification::Collect,
                tet: 3,
                pos: Vec3::new(1.0, 2.0, 3.0),
                dir: Vec3::unit_z(),
                weight: 0.5,
            },
            TerminationRecord {
                classification: Classification::Ignore,
                tet: 0,
                pos: Vec3::zero(),
                dir: Vec3::unit_z(),
                weight: 1.0,
            },
        ];
        let mut buf = Vec::new();
        write_records(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("COLLECT 3 "));
        assert!(lines[1].starts_with("IGNORE 0 "));
    }
}
