//! TINOBJ: minimal indexed text mesh (OBJ subset) shared by the terrain pipeline.
//!
//! - One line per vertex:             `v x y z`
//! - One line per texture coordinate: `vt u v`          (u, v in [0,1])
//! - One line per triangle:           `f i/j i/j i/j`   or `f i i i`
//!
//! Indices are 1-based. Only the vertex index of an `i/j/k` group is
//! consulted; faces must reference exactly 3 vertices. No normals, no
//! polygon faces wider than 3 vertices, no material or group directives.
//! Unknown line prefixes are skipped, which keeps the parser tolerant of
//! files produced by other tools.
//!
//! Two line conventions are written:
//! - surface meshes: x/y in shortest decimal form, z fixed to 1 decimal,
//!   texcoords fixed to 4 decimals, faces pairing each vertex index with
//!   the matching texcoord index
//! - solid geometry: coordinates fixed to 2 decimals, faces as bare vertex
//!   triples over consecutive vertices
//!
//! [`ObjWriter`] owns the running 1-based vertex index offset, so several
//! solids appended in sequence land in one growing mesh without index
//! collisions.

use std::fs::File;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;

/// Indexed triangle mesh.
///
/// Invariants: every triangle index is within the vertex array; texcoords
/// are either empty or exactly one per vertex.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// Texture coordinates, one per vertex when present.
    pub texcoords: Vec<[f64; 2]>,
    /// Triangles as 0-based vertex indices, consistent winding.
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

#[cold]
fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg.to_string())
}

#[inline]
fn parse_number(token: Option<&str>, line_no: usize) -> io::Result<f64> {
    token
        .ok_or_else(|| bad(&format!("line {line_no}: missing coordinate")))?
        .parse::<f64>()
        .map_err(|_| bad(&format!("line {line_no}: malformed number")))
}

#[inline]
fn parse_face_index(group: &str, line_no: usize) -> io::Result<u32> {
    // Only the leading vertex index of an `i/j/k` group matters here.
    let index: i64 = group
        .split('/')
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|_| bad(&format!("line {line_no}: malformed face index")))?;
    if index < 1 {
        return Err(bad(&format!("line {line_no}: face index must be >= 1")));
    }
    Ok((index - 1) as u32)
}

/// Parse a mesh from text. This is the single source of truth for parsing.
pub fn parse_obj_str(text: &str) -> io::Result<Mesh> {
    let mut mesh = Mesh::default();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some("v") => {
                let x = parse_number(tokens.next(), line_no)?;
                let y = parse_number(tokens.next(), line_no)?;
                let z = parse_number(tokens.next(), line_no)?;
                mesh.vertices.push([x, y, z]);
            }
            Some("vt") => {
                let u = parse_number(tokens.next(), line_no)?;
                let v = parse_number(tokens.next(), line_no)?;
                mesh.texcoords.push([u, v]);
            }
            Some("f") => {
                let groups: Vec<&str> = tokens.collect();
                if groups.len() != 3 {
                    return Err(bad(&format!(
                        "line {line_no}: face with {} vertices (triangles only)",
                        groups.len()
                    )));
                }
                let a = parse_face_index(groups[0], line_no)?;
                let b = parse_face_index(groups[1], line_no)?;
                let c = parse_face_index(groups[2], line_no)?;
                mesh.triangles.push([a, b, c]);
            }
            // Comments, normals, materials and anything else are ignored.
            _ => {}
        }
    }

    let n = mesh.vertices.len() as u32;
    for tri in &mesh.triangles {
        if tri.iter().any(|&i| i >= n) {
            return Err(bad("face references an out-of-range vertex"));
        }
    }
    if !mesh.texcoords.is_empty() && mesh.texcoords.len() != mesh.vertices.len() {
        return Err(bad("texcoord count does not match vertex count"));
    }

    Ok(mesh)
}

/// Read and parse a mesh file.
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Mesh> {
    let text = std::fs::read_to_string(path)?;
    parse_obj_str(&text)
}

/// Streaming mesh writer with a running 1-based vertex index offset.
///
/// The offset advances by the number of vertices each call writes, so the
/// face indices of feature N are shifted by the total vertex count of
/// features 0..N. The offset is owned here and never ambient state.
#[derive(Debug)]
pub struct ObjWriter<W: Write> {
    out: W,
    next_index: u64,
}

impl<W: Write> ObjWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, next_index: 1 }
    }

    /// The 1-based index the next written vertex will receive.
    #[inline]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Write an indexed surface mesh: vertices (z fixed to 0.1), texcoords
    /// (4 decimals) and faces pairing each vertex index with its texcoord.
    pub fn write_surface(&mut self, mesh: &Mesh) -> io::Result<()> {
        if !mesh.texcoords.is_empty() && mesh.texcoords.len() != mesh.vertices.len() {
            return Err(bad("texcoord count does not match vertex count"));
        }

        for v in &mesh.vertices {
            writeln!(self.out, "v {} {} {:.1}", v[0], v[1], v[2])?;
        }
        for t in &mesh.texcoords {
            writeln!(self.out, "vt {:.4} {:.4}", t[0], t[1])?;
        }

        let base = self.next_index;
        let with_texcoords = !mesh.texcoords.is_empty();
        for tri in &mesh.triangles {
            let [a, b, c] = [
                base + tri[0] as u64,
                base + tri[1] as u64,
                base + tri[2] as u64,
            ];
            if with_texcoords {
                writeln!(self.out, "f {a}/{a} {b}/{b} {c}/{c}")?;
            } else {
                writeln!(self.out, "f {a} {b} {c}")?;
            }
        }

        self.next_index += mesh.vertices.len() as u64;
        Ok(())
    }

    /// Append unindexed solid geometry: consecutive vertex triples, one
    /// triangle each. Coordinates are fixed to 2 decimals.
    pub fn append_solid(&mut self, vertices: &[[f64; 3]]) -> io::Result<()> {
        if vertices.len() % 3 != 0 {
            return Err(bad("solid vertex count must be a multiple of 3"));
        }

        for v in vertices {
            writeln!(self.out, "v {:.2} {:.2} {:.2}", v[0], v[1], v[2])?;
        }

        let base = self.next_index;
        for t in 0..(vertices.len() / 3) as u64 {
            let i = base + 3 * t;
            writeln!(self.out, "f {} {} {}", i, i + 1, i + 2)?;
        }

        self.next_index += vertices.len() as u64;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl ObjWriter<BufWriter<File>> {
    /// Create a writer over a freshly created file.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad_mesh() -> Mesh {
        Mesh {
            vertices: vec![
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.25],
                [1.0, 1.0, 1.5],
                [0.0, 1.0, 1.75],
            ],
            texcoords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            triangles: vec![[0, 2, 1], [0, 3, 2]],
        }
    }

    #[test]
    fn surface_round_trip() {
        let mesh = unit_quad_mesh();

        let mut writer = ObjWriter::new(Vec::new());
        writer.write_surface(&mesh).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();

        let parsed = parse_obj_str(&text).unwrap();
        assert_eq!(parsed.vertex_count(), mesh.vertex_count());
        assert_eq!(parsed.triangle_count(), mesh.triangle_count());
        assert_eq!(parsed.triangles, mesh.triangles);
        for (a, b) in parsed.vertices.iter().zip(&mesh.vertices) {
            for k in 0..3 {
                assert!((a[k] - b[k]).abs() <= 0.05 + 1e-9);
            }
        }
    }

    #[test]
    fn solid_appends_shift_face_indices() {
        let tri = |dz: f64| vec![[0.0, 0.0, dz], [1.0, 0.0, dz], [0.0, 1.0, dz]];

        let mut writer = ObjWriter::new(Vec::new());
        writer.append_solid(&tri(0.0)).unwrap();
        writer.append_solid(&tri(5.0)).unwrap();
        assert_eq!(writer.next_index(), 7);
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();

        let faces: Vec<&str> = text.lines().filter(|l| l.starts_with('f')).collect();
        assert_eq!(faces, vec!["f 1 2 3", "f 4 5 6"]);

        let parsed = parse_obj_str(&text).unwrap();
        assert_eq!(parsed.vertex_count(), 6);
        assert_eq!(parsed.triangles, vec![[0, 1, 2], [3, 4, 5]]);
    }

    #[test]
    fn solid_rejects_partial_triple() {
        let mut writer = ObjWriter::new(Vec::new());
        let err = writer
            .append_solid(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn parse_rejects_wide_faces_and_bad_indices() {
        assert!(parse_obj_str("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").is_err());
        assert!(parse_obj_str("v 0 0 0\nf 1 2 3\n").is_err());
        assert!(parse_obj_str("v 0 0 0\nv 1 0 0\nv 1 1 0\nf 0 1 2\n").is_err());
    }

    #[test]
    fn parse_takes_vertex_index_from_groups() {
        let mesh = parse_obj_str("v 0 0 0\nv 1 0 0\nv 1 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nf 1/1 2/2 3/3\n")
            .unwrap();
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        assert_eq!(mesh.texcoords.len(), 3);
    }
}
