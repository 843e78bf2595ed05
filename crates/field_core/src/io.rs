//! OBJ input and field output.
//!
//! Meshes are read from the `v`/`f` subset of Wavefront OBJ. Fields are
//! written as OBJ files with one extra record per element:
//!
//! ```text
//! # degree 4
//! v 0 0 0
//! ...
//! vf 1 0 0 0.5    (per vertex)   or   ff 1 0 0   (per face)
//! ...
//! f 1 2 3
//! ```
//!
//! A `vf` record carries the world direction followed by its frame angle.
//! The angle is optional on input.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Vector3;

use crate::error::MeshError;
use crate::field::{frame_angle, FieldSolution};
use crate::mesh::{Mesh, MeshGeometry};

pub fn read_mesh(path: &Path) -> Result<Mesh, MeshError> {
    let file = File::open(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let obj = parse_obj(BufReader::new(file), path)?;
    Mesh::from_triangles(obj.positions, &obj.triangles)
}

/// Parse a mesh from any OBJ text source.
pub fn read_mesh_from<R: BufRead>(reader: R) -> Result<Mesh, MeshError> {
    let obj = parse_obj(reader, Path::new("<reader>"))?;
    Mesh::from_triangles(obj.positions, &obj.triangles)
}

/// Field file as read back from disk.
#[derive(Debug, Clone)]
pub struct FieldFile {
    pub degree: Option<u32>,
    pub positions: Vec<Vector3<f64>>,
    pub triangles: Vec<[usize; 3]>,
    pub vertex_directions: Vec<Vector3<f64>>,
    /// Frame angle stored with each `vf` record, if any.
    pub vertex_frame_angles: Vec<Option<f64>>,
    pub face_directions: Vec<Vector3<f64>>,
}

impl FieldFile {
    pub fn mesh(&self) -> Result<Mesh, MeshError> {
        Mesh::from_triangles(self.positions.clone(), &self.triangles)
    }

    /// Per-vertex frame angles. Stored angles are used as written; records
    /// without one are converted from their direction.
    pub fn vertex_angles(&self, mesh: &Mesh, geometry: &MeshGeometry) -> Result<Vec<f64>, MeshError> {
        if self.vertex_directions.len() != mesh.vertex_count() {
            return Err(MeshError::FieldCount {
                what: "vertex",
                declared: self.vertex_directions.len(),
                actual: mesh.vertex_count(),
            });
        }
        Ok(mesh
            .vertex_ids()
            .map(|v| match self.vertex_frame_angles.get(v.0).copied().flatten() {
                Some(theta) => theta,
                None => frame_angle(mesh, geometry, v, &self.vertex_directions[v.0]),
            })
            .collect())
    }
}

pub fn read_field(path: &Path) -> Result<FieldFile, MeshError> {
    let file = File::open(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let obj = parse_obj(BufReader::new(file), path)?;
    Ok(FieldFile {
        degree: obj.degree,
        positions: obj.positions,
        triangles: obj.triangles,
        vertex_directions: obj.vertex_directions,
        vertex_frame_angles: obj.vertex_frame_angles,
        face_directions: obj.face_directions,
    })
}

/// Write the mesh with one world-space direction per vertex.
pub fn write_field(
    path: &Path,
    mesh: &Mesh,
    geometry: &MeshGeometry,
    solution: &FieldSolution,
) -> Result<(), MeshError> {
    let directions = solution.vertex_directions(mesh, geometry);
    let angles = solution.direction_angles();
    write_obj(path, mesh, solution.degree(), "vf", &directions, Some(&angles))
}

/// Write the mesh with the field sampled at faces.
pub fn write_face_field(
    path: &Path,
    mesh: &Mesh,
    geometry: &MeshGeometry,
    solution: &FieldSolution,
) -> Result<(), MeshError> {
    let directions = solution.face_directions(mesh, geometry);
    write_obj(path, mesh, solution.degree(), "ff", &directions, None)
}

fn write_obj(
    path: &Path,
    mesh: &Mesh,
    degree: u32,
    tag: &str,
    directions: &[Vector3<f64>],
    angles: Option<&[f64]>,
) -> Result<(), MeshError> {
    let to_error = |source| MeshError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(to_error)?;
    let mut w = BufWriter::new(file);

    writeln!(w, "# degree {degree}").map_err(to_error)?;
    for vertex in mesh.vertices() {
        let p = vertex.position;
        writeln!(w, "v {} {} {}", p.x, p.y, p.z).map_err(to_error)?;
    }
    for (i, d) in directions.iter().enumerate() {
        match angles {
            Some(angles) => writeln!(w, "{tag} {} {} {} {}", d.x, d.y, d.z, angles[i]),
            None => writeln!(w, "{tag} {} {} {}", d.x, d.y, d.z),
        }
        .map_err(to_error)?;
    }
    for f in mesh.face_ids() {
        let [a, b, c] = mesh.face_vertices(f).map(|v| v.0 + 1);
        writeln!(w, "f {a} {b} {c}").map_err(to_error)?;
    }
    w.flush().map_err(to_error)?;
    tracing::debug!(path = %path.display(), tag, count = directions.len(), "wrote field");
    Ok(())
}

#[derive(Default)]
struct ObjData {
    degree: Option<u32>,
    positions: Vec<Vector3<f64>>,
    triangles: Vec<[usize; 3]>,
    vertex_directions: Vec<Vector3<f64>>,
    vertex_frame_angles: Vec<Option<f64>>,
    face_directions: Vec<Vector3<f64>>,
}

fn parse_obj<R: BufRead>(reader: R, path: &Path) -> Result<ObjData, MeshError> {
    let mut obj = ObjData::default();
    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line.map_err(|source| MeshError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => obj.positions.push(parse_vector(tokens, number)?),
            Some("vf") => {
                obj.vertex_directions.push(parse_vector(&mut tokens, number)?);
                let angle = tokens
                    .next()
                    .map(|token| {
                        token.parse::<f64>().map_err(|_| MeshError::Parse {
                            line: number,
                            message: format!("invalid frame angle '{token}'"),
                        })
                    })
                    .transpose()?;
                obj.vertex_frame_angles.push(angle);
            }
            Some("ff") => obj.face_directions.push(parse_vector(tokens, number)?),
            Some("f") => {
                let corners = tokens
                    .map(|token| parse_index(token, obj.positions.len(), number))
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(MeshError::Parse {
                        line: number,
                        message: format!("face has {} corners, need at least 3", corners.len()),
                    });
                }
                for k in 1..corners.len() - 1 {
                    obj.triangles.push([corners[0], corners[k], corners[k + 1]]);
                }
            }
            Some("#") => {
                if let (Some("degree"), Some(value)) = (tokens.next(), tokens.next()) {
                    obj.degree = value.parse().ok();
                }
            }
            _ => {}
        }
    }
    Ok(obj)
}

fn parse_vector<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<Vector3<f64>, MeshError> {
    let mut component = || -> Result<f64, MeshError> {
        let token = tokens.next().ok_or_else(|| MeshError::Parse {
            line,
            message: "expected three coordinates".to_string(),
        })?;
        token.parse().map_err(|_| MeshError::Parse {
            line,
            message: format!("invalid coordinate '{token}'"),
        })
    };
    Ok(Vector3::new(component()?, component()?, component()?))
}

/// Resolve one face corner (`a`, `a/b`, `a//c` or `a/b/c`) to a 0-based
/// vertex index. Negative indices count back from the last vertex read.
fn parse_index(token: &str, vertex_count: usize, line: usize) -> Result<usize, MeshError> {
    let head = token.split('/').next().unwrap_or(token);
    let raw: i64 = head.parse().map_err(|_| MeshError::Parse {
        line,
        message: format!("invalid vertex index '{token}'"),
    })?;
    let resolved = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => (vertex_count as i64 + r).try_into().ok(),
    };
    resolved.ok_or_else(|| MeshError::Parse {
        line,
        message: format!("vertex index {raw} is out of range"),
    })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::io::Cursor;
    use std::path::PathBuf;

    use num_complex::Complex;

    use super::*;
    use crate::connection::{wrap_angle, Connection};
    use crate::field::{FieldSynthesizer, SolveMode, SolveSettings};
    use crate::fixtures;
    use crate::mesh::VertexId;
    use crate::singularity::SingularitySet;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("field_core_{}_{name}", std::process::id()))
    }

    #[test]
    fn parses_quads_slashes_and_negative_indices() {
        let obj = "\
# a unit square
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
f 1/1 2//3 -2 -1
";
        let mesh = read_mesh_from(Cursor::new(obj)).expect("square should parse");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.edge_count(), 5);
    }

    #[test]
    fn reports_parse_errors_with_line_numbers() {
        let bad_coordinate = "v 0 0 0\nv 1 nope 0\n";
        match read_mesh_from(Cursor::new(bad_coordinate)) {
            Err(MeshError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result {other:?}"),
        }

        let bad_index = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 -7\n";
        match read_mesh_from(Cursor::new(bad_index)) {
            Err(MeshError::Parse { line, message }) => {
                assert_eq!(line, 4);
                assert!(message.contains("-7"));
            }
            other => panic!("unexpected result {other:?}"),
        }

        let short_face = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        assert!(matches!(
            read_mesh_from(Cursor::new(short_face)),
            Err(MeshError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            read_mesh_from(Cursor::new("# nothing here\n")),
            Err(MeshError::Empty)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = temp_path("does_not_exist.obj");
        assert!(matches!(read_mesh(&path), Err(MeshError::Io { .. })));
    }

    #[test]
    fn written_field_reproduces_vertex_angles() {
        let mesh = fixtures::icosphere(1);
        let degree = 4;
        let settings = SolveSettings {
            degree,
            ..SolveSettings::default()
        };
        let mut synthesizer = FieldSynthesizer::new(&mesh, settings).expect("degree is valid");
        let solution = synthesizer.compute_smoothest().expect("sphere solve");

        let path = temp_path("round_trip.obj");
        write_field(&path, &mesh, synthesizer.geometry(), &solution).expect("write field");
        let file = read_field(&path).expect("read field");
        std::fs::remove_file(&path).ok();

        assert_eq!(file.degree, Some(degree));
        assert!(file.face_directions.is_empty());
        let reread = file.mesh().expect("written mesh is valid");
        assert_eq!(reread.face_count(), mesh.face_count());

        let geometry = MeshGeometry::new(&reread);
        let angles = file.vertex_angles(&reread, &geometry).expect("counts match");
        let sector = 2.0 * PI / degree as f64;
        for (v, angle) in angles.iter().enumerate() {
            let difference = angle - solution.angles()[v];
            let steps = difference / sector;
            assert!(
                (steps - steps.round()).abs() < 1e-6,
                "vertex {v}: {angle} vs {}",
                solution.angles()[v]
            );
            assert!(wrap_angle(degree as f64 * difference).abs() < 1e-6);
        }
    }

    #[test]
    fn saddle_vertex_angle_survives_degree_one_round_trip() {
        let mesh = fixtures::saddle_fan(0.8);
        let geometry = MeshGeometry::new(&mesh);
        let center = VertexId(0);
        assert!(geometry.angle_scale(center) < 0.6);

        let connection = Connection::build(&mesh, &geometry, &SingularitySet::new(), 1)
            .expect("connection should build");
        let phases = vec![Complex::from_polar(1.0, 0.9 * PI); mesh.vertex_count()];
        let solution = FieldSolution::new(&mesh, &connection, SolveMode::Free, phases, 0.0);
        // θ / s_v lands well past π at the center.
        assert!((solution.angle(center) - 0.9 * PI).abs() < 1e-12);

        let path = temp_path("saddle.obj");
        write_field(&path, &mesh, &geometry, &solution).expect("write field");
        let file = read_field(&path).expect("read field");
        std::fs::remove_file(&path).ok();

        assert!(file.vertex_frame_angles.iter().all(Option::is_some));
        let reread = file.mesh().expect("written mesh is valid");
        let angles = file
            .vertex_angles(&reread, &MeshGeometry::new(&reread))
            .expect("counts match");
        for (v, angle) in angles.iter().enumerate() {
            assert!(
                wrap_angle(angle - solution.angles()[v]).abs() < 1e-9,
                "vertex {v}: {angle} vs {}",
                solution.angles()[v]
            );
        }
    }

    #[test]
    fn direction_only_records_fall_back_to_frame_angles() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvf 0 1 0\nvf 1 0 0 0.25\nvf 1 0 0\nf 1 2 3\n";
        let data = parse_obj(Cursor::new(obj), Path::new("<test>")).expect("field should parse");
        assert_eq!(data.vertex_frame_angles, vec![None, Some(0.25), None]);

        assert!(matches!(
            parse_obj(Cursor::new("vf 1 0 0 north\n"), Path::new("<test>")),
            Err(MeshError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn face_field_has_one_direction_per_face() {
        let mesh = fixtures::grid(3, 2, 1.0);
        let settings = SolveSettings {
            degree: 2,
            ..SolveSettings::default()
        };
        let mut synthesizer = FieldSynthesizer::new(&mesh, settings).expect("degree is valid");
        let solution = synthesizer.compute_smoothest().expect("flat solve");

        let path = temp_path("faces.obj");
        write_face_field(&path, &mesh, synthesizer.geometry(), &solution).expect("write field");
        let file = read_field(&path).expect("read field");
        std::fs::remove_file(&path).ok();

        assert_eq!(file.face_directions.len(), mesh.face_count());
        assert!(file.vertex_directions.is_empty());
        for d in &file.face_directions {
            assert!((d.norm() - 1.0).abs() < 1e-9);
            assert!(d.z.abs() < 1e-12);
        }
        let geometry = MeshGeometry::new(&mesh);
        assert!(matches!(
            file.vertex_angles(&mesh, &geometry),
            Err(MeshError::FieldCount { what: "vertex", .. })
        ));
    }
}
